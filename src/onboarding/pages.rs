//! Page map — the ordered table of onboarding screens.
//!
//! Page numbers are 1-based and contiguous. The map is bijective: each
//! screen identifier appears exactly once.

use std::collections::HashMap;

use crate::error::PageMapError;

/// Screens of the built-in onboarding questionnaire, in order.
pub const DEFAULT_SCREENS: &[&str] = &[
    "gender",
    "workouts",
    "source",
    "other-apps",
    "height-weight",
    "birthdate",
    "goal",
    "desired-weight",
    "goal-speed",
    "obstacles",
    "diet",
    "accomplish",
    "calculating",
    "plan-ready",
    "paywall",
];

/// Immutable page number ⇄ screen identifier mapping.
#[derive(Debug, Clone)]
pub struct PageMap {
    screens: Vec<String>,
    index: HashMap<String, u32>,
}

impl PageMap {
    /// Build a map from screens listed in page order.
    pub fn new<I, S>(screens: I) -> Result<Self, PageMapError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let screens: Vec<String> = screens.into_iter().map(Into::into).collect();
        if screens.is_empty() {
            return Err(PageMapError::Empty);
        }

        let mut index = HashMap::with_capacity(screens.len());
        for (i, screen) in screens.iter().enumerate() {
            let page = i as u32 + 1;
            if screen.is_empty() {
                return Err(PageMapError::EmptyScreen { page });
            }
            if screen.contains('/') {
                return Err(PageMapError::InvalidScreen {
                    screen: screen.clone(),
                });
            }
            if let Some(first) = index.insert(screen.clone(), page) {
                return Err(PageMapError::Duplicate {
                    screen: screen.clone(),
                    first,
                    second: page,
                });
            }
        }

        Ok(Self { screens, index })
    }

    /// The screen identifier at `page`, or `None` when out of range.
    pub fn screen_name(&self, page: u32) -> Option<&str> {
        let idx = usize::try_from(page).ok()?.checked_sub(1)?;
        self.screens.get(idx).map(String::as_str)
    }

    /// The page number of `screen`, or `None` when unknown.
    pub fn page_number(&self, screen: &str) -> Option<u32> {
        self.index.get(screen).copied()
    }

    pub fn total_pages(&self) -> u32 {
        self.screens.len() as u32
    }

    pub fn contains_page(&self, page: u32) -> bool {
        (1..=self.total_pages()).contains(&page)
    }

    /// The final screen of the flow.
    pub fn last_screen(&self) -> &str {
        // Construction guarantees at least one screen.
        self.screens.last().map(String::as_str).unwrap_or_default()
    }

    /// Iterate `(page, screen)` in page order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.screens
            .iter()
            .enumerate()
            .map(|(i, s)| (i as u32 + 1, s.as_str()))
    }
}

impl Default for PageMap {
    fn default() -> Self {
        let screens: Vec<String> = DEFAULT_SCREENS.iter().map(|s| s.to_string()).collect();
        let index = screens
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), i as u32 + 1))
            .collect();
        Self { screens, index }
    }
}
