//! Navigation derivation — next/previous/jump/progress from explicit state.
//!
//! Nothing here reads ambient router state. Callers pass the active route as
//! a [`NavState`] and a [`Navigator`] that performs the actual transition.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::error::NavigationError;

use super::pages::PageMap;

/// Route prefix under which onboarding screens live.
pub const ONBOARDING_PREFIX: &str = "/onboarding";

/// Route of the main app, entered once onboarding is complete.
pub const MAIN_ROUTE: &str = "/home";

/// Routes kept by [`HistoryNavigator`]. The oldest entries are dropped first.
pub const MAX_HISTORY: usize = 64;

/// Routing primitive. Implemented by the host app's router.
pub trait Navigator: Send + Sync {
    /// Navigate forward to `route`, keeping history.
    fn push(&self, route: &str);
    /// Replace the current route without adding history.
    fn replace(&self, route: &str);
    /// Generic back navigation.
    fn back(&self);
}

/// Snapshot of the active route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavState {
    route: String,
}

impl NavState {
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
        }
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    /// Last non-empty path segment, ignoring query and fragment.
    pub fn last_segment(&self) -> Option<&str> {
        let path = self
            .route
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/');
        path.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

/// Result of a navigation call that did navigate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavOutcome {
    /// A page-map screen was pushed.
    Pushed { page: u32, screen: String },
    /// Generic back navigation out of the flow.
    ExitedFlow,
}

/// `round(page / total * 100)`.
pub fn progress_percent(page: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(page) / f64::from(total) * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Derives navigation targets from a page map.
#[derive(Debug, Clone)]
pub struct FlowSequencer {
    pages: Arc<PageMap>,
}

impl FlowSequencer {
    pub fn new(pages: Arc<PageMap>) -> Self {
        Self { pages }
    }

    pub fn pages(&self) -> &PageMap {
        &self.pages
    }

    pub fn total_pages(&self) -> u32 {
        self.pages.total_pages()
    }

    /// Route for an onboarding screen.
    pub fn screen_route(&self, screen: &str) -> String {
        format!("{ONBOARDING_PREFIX}/{screen}")
    }

    /// Page for the active route. Falls back to page 1 when the route does
    /// not name a known screen (e.g. the router has not settled yet).
    pub fn current_page(&self, state: &NavState) -> u32 {
        state
            .last_segment()
            .and_then(|segment| self.pages.page_number(segment))
            .unwrap_or(1)
    }

    pub fn progress(&self, state: &NavState) -> u8 {
        progress_percent(self.current_page(state), self.total_pages())
    }

    /// Whether the route is an onboarding screen route at all.
    pub fn in_flow(&self, state: &NavState) -> bool {
        state
            .route()
            .strip_prefix(ONBOARDING_PREFIX)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Completion is only allowed from the final screen of the map.
    pub fn ensure_last_page(&self, state: &NavState) -> Result<(), NavigationError> {
        let last = self.pages.last_screen();
        if self.in_flow(state) && state.last_segment() == Some(last) {
            return Ok(());
        }
        tracing::warn!(route = state.route(), last, "Completion requested before the final page");
        Err(NavigationError::NotOnLastPage {
            route: state.route().to_string(),
            last: last.to_string(),
        })
    }

    /// Push the page after the current one.
    pub fn next(
        &self,
        state: &NavState,
        navigator: &dyn Navigator,
    ) -> Result<NavOutcome, NavigationError> {
        let current = self.current_page(state);
        let total = self.total_pages();
        let target = current + 1;
        if target > total {
            tracing::warn!(current, total, "Already at last onboarding page, not navigating");
            return Err(NavigationError::PastLastPage { current, total });
        }
        Ok(self.push_page(target, navigator))
    }

    /// Push the page before the current one, or leave the flow via generic
    /// back navigation when already on page 1.
    pub fn previous(&self, state: &NavState, navigator: &dyn Navigator) -> NavOutcome {
        let current = self.current_page(state);
        if current <= 1 {
            tracing::debug!("On first onboarding page, falling back to generic back");
            navigator.back();
            return NavOutcome::ExitedFlow;
        }
        self.push_page(current - 1, navigator)
    }

    /// Push an arbitrary page.
    pub fn go_to(
        &self,
        page: u32,
        navigator: &dyn Navigator,
    ) -> Result<NavOutcome, NavigationError> {
        let total = self.total_pages();
        if !self.pages.contains_page(page) {
            tracing::error!(page, total, "Invalid onboarding page requested");
            return Err(NavigationError::PageOutOfRange { page, total });
        }
        Ok(self.push_page(page, navigator))
    }

    /// Where a user should land on app start.
    pub fn entry_route(&self, onboarding_complete: bool) -> String {
        if onboarding_complete {
            MAIN_ROUTE.to_string()
        } else {
            self.screen_route(self.pages.screen_name(1).unwrap_or_default())
        }
    }

    /// Leave the flow for the main app. Used by the paywall step instead of
    /// advancing past the last page.
    pub fn exit_to_main(&self, navigator: &dyn Navigator) -> String {
        navigator.replace(MAIN_ROUTE);
        MAIN_ROUTE.to_string()
    }

    fn push_page(&self, page: u32, navigator: &dyn Navigator) -> NavOutcome {
        // Callers have range-checked `page`.
        let screen = self.pages.screen_name(page).unwrap_or_default().to_string();
        let route = self.screen_route(&screen);
        tracing::debug!(page, screen = %screen, "Navigating");
        navigator.push(&route);
        NavOutcome::Pushed { page, screen }
    }
}

// ── HistoryNavigator ────────────────────────────────────────────────

/// In-memory `Navigator` that tracks a route stack.
///
/// Used by the HTTP layer, which has no router of its own.
pub struct HistoryNavigator {
    stack: Mutex<Vec<String>>,
}

impl HistoryNavigator {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            stack: Mutex::new(vec![initial.into()]),
        }
    }

    fn stack(&self) -> MutexGuard<'_, Vec<String>> {
        self.stack.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn current_route(&self) -> String {
        self.stack().last().cloned().unwrap_or_default()
    }

    pub fn state(&self) -> NavState {
        NavState::new(self.current_route())
    }

    pub fn depth(&self) -> usize {
        self.stack().len()
    }
}

impl Navigator for HistoryNavigator {
    fn push(&self, route: &str) {
        let mut stack = self.stack();
        stack.push(route.to_string());
        if stack.len() > MAX_HISTORY {
            let excess = stack.len() - MAX_HISTORY;
            stack.drain(..excess);
        }
    }

    fn replace(&self, route: &str) {
        let mut stack = self.stack();
        stack.clear();
        stack.push(route.to_string());
    }

    fn back(&self) {
        let mut stack = self.stack();
        if stack.len() > 1 {
            stack.pop();
        } else {
            tracing::debug!("Back requested with no history, ignoring");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Push(String),
        Replace(String),
        Back,
    }

    #[derive(Default)]
    struct Spy {
        calls: Mutex<Vec<Call>>,
    }

    impl Spy {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Navigator for Spy {
        fn push(&self, route: &str) {
            self.calls.lock().unwrap().push(Call::Push(route.to_string()));
        }
        fn replace(&self, route: &str) {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Replace(route.to_string()));
        }
        fn back(&self) {
            self.calls.lock().unwrap().push(Call::Back);
        }
    }

    fn seq() -> FlowSequencer {
        let map = PageMap::new(["gender", "weight", "paywall"]).unwrap();
        FlowSequencer::new(Arc::new(map))
    }

    #[test]
    fn last_segment_parsing() {
        assert_eq!(NavState::new("/onboarding/weight").last_segment(), Some("weight"));
        assert_eq!(NavState::new("/onboarding/weight/").last_segment(), Some("weight"));
        assert_eq!(
            NavState::new("/onboarding/weight?from=edit#top").last_segment(),
            Some("weight")
        );
        assert_eq!(NavState::new("weight").last_segment(), Some("weight"));
        assert_eq!(NavState::new("/").last_segment(), None);
        assert_eq!(NavState::new("").last_segment(), None);
    }

    #[test]
    fn current_page_defaults_to_one() {
        let seq = seq();
        assert_eq!(seq.current_page(&NavState::new("/onboarding/weight")), 2);
        assert_eq!(seq.current_page(&NavState::new("/onboarding/unknown")), 1);
        assert_eq!(seq.current_page(&NavState::new("")), 1);
    }

    #[test]
    fn progress_bounds() {
        let seq = seq();
        assert_eq!(seq.progress(&NavState::new("/onboarding/gender")), 33);
        assert_eq!(seq.progress(&NavState::new("/onboarding/paywall")), 100);
        assert_eq!(progress_percent(1, 15), 7);
        assert_eq!(progress_percent(15, 15), 100);
        assert_eq!(progress_percent(1, 0), 0);
    }

    #[test]
    fn next_pushes_following_screen() {
        let seq = seq();
        let spy = Spy::default();
        let state = NavState::new("/onboarding/weight");
        let outcome = seq.next(&state, &spy).unwrap();
        assert_eq!(
            outcome,
            NavOutcome::Pushed {
                page: 3,
                screen: "paywall".to_string()
            }
        );
        assert_eq!(spy.calls(), vec![Call::Push("/onboarding/paywall".to_string())]);
        assert_eq!(seq.progress(&NavState::new("/onboarding/paywall")), 100);
    }

    #[test]
    fn next_from_last_page_does_not_navigate() {
        let seq = seq();
        let spy = Spy::default();
        let err = seq
            .next(&NavState::new("/onboarding/paywall"), &spy)
            .unwrap_err();
        assert_eq!(err, NavigationError::PastLastPage { current: 3, total: 3 });
        assert!(spy.calls().is_empty());
    }

    #[test]
    fn previous_from_first_page_goes_back_once() {
        let seq = seq();
        let spy = Spy::default();
        let outcome = seq.previous(&NavState::new("/onboarding/gender"), &spy);
        assert_eq!(outcome, NavOutcome::ExitedFlow);
        assert_eq!(spy.calls(), vec![Call::Back]);
    }

    #[test]
    fn previous_pushes_prior_screen() {
        let seq = seq();
        let spy = Spy::default();
        let outcome = seq.previous(&NavState::new("/onboarding/paywall"), &spy);
        assert_eq!(
            outcome,
            NavOutcome::Pushed {
                page: 2,
                screen: "weight".to_string()
            }
        );
        assert_eq!(spy.calls(), vec![Call::Push("/onboarding/weight".to_string())]);
    }

    #[test]
    fn go_to_validates_range() {
        let seq = seq();
        let spy = Spy::default();
        assert_eq!(
            seq.go_to(0, &spy).unwrap_err(),
            NavigationError::PageOutOfRange { page: 0, total: 3 }
        );
        assert_eq!(
            seq.go_to(4, &spy).unwrap_err(),
            NavigationError::PageOutOfRange { page: 4, total: 3 }
        );
        assert!(spy.calls().is_empty());

        seq.go_to(2, &spy).unwrap();
        assert_eq!(spy.calls(), vec![Call::Push("/onboarding/weight".to_string())]);
    }

    #[test]
    fn entry_route_and_exit() {
        let seq = seq();
        assert_eq!(seq.entry_route(false), "/onboarding/gender");
        assert_eq!(seq.entry_route(true), MAIN_ROUTE);

        let spy = Spy::default();
        assert_eq!(seq.exit_to_main(&spy), MAIN_ROUTE);
        assert_eq!(spy.calls(), vec![Call::Replace(MAIN_ROUTE.to_string())]);
    }

    #[test]
    fn history_navigator_tracks_stack() {
        let nav = HistoryNavigator::new("/onboarding/gender");
        nav.push("/onboarding/weight");
        assert_eq!(nav.current_route(), "/onboarding/weight");
        assert_eq!(nav.depth(), 2);

        nav.back();
        assert_eq!(nav.current_route(), "/onboarding/gender");
        // Bottom of the stack stays put.
        nav.back();
        assert_eq!(nav.current_route(), "/onboarding/gender");

        nav.push("/onboarding/paywall");
        nav.replace(MAIN_ROUTE);
        assert_eq!(nav.depth(), 1);
        assert_eq!(nav.state().route(), MAIN_ROUTE);
    }

    #[test]
    fn history_navigator_is_bounded() {
        let seq = seq();
        let nav = HistoryNavigator::new(seq.entry_route(false));
        for _ in 0..100 {
            seq.next(&nav.state(), &nav).unwrap();
            seq.previous(&nav.state(), &nav);
        }
        assert_eq!(nav.depth(), MAX_HISTORY);
        assert_eq!(nav.current_route(), "/onboarding/gender");

        nav.back();
        assert_eq!(nav.current_route(), "/onboarding/weight");
    }

    #[test]
    fn completion_only_from_last_page() {
        let seq = seq();
        assert!(seq.ensure_last_page(&NavState::new("/onboarding/paywall")).is_ok());
        assert!(seq.ensure_last_page(&NavState::new("/onboarding/paywall/")).is_ok());

        let err = seq
            .ensure_last_page(&NavState::new("/onboarding/gender"))
            .unwrap_err();
        assert_eq!(
            err,
            NavigationError::NotOnLastPage {
                route: "/onboarding/gender".to_string(),
                last: "paywall".to_string(),
            }
        );
        assert!(seq.ensure_last_page(&NavState::new("/shop/paywall")).is_err());
        assert!(seq.ensure_last_page(&NavState::new(MAIN_ROUTE)).is_err());
    }

    #[test]
    fn in_flow_requires_onboarding_prefix() {
        let seq = seq();
        assert!(seq.in_flow(&NavState::new("/onboarding/weight")));
        assert!(!seq.in_flow(&NavState::new(MAIN_ROUTE)));
        assert!(!seq.in_flow(&NavState::new("/onboardingx/weight")));
    }

    #[test]
    fn sequencer_drives_history_navigator() {
        let seq = seq();
        let nav = HistoryNavigator::new(seq.entry_route(false));
        seq.next(&nav.state(), &nav).unwrap();
        seq.next(&nav.state(), &nav).unwrap();
        assert_eq!(seq.current_page(&nav.state()), 3);
        assert!(seq.next(&nav.state(), &nav).is_err());
        assert_eq!(seq.progress(&nav.state()), 100);
    }
}
