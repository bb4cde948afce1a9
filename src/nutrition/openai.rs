//! OpenAI chat-completions planner.
//!
//! Sends the validated profile as JSON and expects a JSON object back with
//! `calories`, `protein`, `carbs`, `fat` and `rationale`. Models sometimes
//! wrap the object in a fenced code block, so the first `{ ... }` span of the
//! reply is what gets parsed.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::PlanError;

use super::NutritionPlanner;
use super::model::{NutritionRecommendation, PlanInput};

const PLANNER_NAME: &str = "openai";

static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("static regex is valid"));

const SYSTEM_PROMPT: &str = "You are a registered dietitian. Given a user's profile, \
respond with a JSON object containing integer daily targets: \"calories\" (kcal), \
\"protein\", \"carbs\" and \"fat\" (grams), plus a short \"rationale\" string written \
to the user. Output only the JSON object.";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPlan {
    calories: f64,
    protein: f64,
    carbs: f64,
    fat: f64,
    #[serde(default)]
    rationale: String,
}

pub struct OpenAiPlanner {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OpenAiPlanner {
    pub fn new(
        api_key: SecretString,
        base_url: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self, PlanError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlanError::Upstream {
                planner: PLANNER_NAME.to_string(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    fn request_body(&self, input: &PlanInput) -> Result<serde_json::Value, PlanError> {
        let profile = serde_json::to_string(input).map_err(|e| PlanError::InvalidResponse {
            planner: PLANNER_NAME.to_string(),
            reason: format!("Failed to encode profile: {e}"),
        })?;
        Ok(serde_json::json!({
            "model": self.model,
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": profile },
            ],
        }))
    }
}

/// Pull targets out of a model reply.
fn parse_plan(content: &str) -> Result<RawPlan, String> {
    let json = JSON_OBJECT
        .find(content)
        .ok_or_else(|| "no JSON object in reply".to_string())?;
    let plan: RawPlan = serde_json::from_str(json.as_str()).map_err(|e| e.to_string())?;

    for (field, value) in [
        ("calories", plan.calories),
        ("protein", plan.protein),
        ("carbs", plan.carbs),
        ("fat", plan.fat),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{field} must be a non-negative number, got {value}"));
        }
    }
    if !(800.0..=6000.0).contains(&plan.calories) {
        return Err(format!("calories {} outside 800..=6000", plan.calories));
    }
    Ok(plan)
}

#[async_trait]
impl NutritionPlanner for OpenAiPlanner {
    fn name(&self) -> &str {
        PLANNER_NAME
    }

    async fn recommend(&self, input: &PlanInput) -> Result<NutritionRecommendation, PlanError> {
        let body = self.request_body(input)?;
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlanError::Timeout {
                        planner: PLANNER_NAME.to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    PlanError::Upstream {
                        planner: PLANNER_NAME.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Plan request rejected");
            return Err(PlanError::Upstream {
                planner: PLANNER_NAME.to_string(),
                reason: format!("HTTP {status}: {}", truncate(&detail, 200)),
            });
        }

        let chat: ChatResponse = response.json().await.map_err(|e| PlanError::InvalidResponse {
            planner: PLANNER_NAME.to_string(),
            reason: e.to_string(),
        })?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| PlanError::InvalidResponse {
                planner: PLANNER_NAME.to_string(),
                reason: "empty choices".to_string(),
            })?;

        let plan = parse_plan(&content).map_err(|reason| PlanError::InvalidResponse {
            planner: PLANNER_NAME.to_string(),
            reason,
        })?;

        Ok(NutritionRecommendation {
            calories: plan.calories.round() as u32,
            protein_g: plan.protein.round() as u32,
            carbs_g: plan.carbs.round() as u32,
            fat_g: plan.fat.round() as u32,
            rationale: plan.rationale,
            source: format!("{PLANNER_NAME}:{}", self.model),
            generated_at: Utc::now(),
            edited: false,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
