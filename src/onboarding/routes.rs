//! REST endpoints for onboarding navigation, answers and the nutrition plan.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::error::{PlanError, StorageError};
use crate::nutrition::{NutritionPlanner, PlanCache, TargetEdit};
use crate::store::KeyValueStore;

use super::calculating::{PlanCalculation, ProgressSimulator};
use super::data_store::{OnboardingStore, Persisted, completion_marker};
use super::model::AnswersPatch;
use super::navigation::{FlowSequencer, HistoryNavigator, NavOutcome};
use super::pages::PageMap;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub store: Arc<OnboardingStore>,
    pub sequencer: FlowSequencer,
    pub navigator: Arc<HistoryNavigator>,
    pub calculation: Arc<PlanCalculation>,
    pub plan_cache: PlanCache,
    pub simulator: ProgressSimulator,
}

impl OnboardingRouteState {
    /// Restore the onboarding session from storage. The navigator starts at
    /// the entry route the completion marker selects.
    pub async fn load(
        storage: Arc<dyn KeyValueStore>,
        planner: Arc<dyn NutritionPlanner>,
        pages: Arc<PageMap>,
        config: &AppConfig,
    ) -> Result<Self, StorageError> {
        let store = Arc::new(OnboardingStore::load(Arc::clone(&storage)).await?);
        let sequencer = FlowSequencer::new(pages);
        let complete = completion_marker(&*storage).await?;
        let navigator = Arc::new(HistoryNavigator::new(sequencer.entry_route(complete)));
        let plan_cache = PlanCache::new(storage);
        let calculation = Arc::new(PlanCalculation::new(
            Arc::clone(&store),
            planner,
            plan_cache.clone(),
            config.plan_retry,
        ));
        tracing::info!(
            complete,
            route = %navigator.current_route(),
            "Onboarding session restored"
        );
        Ok(Self {
            store,
            sequencer,
            navigator,
            calculation,
            plan_cache,
            simulator: ProgressSimulator::with_default_stages(config.calculating_duration),
        })
    }
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, Json(serde_json::json!({ "error": message.to_string() }))).into_response()
}

fn plan_error_status(e: &PlanError) -> StatusCode {
    match e {
        PlanError::IncompleteProfile { .. } | PlanError::InvalidProfile { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PlanError::Upstream { .. }
        | PlanError::Timeout { .. }
        | PlanError::InvalidResponse { .. }
        | PlanError::Exhausted { .. } => StatusCode::BAD_GATEWAY,
        PlanError::NoPlan => StatusCode::NOT_FOUND,
        PlanError::Cancelled => StatusCode::CONFLICT,
        PlanError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Current position in the flow, shared by status and navigation replies.
/// Page fields are null once the route has left the flow.
async fn status_body(state: &OnboardingRouteState) -> serde_json::Value {
    let nav = state.navigator.state();
    let in_flow = state.sequencer.in_flow(&nav);
    let page = in_flow.then(|| state.sequencer.current_page(&nav));
    serde_json::json!({
        "onboarding_completed": state.store.is_onboarding_complete().await,
        "route": nav.route(),
        "current_page": page,
        "total_pages": state.sequencer.total_pages(),
        "screen": page.and_then(|p| state.sequencer.pages().screen_name(p)),
        "progress": in_flow.then(|| state.sequencer.progress(&nav)),
    })
}

async fn navigated(state: &OnboardingRouteState, outcome: NavOutcome) -> Response {
    let mut body = status_body(state).await;
    body["outcome"] = serde_json::to_value(outcome).unwrap_or_default();
    Json(body).into_response()
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(status_body(&state).await)
}

/// GET /api/onboarding/answers
async fn get_answers(State(state): State<OnboardingRouteState>) -> impl IntoResponse {
    Json(state.store.snapshot().await)
}

/// PATCH /api/onboarding/answers
///
/// The answers are updated even when persisting them fails; the reply says
/// which happened.
async fn patch_answers(
    State(state): State<OnboardingRouteState>,
    Json(patch): Json<AnswersPatch>,
) -> impl IntoResponse {
    let persisted = match state.store.apply(patch).await {
        Ok(Persisted::Written) => "written",
        Ok(Persisted::Deferred) => "deferred",
        Err(_) => "failed",
    };
    Json(serde_json::json!({
        "persisted": persisted,
        "answers": state.store.snapshot().await,
    }))
}

/// POST /api/onboarding/next
async fn post_next(State(state): State<OnboardingRouteState>) -> Response {
    let nav = state.navigator.state();
    match state.sequencer.next(&nav, &*state.navigator) {
        Ok(outcome) => navigated(&state, outcome).await,
        Err(e) => error_response(StatusCode::CONFLICT, e),
    }
}

/// POST /api/onboarding/previous
async fn post_previous(State(state): State<OnboardingRouteState>) -> Response {
    let nav = state.navigator.state();
    let outcome = state.sequencer.previous(&nav, &*state.navigator);
    navigated(&state, outcome).await
}

/// POST /api/onboarding/pages/{page}
async fn post_go_to(
    State(state): State<OnboardingRouteState>,
    Path(page): Path<u32>,
) -> Response {
    match state.sequencer.go_to(page, &*state.navigator) {
        Ok(outcome) => navigated(&state, outcome).await,
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e),
    }
}

#[derive(Debug, Deserialize)]
struct ProgressQuery {
    #[serde(default)]
    elapsed_ms: u64,
}

/// GET /api/onboarding/calculating/progress?elapsed_ms=N
async fn get_calculating_progress(
    State(state): State<OnboardingRouteState>,
    Query(query): Query<ProgressQuery>,
) -> impl IntoResponse {
    Json(
        state
            .simulator
            .snapshot(Duration::from_millis(query.elapsed_ms)),
    )
}

/// POST /api/onboarding/calculate
async fn post_calculate(State(state): State<OnboardingRouteState>) -> Response {
    match state.calculation.run().await {
        Ok(plan) => Json(plan).into_response(),
        Err(e) => error_response(plan_error_status(&e), e),
    }
}

/// POST /api/onboarding/complete
///
/// Sets the completion marker and leaves the flow for the main app. Only
/// allowed from the final screen; anywhere else is 409 and nothing is
/// written. A storage failure is logged by the store and does not block
/// navigation.
async fn post_complete(State(state): State<OnboardingRouteState>) -> Response {
    if let Err(e) = state.sequencer.ensure_last_page(&state.navigator.state()) {
        return error_response(StatusCode::CONFLICT, e);
    }
    let persisted = state.store.mark_onboarding_complete().await.is_ok();
    let route = state.sequencer.exit_to_main(&*state.navigator);
    Json(serde_json::json!({ "route": route, "persisted": persisted })).into_response()
}

/// GET /api/nutrition/plan
async fn get_plan(State(state): State<OnboardingRouteState>) -> Response {
    match state.plan_cache.load().await {
        Ok(Some(plan)) => Json(plan).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, PlanError::NoPlan),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

/// PUT /api/nutrition/plan
async fn put_plan(
    State(state): State<OnboardingRouteState>,
    Json(edit): Json<TargetEdit>,
) -> Response {
    match state.plan_cache.update_targets(edit).await {
        Ok(plan) => Json(plan).into_response(),
        Err(e) => error_response(plan_error_status(&e), e),
    }
}

/// Build the onboarding REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/api/onboarding/status", get(get_status))
        .route(
            "/api/onboarding/answers",
            get(get_answers).patch(patch_answers),
        )
        .route("/api/onboarding/next", post(post_next))
        .route("/api/onboarding/previous", post(post_previous))
        .route("/api/onboarding/pages/{page}", post(post_go_to))
        .route(
            "/api/onboarding/calculating/progress",
            get(get_calculating_progress),
        )
        .route("/api/onboarding/calculate", post(post_calculate))
        .route("/api/onboarding/complete", post(post_complete))
        .route("/api/nutrition/plan", get(get_plan).put(put_plan))
        .with_state(state)
}
