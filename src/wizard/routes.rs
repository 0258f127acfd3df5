//! REST endpoints exposing the wizard to the browser front end.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use super::controller::{WizardController, WizardEvent};
use crate::error::{FinalizationError, WizardError};

/// Shared state for wizard routes.
#[derive(Clone)]
pub struct WizardRouteState {
    pub controller: Arc<WizardController>,
}

impl IntoResponse for WizardError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            WizardError::Validation(v) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": v.summary(),
                    "step": v.step_id,
                    "failures": v.failures,
                }),
            ),
            WizardError::Configuration(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": e.to_string(), "restart": true}),
            ),
            WizardError::Finalization(e) => {
                let status = match e {
                    FinalizationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    FinalizationError::MissingCredentials(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    FinalizationError::Rejected { .. } | FinalizationError::Transport { .. } => {
                        StatusCode::BAD_GATEWAY
                    }
                };
                (status, json!({"error": e.user_message()}))
            }
            WizardError::StepMismatch { .. }
            | WizardError::Submitting
            | WizardError::NotAtTerminalStep { .. }
            | WizardError::CategoryLocked { .. }
            | WizardError::Finished { .. }
            | WizardError::NotStarted => (StatusCode::CONFLICT, json!({"error": self.to_string()})),
        };
        (status, Json(body)).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "therapy-onboarding"
    }))
}

/// GET /api/onboarding/status
async fn get_status(State(state): State<WizardRouteState>) -> impl IntoResponse {
    Json(state.controller.view().await)
}

/// POST /api/onboarding/steps/{step_id}
///
/// Body is the step's partial data as a JSON object.
async fn complete_step(
    State(state): State<WizardRouteState>,
    Path(step_id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let Value::Object(data) = body else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Step data must be a JSON object"})),
        )
            .into_response();
    };
    match state
        .controller
        .dispatch(WizardEvent::StepCompleted { step_id, data })
        .await
    {
        Ok(view) => Json(view).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/onboarding/back
async fn go_back(State(state): State<WizardRouteState>) -> Response {
    match state.controller.dispatch(WizardEvent::BackRequested).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/onboarding/finalize
///
/// Returns the destination the host router should navigate to.
async fn finalize(State(state): State<WizardRouteState>) -> Response {
    match state.controller.finalize().await {
        Ok(completion) => Json(json!({
            "destination": completion.destination,
            "account_id": completion.account.id,
        }))
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/onboarding/abandon
async fn abandon(State(state): State<WizardRouteState>) -> Response {
    match state.controller.abandon().await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/onboarding/restart
async fn restart(State(state): State<WizardRouteState>) -> Response {
    match state.controller.restart().await {
        Ok(view) => Json(view).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Build the wizard REST routes.
pub fn wizard_routes(state: WizardRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/status", get(get_status))
        .route("/api/onboarding/steps/{step_id}", post(complete_step))
        .route("/api/onboarding/back", post(go_back))
        .route("/api/onboarding/finalize", post(finalize))
        .route("/api/onboarding/abandon", post(abandon))
        .route("/api/onboarding/restart", post(restart))
        .with_state(state)
}
