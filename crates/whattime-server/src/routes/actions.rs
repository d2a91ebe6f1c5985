use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use whattime_core::{ActionView, Caller};

use crate::caller::AuthedCaller;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// POST /apt/run: start a new action
pub async fn run_action(
    State(app): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    body: Bytes,
) -> Result<(StatusCode, Json<ActionView>), AppError> {
    let payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("request body is not valid JSON: {e}")))?;
    let service = app.service.clone();
    let record = tokio::task::spawn_blocking(move || service.run(payload, &caller))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok((StatusCode::ACCEPTED, Json(record.view())))
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// GET /apt/{action_id}/status: current status, completing the action if due
pub async fn action_status(
    State(app): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path(action_id): Path<String>,
) -> Result<Json<ActionView>, AppError> {
    blocking(app, action_id, caller, |service, id, caller| {
        service.status(id, caller)
    })
    .await
}

// ---------------------------------------------------------------------------
// Cancel
// ---------------------------------------------------------------------------

/// POST /apt/{action_id}/cancel: cancel an active action
pub async fn cancel_action(
    State(app): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path(action_id): Path<String>,
) -> Result<Json<ActionView>, AppError> {
    blocking(app, action_id, caller, |service, id, caller| {
        service.cancel(id, caller)
    })
    .await
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

/// POST /apt/{action_id}/release: release a completed action
pub async fn release_action(
    State(app): State<AppState>,
    AuthedCaller(caller): AuthedCaller,
    Path(action_id): Path<String>,
) -> Result<Json<ActionView>, AppError> {
    blocking(app, action_id, caller, |service, id, caller| {
        service.release(id, caller)
    })
    .await
}

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

async fn blocking<F>(
    app: AppState,
    action_id: String,
    caller: Caller,
    op: F,
) -> Result<Json<ActionView>, AppError>
where
    F: FnOnce(
            &whattime_core::ActionService,
            &str,
            &Caller,
        ) -> whattime_core::Result<whattime_core::ActionRecord>
        + Send
        + 'static,
{
    let service = app.service.clone();
    let record = tokio::task::spawn_blocking(move || op(&service, &action_id, &caller))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(record.view()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
