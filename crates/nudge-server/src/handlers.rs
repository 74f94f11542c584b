use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use nudge_notifications::{
    ActionResult, ErrorKind, NotificationError, PushActions, RawPushSubscription, Reminder,
    ReminderOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::server::AppState;

/// `NotificationError` rendered as an ActionResult body
#[derive(Debug)]
pub struct ApiError(pub NotificationError);

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        Self(err)
    }
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::NoSubscriptions => StatusCode::CONFLICT,
        ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
        ErrorKind::Unsupported => StatusCode::NOT_IMPLEMENTED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::DeliveryFailed => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(self.0.kind());
        if status.is_server_error() {
            tracing::warn!(error = %self.0, kind = %self.0.kind(), "request failed");
        }
        (status, Json(ActionResult::failure(&self.0))).into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

// ---- Push server actions ----

pub async fn vapid_public_key(State(state): State<AppState>) -> Result<Response, ApiError> {
    let key = state
        .registry
        .public_key()
        .ok_or_else(NotificationError::not_configured)?;
    Ok(Json(json!({ "publicKey": key })).into_response())
}

pub async fn subscribe(
    State(state): State<AppState>,
    Json(subscription): Json<RawPushSubscription>,
) -> Result<Json<ActionResult>, ApiError> {
    state.registry.subscribe_user(&subscription).await?;
    Ok(Json(ActionResult::ok()))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Json(subscription): Json<RawPushSubscription>,
) -> Result<Json<ActionResult>, ApiError> {
    state.registry.unsubscribe_user(&subscription).await?;
    Ok(Json(ActionResult::ok()))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: String,
}

pub async fn send(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Result<Json<ActionResult>, ApiError> {
    let report = state.registry.send_notification(&req.message).await?;
    Ok(Json(
        ActionResult::ok_with_message(format!(
            "Notification sent to {} subscribers",
            report.delivered
        ))
        .with_report(report),
    ))
}

// ---- Reminders ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderView {
    #[serde(flatten)]
    pub reminder: Reminder,
    pub time_remaining: u64,
}

impl ReminderView {
    fn build(state: &AppState, reminder: Reminder) -> Self {
        let time_remaining = state.scheduler.time_remaining(&reminder.id).unwrap_or(0);
        Self {
            reminder,
            time_remaining,
        }
    }
}

pub async fn list_reminders(State(state): State<AppState>) -> Json<Vec<ReminderView>> {
    let mut reminders = state.scheduler.active_reminders();
    reminders.sort_by_key(|r| r.scheduled_for);
    Json(
        reminders
            .into_iter()
            .map(|r| ReminderView::build(&state, r))
            .collect(),
    )
}

pub async fn create_reminder(
    State(state): State<AppState>,
    Json(options): Json<ReminderOptions>,
) -> impl IntoResponse {
    let reminder = state.scheduler.set_reminder(options);
    (
        StatusCode::CREATED,
        Json(ReminderView::build(&state, reminder)),
    )
}

pub async fn get_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReminderView>, ApiError> {
    let reminder = state
        .scheduler
        .reminder(&id)
        .ok_or_else(|| reminder_not_found(&id))?;
    Ok(Json(ReminderView::build(&state, reminder)))
}

pub async fn cancel_reminder(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.scheduler.cancel_reminder(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(reminder_not_found(&id).into())
    }
}

pub async fn cancel_all_reminders(State(state): State<AppState>) -> impl IntoResponse {
    let cancelled = state.scheduler.cancel_all_reminders();
    Json(json!({ "cancelled": cancelled }))
}

fn reminder_not_found(id: &str) -> NotificationError {
    NotificationError::NotFound(format!("Reminder '{id}' not found"))
}
