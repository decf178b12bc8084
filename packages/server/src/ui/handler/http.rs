//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};

use crate::{
    domain::NotificationTarget,
    infrastructure::dto::http::{
        PublishNotificationRequestDto, PublishNotificationResponseDto, RoomSummaryDto,
    },
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Get list of live rooms
pub async fn get_rooms(State(state): State<Arc<AppState>>) -> Json<Vec<RoomSummaryDto>> {
    Json(state.get_rooms_usecase.execute().await)
}

/// Inlet for the portal's CRUD side: dispatch a notification to the live
/// channels of an audience. Responds with how many channels received it;
/// zero is a success, not an error.
pub async fn publish_notification(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishNotificationRequestDto>,
) -> Result<Json<PublishNotificationResponseDto>, (StatusCode, String)> {
    let target = NotificationTarget::try_from(&request)
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;
    let delivered = state
        .publish_notification_usecase
        .execute(target, &request.event_type, &request.payload)
        .await;
    Ok(Json(PublishNotificationResponseDto { delivered }))
}
