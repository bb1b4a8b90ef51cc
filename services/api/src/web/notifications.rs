//! services/api/src/web/notifications.rs
//!
//! Handlers for reading and managing the caller's notifications.

use crate::error::ApiError;
use crate::web::rest::ApiResponse;
use crate::web::state::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    Extension, Json,
};
use invoice_core::domain::{NotificationQuery, User};
use invoice_core::realtime::NotificationPayload;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, IntoParams, Debug, Default)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListNotificationsParams {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size, 1 to 100 (default 10).
    pub limit: Option<u32>,
    /// Only return unread notifications.
    pub unread_only: Option<bool>,
}

#[derive(Deserialize, ToSchema, Debug, Default)]
pub struct UpdateNotificationRequest {
    /// Defaults to `true` when omitted.
    pub read: Option<bool>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PaginationData {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListData {
    #[schema(value_type = Vec<Object>)]
    pub notifications: Vec<NotificationPayload>,
    pub unread_count: u64,
    pub pagination: PaginationData,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadData {
    pub updated_count: u64,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct DeletedData {
    pub id: Uuid,
}

fn notification_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|_| ApiError::NotFound("Notification not found".to_string()))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /notifications - Page through the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    params(ListNotificationsParams),
    responses(
        (status = 200, description = "A page of notifications in the success envelope", body = NotificationListData),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "No user record for this identity", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    params: Result<Query<ListNotificationsParams>, QueryRejection>,
) -> Result<Json<ApiResponse<NotificationListData>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::Validation(e.body_text()))?;
    let query = NotificationQuery::new(
        params.page,
        params.limit,
        params.unread_only.unwrap_or(false),
    );

    let page = state.notifications.list_notifications(user.id, query).await?;

    Ok(ApiResponse::ok(NotificationListData {
        notifications: page.items.iter().map(NotificationPayload::from).collect(),
        unread_count: page.unread_count,
        pagination: PaginationData {
            page: page.page,
            limit: page.limit,
            total: page.total,
            total_pages: page.total_pages(),
        },
    }))
}

/// PATCH /notifications/{id} - Set the read flag of one notification
#[utoipa::path(
    patch,
    path = "/notifications/{id}",
    request_body(content = UpdateNotificationRequest, description = "Optional; `read` defaults to true"),
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "The updated notification in the success envelope"),
        (status = 400, description = "Malformed body", body = crate::error::ErrorResponse),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_notification_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Bytes,
) -> Result<Json<ApiResponse<NotificationPayload>>, ApiError> {
    let id = notification_id(id)?;
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        UpdateNotificationRequest::default()
    } else {
        serde_json::from_slice::<UpdateNotificationRequest>(&body)
            .map_err(|e| ApiError::Validation(format!("Invalid request body: {}", e)))?
    };

    let notification = state
        .notifications
        .set_notification_read(id, user.id, req.read.unwrap_or(true))
        .await?;

    Ok(ApiResponse::ok(NotificationPayload::from(&notification)))
}

/// DELETE /notifications/{id} - Delete one notification
#[utoipa::path(
    delete,
    path = "/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Deleted", body = DeletedData),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_notification_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ApiResponse<DeletedData>>, ApiError> {
    let id = notification_id(id)?;
    state.notifications.delete_notification(id, user.id).await?;
    Ok(ApiResponse::with_message(
        DeletedData { id },
        "Notification deleted",
    ))
}

/// PATCH /notifications/mark-all-read - Mark every unread notification as read
#[utoipa::path(
    patch,
    path = "/notifications/mark-all-read",
    responses(
        (status = 200, description = "Number of notifications updated", body = MarkAllReadData),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_all_read_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<ApiResponse<MarkAllReadData>>, ApiError> {
    let updated_count = state.notifications.mark_all_read(user.id).await?;
    info!(user_id = %user.id, updated_count, "Marked notifications as read");
    Ok(ApiResponse::with_message(
        MarkAllReadData { updated_count },
        format!("{} notifications marked as read", updated_count),
    ))
}
