//! services/api/src/web/rest.rs
//!
//! The success envelope shared by the REST handlers, the health endpoint, and the
//! master definition for the OpenAPI specification.

use crate::error::{ErrorBody, ErrorResponse};
use crate::web::{invoices, notifications};
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        invoices::update_invoice_status_handler,
        notifications::list_notifications_handler,
        notifications::update_notification_handler,
        notifications::delete_notification_handler,
        notifications::mark_all_read_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            ErrorBody,
            invoices::UpdateStatusRequest,
            invoices::InvoiceResponse,
            invoices::CustomerResponse,
            invoices::LineItemResponse,
            notifications::UpdateNotificationRequest,
            notifications::NotificationListData,
            notifications::PaginationData,
            notifications::MarkAllReadData,
            notifications::DeletedData,
        )
    ),
    tags(
        (name = "Invoice API", description = "Invoice status workflow and user notifications.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Response Envelope
//=========================================================================================

/// The body of every successful request.
#[derive(Serialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: None,
        })
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: Some(message.into()),
        })
    }
}

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: &'static str,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}
