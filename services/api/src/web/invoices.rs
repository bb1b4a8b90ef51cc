//! services/api/src/web/invoices.rs
//!
//! The invoice status endpoint. All business rules live in the core
//! `StatusTransitionEngine`; this module only translates HTTP to and from it.

use crate::error::ApiError;
use crate::web::rest::ApiResponse;
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use invoice_core::domain::{Invoice, InvoiceStatus, LineItem, User};
use invoice_core::DispatchOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// One of DRAFT, SENT, PAID, OVERDUE, CANCELLED.
    pub status: String,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CustomerResponse {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResponse {
    pub id: Uuid,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
}

impl From<&LineItem> for LineItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.id,
            description: item.description.clone(),
            quantity: item.quantity,
            unit_price_cents: item.unit_price_cents,
            total_cents: item.total_cents(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub currency: String,
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub customer: CustomerResponse,
    pub line_items: Vec<LineItemResponse>,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Invoice> for InvoiceResponse {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: invoice.id,
            invoice_number: invoice.invoice_number.clone(),
            status: invoice.status.as_str().to_string(),
            currency: invoice.currency.clone(),
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            customer: CustomerResponse {
                id: invoice.customer.id,
                name: invoice.customer.name.clone(),
                email: invoice.customer.email.clone(),
            },
            line_items: invoice.line_items.iter().map(LineItemResponse::from).collect(),
            total_cents: invoice.total_cents(),
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

fn parse_status(raw: &str) -> Result<InvoiceStatus, ApiError> {
    raw.parse().map_err(|_| {
        let allowed: Vec<_> = InvoiceStatus::ALL.iter().map(|s| s.as_str()).collect();
        ApiError::Validation(format!(
            "Invalid status '{}'. Expected one of: {}",
            raw,
            allowed.join(", ")
        ))
    })
}

//=========================================================================================
// Handlers
//=========================================================================================

/// PATCH /invoices/{id}/status - Move an invoice to a new status
#[utoipa::path(
    patch,
    path = "/invoices/{id}/status",
    request_body = UpdateStatusRequest,
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Status updated; the invoice is wrapped in the success envelope", body = InvoiceResponse),
        (status = 400, description = "Invalid transition or malformed status", body = crate::error::ErrorResponse),
        (status = 401, description = "Unauthenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Invoice not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_invoice_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    invoice_id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<InvoiceResponse>>, ApiError> {
    // An unparseable id cannot name any invoice.
    let Path(invoice_id) =
        invoice_id.map_err(|_| ApiError::NotFound("Invoice not found".to_string()))?;
    let Json(req) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let target = parse_status(&req.status)?;

    let outcome = state.engine.transition(invoice_id, user.id, target).await?;

    match &outcome.notification {
        Some(DispatchOutcome::Failed { reason }) => {
            info!(%invoice_id, reason = %reason, "Status updated, notification not created")
        }
        Some(other) => debug!(%invoice_id, outcome = ?other, "Status updated with notification"),
        None => debug!(%invoice_id, "Status updated"),
    }

    Ok(ApiResponse::with_message(
        InvoiceResponse::from(&outcome.invoice),
        outcome.message,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_reports_allowed_values() {
        assert_eq!(parse_status("paid").unwrap(), InvoiceStatus::Paid);
        let err = parse_status("ARCHIVED").unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("DRAFT, SENT, PAID, OVERDUE, CANCELLED"));
    }
}
