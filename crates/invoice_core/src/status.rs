//! crates/invoice_core/src/status.rs
//!
//! The invoice status state machine. Validates a requested status change against
//! the business rules, persists it, and fires the matching notification.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Invoice, InvoiceStatus, UserId};
use crate::notify::{DispatchOutcome, InvoiceEvent, NotificationGenerator};
use crate::ports::{InvoiceStore, PortError, StatusUpdate};

/// How many times a write that lost a race is re-evaluated against fresh state.
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invoice not found")]
    NotFound,
    #[error("Invoice is {0}, which is a terminal state; its status can no longer change")]
    TerminalState(InvoiceStatus),
    #[error("Cannot revert a {0} invoice to draft")]
    RevertToDraft(InvoiceStatus),
    #[error("Failed to update invoice status: {0}")]
    Dependency(#[source] PortError),
}

impl From<PortError> for TransitionError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(_) => TransitionError::NotFound,
            other => TransitionError::Dependency(other),
        }
    }
}

/// Checks whether `current -> target` is allowed.
pub fn validate_transition(
    current: InvoiceStatus,
    target: InvoiceStatus,
) -> Result<(), TransitionError> {
    if current.is_terminal() {
        return Err(TransitionError::TerminalState(current));
    }
    if target == InvoiceStatus::Draft && current != InvoiceStatus::Draft {
        return Err(TransitionError::RevertToDraft(current));
    }
    Ok(())
}

/// The event a successful transition emits, if any.
pub fn event_for(previous: InvoiceStatus, current: InvoiceStatus) -> Option<InvoiceEvent> {
    match current {
        InvoiceStatus::Paid if previous != InvoiceStatus::Paid => Some(InvoiceEvent::Paid),
        InvoiceStatus::Overdue if previous != InvoiceStatus::Overdue => Some(InvoiceEvent::Overdue),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub invoice: Invoice,
    pub previous_status: InvoiceStatus,
    pub message: &'static str,
    /// `None` when the transition emits no event.
    pub notification: Option<DispatchOutcome>,
}

pub struct StatusTransitionEngine {
    invoices: Arc<dyn InvoiceStore>,
    notifications: Arc<NotificationGenerator>,
}

impl StatusTransitionEngine {
    pub fn new(invoices: Arc<dyn InvoiceStore>, notifications: Arc<NotificationGenerator>) -> Self {
        Self {
            invoices,
            notifications,
        }
    }

    /// Moves an invoice owned by `user_id` into `target`.
    ///
    /// The status write is the outcome of this call. The notification that follows
    /// it is best-effort and reported in [`TransitionOutcome::notification`].
    pub async fn transition(
        &self,
        invoice_id: Uuid,
        user_id: UserId,
        target: InvoiceStatus,
    ) -> Result<TransitionOutcome, TransitionError> {
        let mut attempt = 0;
        let (previous_status, invoice) = loop {
            attempt += 1;
            let current = self.invoices.find_invoice_for_owner(invoice_id, user_id).await?;
            validate_transition(current.status, target)?;

            let issue_date = (current.status == InvoiceStatus::Draft
                && target == InvoiceStatus::Sent)
                .then(Utc::now);
            let update = StatusUpdate {
                invoice_id,
                owner_id: user_id,
                expected: current.status,
                status: target,
                issue_date,
            };

            match self.invoices.update_invoice_status(update).await? {
                Some(updated) => break (current.status, updated),
                None if attempt < MAX_ATTEMPTS => {
                    warn!(%invoice_id, attempt, "Invoice status changed concurrently, re-evaluating");
                }
                None => {
                    return Err(TransitionError::Dependency(PortError::Unexpected(format!(
                        "invoice {invoice_id} kept changing during the status update"
                    ))))
                }
            }
        };

        info!(
            %invoice_id,
            %user_id,
            from = %previous_status,
            to = %invoice.status,
            "Invoice status updated"
        );

        let notification = match event_for(previous_status, invoice.status) {
            Some(event) => Some(self.notifications.dispatch(event, &invoice).await),
            None => None,
        };

        Ok(TransitionOutcome {
            message: invoice.status.success_message(),
            invoice,
            previous_status,
            notification,
        })
    }
}
