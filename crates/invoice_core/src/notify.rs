//! crates/invoice_core/src/notify.rs
//!
//! Turns invoice events into persisted notifications and hands them to the
//! realtime publisher.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Invoice, NewNotification, Notification, NotificationKind};
use crate::ports::{NotificationPublisher, NotificationStore, PortResult};

/// Invoice events that produce a notification for the invoice owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceEvent {
    Paid,
    Overdue,
}

impl InvoiceEvent {
    pub fn kind(self) -> NotificationKind {
        match self {
            InvoiceEvent::Paid => NotificationKind::InvoicePaid,
            InvoiceEvent::Overdue => NotificationKind::InvoiceOverdue,
        }
    }

    fn title(self) -> &'static str {
        match self {
            InvoiceEvent::Paid => "Invoice Paid",
            InvoiceEvent::Overdue => "Invoice Overdue",
        }
    }

    fn message(self, invoice: &Invoice) -> String {
        let number = &invoice.invoice_number;
        let amount = invoice.formatted_total();
        let customer = &invoice.customer.name;
        match self {
            InvoiceEvent::Paid => {
                format!("Invoice {number} for {amount} from {customer} has been paid.")
            }
            InvoiceEvent::Overdue => {
                format!("Invoice {number} for {amount} to {customer} is overdue.")
            }
        }
    }
}

/// What happened to a best-effort notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Persisted and pushed to at least one live connection.
    Delivered { notification_id: Uuid, connections: usize },
    /// Persisted, but the owner had no live connection.
    PersistedUndelivered { notification_id: Uuid },
    /// Nothing was persisted.
    Failed { reason: String },
}

impl DispatchOutcome {
    pub fn is_persisted(&self) -> bool {
        !matches!(self, DispatchOutcome::Failed { .. })
    }
}

/// Builds the notification an event produces, without persisting it.
pub fn build_notification(event: InvoiceEvent, invoice: &Invoice) -> NewNotification {
    NewNotification {
        user_id: invoice.user_id,
        kind: event.kind(),
        title: event.title().to_string(),
        message: event.message(invoice),
        data: Some(json!({
            "invoiceId": invoice.id,
            "invoiceNumber": invoice.invoice_number,
            "amount": invoice.total_cents(),
            "currency": invoice.currency,
            "customerName": invoice.customer.name,
            "status": invoice.status.as_str(),
        })),
        action_url: Some(invoice.detail_path()),
    }
}

pub struct NotificationGenerator {
    store: Arc<dyn NotificationStore>,
    publisher: Arc<dyn NotificationPublisher>,
}

impl NotificationGenerator {
    pub fn new(store: Arc<dyn NotificationStore>, publisher: Arc<dyn NotificationPublisher>) -> Self {
        Self { store, publisher }
    }

    /// Persists the notification for `event` under the invoice owner and pushes it
    /// to the owner's live connections.
    pub async fn notify(&self, event: InvoiceEvent, invoice: &Invoice) -> PortResult<Notification> {
        self.notify_and_count(event, invoice)
            .await
            .map(|(notification, _)| notification)
    }

    /// Like [`notify`](Self::notify), but never fails: the result is folded into a
    /// [`DispatchOutcome`].
    pub async fn dispatch(&self, event: InvoiceEvent, invoice: &Invoice) -> DispatchOutcome {
        match self.notify_and_count(event, invoice).await {
            Ok((notification, 0)) => DispatchOutcome::PersistedUndelivered {
                notification_id: notification.id,
            },
            Ok((notification, connections)) => DispatchOutcome::Delivered {
                notification_id: notification.id,
                connections,
            },
            Err(e) => {
                warn!(invoice_id = %invoice.id, kind = %event.kind(), error = %e, "Failed to create notification");
                DispatchOutcome::Failed { reason: e.to_string() }
            }
        }
    }

    async fn notify_and_count(
        &self,
        event: InvoiceEvent,
        invoice: &Invoice,
    ) -> PortResult<(Notification, usize)> {
        let notification = self
            .store
            .create_notification(build_notification(event, invoice))
            .await?;
        let connections = self.publisher.publish(&notification);
        debug!(
            notification_id = %notification.id,
            user_id = %notification.user_id,
            connections,
            "Notification published"
        );
        Ok((notification, connections))
    }
}
