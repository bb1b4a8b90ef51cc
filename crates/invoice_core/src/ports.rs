//! crates/invoice_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of a specific identity provider or database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Invoice, InvoiceStatus, NewNotification, Notification, NotificationPage, NotificationQuery,
    User, UserId,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Verifies a request credential with the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the provider subject for a valid credential, `Unauthorized` otherwise.
    async fn current_identity(&self, credential: &str) -> PortResult<String>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, user_id: UserId) -> PortResult<User>;

    async fn find_user_by_external_id(&self, external_id: &str) -> PortResult<User>;
}

/// A conditional status write. It only applies while the row is still in `expected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusUpdate {
    pub invoice_id: Uuid,
    pub owner_id: UserId,
    pub expected: InvoiceStatus,
    pub status: InvoiceStatus,
    /// Written in the same statement as the status when present.
    pub issue_date: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Loads an invoice with its customer and line items. Invoices owned by
    /// someone else are reported as `NotFound`.
    async fn find_invoice_for_owner(&self, invoice_id: Uuid, owner_id: UserId)
        -> PortResult<Invoice>;

    /// Applies `update` atomically. Returns `None` when the invoice no longer
    /// has the expected status.
    async fn update_invoice_status(&self, update: StatusUpdate) -> PortResult<Option<Invoice>>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn create_notification(&self, notification: NewNotification) -> PortResult<Notification>;

    /// Newest first.
    async fn list_notifications(
        &self,
        user_id: UserId,
        query: NotificationQuery,
    ) -> PortResult<NotificationPage>;

    async fn count_unread(&self, user_id: UserId) -> PortResult<u64>;

    async fn set_notification_read(
        &self,
        notification_id: Uuid,
        user_id: UserId,
        read: bool,
    ) -> PortResult<Notification>;

    async fn delete_notification(&self, notification_id: Uuid, user_id: UserId) -> PortResult<()>;

    /// Marks every unread notification of the user as read and returns how many changed.
    async fn mark_all_read(&self, user_id: UserId) -> PortResult<u64>;
}

/// Pushes a freshly persisted notification to its owner's live connections.
pub trait NotificationPublisher: Send + Sync {
    /// Returns the number of connections the notification was handed to.
    fn publish(&self, notification: &Notification) -> usize;
}
