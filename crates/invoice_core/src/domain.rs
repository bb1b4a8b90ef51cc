//! crates/invoice_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or wire format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The identity of a persisted user.
pub type UserId = Uuid;

/// Represents a user known to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Subject issued by the identity provider.
    pub external_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

//=========================================================================================
// Invoices
//=========================================================================================

/// The lifecycle status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 5] = [
        InvoiceStatus::Draft,
        InvoiceStatus::Sent,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    /// Terminal statuses have no outgoing transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Cancelled => "CANCELLED",
        }
    }

    /// The message reported to the caller after moving an invoice into this status.
    pub fn success_message(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "Invoice moved back to draft",
            InvoiceStatus::Sent => "Invoice sent successfully",
            InvoiceStatus::Paid => "Invoice marked as paid",
            InvoiceStatus::Overdue => "Invoice marked as overdue",
            InvoiceStatus::Cancelled => "Invoice cancelled",
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown invoice status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for InvoiceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InvoiceStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// A single billable line on an invoice. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineItem {
    pub id: Uuid,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl LineItem {
    /// `quantity * unit_price_cents`, clamped to the `i64` range instead of overflowing.
    pub fn total_cents(&self) -> i64 {
        self.quantity.saturating_mul(self.unit_price_cents)
    }
}

/// The part of a customer record that travels with an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSummary {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: Uuid,
    pub user_id: UserId,
    pub invoice_number: String,
    pub customer: CustomerSummary,
    pub status: InvoiceStatus,
    pub currency: String,
    /// Stamped when the invoice leaves DRAFT for SENT.
    pub issue_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub line_items: Vec<LineItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Sum of the line totals. Saturates at the `i64` bounds.
    pub fn total_cents(&self) -> i64 {
        self.line_items
            .iter()
            .map(LineItem::total_cents)
            .fold(0i64, i64::saturating_add)
    }

    /// Renders the invoice total as e.g. `USD 1250.00`.
    pub fn formatted_total(&self) -> String {
        format_amount(self.total_cents(), &self.currency)
    }

    pub fn detail_path(&self) -> String {
        format!("/invoices/{}", self.id)
    }
}

pub fn format_amount(cents: i64, currency: &str) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{} {}{}.{:02}", currency, sign, abs / 100, abs % 100)
}

//=========================================================================================
// Notifications
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    InvoiceCreated,
    InvoicePaid,
    InvoiceOverdue,
    PaymentReceived,
    Reminder,
    CustomerCreated,
    SettingsUpdated,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 7] = [
        NotificationKind::InvoiceCreated,
        NotificationKind::InvoicePaid,
        NotificationKind::InvoiceOverdue,
        NotificationKind::PaymentReceived,
        NotificationKind::Reminder,
        NotificationKind::CustomerCreated,
        NotificationKind::SettingsUpdated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::InvoiceCreated => "invoice-created",
            NotificationKind::InvoicePaid => "invoice-paid",
            NotificationKind::InvoiceOverdue => "invoice-overdue",
            NotificationKind::PaymentReceived => "payment-received",
            NotificationKind::Reminder => "reminder",
            NotificationKind::CustomerCreated => "customer-created",
            NotificationKind::SettingsUpdated => "settings-updated",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown notification kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for NotificationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NotificationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// A persisted notification owned by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The fields needed to create a notification; the store assigns the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub action_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationQuery {
    /// 1-based page number.
    pub page: u32,
    pub limit: u32,
    pub unread_only: bool,
}

impl NotificationQuery {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Builds a query with page and limit clamped to valid ranges.
    pub fn new(page: Option<u32>, limit: Option<u32>, unread_only: bool) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
            unread_only,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self::new(None, None, false)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    /// Number of rows matching the query filter.
    pub total: u64,
    /// Unread notifications for the user, independent of the filter.
    pub unread_count: u64,
    pub page: u32,
    pub limit: u32,
}

impl NotificationPage {
    pub fn total_pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.limit.max(1)))
    }
}
