//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! persistence and identity ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use invoice_core::domain::{
    CustomerSummary, Invoice, InvoiceStatus, LineItem, NewNotification, Notification,
    NotificationKind, NotificationPage, NotificationQuery, User, UserId,
};
use invoice_core::ports::{
    IdentityProvider, InvoiceStore, NotificationStore, PortError, PortResult, StatusUpdate,
    UserStore,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage and identity ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn load_line_items(&self, invoice_id: Uuid) -> PortResult<Vec<LineItem>> {
        let records = sqlx::query_as::<_, LineItemRecord>(
            "SELECT id, description, quantity, unit_price_cents FROM line_items \
             WHERE invoice_id = $1 ORDER BY position ASC",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(LineItemRecord::to_domain).collect())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    external_id: String,
    email: Option<String>,
    name: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            external_id: self.external_id,
            email: self.email,
            name: self.name,
        }
    }
}

#[derive(FromRow)]
struct InvoiceRecord {
    id: Uuid,
    user_id: Uuid,
    invoice_number: String,
    status: String,
    currency: String,
    issue_date: Option<DateTime<Utc>>,
    due_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    customer_id: Uuid,
    customer_name: String,
    customer_email: Option<String>,
}
impl InvoiceRecord {
    fn to_domain(self, line_items: Vec<LineItem>) -> PortResult<Invoice> {
        let status = self
            .status
            .parse::<InvoiceStatus>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Invoice {
            id: self.id,
            user_id: self.user_id,
            invoice_number: self.invoice_number,
            customer: CustomerSummary {
                id: self.customer_id,
                name: self.customer_name,
                email: self.customer_email,
            },
            status,
            currency: self.currency,
            issue_date: self.issue_date,
            due_date: self.due_date,
            line_items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct LineItemRecord {
    id: Uuid,
    description: String,
    quantity: i64,
    unit_price_cents: i64,
}
impl LineItemRecord {
    fn to_domain(self) -> LineItem {
        LineItem {
            id: self.id,
            description: self.description,
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
        }
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    title: String,
    message: String,
    data: Option<serde_json::Value>,
    action_url: Option<String>,
    read: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl NotificationRecord {
    fn to_domain(self) -> PortResult<Notification> {
        let kind = self
            .kind
            .parse::<NotificationKind>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            kind,
            title: self.title,
            message: self.message,
            data: self.data,
            action_url: self.action_url,
            read: self.read,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const INVOICE_SELECT: &str = "SELECT i.id, i.user_id, i.invoice_number, i.status, i.currency, \
     i.issue_date, i.due_date, i.created_at, i.updated_at, \
     c.id AS customer_id, c.name AS customer_name, c.email AS customer_email \
     FROM invoices i JOIN customers c ON c.id = i.customer_id \
     WHERE i.id = $1 AND i.user_id = $2";

const NOTIFICATION_COLUMNS: &str =
    "id, user_id, kind, title, message, data, action_url, read, created_at, updated_at";

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl IdentityProvider for DbAdapter {
    async fn current_identity(&self, credential: &str) -> PortResult<String> {
        sqlx::query_scalar::<_, String>(
            "SELECT external_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(credential)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or(PortError::Unauthorized)
    }
}

#[async_trait]
impl UserStore for DbAdapter {
    async fn find_user_by_id(&self, user_id: UserId) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, external_id, email, name FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(UserRecord::to_domain)
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> PortResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, external_id, email, name FROM users WHERE external_id = $1",
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .map(UserRecord::to_domain)
        .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }
}

#[async_trait]
impl InvoiceStore for DbAdapter {
    async fn find_invoice_for_owner(
        &self,
        invoice_id: Uuid,
        owner_id: UserId,
    ) -> PortResult<Invoice> {
        let record = sqlx::query_as::<_, InvoiceRecord>(INVOICE_SELECT)
            .bind(invoice_id)
            .bind(owner_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Invoice {} not found", invoice_id)))?;
        let line_items = self.load_line_items(invoice_id).await?;
        record.to_domain(line_items)
    }

    async fn update_invoice_status(&self, update: StatusUpdate) -> PortResult<Option<Invoice>> {
        // Status and issue date change in one statement, guarded by the expected status.
        let result = sqlx::query(
            "UPDATE invoices SET status = $1, issue_date = COALESCE($2, issue_date), \
             updated_at = now() \
             WHERE id = $3 AND user_id = $4 AND status = $5",
        )
        .bind(update.status.as_str())
        .bind(update.issue_date)
        .bind(update.invoice_id)
        .bind(update.owner_id)
        .bind(update.expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.find_invoice_for_owner(update.invoice_id, update.owner_id)
            .await
            .map(Some)
    }
}

#[async_trait]
impl NotificationStore for DbAdapter {
    async fn create_notification(&self, new: NewNotification) -> PortResult<Notification> {
        let sql = format!(
            "INSERT INTO notifications (id, user_id, kind, title, message, data, action_url) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(new.user_id)
            .bind(new.kind.as_str())
            .bind(new.title)
            .bind(new.message)
            .bind(new.data)
            .bind(new.action_url)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?
            .to_domain()
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
        query: NotificationQuery,
    ) -> PortResult<NotificationPage> {
        let sql = format!(
            "SELECT {} FROM notifications \
             WHERE user_id = $1 AND ($2 = FALSE OR read = FALSE) \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
            NOTIFICATION_COLUMNS
        );
        let records = sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(user_id)
            .bind(query.unread_only)
            .bind(i64::from(query.limit))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        let items = records
            .into_iter()
            .map(NotificationRecord::to_domain)
            .collect::<PortResult<Vec<_>>>()?;

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND ($2 = FALSE OR read = FALSE)",
        )
        .bind(user_id)
        .bind(query.unread_only)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(NotificationPage {
            items,
            total: total as u64,
            unread_count: self.count_unread(user_id).await?,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn count_unread(&self, user_id: UserId) -> PortResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u64)
    }

    async fn set_notification_read(
        &self,
        notification_id: Uuid,
        user_id: UserId,
        read: bool,
    ) -> PortResult<Notification> {
        let sql = format!(
            "UPDATE notifications SET read = $1, updated_at = now() \
             WHERE id = $2 AND user_id = $3 RETURNING {}",
            NOTIFICATION_COLUMNS
        );
        sqlx::query_as::<_, NotificationRecord>(&sql)
            .bind(read)
            .bind(notification_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound("Notification not found".to_string()))?
            .to_domain()
    }

    async fn delete_notification(&self, notification_id: Uuid, user_id: UserId) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(notification_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound("Notification not found".to_string()));
        }
        Ok(())
    }

    async fn mark_all_read(&self, user_id: UserId) -> PortResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE, updated_at = now() \
             WHERE user_id = $1 AND read = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(result.rows_affected())
    }
}
