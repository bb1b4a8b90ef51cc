//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of every storage and identity port. Rows live in
//! `DashMap`s, so a conditional status write holds the row's shard lock for the
//! whole compare-and-set.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use invoice_core::domain::{
    Invoice, NewNotification, Notification, NotificationPage, NotificationQuery, User, UserId,
};
use invoice_core::ports::{
    IdentityProvider, InvoiceStore, NotificationStore, PortError, PortResult, StatusUpdate,
    UserStore,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    credentials: DashMap<String, String>,
    users: DashMap<UserId, User>,
    invoices: DashMap<Uuid, Invoice>,
    notifications: DashMap<Uuid, Notification>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.inner.users.insert(user.id, user);
    }

    pub fn insert_invoice(&self, invoice: Invoice) {
        self.inner.invoices.insert(invoice.id, invoice);
    }

    /// Registers a credential the identity provider would accept for `external_id`.
    pub fn issue_credential(&self, credential: impl Into<String>, external_id: impl Into<String>) {
        self.inner
            .credentials
            .insert(credential.into(), external_id.into());
    }

    pub fn invoice(&self, invoice_id: Uuid) -> Option<Invoice> {
        self.inner.invoices.get(&invoice_id).map(|r| r.clone())
    }

    pub fn notifications_for(&self, user_id: UserId) -> Vec<Notification> {
        let mut items: Vec<_> = self
            .inner
            .notifications
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        // Newest first; ties on the timestamp fall back to the id so pages stay stable.
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        items
    }
}

#[async_trait]
impl IdentityProvider for InMemoryStore {
    async fn current_identity(&self, credential: &str) -> PortResult<String> {
        self.inner
            .credentials
            .get(credential)
            .map(|r| r.clone())
            .ok_or(PortError::Unauthorized)
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_user_by_id(&self, user_id: UserId) -> PortResult<User> {
        self.inner
            .users
            .get(&user_id)
            .map(|r| r.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> PortResult<User> {
        self.inner
            .users
            .iter()
            .find(|r| r.external_id == external_id)
            .map(|r| r.clone())
            .ok_or_else(|| PortError::NotFound("User not found".to_string()))
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn find_invoice_for_owner(
        &self,
        invoice_id: Uuid,
        owner_id: UserId,
    ) -> PortResult<Invoice> {
        self.inner
            .invoices
            .get(&invoice_id)
            .filter(|r| r.user_id == owner_id)
            .map(|r| r.clone())
            .ok_or_else(|| PortError::NotFound(format!("Invoice {} not found", invoice_id)))
    }

    async fn update_invoice_status(&self, update: StatusUpdate) -> PortResult<Option<Invoice>> {
        let Some(mut row) = self.inner.invoices.get_mut(&update.invoice_id) else {
            return Ok(None);
        };
        if row.user_id != update.owner_id || row.status != update.expected {
            return Ok(None);
        }
        row.status = update.status;
        if let Some(issue_date) = update.issue_date {
            row.issue_date = Some(issue_date);
        }
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn create_notification(&self, new: NewNotification) -> PortResult<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            kind: new.kind,
            title: new.title,
            message: new.message,
            data: new.data,
            action_url: new.action_url,
            read: false,
            created_at: now,
            updated_at: now,
        };
        self.inner
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
        query: NotificationQuery,
    ) -> PortResult<NotificationPage> {
        let all = self.notifications_for(user_id);
        let unread_count = all.iter().filter(|n| !n.read).count() as u64;
        let matching: Vec<_> = all
            .into_iter()
            .filter(|n| !query.unread_only || !n.read)
            .collect();
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit as usize)
            .collect();
        Ok(NotificationPage {
            items,
            total,
            unread_count,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn count_unread(&self, user_id: UserId) -> PortResult<u64> {
        Ok(self
            .inner
            .notifications
            .iter()
            .filter(|r| r.user_id == user_id && !r.read)
            .count() as u64)
    }

    async fn set_notification_read(
        &self,
        notification_id: Uuid,
        user_id: UserId,
        read: bool,
    ) -> PortResult<Notification> {
        let mut row = self
            .inner
            .notifications
            .get_mut(&notification_id)
            .filter(|r| r.user_id == user_id)
            .ok_or_else(|| PortError::NotFound("Notification not found".to_string()))?;
        row.read = read;
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete_notification(&self, notification_id: Uuid, user_id: UserId) -> PortResult<()> {
        self.inner
            .notifications
            .remove_if(&notification_id, |_, n| n.user_id == user_id)
            .map(|_| ())
            .ok_or_else(|| PortError::NotFound("Notification not found".to_string()))
    }

    async fn mark_all_read(&self, user_id: UserId) -> PortResult<u64> {
        let now = Utc::now();
        let mut updated = 0;
        for mut row in self.inner.notifications.iter_mut() {
            if row.user_id == user_id && !row.read {
                row.read = true;
                row.updated_at = now;
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invoice_core::domain::NotificationKind;
    use std::collections::HashSet;

    #[tokio::test]
    async fn pages_are_disjoint_when_timestamps_tie() {
        let store = InMemoryStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        for i in 0..6 {
            let notification = Notification {
                id: Uuid::new_v4(),
                user_id,
                kind: NotificationKind::Reminder,
                title: format!("Notice {}", i),
                message: "Scheduled maintenance".to_string(),
                data: None,
                action_url: None,
                read: false,
                created_at: now,
                updated_at: now,
            };
            store.inner.notifications.insert(notification.id, notification);
        }

        let first = store
            .list_notifications(user_id, NotificationQuery::new(Some(1), Some(3), false))
            .await
            .unwrap();
        let second = store
            .list_notifications(user_id, NotificationQuery::new(Some(2), Some(3), false))
            .await
            .unwrap();

        let ids: HashSet<_> = first.items.iter().chain(&second.items).map(|n| n.id).collect();
        assert_eq!(ids.len(), 6);
        let ordered: Vec<_> = first.items.iter().chain(&second.items).map(|n| n.id).collect();
        let mut expected = ordered.clone();
        expected.sort_by(|a, b| b.cmp(a));
        assert_eq!(ordered, expected);
    }
}
