//! Fixtures shared by the API integration tests.

#![allow(dead_code)]

use api_lib::adapters::InMemoryStore;
use api_lib::realtime::RealtimeHub;
use api_lib::web::{router, AppState};
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::response::Response;
use axum::Router;
use async_trait::async_trait;
use chrono::Utc;
use invoice_core::domain::{
    CustomerSummary, Invoice, InvoiceStatus, LineItem, NewNotification, Notification,
    NotificationKind, NotificationPage, NotificationQuery, User, UserId,
};
use invoice_core::ports::{
    IdentityProvider, InvoiceStore, NotificationStore, PortError, PortResult, StatusUpdate,
    UserStore,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Delegates to an [`InMemoryStore`], but can be told to refuse notification writes.
pub struct FaultyStore {
    inner: InMemoryStore,
    fail_notification_writes: AtomicBool,
}

#[async_trait]
impl IdentityProvider for FaultyStore {
    async fn current_identity(&self, credential: &str) -> PortResult<String> {
        self.inner.current_identity(credential).await
    }
}

#[async_trait]
impl UserStore for FaultyStore {
    async fn find_user_by_id(&self, user_id: UserId) -> PortResult<User> {
        self.inner.find_user_by_id(user_id).await
    }

    async fn find_user_by_external_id(&self, external_id: &str) -> PortResult<User> {
        self.inner.find_user_by_external_id(external_id).await
    }
}

#[async_trait]
impl InvoiceStore for FaultyStore {
    async fn find_invoice_for_owner(&self, invoice_id: Uuid, owner_id: UserId) -> PortResult<Invoice> {
        self.inner.find_invoice_for_owner(invoice_id, owner_id).await
    }

    async fn update_invoice_status(&self, update: StatusUpdate) -> PortResult<Option<Invoice>> {
        self.inner.update_invoice_status(update).await
    }
}

#[async_trait]
impl NotificationStore for FaultyStore {
    async fn create_notification(&self, new: NewNotification) -> PortResult<Notification> {
        if self.fail_notification_writes.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected(
                "notification store is unavailable".to_string(),
            ));
        }
        self.inner.create_notification(new).await
    }

    async fn list_notifications(
        &self,
        user_id: UserId,
        query: NotificationQuery,
    ) -> PortResult<NotificationPage> {
        self.inner.list_notifications(user_id, query).await
    }

    async fn count_unread(&self, user_id: UserId) -> PortResult<u64> {
        self.inner.count_unread(user_id).await
    }

    async fn set_notification_read(
        &self,
        notification_id: Uuid,
        user_id: UserId,
        read: bool,
    ) -> PortResult<Notification> {
        self.inner
            .set_notification_read(notification_id, user_id, read)
            .await
    }

    async fn delete_notification(&self, notification_id: Uuid, user_id: UserId) -> PortResult<()> {
        self.inner.delete_notification(notification_id, user_id).await
    }

    async fn mark_all_read(&self, user_id: UserId) -> PortResult<u64> {
        self.inner.mark_all_read(user_id).await
    }
}

pub struct TestApp {
    pub store: InMemoryStore,
    pub faults: Arc<FaultyStore>,
    pub hub: Arc<RealtimeHub>,
    pub router: Router,
}

pub struct Account {
    pub user: User,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let hub = Arc::new(RealtimeHub::new());
        let faults = Arc::new(FaultyStore {
            inner: store.clone(),
            fail_notification_writes: AtomicBool::new(false),
        });
        let state = Arc::new(AppState::new(faults.clone(), hub.clone()));
        Self {
            store,
            faults,
            hub,
            router: router(state),
        }
    }

    /// Makes every later notification write fail until switched off.
    pub fn fail_notification_writes(&self, fail: bool) {
        self.faults
            .fail_notification_writes
            .store(fail, Ordering::SeqCst);
    }

    /// Creates a user with a credential the identity provider accepts.
    pub fn account(&self, name: &str) -> Account {
        let user = User {
            id: Uuid::new_v4(),
            external_id: format!("ext|{}", name),
            email: Some(format!("{}@example.com", name)),
            name: Some(name.to_string()),
        };
        let token = format!("token-{}", name);
        self.store.insert_user(user.clone());
        self.store.issue_credential(token.clone(), user.external_id.clone());
        Account { user, token }
    }

    /// Stores an invoice worth USD 1250.00 for `owner`.
    pub fn invoice(&self, owner: &User, status: InvoiceStatus) -> Invoice {
        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            user_id: owner.id,
            invoice_number: "INV-0042".to_string(),
            customer: CustomerSummary {
                id: Uuid::new_v4(),
                name: "Acme Corp".to_string(),
                email: Some("billing@acme.test".to_string()),
            },
            status,
            currency: "USD".to_string(),
            issue_date: None,
            due_date: None,
            line_items: vec![
                LineItem {
                    id: Uuid::new_v4(),
                    description: "Consulting".to_string(),
                    quantity: 10,
                    unit_price_cents: 10_000,
                },
                LineItem {
                    id: Uuid::new_v4(),
                    description: "Support".to_string(),
                    quantity: 1,
                    unit_price_cents: 25_000,
                },
            ],
            created_at: now,
            updated_at: now,
        };
        self.store.insert_invoice(invoice.clone());
        invoice
    }

    pub async fn seed_notifications(&self, owner: &User, count: usize) {
        for i in 0..count {
            self.store
                .create_notification(NewNotification {
                    user_id: owner.id,
                    kind: NotificationKind::Reminder,
                    title: format!("Notice {}", i),
                    message: "Scheduled maintenance".to_string(),
                    data: None,
                    action_url: None,
                })
                .await
                .unwrap();
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
