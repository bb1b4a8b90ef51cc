//! Drives the REST routes end to end over the in-memory store.

mod common;

use axum::http::{Method, StatusCode};
use common::{json_body, request, TestApp};
use invoice_core::domain::InvoiceStatus;
use serde_json::json;

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();

    let response = app.send(request(Method::GET, "/health", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "ok");
}

#[tokio::test]
async fn sending_a_draft_stamps_the_issue_date() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Draft);

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            Some(&alice.token),
            Some(json!({ "status": "SENT" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Invoice sent successfully");
    assert_eq!(body["data"]["status"], "SENT");
    assert_eq!(body["data"]["totalCents"], 125_000);
    assert!(body["data"]["issueDate"].is_string());

    let stored = app.store.invoice(invoice.id).unwrap();
    assert_eq!(stored.status, InvoiceStatus::Sent);
    assert!(stored.issue_date.is_some());
    // Only PAID and OVERDUE produce notifications.
    assert!(app.store.notifications_for(alice.user.id).is_empty());
}

#[tokio::test]
async fn marking_paid_creates_a_notification() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Sent);

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            Some(&alice.token),
            Some(json!({ "status": "paid" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["message"], "Invoice marked as paid");

    let notifications = app.store.notifications_for(alice.user.id);
    assert_eq!(notifications.len(), 1);
    let notification = &notifications[0];
    assert_eq!(notification.title, "Invoice Paid");
    assert!(notification.message.contains("INV-0042"));
    assert!(notification.message.contains("USD 1250.00"));
    assert!(notification.message.contains("Acme Corp"));
    assert_eq!(
        notification.action_url.as_deref(),
        Some(format!("/invoices/{}", invoice.id).as_str())
    );
}

#[tokio::test]
async fn terminal_invoices_reject_changes() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Paid);

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            Some(&alice.token),
            Some(json!({ "status": "DRAFT" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
    assert!(body["error"]["message"].as_str().unwrap().contains("terminal"));
    assert_eq!(app.store.invoice(invoice.id).unwrap(), invoice);
}

#[tokio::test]
async fn returning_to_draft_is_rejected() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Overdue);

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            Some(&alice.token),
            Some(json!({ "status": "DRAFT" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "INVALID_TRANSITION");
    assert_eq!(
        app.store.invoice(invoice.id).unwrap().status,
        InvoiceStatus::Overdue
    );
}

#[tokio::test]
async fn status_change_requires_a_credential() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Draft);

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            None,
            Some(json!({ "status": "SENT" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"]["code"], "UNAUTHENTICATED");

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            Some("forged"),
            Some(json!({ "status": "SENT" })),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.store.invoice(invoice.id).unwrap().status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn another_users_invoice_is_not_found() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let mallory = app.account("mallory");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Sent);

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            Some(&mallory.token),
            Some(json!({ "status": "PAID" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"]["code"], "NOT_FOUND");
    assert_eq!(app.store.invoice(invoice.id).unwrap().status, InvoiceStatus::Sent);
    assert!(app.store.notifications_for(alice.user.id).is_empty());
}

#[tokio::test]
async fn malformed_status_requests_are_validation_errors() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Draft);
    let uri = format!("/invoices/{}/status", invoice.id);

    for body in [json!({ "status": "ARCHIVED" }), json!({ "state": "SENT" })] {
        let response = app
            .send(request(Method::PATCH, &uri, Some(&alice.token), Some(body)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], "VALIDATION_ERROR");
    }
    assert_eq!(app.store.invoice(invoice.id).unwrap().status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn notification_failure_does_not_fail_the_transition() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let invoice = app.invoice(&alice.user, InvoiceStatus::Sent);
    app.fail_notification_writes(true);

    let response = app
        .send(request(
            Method::PATCH,
            &format!("/invoices/{}/status", invoice.id),
            Some(&alice.token),
            Some(json!({ "status": "OVERDUE" })),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["status"], "OVERDUE");
    assert_eq!(
        app.store.invoice(invoice.id).unwrap().status,
        InvoiceStatus::Overdue
    );
    assert!(app.store.notifications_for(alice.user.id).is_empty());
}

#[tokio::test]
async fn notifications_are_paginated_with_unread_count() {
    let app = TestApp::new();
    let alice = app.account("alice");
    app.seed_notifications(&alice.user, 12).await;

    let response = app
        .send(request(
            Method::GET,
            "/notifications?page=2&limit=5",
            Some(&alice.token),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let data = json_body(response).await["data"].clone();
    assert_eq!(data["notifications"].as_array().unwrap().len(), 5);
    assert_eq!(data["unreadCount"], 12);
    assert_eq!(
        data["pagination"],
        json!({ "page": 2, "limit": 5, "total": 12, "totalPages": 3 })
    );

    let response = app
        .send(request(Method::GET, "/notifications", Some(&alice.token), None))
        .await;
    let data = json_body(response).await["data"].clone();
    assert_eq!(data["pagination"]["limit"], 10);
    assert_eq!(data["pagination"]["page"], 1);
}

#[tokio::test]
async fn mark_all_read_reports_the_updated_count() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let bob = app.account("bob");
    app.seed_notifications(&alice.user, 5).await;
    app.seed_notifications(&bob.user, 2).await;

    let response = app
        .send(request(
            Method::PATCH,
            "/notifications/mark-all-read",
            Some(&alice.token),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["updatedCount"], 5);

    let response = app
        .send(request(
            Method::GET,
            "/notifications?unreadOnly=true",
            Some(&alice.token),
            None,
        ))
        .await;
    let data = json_body(response).await["data"].clone();
    assert_eq!(data["unreadCount"], 0);
    assert!(data["notifications"].as_array().unwrap().is_empty());

    // Nothing left to update.
    let response = app
        .send(request(
            Method::PATCH,
            "/notifications/mark-all-read",
            Some(&alice.token),
            None,
        ))
        .await;
    assert_eq!(json_body(response).await["data"]["updatedCount"], 0);
    assert!(app.store.notifications_for(bob.user.id).iter().all(|n| !n.read));
}

#[tokio::test]
async fn updating_a_notification_defaults_to_read() {
    let app = TestApp::new();
    let alice = app.account("alice");
    app.seed_notifications(&alice.user, 1).await;
    let id = app.store.notifications_for(alice.user.id)[0].id;
    let uri = format!("/notifications/{}", id);

    let response = app
        .send(request(Method::PATCH, &uri, Some(&alice.token), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["read"], true);

    let response = app
        .send(request(
            Method::PATCH,
            &uri,
            Some(&alice.token),
            Some(json!({ "read": false })),
        ))
        .await;
    assert_eq!(json_body(response).await["data"]["read"], false);
}

#[tokio::test]
async fn notifications_of_other_users_are_not_found() {
    let app = TestApp::new();
    let alice = app.account("alice");
    let mallory = app.account("mallory");
    app.seed_notifications(&alice.user, 1).await;
    let id = app.store.notifications_for(alice.user.id)[0].id;
    let uri = format!("/notifications/{}", id);

    let response = app
        .send(request(Method::PATCH, &uri, Some(&mallory.token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(request(Method::DELETE, &uri, Some(&mallory.token), None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.store.notifications_for(alice.user.id).len(), 1);
}

#[tokio::test]
async fn deleting_a_notification_removes_it() {
    let app = TestApp::new();
    let alice = app.account("alice");
    app.seed_notifications(&alice.user, 2).await;
    let id = app.store.notifications_for(alice.user.id)[0].id;

    let response = app
        .send(request(
            Method::DELETE,
            &format!("/notifications/{}", id),
            Some(&alice.token),
            None,
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["id"], id.to_string());
    let remaining = app.store.notifications_for(alice.user.id);
    assert_eq!(remaining.len(), 1);
    assert!(remaining.iter().all(|n| n.id != id));
}
