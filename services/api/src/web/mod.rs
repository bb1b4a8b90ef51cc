pub mod invoices;
pub mod middleware;
pub mod notifications;
pub mod rest;
pub mod state;
pub mod ws_handler;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, patch},
    Router,
};
use std::sync::Arc;

pub use middleware::require_auth;
pub use state::AppState;
pub use ws_handler::ws_handler;

/// Builds the API router: public health and realtime endpoints plus the
/// authenticated invoice and notification routes.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required; the socket authenticates in-band)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/ws", get(ws_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/invoices/{id}/status",
            patch(invoices::update_invoice_status_handler),
        )
        .route("/notifications", get(notifications::list_notifications_handler))
        .route(
            "/notifications/mark-all-read",
            patch(notifications::mark_all_read_handler),
        )
        .route(
            "/notifications/{id}",
            patch(notifications::update_notification_handler)
                .delete(notifications::delete_notification_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(app_state)
}
