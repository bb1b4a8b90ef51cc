//! services/api/src/web/state.rs
//!
//! Defines the application state shared by every handler and socket.

use crate::realtime::RealtimeHub;
use invoice_core::ports::{
    IdentityProvider, InvoiceStore, NotificationPublisher, NotificationStore, UserStore,
};
use invoice_core::{NotificationGenerator, StatusTransitionEngine};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub users: Arc<dyn UserStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub engine: Arc<StatusTransitionEngine>,
    pub hub: Arc<RealtimeHub>,
}

impl AppState {
    /// Wires the core services onto one backing store and the realtime hub.
    pub fn new<S>(store: Arc<S>, hub: Arc<RealtimeHub>) -> Self
    where
        S: IdentityProvider + UserStore + InvoiceStore + NotificationStore + 'static,
    {
        let publisher: Arc<dyn NotificationPublisher> = hub.clone();
        let generator = Arc::new(NotificationGenerator::new(store.clone(), publisher));
        let engine = Arc::new(StatusTransitionEngine::new(store.clone(), generator));
        Self {
            identity: store.clone(),
            users: store.clone(),
            notifications: store,
            engine,
            hub,
        }
    }
}
