pub mod domain;
pub mod notify;
pub mod ports;
pub mod realtime;
pub mod status;

pub use domain::{
    CustomerSummary, Invoice, InvoiceStatus, LineItem, NewNotification, Notification,
    NotificationKind, NotificationPage, NotificationQuery, User, UserId,
};
pub use notify::{DispatchOutcome, InvoiceEvent, NotificationGenerator};
pub use ports::{
    IdentityProvider, InvoiceStore, NotificationPublisher, NotificationStore, PortError,
    PortResult, StatusUpdate, UserStore,
};
pub use realtime::{ClientMessage, NotificationPayload, ServerMessage};
pub use status::{StatusTransitionEngine, TransitionError, TransitionOutcome};
