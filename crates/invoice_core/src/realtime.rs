//! crates/invoice_core/src/realtime.rs
//!
//! Defines the realtime message protocol between a client session and the
//! notification channel. Every frame is a JSON text message of the form
//! `{"type": "<event>", "data": {...}}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Notification;

//=========================================================================================
// Messages Sent FROM the Client TO the Server
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Binds the connection to a user. Must be sent before any notification is delivered.
    Authenticate {
        #[serde(default)]
        user_id: Option<String>,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// The connection joined the user's delivery group.
    Authenticated { user_id: Uuid, connection_id: Uuid },

    /// Authentication was refused; the connection stays outside every group.
    AuthenticationError { message: String },

    /// A newly created notification for the authenticated user.
    Notification(NotificationPayload),
}

/// The serialized form of a notification, shared by the realtime channel and the REST API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id,
            kind: n.kind.as_str().to_string(),
            title: n.title.clone(),
            message: n.message.clone(),
            data: n.data.clone(),
            action_url: n.action_url.clone(),
            read: n.read,
            created_at: n.created_at,
            updated_at: n.updated_at,
        }
    }
}
