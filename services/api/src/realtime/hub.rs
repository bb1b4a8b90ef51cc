//! Registry of live connections grouped by user, and the push path into them.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use invoice_core::domain::{Notification, UserId};
use invoice_core::ports::NotificationPublisher;
use invoice_core::realtime::{NotificationPayload, ServerMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// The outbox of one connection. A writer task drains it into the socket, so
/// everything sent through it reaches the client in send order.
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Delivery groups of authenticated connections.
///
/// Each user's group sits behind its own map entry; joining, leaving and pushing
/// for the same user are serialized on that entry's lock.
pub struct RealtimeHub {
    groups: DashMap<UserId, HashMap<ConnectionId, Outbox>>,
    members: DashMap<ConnectionId, UserId>,
    shutdown: CancellationToken,
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self {
            groups: DashMap::new(),
            members: DashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Adds a connection to `user_id`'s group, leaving any group it was in before.
    pub fn join(&self, connection_id: ConnectionId, user_id: UserId, outbox: Outbox) {
        if self.members.get(&connection_id).is_some_and(|u| *u == user_id) {
            return;
        }
        self.leave(connection_id);
        self.groups
            .entry(user_id)
            .or_default()
            .insert(connection_id, outbox);
        self.members.insert(connection_id, user_id);
        debug!(%connection_id, %user_id, "Connection joined delivery group");
    }

    /// Removes a connection from whatever group it joined. Unknown ids are ignored.
    pub fn leave(&self, connection_id: ConnectionId) {
        let Some((_, user_id)) = self.members.remove(&connection_id) else {
            return;
        };
        if let Entry::Occupied(mut group) = self.groups.entry(user_id) {
            group.get_mut().remove(&connection_id);
            if group.get().is_empty() {
                group.remove();
            }
        }
        debug!(%connection_id, %user_id, "Connection left delivery group");
    }

    /// Sends `message` to every connection currently in `user_id`'s group and
    /// returns how many accepted it. Absent users receive nothing and nothing is queued.
    pub fn push(&self, user_id: UserId, message: ServerMessage) -> usize {
        let Some(group) = self.groups.get(&user_id) else {
            return 0;
        };
        group
            .values()
            .filter(|outbox| outbox.send(message.clone()).is_ok())
            .count()
    }

    pub fn group_size(&self, user_id: UserId) -> usize {
        self.groups.get(&user_id).map_or(0, |g| g.len())
    }

    pub fn connection_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_member(&self, connection_id: ConnectionId) -> bool {
        self.members.contains_key(&connection_id)
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_cancelled()
    }

    /// Resolves once [`shutdown`](Self::shutdown) has been called.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops the hub. Every socket task watching the token closes, and the
    /// registry is emptied so no further push reaches anyone.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.groups.clear();
        self.members.clear();
        info!("Realtime hub stopped");
    }
}

impl NotificationPublisher for RealtimeHub {
    fn publish(&self, notification: &Notification) -> usize {
        let payload = NotificationPayload::from(notification);
        self.push(notification.user_id, ServerMessage::Notification(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox() -> (Outbox, mpsc::UnboundedReceiver<ServerMessage>) {
        mpsc::unbounded_channel()
    }

    fn ping() -> ServerMessage {
        ServerMessage::AuthenticationError {
            message: "ping".to_string(),
        }
    }

    #[test]
    fn push_reaches_only_the_users_connections() {
        let hub = RealtimeHub::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let (tx1, mut rx1) = outbox();
        let (tx2, mut rx2) = outbox();
        let (tx3, mut rx3) = outbox();
        hub.join(Uuid::new_v4(), alice, tx1);
        hub.join(Uuid::new_v4(), alice, tx2);
        hub.join(Uuid::new_v4(), bob, tx3);

        assert_eq!(hub.push(alice, ping()), 2);
        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn push_to_absent_user_is_dropped() {
        let hub = RealtimeHub::new();
        assert_eq!(hub.push(Uuid::new_v4(), ping()), 0);
    }

    #[test]
    fn leave_removes_connection_and_empty_group() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let (tx, mut rx) = outbox();
        hub.join(conn, user, tx);
        assert_eq!(hub.group_size(user), 1);

        hub.leave(conn);
        hub.leave(conn);

        assert_eq!(hub.group_size(user), 0);
        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.push(user, ping()), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn rejoining_as_another_user_moves_the_connection() {
        let hub = RealtimeHub::new();
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let conn = Uuid::new_v4();
        let (tx, _rx) = outbox();
        hub.join(conn, alice, tx.clone());
        hub.join(conn, bob, tx);

        assert_eq!(hub.group_size(alice), 0);
        assert_eq!(hub.group_size(bob), 1);
        assert_eq!(hub.connection_count(), 1);
    }

    #[test]
    fn closed_outboxes_are_not_counted() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let (tx, rx) = outbox();
        hub.join(Uuid::new_v4(), user, tx);
        drop(rx);

        assert_eq!(hub.push(user, ping()), 0);
    }

    #[test]
    fn shutdown_clears_registry() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let (tx, _rx) = outbox();
        hub.join(Uuid::new_v4(), user, tx);
        let token = hub.shutdown_token();

        hub.shutdown();

        assert!(!hub.is_running());
        assert!(token.is_cancelled());
        assert_eq!(hub.push(user, ping()), 0);
    }

    #[test]
    fn published_notification_carries_payload() {
        let hub = RealtimeHub::new();
        let user = Uuid::new_v4();
        let (tx, mut rx) = outbox();
        hub.join(Uuid::new_v4(), user, tx);
        let now = chrono::Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: user,
            kind: invoice_core::NotificationKind::InvoicePaid,
            title: "Invoice Paid".to_string(),
            message: "paid".to_string(),
            data: None,
            action_url: Some("/invoices/1".to_string()),
            read: false,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(hub.publish(&notification), 1);
        match rx.try_recv().unwrap() {
            ServerMessage::Notification(payload) => {
                assert_eq!(payload.id, notification.id);
                assert_eq!(payload.kind, "invoice-paid");
            }
            other => panic!("unexpected message {:?}", other),
        }
    }
}
