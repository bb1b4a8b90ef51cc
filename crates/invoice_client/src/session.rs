//! crates/invoice_client/src/session.rs
//!
//! Manages the lifecycle of one realtime session:
//! `Disconnected -> Connecting -> Connected -> Authenticated`.
//!
//! The manager never reconnects on its own. When the transport drops it moves to
//! `Disconnected`, emits [`SessionEvent::Disconnected`], and waits for the caller
//! to decide whether to call [`SessionManager::reconnect`].

use crate::error::ClientError;
use crate::transport::{Connection, Connector, FrameSink, FrameStream};
use futures::{SinkExt, StreamExt};
use invoice_core::realtime::{ClientMessage, NotificationPayload, ServerMessage};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    /// The transport is open but the server has not accepted the identity.
    Connected,
    Authenticated,
}

/// What subscribers observe from the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Authenticated { user_id: Uuid, connection_id: Uuid },
    AuthenticationFailed { message: String },
    Notification(NotificationPayload),
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long `connect` waits for the server to answer `authenticate`.
    pub auth_timeout: Duration,
    /// Buffer of the event broadcast; slow subscribers lag past this.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_timeout: Duration::from_secs(10),
            event_capacity: 64,
        }
    }
}

/// State shared between the manager and its reader task.
struct Shared {
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    last_error: Mutex<Option<ClientError>>,
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn record_error(&self, error: ClientError) {
        let mut slot = self.last_error.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(error);
    }
}

struct ActiveConnection {
    sink: FrameSink,
    reader: JoinHandle<()>,
}

impl ActiveConnection {
    async fn close(mut self) {
        self.reader.abort();
        let _ = self.reader.await;
        let _ = self.sink.close().await;
    }
}

type AuthReply = oneshot::Sender<Result<(), ClientError>>;

pub struct SessionManager {
    connector: Arc<dyn Connector>,
    user_id: Option<String>,
    config: SessionConfig,
    shared: Arc<Shared>,
    active: tokio::sync::Mutex<Option<ActiveConnection>>,
}

impl SessionManager {
    /// Creates a disconnected manager. `user_id` is the locally known identity, if any.
    pub fn new(connector: Arc<dyn Connector>, user_id: Option<String>, config: SessionConfig) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            connector,
            user_id,
            config,
            shared: Arc::new(Shared {
                state,
                events,
                last_error: Mutex::new(None),
            }),
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// The most recent connection or authentication failure.
    pub fn last_error(&self) -> Option<ClientError> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Opens a connection and authenticates it as the known user.
    ///
    /// Without a known identity this does nothing. An already authenticated
    /// session is left alone; any other existing connection is replaced.
    /// Resolves once the server accepts or rejects the identity, or when
    /// `auth_timeout` elapses.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let Some(user_id) = self.user_id.clone() else {
            debug!("No user identity known, not connecting");
            return Ok(());
        };

        let auth_rx = {
            let mut active = self.active.lock().await;
            if active.is_some() && self.state() == SessionState::Authenticated {
                return Ok(());
            }
            if let Some(previous) = active.take() {
                self.close_connection(previous).await;
            }

            self.shared.set_state(SessionState::Connecting);
            let Connection { mut sink, stream } = match self.connector.connect().await {
                Ok(connection) => connection,
                Err(e) => return Err(self.fail(e)),
            };
            self.shared.set_state(SessionState::Connected);

            let frame = serde_json::to_string(&ClientMessage::Authenticate {
                user_id: Some(user_id),
            })
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
            if let Err(e) = sink.send(frame).await {
                let _ = sink.close().await;
                return Err(self.fail(e));
            }

            let (auth_tx, auth_rx) = oneshot::channel();
            let reader = tokio::spawn(read_frames(stream, self.shared.clone(), auth_tx));
            *active = Some(ActiveConnection { sink, reader });
            auth_rx
        };

        match tokio::time::timeout(self.config.auth_timeout, auth_rx).await {
            Ok(Ok(result)) => result,
            // The reader was stopped by a concurrent disconnect.
            Ok(Err(_)) => Err(ClientError::Closed),
            Err(_) => {
                warn!("Server did not answer authenticate in time");
                self.shared.record_error(ClientError::Timeout);
                self.disconnect().await;
                Err(ClientError::Timeout)
            }
        }
    }

    /// Tears down the current connection, if any, and connects afresh.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        info!("Reconnecting realtime session");
        self.disconnect().await;
        self.connect().await
    }

    /// Closes the current connection. Emits `Disconnected` if a session was open.
    pub async fn disconnect(&self) {
        let previous = self.active.lock().await.take();
        match previous {
            Some(previous) => self.close_connection(previous).await,
            None => self.shared.set_state(SessionState::Disconnected),
        }
    }

    /// Closes `connection` and reports `Disconnected` unless its reader already did.
    async fn close_connection(&self, connection: ActiveConnection) {
        connection.close().await;
        if self.state() != SessionState::Disconnected {
            self.shared.set_state(SessionState::Disconnected);
            self.shared.emit(SessionEvent::Disconnected);
        }
    }

    fn fail(&self, error: ClientError) -> ClientError {
        warn!("Realtime connection failed: {}", error);
        self.shared.record_error(error.clone());
        self.shared.set_state(SessionState::Disconnected);
        error
    }
}

/// Reads server frames until the transport ends, updating state and fanning out events.
async fn read_frames(mut stream: FrameStream, shared: Arc<Shared>, auth_tx: AuthReply) {
    let mut auth_tx = Some(auth_tx);

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(text) => text,
            Err(e) => {
                warn!("Realtime transport error: {}", e);
                shared.record_error(e);
                break;
            }
        };
        let message = match serde_json::from_str::<ServerMessage>(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed server message: {}", e);
                continue;
            }
        };

        match message {
            ServerMessage::Authenticated {
                user_id,
                connection_id,
            } => {
                info!(%user_id, %connection_id, "Realtime session authenticated");
                shared.set_state(SessionState::Authenticated);
                shared.emit(SessionEvent::Authenticated {
                    user_id,
                    connection_id,
                });
                if let Some(tx) = auth_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            ServerMessage::AuthenticationError { message } => {
                warn!("Realtime authentication rejected: {}", message);
                let error = ClientError::AuthenticationFailed(message.clone());
                shared.record_error(error.clone());
                shared.set_state(SessionState::Connected);
                shared.emit(SessionEvent::AuthenticationFailed { message });
                if let Some(tx) = auth_tx.take() {
                    let _ = tx.send(Err(error));
                }
            }
            ServerMessage::Notification(payload) => {
                if shared.state() == SessionState::Authenticated {
                    shared.emit(SessionEvent::Notification(payload));
                } else {
                    debug!("Dropping notification on an unauthenticated session");
                }
            }
        }
    }

    shared.set_state(SessionState::Disconnected);
    shared.emit(SessionEvent::Disconnected);
    if let Some(tx) = auth_tx.take() {
        let _ = tx.send(Err(ClientError::Closed));
    }
}
