//! Client-side session manager for the invoice realtime channel.
//!
//! A [`SessionManager`] owns at most one live connection, authenticates it as
//! the known user, and republishes what the server sends as [`SessionEvent`]s.

pub mod error;
pub mod session;
pub mod transport;

pub use error::ClientError;
pub use session::{SessionConfig, SessionEvent, SessionManager, SessionState};
pub use transport::{Connection, Connector, FrameSink, FrameStream, WsConnector};
