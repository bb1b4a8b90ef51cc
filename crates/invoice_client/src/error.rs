//! crates/invoice_client/src/error.rs

use thiserror::Error;

/// Errors surfaced by the realtime session manager.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed message: {0}")]
    Protocol(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Timed out waiting for the server to authenticate the connection")]
    Timeout,

    #[error("Connection closed")]
    Closed,
}
