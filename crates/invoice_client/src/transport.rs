//! crates/invoice_client/src/transport.rs
//!
//! The seam between the session manager and the wire. A connection is a pair of
//! text-frame halves; everything else about the socket stays behind [`Connector`].

use crate::error::ClientError;
use async_trait::async_trait;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ClientError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

/// An open connection. The stream ends when the server goes away.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Connection, ClientError>;
}

/// Connects to the realtime endpoint over WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Connection, ClientError> {
        let (socket, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        debug!(url = %self.url, "WebSocket connection opened");

        let (sink, stream) = socket.split();
        let sink = sink
            .sink_map_err(|e| ClientError::Transport(e.to_string()))
            .with(|text: String| future::ok::<_, ClientError>(Message::Text(text.into())));
        let stream = stream.filter_map(|frame| {
            future::ready(match frame {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                // Pings are answered by tungstenite; binary frames are not part of the protocol.
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::Transport(e.to_string()))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
