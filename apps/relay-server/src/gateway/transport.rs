//! Frame-level transport seam between a session and its socket.
//!
//! The read and write halves are separate objects so a session can write while
//! another task is parked on a read.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};

/// A single transport frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    Close,
}

#[derive(Debug, thiserror::Error)]
#[error("transport error: {0}")]
pub struct TransportError(pub String);

/// Write half of a connection.
#[async_trait]
pub trait TransportSink: Send {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Send a close frame and flush. Errors are informational only.
    async fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// Read half of a connection. `None` means the peer went away.
#[async_trait]
pub trait TransportStream: Send {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>>;
}

// ---------------------------------------------------------------------------
// axum WebSocket
// ---------------------------------------------------------------------------

impl From<Frame> for Message {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => Message::Text(text.into()),
            Frame::Binary(bytes) => Message::Binary(bytes.into()),
            Frame::Ping(bytes) => Message::Ping(bytes.into()),
            Frame::Pong(bytes) => Message::Pong(bytes.into()),
            Frame::Close => Message::Close(None),
        }
    }
}

impl From<Message> for Frame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Text(text) => Frame::Text(text.as_str().to_owned()),
            Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
            Message::Ping(bytes) => Frame::Ping(bytes.to_vec()),
            Message::Pong(bytes) => Frame::Pong(bytes.to_vec()),
            Message::Close(_) => Frame::Close,
        }
    }
}

#[async_trait]
impl TransportSink for SplitSink<WebSocket, Message> {
    async fn send_frame(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.send(Message::from(frame))
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        let _ = self.send(Message::Close(None)).await;
        SinkExt::close(self)
            .await
            .map_err(|e| TransportError(e.to_string()))
    }
}

#[async_trait]
impl TransportStream for SplitStream<WebSocket> {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        self.next()
            .await
            .map(|res| res.map(Frame::from).map_err(|e| TransportError(e.to_string())))
    }
}

// ---------------------------------------------------------------------------
// In-memory transport (tests)
// ---------------------------------------------------------------------------
