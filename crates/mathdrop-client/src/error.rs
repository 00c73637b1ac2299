//! Error types for the client.

use mathdrop_protocol::ProtocolError;
use mathdrop_transport::TransportError;

/// Errors that can occur on the client side.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The screen name was empty after trimming. Nothing was sent.
    #[error("please enter a screen name")]
    EmptyScreenName,

    /// `join` was called while a session is already open.
    #[error("already joined as {0:?}")]
    AlreadyJoined(String),

    /// A transport-level error (dial, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding an outbound envelope failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
}
