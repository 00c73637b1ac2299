//! Unified error type for the Mathdrop server.

use mathdrop_protocol::ProtocolError;
use mathdrop_session::{RegistryError, SessionError};
use mathdrop_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
///
/// None of these are ever sent to a client. They surface from the server
/// builder and accept loop, or end a single connection task.
#[derive(Debug, thiserror::Error)]
pub enum MathdropError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (registry or countdown).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The session actor has stopped and no longer takes commands.
    #[error("session actor is not running")]
    SessionUnavailable,
}

impl From<RegistryError> for MathdropError {
    fn from(e: RegistryError) -> Self {
        Self::Session(SessionError::Registry(e))
    }
}
