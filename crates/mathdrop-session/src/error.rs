//! Error types for the session layer.

use mathdrop_countdown::CountdownError;
use mathdrop_protocol::PlayerId;
use mathdrop_transport::ConnectionId;

/// Errors from [`ConnectionRegistry`](crate::ConnectionRegistry) operations.
///
/// None of these reach the client. The state machine logs them and treats
/// the triggering message as a no-op.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The same transport connection was registered twice.
    #[error("connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),

    /// No record exists for this token (never registered, or purged).
    #[error("unknown player {0}")]
    UnknownPlayer(PlayerId),

    /// The display name was empty after trimming whitespace.
    #[error("empty display name for player {0}")]
    EmptyName(PlayerId),

    /// The record already has a display name; names are set once.
    #[error("player {0} has already joined")]
    NameAlreadySet(PlayerId),

    /// The operation needs a joined record (one with a display name).
    #[error("player {0} has not joined")]
    NotJoined(PlayerId),

    /// The record was already marked disconnected.
    #[error("player {0} is already disconnected")]
    AlreadyDisconnected(PlayerId),

    /// Only disconnected records may be purged.
    #[error("player {0} is still connected")]
    StillConnected(PlayerId),
}

/// Top-level error for the session crate.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A countdown control call failed.
    #[error(transparent)]
    Countdown(#[from] CountdownError),
}
