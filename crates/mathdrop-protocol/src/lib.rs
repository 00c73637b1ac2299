//! Wire protocol for Mathdrop.
//!
//! This crate defines the "language" that the browser game and the match
//! server speak:
//!
//! - **Types** ([`ServerMessage`], [`ClientMessage`], [`PlayerSummary`],
//!   etc.): the envelopes that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those envelopes
//!   are converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw frames) and the session
//! (players, readiness, countdown). It doesn't know about connections or
//! phases: it only knows how to serialize and deserialize envelopes.
//!
//! ```text
//! Transport (bytes) → Protocol (envelope) → Session (state machine)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    ClientMessage, CountdownValue, GameStatus, PlayerId, PlayerSummary,
    QuestionRelay, Recipient, ServerMessage,
};
