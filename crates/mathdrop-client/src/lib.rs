//! Client side of the Mathdrop multiplayer protocol.
//!
//! - [`ClientProtocolHandler`]: pure state machine mirroring the server's
//!   envelopes onto a local screen, testable without a socket
//! - [`MultiplayerClient`]: drives a handler over a WebSocket connection
//!
//! The game core talks to the handler through two outbound calls,
//! [`send_question_to_opponent`](ClientProtocolHandler::send_question_to_opponent)
//! and [`send_game_won`](ClientProtocolHandler::send_game_won), and
//! receives [`ClientEvent`]s back.

mod connection;
mod error;
mod handler;

pub use connection::MultiplayerClient;
pub use error::ClientError;
pub use handler::{ClientEvent, ClientProtocolHandler, GO_DELAY, Screen};
