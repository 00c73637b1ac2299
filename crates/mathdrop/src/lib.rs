//! # Mathdrop
//!
//! Session server for the two-player Mathdrop falling-math game.
//!
//! Browsers connect over WebSocket, pick a screen name, and mark
//! themselves ready. Once every joined player is ready the server runs a
//! `3, 2, 1, Go!` countdown and starts the match. During play it only
//! relays gameplay events (answered questions, the win) between players;
//! all game physics stay in the browser.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mathdrop::prelude::*;
//!
//! # async fn run() -> Result<(), MathdropError> {
//! let server = MathdropServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .session_config(SessionConfig::default())
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod actor;
mod error;
mod handler;
mod server;

pub use actor::{Frame, Outbox, SessionHandle, SessionInfo, spawn_session};
pub use error::MathdropError;
pub use server::{DEFAULT_CHANNEL_SIZE, MathdropServer, MathdropServerBuilder};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{MathdropError, MathdropServer, MathdropServerBuilder, SessionHandle, SessionInfo};
    pub use mathdrop_countdown::CountdownConfig;
    pub use mathdrop_protocol::{ClientMessage, GameStatus, PlayerId, ServerMessage};
    pub use mathdrop_session::{Phase, SessionConfig};
}
