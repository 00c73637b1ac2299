//! Connection registry and match session for Mathdrop.
//!
//! This crate owns everything the server knows about a match:
//!
//! 1. **Registry**: one record per open transport, keyed by an opaque
//!    player token ([`ConnectionRegistry`])
//! 2. **Session**: the `lobby → countdown → active` state machine
//!    ([`Session`]), written as a pure transition function
//!
//! # How it fits in the stack
//!
//! ```text
//! Server actor (above)  ← feeds Events in, executes Effects
//!     ↕
//! Session Layer (this crate)  ← registry + phase transitions
//!     ↕
//! Protocol / Countdown (below)  ← wire types, Tick
//! ```
//!
//! Nothing here performs I/O or reads a clock. Timers and sockets belong
//! to the caller, which makes every rule testable with plain function
//! calls.

mod config;
mod error;
mod registry;
mod session;

pub use config::SessionConfig;
pub use error::{RegistryError, SessionError};
pub use registry::{ConnectionRecord, ConnectionRegistry};
pub use session::{Effect, Event, Phase, Session};
