//! The match session: phase state machine over the connection registry.
//!
//! [`Session`] is a pure transition function. It never touches a socket
//! or a clock; every input is an [`Event`] and every output is a list of
//! [`Effect`]s for the caller to execute in order:
//!
//! ```text
//!          all participants ready (≥ min_players)
//!   Lobby ─────────────────────────────────────────→ Countdown
//!     ↑                                                  │
//!     │ participant disconnects                          │ Tick::Go
//!     ├──────────────────────────────────────────────────┤
//!     │                                                  ▼
//!     └─────────────── participant disconnects ───────── Active
//! ```
//!
//! Every phase transition is followed by a full `gameStatus` broadcast so
//! a client that missed a message can resynchronize from scratch.

use std::fmt;

use mathdrop_countdown::Tick;
use mathdrop_protocol::{
    ClientMessage, CountdownValue, GameStatus, PlayerId, Recipient, ServerMessage,
};
use mathdrop_transport::ConnectionId;

use crate::{ConnectionRegistry, RegistryError, SessionConfig};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for enough ready players.
    #[default]
    Lobby,
    /// Counting down; `remaining` is the value last broadcast.
    Countdown { remaining: u32 },
    /// The match is live.
    Active,
}

impl Phase {
    /// Returns `true` while counting down.
    pub fn is_countdown(&self) -> bool {
        matches!(self, Self::Countdown { .. })
    }

    /// Returns `true` while the match is live.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Countdown { remaining } => write!(f, "countdown({remaining})"),
            Self::Active => write!(f, "active"),
        }
    }
}

// ---------------------------------------------------------------------------
// Events and effects
// ---------------------------------------------------------------------------

/// An input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A decoded envelope from a registered connection.
    Message { from: PlayerId, message: ClientMessage },
    /// The player's transport closed.
    Disconnected(PlayerId),
    /// The countdown timer fired.
    CountdownTick(Tick),
    /// The grace delay for a disconnected player elapsed.
    PurgeDue(PlayerId),
}

/// An output of the state machine, executed by the caller in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver a message to the resolved recipients.
    Send { to: Recipient, message: ServerMessage },
    /// Start the countdown timer and feed its first tick back immediately.
    StartCountdown,
    /// Cancel the countdown timer. No further tick may be fed back.
    CancelCountdown,
    /// Feed [`Event::PurgeDue`] back after the grace delay.
    SchedulePurge(PlayerId),
}

impl Effect {
    fn broadcast(message: ServerMessage) -> Self {
        Self::Send {
            to: Recipient::All,
            message,
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One match session: the registry plus the current phase.
///
/// `H` is the transport handle stored in each registry record.
#[derive(Debug)]
pub struct Session<H> {
    config: SessionConfig,
    registry: ConnectionRegistry<H>,
    phase: Phase,
}

impl<H> Session<H> {
    /// Creates a session in the lobby with an empty registry.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config: config.validated(),
            registry: ConnectionRegistry::new(),
            phase: Phase::Lobby,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Read access to the registry (for delivery and inspection).
    pub fn registry(&self) -> &ConnectionRegistry<H> {
        &self.registry
    }

    /// The (validated) configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The full roster and phase snapshot sent as `gameStatus`.
    pub fn status(&self) -> GameStatus {
        let (countdown_active, countdown_value) = match self.phase {
            Phase::Countdown { remaining } => (true, remaining),
            _ => (false, 0),
        };
        GameStatus {
            players: self.registry.snapshot(),
            game_started: self.phase.is_active(),
            countdown_active,
            countdown_value,
        }
    }

    /// Registers a newly opened connection and greets it with `welcome`.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyRegistered`] if the connection is known.
    pub fn connect(
        &mut self,
        connection_id: ConnectionId,
        handle: H,
    ) -> Result<(PlayerId, Vec<Effect>), RegistryError> {
        let player_id = self.registry.register(connection_id, handle)?;
        tracing::info!(%player_id, %connection_id, "player connected");
        let welcome = Effect::Send {
            to: Recipient::Player(player_id.clone()),
            message: ServerMessage::Welcome {
                player_id: player_id.clone(),
            },
        };
        Ok((player_id, vec![welcome]))
    }

    /// Applies one event and returns the effects it produced.
    ///
    /// Invalid input (unknown token, message before join, stale timer
    /// tick) is logged and yields no effects.
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::Message { from, message } => self.on_message(from, message),
            Event::Disconnected(player_id) => self.on_disconnect(player_id),
            Event::CountdownTick(tick) => self.on_tick(tick),
            Event::PurgeDue(player_id) => self.on_purge(player_id),
        }
    }

    fn on_message(&mut self, from: PlayerId, message: ClientMessage) -> Vec<Effect> {
        match message {
            ClientMessage::JoinGame { screen_name } => self.on_join(from, &screen_name),
            ClientMessage::Ready => self.on_ready(from),
            ClientMessage::AddQuestion(relay) => {
                self.relay(from, ServerMessage::AddQuestion(relay))
            }
            ClientMessage::GameWon { winner } => {
                self.relay(from, ServerMessage::GameWon { winner })
            }
        }
    }

    fn on_join(&mut self, from: PlayerId, screen_name: &str) -> Vec<Effect> {
        match self.registry.set_display_name(&from, screen_name) {
            Ok(name) => {
                tracing::info!(player_id = %from, screen_name = name, "player joined");
                vec![self.status_broadcast()]
            }
            Err(e) => {
                tracing::debug!(player_id = %from, error = %e, "join ignored");
                Vec::new()
            }
        }
    }

    fn on_ready(&mut self, from: PlayerId) -> Vec<Effect> {
        match self.registry.set_ready(&from) {
            Ok(true) => {}
            Ok(false) => return Vec::new(),
            Err(e) => {
                tracing::debug!(player_id = %from, error = %e, "ready ignored");
                return Vec::new();
            }
        }

        tracing::info!(player_id = %from, "player ready");
        let start = self.phase == Phase::Lobby
            && self.registry.all_ready(self.config.min_players);
        if start {
            let remaining = self.config.countdown.from;
            self.transition(Phase::Countdown { remaining });
        }

        let mut effects = vec![self.status_broadcast()];
        if start {
            effects.push(Effect::StartCountdown);
        }
        effects
    }

    /// Forwards a gameplay event to every other participant.
    fn relay(&self, from: PlayerId, message: ServerMessage) -> Vec<Effect> {
        let sender_joined = self
            .registry
            .get(&from)
            .is_some_and(|record| record.is_participant());
        if !sender_joined {
            tracing::debug!(player_id = %from, kind = message.kind(), "relay from non-participant dropped");
            return Vec::new();
        }

        tracing::debug!(player_id = %from, kind = message.kind(), "relaying");
        vec![Effect::Send {
            to: Recipient::AllExcept(from),
            message,
        }]
    }

    fn on_disconnect(&mut self, player_id: PlayerId) -> Vec<Effect> {
        let was_participant = self
            .registry
            .get(&player_id)
            .is_some_and(|record| record.is_participant());

        if let Err(e) = self.registry.mark_disconnected(&player_id) {
            tracing::warn!(%player_id, error = %e, "disconnect for unusable record");
            return Vec::new();
        }
        tracing::info!(%player_id, phase = %self.phase, "player disconnected");

        let mut effects = Vec::new();
        if was_participant {
            match self.phase {
                Phase::Countdown { .. } => {
                    effects.push(Effect::CancelCountdown);
                    self.abort_to_lobby();
                    effects.push(self.status_broadcast());
                }
                Phase::Active => {
                    self.abort_to_lobby();
                    effects.push(self.status_broadcast());
                }
                Phase::Lobby => {}
            }
        }
        effects.push(Effect::SchedulePurge(player_id));
        effects
    }

    fn on_tick(&mut self, tick: Tick) -> Vec<Effect> {
        if !self.phase.is_countdown() {
            tracing::warn!(?tick, phase = %self.phase, "stale countdown tick ignored");
            return Vec::new();
        }

        match tick {
            Tick::Count(remaining) => {
                self.phase = Phase::Countdown { remaining };
                vec![Effect::broadcast(ServerMessage::Countdown {
                    value: CountdownValue::Number(remaining),
                })]
            }
            Tick::Go => {
                let go = Effect::broadcast(ServerMessage::Countdown {
                    value: CountdownValue::Go,
                });
                self.transition(Phase::Active);
                vec![
                    go,
                    Effect::broadcast(ServerMessage::GameStart),
                    self.status_broadcast(),
                ]
            }
        }
    }

    fn on_purge(&mut self, player_id: PlayerId) -> Vec<Effect> {
        match self.registry.purge(&player_id) {
            Ok(_) => {
                tracing::info!(%player_id, "player purged");
                vec![self.status_broadcast()]
            }
            Err(e) => {
                tracing::warn!(%player_id, error = %e, "purge skipped");
                Vec::new()
            }
        }
    }

    fn abort_to_lobby(&mut self) {
        self.transition(Phase::Lobby);
        if self.config.reset_ready_on_abort {
            let cleared = self.registry.clear_ready();
            tracing::debug!(cleared, "ready flags reset");
        }
    }

    fn transition(&mut self, next: Phase) {
        tracing::info!(from = %self.phase, to = %next, "session phase changed");
        self.phase = next;
    }

    fn status_broadcast(&self) -> Effect {
        Effect::broadcast(ServerMessage::GameStatus(self.status()))
    }
}
