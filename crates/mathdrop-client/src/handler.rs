//! Client protocol handler: a pure reactive view of the match.
//!
//! [`ClientProtocolHandler`] owns no socket. Feed it every decoded
//! [`ServerMessage`] and it updates the local screen and returns the
//! [`ClientEvent`]s the game core should react to. Outbound calls return
//! the [`ClientMessage`] to send, or `None` when the call is a no-op in
//! the current state.

use std::time::Duration;

use mathdrop_protocol::{
    ClientMessage, CountdownValue, GameStatus, PlayerId, PlayerSummary, QuestionRelay,
    ServerMessage,
};

use crate::ClientError;

/// How long the `"Go!"` screen stays up before the game view takes over.
pub const GO_DELAY: Duration = Duration::from_secs(1);

/// Which screen the client is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Screen {
    /// Pre-connection screen (name entry).
    #[default]
    Offline,
    /// Socket is opening; the join goes out once it is open.
    Connecting,
    /// Roster and ready button.
    WaitingRoom,
    /// Countdown overlay showing this value.
    Countdown(CountdownValue),
    /// The live match.
    Playing,
}

/// Something the local game core or UI should react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The server assigned this connection its token.
    Welcomed(PlayerId),
    /// The roster was replaced wholesale.
    RosterUpdated(Vec<PlayerSummary>),
    /// Show this countdown value.
    CountdownShown(CountdownValue),
    /// Switch to the live game view.
    GameStarted,
    /// A countdown or match was aborted; back to the waiting room.
    ReturnedToLobby,
    /// Drop this question onto the local field.
    QuestionFromOpponent(QuestionRelay),
    /// Show the "opponent won" overlay. The local score is untouched.
    OpponentWon(String),
    /// The connection dropped without the player leaving.
    ConnectionLost,
}

/// Local state of one player's multiplayer session.
#[derive(Debug, Clone, Default)]
pub struct ClientProtocolHandler {
    screen: Screen,
    player_id: Option<PlayerId>,
    screen_name: Option<String>,
    players: Vec<PlayerSummary>,
    ready: bool,
    game_started: bool,
    opponent_won: Option<String>,
}

impl ClientProtocolHandler {
    /// Creates a handler on the pre-connection screen.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    /// Validates and stores the screen name before any socket is opened.
    ///
    /// # Errors
    /// - [`ClientError::EmptyScreenName`]: blank after trimming
    /// - [`ClientError::AlreadyJoined`]: a session is already open
    pub fn join(&mut self, screen_name: &str) -> Result<(), ClientError> {
        if let Some(current) = &self.screen_name {
            return Err(ClientError::AlreadyJoined(current.clone()));
        }
        let name = screen_name.trim();
        if name.is_empty() {
            return Err(ClientError::EmptyScreenName);
        }
        self.screen_name = Some(name.to_owned());
        self.screen = Screen::Connecting;
        Ok(())
    }

    /// The `joinGame` envelope to send once the socket is open.
    pub fn on_open(&self) -> Option<ClientMessage> {
        if self.screen != Screen::Connecting {
            return None;
        }
        self.screen_name
            .as_ref()
            .map(|name| ClientMessage::JoinGame {
                screen_name: name.clone(),
            })
    }

    /// Marks this player ready. No-op unless waiting in the lobby and
    /// not already ready.
    pub fn ready(&mut self) -> Option<ClientMessage> {
        if self.screen != Screen::WaitingRoom || self.ready {
            return None;
        }
        self.ready = true;
        Some(ClientMessage::Ready)
    }

    /// Relays a correctly answered question. No-op outside a live match.
    pub fn send_question_to_opponent(
        &self,
        question: &str,
        answer: &str,
    ) -> Option<ClientMessage> {
        let from_player = self.match_name()?;
        Some(ClientMessage::AddQuestion(QuestionRelay {
            question: question.to_owned(),
            answer: answer.to_owned(),
            from_player: from_player.to_owned(),
        }))
    }

    /// Tells the opponent this player won. No-op outside a live match.
    pub fn send_game_won(&self) -> Option<ClientMessage> {
        let winner = self.match_name()?;
        Some(ClientMessage::GameWon {
            winner: winner.to_owned(),
        })
    }

    /// Leaves on purpose. The later socket close raises no alert.
    pub fn leave(&mut self) {
        tracing::debug!("leaving multiplayer session");
        self.reset();
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Applies one server envelope.
    pub fn handle(&mut self, message: ServerMessage) -> Vec<ClientEvent> {
        if self.screen == Screen::Offline {
            tracing::debug!(kind = message.kind(), "message while offline ignored");
            return Vec::new();
        }

        match message {
            ServerMessage::Welcome { player_id } => {
                self.player_id = Some(player_id.clone());
                if self.screen == Screen::Connecting {
                    self.screen = Screen::WaitingRoom;
                }
                vec![ClientEvent::Welcomed(player_id)]
            }
            ServerMessage::GameStatus(status) => self.apply_status(status),
            ServerMessage::Countdown { value } => {
                self.screen = Screen::Countdown(value);
                vec![ClientEvent::CountdownShown(value)]
            }
            ServerMessage::GameStart => self.enter_game().into_iter().collect(),
            ServerMessage::AddQuestion(relay) => {
                if !self.is_multiplayer_mode() {
                    tracing::debug!("question outside a match dropped");
                    return Vec::new();
                }
                vec![ClientEvent::QuestionFromOpponent(relay)]
            }
            ServerMessage::GameWon { winner } => {
                self.opponent_won = Some(winner.clone());
                vec![ClientEvent::OpponentWon(winner)]
            }
        }
    }

    /// Call this [`GO_DELAY`] after `"Go!"` was shown.
    pub fn go_delay_elapsed(&mut self) -> Option<ClientEvent> {
        if self.screen != Screen::Countdown(CountdownValue::Go) {
            return None;
        }
        self.enter_game()
    }

    /// The socket closed. Returns [`ClientEvent::ConnectionLost`] once,
    /// unless the player left on purpose.
    pub fn on_close(&mut self) -> Option<ClientEvent> {
        if self.screen == Screen::Offline {
            return None;
        }
        tracing::info!("connection lost");
        self.reset();
        Some(ClientEvent::ConnectionLost)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn player_id(&self) -> Option<&PlayerId> {
        self.player_id.as_ref()
    }

    pub fn screen_name(&self) -> Option<&str> {
        self.screen_name.as_deref()
    }

    pub fn players(&self) -> &[PlayerSummary] {
        &self.players
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn opponent_won(&self) -> Option<&str> {
        self.opponent_won.as_deref()
    }

    /// `true` while a match is live on this client.
    pub fn is_multiplayer_mode(&self) -> bool {
        self.screen == Screen::Playing && self.game_started
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Replaces roster and phase wholesale. Applying the same status twice
    /// leaves the same state.
    fn apply_status(&mut self, status: GameStatus) -> Vec<ClientEvent> {
        self.ready = self
            .player_id
            .as_ref()
            .and_then(|me| status.players.iter().find(|p| &p.id == me))
            .is_some_and(|me| me.ready);
        self.players = status.players;
        self.game_started = status.game_started;

        let mut events = vec![ClientEvent::RosterUpdated(self.players.clone())];

        if status.countdown_active {
            let value = CountdownValue::Number(status.countdown_value);
            if self.screen != Screen::Countdown(value) {
                self.screen = Screen::Countdown(value);
                events.push(ClientEvent::CountdownShown(value));
            }
        } else if status.game_started {
            events.extend(self.enter_game());
        } else if self.screen != Screen::WaitingRoom {
            let aborted = matches!(self.screen, Screen::Countdown(_) | Screen::Playing);
            self.screen = Screen::WaitingRoom;
            if aborted {
                self.opponent_won = None;
                events.push(ClientEvent::ReturnedToLobby);
            }
        }

        events
    }

    fn enter_game(&mut self) -> Option<ClientEvent> {
        self.game_started = true;
        if self.screen == Screen::Playing {
            return None;
        }
        self.screen = Screen::Playing;
        self.opponent_won = None;
        Some(ClientEvent::GameStarted)
    }

    fn match_name(&self) -> Option<&str> {
        if !self.is_multiplayer_mode() {
            return None;
        }
        self.screen_name.as_deref()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
