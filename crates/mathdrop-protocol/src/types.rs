//! Core protocol types for Mathdrop's wire format.
//!
//! Every type in this module is serialized to a JSON object and sent as a
//! single text frame. The browser side reads `data.type` and switches on
//! it, so every envelope is *internally tagged*: the variant name lives in
//! a `"type"` field next to the payload fields.
//!
//! ```text
//! { "type": "addQuestion", "question": "3 + 4 = ?", "answer": "7", "fromPlayer": "Alice" }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The opaque token the server hands a connection in its `welcome`.
///
/// Newtype over `String` so a token can't be confused with a display
/// name, even though both are strings on the wire.
/// `#[serde(transparent)]` keeps it a bare JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Borrows the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Recipient: who should receive a message?
// ---------------------------------------------------------------------------

/// Specifies who should receive a server message.
///
/// The session state machine returns `(Recipient, ServerMessage)` pairs;
/// the server resolves each recipient against the live roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every connected player on the roster.
    All,

    /// One specific connection, joined or not.
    Player(PlayerId),

    /// Every connected player on the roster EXCEPT the given one.
    /// This is how relayed gameplay events avoid echoing to their sender.
    AllExcept(PlayerId),
}

// ---------------------------------------------------------------------------
// Shared payloads
// ---------------------------------------------------------------------------

/// One roster entry inside a `gameStatus` envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub screen_name: String,
    pub ready: bool,
    /// `false` while a player sits in the grace window after disconnecting.
    #[serde(default = "default_connected")]
    pub connected: bool,
}

fn default_connected() -> bool {
    true
}

/// A full resync of roster and phase. Applying the same status twice on
/// the client yields the same screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub players: Vec<PlayerSummary>,
    pub game_started: bool,
    pub countdown_active: bool,
    /// Remaining count while `countdown_active`, otherwise 0.
    pub countdown_value: u32,
}

/// A question a player answered correctly, relayed to the opponent so it
/// drops onto their field.
///
/// The server forwards this verbatim; it never inspects the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionRelay {
    pub question: String,
    pub answer: String,
    pub from_player: String,
}

// ---------------------------------------------------------------------------
// CountdownValue
// ---------------------------------------------------------------------------

/// The value shown on the countdown screen: a number, then `"Go!"`.
///
/// On the wire this is either a JSON integer or the literal string
/// `"Go!"`, so it goes through a small untagged helper enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CountdownRepr", into = "CountdownRepr")]
pub enum CountdownValue {
    Number(u32),
    Go,
}

impl CountdownValue {
    /// The string the server sends for the terminal tick.
    pub const GO_TEXT: &'static str = "Go!";

    /// Returns `true` for the terminal `"Go!"` value.
    pub fn is_go(&self) -> bool {
        matches!(self, Self::Go)
    }
}

impl fmt::Display for CountdownValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Go => f.write_str(Self::GO_TEXT),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CountdownRepr {
    Number(u32),
    Text(String),
}

impl TryFrom<CountdownRepr> for CountdownValue {
    type Error = String;

    fn try_from(repr: CountdownRepr) -> Result<Self, Self::Error> {
        match repr {
            CountdownRepr::Number(n) => Ok(Self::Number(n)),
            CountdownRepr::Text(text) if text == Self::GO_TEXT => Ok(Self::Go),
            CountdownRepr::Text(text) => {
                Err(format!("unexpected countdown value {text:?}"))
            }
        }
    }
}

impl From<CountdownValue> for CountdownRepr {
    fn from(value: CountdownValue) -> Self {
        match value {
            CountdownValue::Number(n) => Self::Number(n),
            CountdownValue::Go => Self::Text(CountdownValue::GO_TEXT.to_owned()),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerMessage: server → client
// ---------------------------------------------------------------------------

/// Every envelope the server sends to a browser.
///
/// `rename_all` turns the variant names into the camelCase `type` tags the
/// client switches on; `rename_all_fields` does the same for the fields
/// inside struct variants (`player_id` → `playerId`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent once, right after the connection is registered.
    Welcome { player_id: PlayerId },

    /// Full roster and phase snapshot, sent on every roster change and
    /// every phase transition.
    GameStatus(GameStatus),

    /// One countdown tick: 3, 2, 1, then `"Go!"`.
    Countdown { value: CountdownValue },

    /// The match is live.
    GameStart,

    /// An opponent's correctly answered question.
    AddQuestion(QuestionRelay),

    /// An opponent won the match.
    GameWon { winner: String },
}

impl ServerMessage {
    /// The `type` tag of this envelope, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::GameStatus(_) => "gameStatus",
            Self::Countdown { .. } => "countdown",
            Self::GameStart => "gameStart",
            Self::AddQuestion(_) => "addQuestion",
            Self::GameWon { .. } => "gameWon",
        }
    }
}

// ---------------------------------------------------------------------------
// ClientMessage: client → server
// ---------------------------------------------------------------------------

/// Every envelope a browser may send to the server.
///
/// Anything that doesn't match one of these shapes fails to decode and is
/// dropped by the server without closing the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Claim a display name and appear on the roster.
    JoinGame { screen_name: String },

    /// Mark this player as ready to start.
    Ready,

    /// Relay a correctly answered question to the opponent(s).
    AddQuestion(QuestionRelay),

    /// Tell the opponent(s) that this player won.
    GameWon { winner: String },
}

impl ClientMessage {
    /// The `type` tag of this envelope, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinGame { .. } => "joinGame",
            Self::Ready => "ready",
            Self::AddQuestion(_) => "addQuestion",
            Self::GameWon { .. } => "gameWon",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
