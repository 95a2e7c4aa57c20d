//! Core protocol types.
//!
//! Everything here is serialized into the `{"event", "data"}` frames that
//! browser clients send and receive. Field names follow the camelCase the
//! JavaScript client expects.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier for one client connection.
///
/// The connection *is* the player identity: there is no login, so the id is
/// used for painter/sender checks and as the score key. Nothing should
/// assume any structure beyond equality and ordering.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a `ConnectionId` from a raw value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Room name chosen by the client. Unique key in the room registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for RoomId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A graph placed by the painter. The server never looks inside it.
pub type GraphDescriptor = serde_json::Value;

/// Scores keyed by player, in a stable order for broadcasts.
pub type Scoreboard = BTreeMap<ConnectionId, u32>;

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connection subscribed to the room that produced the event.
    Room,
    /// A single connection.
    Connection(ConnectionId),
    /// Every live connection on the server.
    Everyone,
}

// ---------------------------------------------------------------------------
// Room and player views
// ---------------------------------------------------------------------------

/// A player's role in the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Painter,
    Viewer,
}

/// One entry of the room roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: ConnectionId,
    pub name: String,
    pub role: Role,
}

/// The lifecycle state of a room's game.
///
/// ```text
/// Lobby ──→ Round ⇄ Intermission
///             │          │
///             └──→ GameOver ←┘
///                    │
///                    └──→ Round (restart)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomState {
    Lobby,
    Round,
    Intermission,
    GameOver,
}

impl RoomState {
    /// `true` while a game is running (a round or the pause after one).
    pub fn is_in_game(self) -> bool {
        matches!(self, Self::Round | Self::Intermission)
    }

    /// Returns `true` if moving from `self` to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RoomState::*;
        matches!(
            (self, target),
            (Lobby, Round)
                | (Round, Intermission)
                | (Intermission, Round)
                | (GameOver, Round)
                | (Lobby | Round | Intermission, GameOver)
        )
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "Lobby"),
            Self::Round => write!(f, "Round"),
            Self::Intermission => write!(f, "Intermission"),
            Self::GameOver => write!(f, "GameOver"),
        }
    }
}

/// Public summary of a room, as listed in the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub name: RoomId,
    pub in_game: bool,
    pub user_count: usize,
    pub has_painter: bool,
    pub is_waiting: bool,
    pub is_full: bool,
}

/// Timing metadata of a round. Clients derive the remaining time from
/// `round_started_at + round_duration_sec`; the server never pushes ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundTiming {
    pub round_number: u32,
    /// Unix epoch milliseconds.
    pub round_started_at: u64,
    pub round_duration_sec: u64,
}

/// Why a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundEndReason {
    Guessed,
    Timeout,
}

impl fmt::Display for RoundEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guessed => write!(f, "guessed"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

/// Snapshot of a room's game sent to a connection that joins (or rejoins)
/// while a game is running. Never contains the secret word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateView {
    pub room: RoomId,
    pub state: RoomState,
    pub painter: Option<ConnectionId>,
    pub round: Option<RoundTiming>,
    pub remaining_ms: Option<u64>,
    pub intermission_sec: u64,
    pub scores: Scoreboard,
}

/// Outcome of a guess.
///
/// A correct guess is broadcast with the word, the guesser's name and the
/// updated scores; an incorrect one is sent privately with `correct: false`
/// only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessResult {
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<Scoreboard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guesser: Option<String>,
}

impl GuessResult {
    pub fn incorrect() -> Self {
        Self {
            correct: false,
            word: None,
            scores: None,
            guesser: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

/// The `user` object of a join request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinUser {
    pub name: String,
}

/// Per-game overrides sent with `game:start`. Missing fields keep the room's
/// current settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOptions {
    #[serde(default)]
    pub round_duration_sec: Option<u64>,
    #[serde(default)]
    pub intermission_sec: Option<u64>,
    #[serde(default)]
    pub loop_sets: Option<bool>,
}

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Ensure a room exists and subscribe to its broadcasts.
    /// `max_users` falls back to the server default when absent.
    #[serde(rename = "create", rename_all = "camelCase")]
    Create {
        room: RoomId,
        #[serde(default)]
        is_private: bool,
        #[serde(default)]
        max_users: Option<usize>,
    },

    #[serde(rename = "join")]
    Join { room: RoomId, user: JoinUser },

    #[serde(rename = "addGraph")]
    AddGraph { room: RoomId, graph: GraphDescriptor },

    #[serde(rename = "clearCanvas")]
    ClearCanvas { room: RoomId },

    #[serde(rename = "guess")]
    Guess { room: RoomId, guess: String },

    /// Ask for a fresh room-list broadcast.
    #[serde(rename = "getRooms")]
    GetRooms,

    #[serde(rename = "game:start")]
    GameStart {
        room: RoomId,
        #[serde(default)]
        options: GameOptions,
    },
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "roomList")]
    RoomList(Vec<RoomSummary>),

    /// Full graph list of the room.
    #[serde(rename = "graphs")]
    Graphs(Vec<GraphDescriptor>),

    #[serde(rename = "clearCanvas")]
    ClearCanvas,

    /// Full roster of the room.
    #[serde(rename = "users")]
    Users(Vec<PlayerInfo>),

    /// A round started.
    #[serde(rename = "newGame")]
    NewGame {
        room: RoomId,
        roles: Vec<PlayerInfo>,
        painter: ConnectionId,
        round: RoundTiming,
    },

    #[serde(rename = "game:state")]
    GameState(GameStateView),

    /// The secret word, sent to the painter only.
    #[serde(rename = "wordForPainter")]
    WordForPainter(String),

    #[serde(rename = "guessResult")]
    GuessResult(GuessResult),

    #[serde(rename = "round:end")]
    RoundEnd {
        reason: RoundEndReason,
        word: String,
        scores: Scoreboard,
    },

    #[serde(rename = "gameOver")]
    GameOver { scores: Scoreboard },

    /// A rejected request. `code` is stable (`room-not-found`, `room-full`,
    /// ...), `message` is for humans.
    #[serde(rename = "errorMsg")]
    ErrorMsg { code: String, message: String },
}
