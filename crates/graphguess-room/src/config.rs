//! Round and room configuration.

use std::time::Duration;

use graphguess_protocol::GameOptions;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default capacity of a room when `create` does not name one.
pub const DEFAULT_MAX_USERS: usize = 6;

/// Longest round or intermission a room accepts.
pub const MAX_PHASE_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

// ---------------------------------------------------------------------------
// RoundConfig
// ---------------------------------------------------------------------------

/// Timing and scoring rules for the rounds of a room.
///
/// A room starts with the server-wide defaults; `game:start` may override
/// the timing fields for the game it starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundConfig {
    /// How long the painter has before the round times out.
    pub round_duration: Duration,

    /// Pause between a round ending and the next painter being picked.
    pub intermission: Duration,

    /// When every player has painted, start a new set instead of ending
    /// the game.
    pub loop_sets: bool,

    /// Players needed for a game to run.
    pub min_players: usize,

    /// Points credited for a correct guess.
    pub guess_reward: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            round_duration: Duration::from_secs(180),
            intermission: Duration::from_secs(2),
            loop_sets: false,
            min_players: 2,
            guess_reward: 10,
        }
    }
}

impl RoundConfig {
    /// Clamps values that would stall or break a game.
    pub fn validated(mut self) -> Self {
        if self.round_duration.is_zero() {
            warn!("round_duration of 0 is not allowed, clamping to 1s");
            self.round_duration = Duration::from_secs(1);
        }
        if self.intermission.is_zero() {
            warn!("intermission of 0 is not allowed, clamping to 1s");
            self.intermission = Duration::from_secs(1);
        }
        if self.round_duration > MAX_PHASE_DURATION {
            warn!(
                round_secs = self.round_duration.as_secs(),
                "round_duration too long, clamping to 24h"
            );
            self.round_duration = MAX_PHASE_DURATION;
        }
        if self.intermission > MAX_PHASE_DURATION {
            warn!(
                intermission_secs = self.intermission.as_secs(),
                "intermission too long, clamping to 24h"
            );
            self.intermission = MAX_PHASE_DURATION;
        }
        if self.min_players < 2 {
            warn!(
                min_players = self.min_players,
                "a round needs a painter and a guesser, clamping min_players to 2"
            );
            self.min_players = 2;
        }
        self
    }

    /// Applies per-game overrides. Fields missing from `options` keep their
    /// current value.
    pub fn with_options(mut self, options: &GameOptions) -> Self {
        if let Some(secs) = options.round_duration_sec {
            self.round_duration = Duration::from_secs(secs);
        }
        if let Some(secs) = options.intermission_sec {
            self.intermission = Duration::from_secs(secs);
        }
        if let Some(loop_sets) = options.loop_sets {
            self.loop_sets = loop_sets;
        }
        self.validated()
    }
}

// ---------------------------------------------------------------------------
// RoomOptions
// ---------------------------------------------------------------------------

/// Settings fixed when a room is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomOptions {
    /// Private rooms never appear in the public room list.
    pub is_private: bool,
    pub max_users: usize,
}

impl Default for RoomOptions {
    fn default() -> Self {
        Self {
            is_private: false,
            max_users: DEFAULT_MAX_USERS,
        }
    }
}

impl RoomOptions {
    pub fn validated(mut self) -> Self {
        if self.max_users == 0 {
            warn!("max_users of 0 is not allowed, clamping to 1");
            self.max_users = 1;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// RegistryConfig
// ---------------------------------------------------------------------------

/// Server-wide settings applied to every room the registry creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Rules each new room starts with.
    pub round: RoundConfig,

    /// Capacity used when `create` does not name one.
    pub default_max_users: usize,

    /// Command mailbox size of each room actor. A full mailbox makes
    /// senders wait.
    pub channel_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            round: RoundConfig::default(),
            default_max_users: DEFAULT_MAX_USERS,
            channel_size: 64,
        }
    }
}
