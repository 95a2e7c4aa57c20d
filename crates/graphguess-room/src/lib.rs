//! Rooms and rounds for GraphGuess.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns its
//! roster, scores, canvas and round timers.
//!
//! # Key types
//!
//! - [`RoomRegistry`]: creates/destroys rooms, routes client events
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoundController`]: the per-room round state machine
//! - [`Gateway`]: directory of live connections, outbound delivery
//! - [`WordSource`] / [`Vocabulary`]: secret word selection
//! - [`RoundConfig`], [`RoomOptions`], [`RegistryConfig`]: settings

mod config;
mod error;
mod gateway;
mod ledger;
mod registry;
mod room;
mod round;
mod words;

pub use config::{
    DEFAULT_MAX_USERS, MAX_PHASE_DURATION, RegistryConfig, RoomOptions, RoundConfig,
};
pub use error::RoomError;
pub use gateway::{EventSender, Gateway};
pub use graphguess_protocol::RoomState;
pub use ledger::ScoreLedger;
pub use registry::RoomRegistry;
pub use room::{LeaveOutcome, RoomHandle, RoomInfo};
pub use round::{Alarm, AlarmKind, Outbound, RoomSnapshot, RoundController};
pub use words::{DEFAULT_WORDS, Vocabulary, WordSource};
