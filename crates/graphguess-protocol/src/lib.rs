//! Wire protocol for GraphGuess.
//!
//! Clients and the server exchange *named events*: every frame is a JSON
//! object of the form `{"event": "<name>", "data": <payload>}`.
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`ConnectionId`],
//!   [`RoomId`], ...): what travels on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! WebSocket frame → Protocol (ClientEvent) → Room registry → Room actor
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ClientEvent, ConnectionId, GameOptions, GameStateView, GraphDescriptor,
    GuessResult, JoinUser, PlayerInfo, Recipient, Role, RoomId, RoomState,
    RoomSummary, RoundEndReason, RoundTiming, Scoreboard, ServerEvent,
};
