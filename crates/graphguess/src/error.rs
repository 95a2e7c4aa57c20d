//! Unified error type for the GraphGuess server.

use graphguess_protocol::ProtocolError;
use graphguess_room::RoomError;

use crate::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum GraphGuessError {
    /// The listener could not bind or a handshake failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Room lookup or setup failed (unknown room, empty vocabulary, ...).
    #[error(transparent)]
    Room(#[from] RoomError),
}
