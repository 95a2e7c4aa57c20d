//! Error types for the room layer.

use graphguess_protocol::RoomId;

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// No room with this id is registered.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room already holds `maxUsers` players.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The room's mailbox is closed, usually because it is shutting down.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// A word source cannot be built from an empty list.
    #[error("vocabulary must contain at least one word")]
    EmptyVocabulary,
}

impl RoomError {
    /// Stable code sent to clients in `errorMsg`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "room-not-found",
            Self::RoomFull(_) => "room-full",
            Self::Unavailable(_) => "room-unavailable",
            Self::EmptyVocabulary => "empty-vocabulary",
        }
    }
}
