//! # GraphGuess
//!
//! Multiplayer "draw a math graph, others guess the word" game server.
//!
//! One player per round is the painter: they get a secret word and place
//! graphs on a shared canvas while everyone else guesses. The server speaks
//! named JSON events over WebSocket and runs one actor per room.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphguess::prelude::*;
//!
//! # async fn run() -> Result<(), GraphGuessError> {
//! let config = ServerConfig::from_env();
//! let server = GraphGuessServer::builder().config(&config)?.build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod transport;

pub use config::ServerConfig;
pub use error::GraphGuessError;
pub use server::{GraphGuessServer, GraphGuessServerBuilder};
pub use transport::{PendingConnection, TransportError, WebSocketListener, WsStream};

/// Everything needed to configure and run a server.
pub mod prelude {
    pub use crate::{GraphGuessError, GraphGuessServer, GraphGuessServerBuilder, ServerConfig};
    pub use graphguess_protocol::{ClientEvent, ServerEvent};
    pub use graphguess_room::{RoundConfig, Vocabulary, WordSource};
}
