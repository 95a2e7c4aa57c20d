//! `GraphGuessServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → room registry.

use std::net::SocketAddr;
use std::sync::Arc;

use graphguess_protocol::JsonCodec;
use graphguess_room::{Gateway, RegistryConfig, RoomRegistry, RoundConfig, Vocabulary, WordSource};

use crate::handler::handle_connection;
use crate::{GraphGuessError, ServerConfig, WebSocketListener};

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) registry: RoomRegistry,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a GraphGuess server.
///
/// ```rust,no_run
/// # async fn run() -> Result<(), graphguess::GraphGuessError> {
/// use graphguess::GraphGuessServer;
///
/// let server = GraphGuessServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct GraphGuessServerBuilder {
    bind_addr: String,
    registry_config: RegistryConfig,
    words: Option<Arc<dyn WordSource>>,
}

impl GraphGuessServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            registry_config: RegistryConfig::default(),
            words: None,
        }
    }

    /// Takes address, round rules, capacity and vocabulary from a
    /// [`ServerConfig`].
    ///
    /// # Errors
    /// Fails if the configured word list is empty.
    pub fn config(mut self, config: &ServerConfig) -> Result<Self, GraphGuessError> {
        let vocabulary = config.vocabulary()?;
        self.registry_config = config.registry_config();
        Ok(self.bind(&config.bind_addr()).vocabulary(vocabulary))
    }

    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn round_config(mut self, round: RoundConfig) -> Self {
        self.registry_config.round = round.validated();
        self
    }

    pub fn default_max_users(mut self, max_users: usize) -> Self {
        self.registry_config.default_max_users = max_users.max(1);
        self
    }

    pub fn vocabulary(self, vocabulary: Vocabulary) -> Self {
        self.word_source(vocabulary)
    }

    /// Uses a custom word source instead of a fixed vocabulary.
    pub fn word_source(mut self, words: impl WordSource) -> Self {
        self.words = Some(Arc::new(words));
        self
    }

    /// Binds the listener and sets up the room registry.
    pub async fn build(self) -> Result<GraphGuessServer, GraphGuessError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;
        let words = self
            .words
            .unwrap_or_else(|| Arc::new(Vocabulary::default()));
        let registry = RoomRegistry::new(Gateway::new(), self.registry_config, words);

        let state = Arc::new(ServerState {
            registry,
            codec: JsonCodec,
        });
        Ok(GraphGuessServer { listener, state })
    }
}

impl Default for GraphGuessServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound GraphGuess server. Call [`run()`](Self::run) to start accepting
/// connections.
pub struct GraphGuessServer {
    listener: WebSocketListener,
    state: Arc<ServerState>,
}

impl GraphGuessServer {
    pub fn builder() -> GraphGuessServerBuilder {
        GraphGuessServerBuilder::new()
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The server's room registry.
    pub fn registry(&self) -> &RoomRegistry {
        &self.state.registry
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// Each connection is upgraded and handled in its own task.
    pub async fn run(self) -> Result<(), GraphGuessError> {
        tracing::info!(addr = ?self.local_addr().ok(), "GraphGuess server running");

        loop {
            match self.listener.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        match pending.upgrade().await {
                            Ok((conn, ws)) => handle_connection(conn, ws, state).await,
                            Err(e) => tracing::debug!(error = %e, "upgrade failed"),
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
