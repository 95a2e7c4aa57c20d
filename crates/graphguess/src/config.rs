//! Environment-based server configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use graphguess_room::{DEFAULT_MAX_USERS, RegistryConfig, RoomError, RoundConfig, Vocabulary};

/// Server settings, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Default `EnvFilter` directive; `RUST_LOG` overrides it.
    pub log_level: String,
    pub round: RoundConfig,
    pub default_max_users: usize,
    /// Custom vocabulary. `None` means the built-in word list.
    pub words: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            round: RoundConfig::default(),
            default_max_users: DEFAULT_MAX_USERS,
            words: None,
        }
    }
}

impl ServerConfig {
    /// Loads `.env`, then reads the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup. Missing or unparsable values
    /// fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let round = RoundConfig {
            round_duration: parse_var::<u64>(&lookup, "ROUND_DURATION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.round.round_duration),
            intermission: parse_var::<u64>(&lookup, "INTERMISSION_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.round.intermission),
            loop_sets: lookup("LOOP_SETS")
                .map(|v| v.trim() == "true")
                .unwrap_or(defaults.round.loop_sets),
            ..defaults.round
        }
        .validated();

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            round,
            default_max_users: parse_var::<usize>(&lookup, "DEFAULT_MAX_USERS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.default_max_users),
            words: lookup("WORDS").map(|v| v.split(',').map(|w| w.trim().to_string()).collect()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Registry settings for a server built from this config.
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            round: self.round.clone().validated(),
            default_max_users: self.default_max_users.max(1),
            ..RegistryConfig::default()
        }
    }

    /// # Errors
    /// Returns [`RoomError::EmptyVocabulary`] if `WORDS` held no usable word.
    pub fn vocabulary(&self) -> Result<Vocabulary, RoomError> {
        match &self.words {
            Some(words) => Vocabulary::new(words.iter().cloned()),
            None => Ok(Vocabulary::default()),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}
