//! Session configuration, loaded from TOML.

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const MAX_BOARD_SIZE: usize = 64;
pub const MAX_PLAYERS: usize = 4;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Side length of the square board.
    pub board_size: usize,
    /// Player display names; ids are assigned in order from 0.
    pub players: Vec<String>,
    /// Publish accepted turns to other clients.
    pub relay: bool,
    /// Number of clients sharing the session in the demo.
    pub clients: usize,
    /// Placements the demo attempts to complete.
    pub moves: usize,
    /// Random attempts per move before the demo gives up.
    pub attempts_per_move: usize,
    pub seed: u64,
    /// Buffered relay frames per client before it falls behind and resyncs.
    pub relay_capacity: usize,
    /// Move the selection to the engine's current player after this client's
    /// own accepted placements.
    pub follow_turns: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            board_size: 20,
            players: (1..=MAX_PLAYERS).map(|i| format!("Player {i}")).collect(),
            relay: true,
            clients: 2,
            moves: 12,
            attempts_per_move: 200,
            seed: 42,
            relay_capacity: 64,
            follow_turns: false,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.board_size == 0 || self.board_size > MAX_BOARD_SIZE {
            return Err(ConfigError::Invalid(format!(
                "board_size must be between 1 and {MAX_BOARD_SIZE}, got {}",
                self.board_size
            )));
        }
        if self.players.is_empty() || self.players.len() > MAX_PLAYERS {
            return Err(ConfigError::Invalid(format!(
                "between 1 and {MAX_PLAYERS} players required, got {}",
                self.players.len()
            )));
        }
        if self.clients == 0 {
            return Err(ConfigError::Invalid("at least one client required".into()));
        }
        if self.relay_capacity == 0 {
            return Err(ConfigError::Invalid("relay_capacity must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse { path: PathBuf, source: toml::de::Error },
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => write!(f, "failed to read {}: {}", path.display(), source),
            ConfigError::Parse { path, source } => write!(f, "failed to parse {}: {}", path.display(), source),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: SessionConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

/// Try well-known paths, falling back to built-in defaults.
pub fn load_default_config() -> SessionConfig {
    let candidates = ["session.toml", "../session.toml"];
    for path in &candidates {
        let p = Path::new(path);
        if p.exists() {
            match load_config(p) {
                Ok(config) => {
                    tracing::info!(path = %p.display(), "loaded session config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = %p.display(), error = %e, "failed to load session config");
                }
            }
        }
    }
    tracing::info!("no session.toml found, using built-in defaults");
    SessionConfig::default()
}
