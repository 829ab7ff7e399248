// ABOUTME: Configuration loading and validation for the parlor server.
// ABOUTME: Reads PARLOR_* environment variables and derives the database location.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:7331";
pub const DEFAULT_EVENT_BUFFER: usize = 256;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PARLOR_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("PARLOR_EVENT_BUFFER must be a positive integer, got {0:?}")]
    InvalidEventBuffer(String),
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ParlorConfig {
    pub home: PathBuf,
    pub db_path: PathBuf,
    pub bind: SocketAddr,
    pub static_dir: Option<PathBuf>,
    pub event_buffer: usize,
}

impl ParlorConfig {
    /// Load configuration from the process environment.
    ///
    /// Environment variables:
    /// - PARLOR_HOME: data directory (default: ~/.parlor)
    /// - PARLOR_DB: database file (default: $PARLOR_HOME/messages.db)
    /// - PARLOR_BIND: socket address to bind (default: 127.0.0.1:7331)
    /// - PARLOR_STATIC_DIR: directory of static assets served at / (optional)
    /// - PARLOR_EVENT_BUFFER: change events buffered per subscriber (default: 256)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let home = var("PARLOR_HOME").map(PathBuf::from).unwrap_or_else(|| {
            var("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".parlor")
        });

        let db_path = var("PARLOR_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join("messages.db"));

        let bind_str = var("PARLOR_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let static_dir = var("PARLOR_STATIC_DIR").map(PathBuf::from);

        let event_buffer = match var("PARLOR_EVENT_BUFFER") {
            Some(raw) => match raw.parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => return Err(ConfigError::InvalidEventBuffer(raw)),
            },
            None => DEFAULT_EVENT_BUFFER,
        };

        Ok(Self {
            home,
            db_path,
            bind,
            static_dir,
            event_buffer,
        })
    }
}
