//! Configuration loading for the rosterctl binary.
//!
//! Sources, highest priority first:
//! 1. command-line flags
//! 2. environment (`PGHOST`, `PGPORT`, `PGUSER`, `PGPASSWORD`, `PGDATABASE`),
//!    including values loaded from `.env` files
//! 3. `--config <path>`, or else `./rosterctl.toml` over `~/.rosterctl/config.toml`
//! 4. built-in defaults

use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::Args;
use rosterctl_core::{ConnectionConfig, IsolationLevel, SessionOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Load `.env` files from the current directory and `~/.rosterctl/.env`.
///
/// Existing environment variables are never overwritten. Runs before
/// tracing is set up, so it returns what it loaded instead of logging.
pub fn load_dotenv() -> Vec<PathBuf> {
    let mut loaded_from = Vec::new();

    if let Ok(path) = dotenvy::dotenv() {
        loaded_from.push(path);
    }

    if let Some(env_file) = config_dir().map(|dir| dir.join(".env")) {
        if env_file.exists() && dotenvy::from_path(&env_file).is_ok() {
            loaded_from.push(env_file);
        }
    }

    loaded_from
}

/// Get the rosterctl config directory path (~/.rosterctl)
pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rosterctl"))
}

/// TOML configuration file contents
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RosterConfig {
    #[serde(default)]
    pub database: ConnectionConfig,

    #[serde(default)]
    pub session: SessionOptions,
}

impl RosterConfig {
    /// Load configuration from `explicit`, or from the default locations.
    ///
    /// An explicit path must exist and parse; default locations are optional
    /// and a broken file there is skipped with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let mut config = RosterConfig::default();
        let candidates = config_dir()
            .map(|dir| dir.join("config.toml"))
            .into_iter()
            .chain(std::iter::once(PathBuf::from("rosterctl.toml")));

        for path in candidates.filter(|p| p.exists()) {
            match Self::from_file(&path) {
                Ok(found) => {
                    debug!("Loaded config from {}", path.display());
                    config = found;
                }
                Err(e) => warn!("Skipping {}: {:#}", path.display(), e),
            }
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Connection flags shared by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Database host
    #[arg(long, env = "PGHOST", global = true)]
    pub host: Option<String>,

    /// Database port
    #[arg(long, env = "PGPORT", global = true)]
    pub port: Option<u16>,

    /// Database user
    #[arg(long, env = "PGUSER", global = true)]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "PGPASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Database name
    #[arg(long, env = "PGDATABASE", global = true)]
    pub database: Option<String>,

    /// Per-statement timeout in seconds
    #[arg(
        long,
        env = "ROSTERCTL_STATEMENT_TIMEOUT",
        global = true,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub statement_timeout: Option<u64>,

    /// Isolation level for writes (read-committed, repeatable-read, serializable)
    #[arg(long, env = "ROSTERCTL_ISOLATION", global = true)]
    pub isolation: Option<IsolationLevel>,
}

impl ConnectionArgs {
    /// Overlay flags and environment on top of the file configuration.
    ///
    /// Fails if the resulting statement timeout is zero.
    pub fn resolve(&self, file: RosterConfig) -> Result<(ConnectionConfig, SessionOptions)> {
        let RosterConfig {
            mut database,
            mut session,
        } = file;

        if let Some(host) = &self.host {
            database.host = host.clone();
        }
        if let Some(port) = self.port {
            database.port = port;
        }
        if let Some(user) = &self.user {
            database.user = user.clone();
        }
        if let Some(password) = &self.password {
            database.password = Some(password.clone());
        }
        if let Some(name) = &self.database {
            database.database = name.clone();
        }
        if let Some(secs) = self.statement_timeout {
            session.statement_timeout_secs = secs;
        }
        if let Some(isolation) = self.isolation {
            session.isolation = isolation;
        }
        ensure!(
            session.statement_timeout_secs > 0,
            "statement_timeout_secs must be at least 1 second"
        );

        Ok((database, session))
    }
}
