//! Environment-driven runtime configuration.
//!
//! # Responsibility
//! - Resolve database path, owner and logging settings for binaries
//!   embedding core, from `LIFETREE_*` variables.
//!
//! # Invariants
//! - Blank values are treated as unset.
//! - Values are not validated here; `open_db`, `init_logging` and the service
//!   report bad values with precise errors.

use crate::logging::default_log_level;
use config::{Config, ConfigError, Environment, Map};
use serde::Deserialize;
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "LIFETREE";
pub const DB_PATH_ENV: &str = "LIFETREE_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "LIFETREE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "LIFETREE_LOG_DIR";
pub const OWNER_ENV: &str = "LIFETREE_OWNER";

const DEFAULT_DB_FILE_NAME: &str = "lifetree.sqlite3";
const DEFAULT_LOG_DIR_NAME: &str = "lifetree-logs";
const DEFAULT_OWNER: &str = "local";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    db_path: Option<String>,
    log_level: Option<String>,
    log_dir: Option<String>,
    owner: Option<String>,
}

/// Resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// SQLite file holding all category trees.
    pub db_path: PathBuf,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
    /// Owner whose trees this process reads and edits.
    pub owner: String,
}

impl CoreConfig {
    /// Reads settings from the process environment.
    ///
    /// Defaults: database and log directory under the system temp dir, level
    /// from [`default_log_level`], owner `local`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::with_prefix(ENV_PREFIX))
    }

    /// Same as [`CoreConfig::from_env`] over an explicit variable set.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let source = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<Map<String, String>>();
        Self::load(Environment::with_prefix(ENV_PREFIX).source(Some(source)))
    }

    fn load(environment: Environment) -> Result<Self, ConfigError> {
        let raw: RawConfig = Config::builder()
            .add_source(environment.ignore_empty(true))
            .build()?
            .try_deserialize()?;

        Ok(Self {
            db_path: present(raw.db_path)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME)),
            log_level: present(raw.log_level).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: present(raw.log_dir)
                .map(PathBuf::from)
                .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME)),
            owner: present(raw.owner).unwrap_or_else(|| DEFAULT_OWNER.to_string()),
        })
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}
