//! Configuration resolution for the kips store.
//!
//! The database lives under the per-user config directory (`~/.config/kips/kips.db`)
//! unless overridden. Resolution order for the database path:
//! 1. explicit path (the `--db` flag)
//! 2. `KIPS_DB` environment variable
//! 3. `[database] path` in `~/.config/kips/config.toml`
//! 4. the default location

use crate::core::error::KipsError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = "kips";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "kips.db";
pub const DB_ENV_VAR: &str = "KIPS_DB";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// On-disk `config.toml` layout. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: Option<u64>,
}

/// Where the resolved database path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DbPathSource {
    Flag,
    Env,
    ConfigFile,
    Default,
}

#[derive(Debug, Clone, Serialize)]
pub struct KipsConfig {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub config_file_present: bool,
    pub db_path: PathBuf,
    pub db_path_source: DbPathSource,
    pub busy_timeout_ms: u64,
}

/// `$HOME/.config/kips`, falling back to `%USERPROFILE%` and finally the working directory.
pub fn default_config_dir() -> PathBuf {
    let home = std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    home.join(".config").join(CONFIG_DIR_NAME)
}

pub fn load_config_file(path: &Path) -> Result<Option<ConfigFile>, KipsError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(KipsError::IoError)?;
    let parsed: ConfigFile = toml::from_str(&content)
        .map_err(|e| KipsError::ConfigError(format!("{}: {}", path.display(), e)))?;
    Ok(Some(parsed))
}

impl KipsConfig {
    /// Resolve against the real environment.
    pub fn load(flag_db: Option<PathBuf>) -> Result<Self, KipsError> {
        let env_db = std::env::var_os(DB_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self::resolve(default_config_dir(), flag_db, env_db)
    }

    pub fn resolve(
        config_dir: PathBuf,
        flag_db: Option<PathBuf>,
        env_db: Option<PathBuf>,
    ) -> Result<Self, KipsError> {
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        let file = load_config_file(&config_file)?;
        let config_file_present = file.is_some();
        let section = file.map(|f| f.database).unwrap_or_default();

        let (db_path, db_path_source) = if let Some(p) = flag_db {
            (p, DbPathSource::Flag)
        } else if let Some(p) = env_db {
            (p, DbPathSource::Env)
        } else if let Some(p) = section.path {
            (p, DbPathSource::ConfigFile)
        } else {
            (config_dir.join(DB_FILE_NAME), DbPathSource::Default)
        };

        Ok(Self {
            config_dir,
            config_file,
            config_file_present,
            db_path,
            db_path_source,
            busy_timeout_ms: section.busy_timeout_ms.unwrap_or(DEFAULT_BUSY_TIMEOUT_MS),
        })
    }
}
