//! Core runtime configuration.
//!
//! # Invariants
//! - Every field has a default; an empty JSON object is a valid config.
//! - Unknown datum tags are rejected at load time; log levels are checked
//!   when logging starts.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::geodesy::bundle::BundleBuilder;
use crate::logging::default_log_level;
use crate::model::geo::Datum;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    UnsupportedDatum(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::UnsupportedDatum(tag) => {
                write!(f, "unsupported datum `{tag}`; expected ETRS89|WGS84")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::UnsupportedDatum(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// `ETRS89` or `WGS84`.
    pub datum: String,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
    /// In-memory database when absent.
    pub db_path: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            datum: Datum::default().tag().to_string(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: None,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.datum()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn datum(&self) -> Result<Datum, ConfigError> {
        Datum::parse(&self.datum).ok_or_else(|| ConfigError::UnsupportedDatum(self.datum.clone()))
    }

    pub fn bundle_builder(&self) -> Result<BundleBuilder, ConfigError> {
        Ok(BundleBuilder::new(self.datum()?))
    }

    /// Opens the configured database and applies migrations.
    pub fn open_database(&self) -> DbResult<Connection> {
        match &self.db_path {
            Some(path) => open_db(path),
            None => open_db_in_memory(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use crate::model::geo::Datum;

    #[test]
    fn empty_object_uses_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.datum().unwrap(), Datum::Etrs89);
        assert!(config.db_path.is_none());
    }

    #[test]
    fn wgs84_datum_is_accepted() {
        let config = CoreConfig::from_json_str(r#"{"datum":"WGS84","log_level":"warn"}"#).unwrap();
        assert_eq!(config.datum().unwrap(), Datum::Wgs84);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn open_database_migrates_configured_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.db");
        let config = CoreConfig {
            db_path: Some(path.clone()),
            ..CoreConfig::default()
        };
        let conn = config.open_database().unwrap();
        let version: u32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert!(version >= 2);
        assert!(path.exists());
    }

    #[test]
    fn unknown_datum_is_rejected() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"datum":"NAD83"}"#),
            Err(ConfigError::UnsupportedDatum(_))
        ));
    }
}
