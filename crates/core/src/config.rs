//! Configuration loaded from `salas.toml`
//!
//! Every field has a default, so an empty or missing file is a valid
//! configuration.

use std::path::{Path, PathBuf};

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Name of the configuration file inside the platform config directory
pub const CONFIG_FILE: &str = "salas.toml";

/// Name of the database file inside the platform data directory
pub const DATABASE_FILE: &str = "salas.db";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database location; the platform data directory when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default)]
    pub admission: AdmissionPolicy,
}

/// Rules applied when admitting reservations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdmissionPolicy {
    /// Reject reservations that overlap another active reservation on the same room
    pub enforce_room_exclusivity: bool,
    /// Window length used when a request gives no end time
    pub default_duration_minutes: u32,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            enforce_room_exclusivity: true,
            default_duration_minutes: 120,
        }
    }
}

impl AdmissionPolicy {
    pub fn default_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.default_duration_minutes))
    }

    /// Only the identity rule, no same-room overlap check
    pub fn identity_only() -> Self {
        Self {
            enforce_room_exclusivity: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.default_duration_minutes == 0 {
            return Err(Error::Config(
                "admission.default_duration_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::Config(e.message().to_string()))?;
        config.admission.validate()?;
        Ok(config)
    }

    /// Load configuration from a file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "Loaded configuration");
        Self::from_toml_str(&content)
    }

    /// Load configuration from `path`, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No configuration file, using defaults");
            Ok(Self::default())
        }
    }

    /// Default configuration file location
    pub fn default_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join(CONFIG_FILE))
    }

    /// Database path from the configuration, or the platform default
    pub fn resolve_database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(project_dirs()?.data_dir().join(DATABASE_FILE)),
        }
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("cl", "salas", "salas").ok_or_else(|| {
        Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not determine data directory",
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.admission.enforce_room_exclusivity);
        assert_eq!(config.admission.default_duration(), Duration::hours(2));
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml_str(
            r#"
            database_path = "/var/lib/salas/salas.db"

            [admission]
            enforce_room_exclusivity = false
            default_duration_minutes = 90
            "#,
        )
        .unwrap();

        assert_eq!(
            config.database_path.as_deref(),
            Some(Path::new("/var/lib/salas/salas.db"))
        );
        assert!(!config.admission.enforce_room_exclusivity);
        assert_eq!(config.admission.default_duration(), Duration::minutes(90));
        assert_eq!(
            config.resolve_database_path().unwrap(),
            PathBuf::from("/var/lib/salas/salas.db")
        );
    }

    #[test]
    fn test_partial_admission_section() {
        let config = Config::from_toml_str("[admission]\ndefault_duration_minutes = 30").unwrap();
        assert!(config.admission.enforce_room_exclusivity);
        assert_eq!(config.admission.default_duration_minutes, 30);
    }

    #[test]
    fn test_rejects_zero_duration() {
        let err = Config::from_toml_str("[admission]\ndefault_duration_minutes = 0").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(matches!(
            Config::from_toml_str("max_rooms = 3"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        assert_eq!(Config::load_or_default(&path).unwrap(), Config::default());

        std::fs::write(&path, "[admission]\nenforce_room_exclusivity = false\n").unwrap();
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config.admission, AdmissionPolicy::identity_only());
    }
}
