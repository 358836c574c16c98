//! Application state management

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use salas_core::{Config, Database, ReservationEngine, Result};

/// Configuration plus the engine over the opened database
pub struct AppState {
    pub config: Config,
    pub engine: ReservationEngine<Database>,
    db_path: PathBuf,
}

impl AppState {
    /// Load the configuration and open the database.
    ///
    /// An explicit `config_path` must exist; the default location may be absent.
    /// `db_override` wins over the configured database path.
    pub fn new(config_path: Option<&Path>, db_override: Option<PathBuf>) -> Result<Self> {
        let config = match config_path {
            Some(path) => Config::load(path)?,
            None => Config::load_or_default(&Config::default_path()?)?,
        };

        let db_path = match db_override {
            Some(path) => path,
            None => config.resolve_database_path()?,
        };

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        tracing::debug!(path = %db_path.display(), "Database opened");

        Ok(Self {
            engine: ReservationEngine::with_policy(db, config.admission),
            config,
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

/// Command-line session that opens the application state on first use
pub struct Session {
    config_path: Option<PathBuf>,
    db_override: Option<PathBuf>,
    state: OnceCell<AppState>,
}

impl Session {
    pub fn new(config_path: Option<PathBuf>, db_override: Option<PathBuf>) -> Self {
        Self {
            config_path,
            db_override,
            state: OnceCell::new(),
        }
    }

    /// The opened state, loading configuration and database if needed
    pub fn state(&self) -> Result<&AppState> {
        if let Some(state) = self.state.get() {
            return Ok(state);
        }
        let state = AppState::new(self.config_path.as_deref(), self.db_override.clone())?;
        tracing::debug!(db = %state.db_path().display(), "Session opened");
        Ok(self.state.get_or_init(|| state))
    }

    pub fn is_open(&self) -> bool {
        self.state.get().is_some()
    }
}
