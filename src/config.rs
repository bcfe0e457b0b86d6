//! Runtime configuration: defaults, then `.env` and the process environment.

use std::env;
use std::io;
use std::path::PathBuf;

use crate::error::Result;

pub const DEFAULT_DB_PATH: &str = "calendar_database.db";
pub const DB_PATH_VAR: &str = "CALENDAR_DB_PATH";
pub const SEED_FILE_VAR: &str = "CALENDAR_SEED_FILE";

/// Calendar service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    /// Path to the SQLite database file
    pub db_path: PathBuf,
    /// JSON seed data replacing the built-in sample set
    pub seed_file: Option<PathBuf>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            seed_file: None,
        }
    }
}

impl CalendarConfig {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            seed_file: None,
        }
    }

    pub fn with_seed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.seed_file = Some(path.into());
        self
    }

    /// Defaults overridden by `CALENDAR_DB_PATH` / `CALENDAR_SEED_FILE`.
    /// A `.env` file in the working directory is loaded first when present;
    /// one that exists but does not parse is an error.
    pub fn from_env() -> Result<Self> {
        tolerate_missing(dotenvy::dotenv())?;
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup(DB_PATH_VAR).filter(|v| !v.is_empty()) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(SEED_FILE_VAR).filter(|v| !v.is_empty()) {
            config.seed_file = Some(PathBuf::from(path));
        }
        config
    }
}

fn tolerate_missing<T>(loaded: std::result::Result<T, dotenvy::Error>) -> Result<()> {
    match loaded {
        Ok(_) => Ok(()),
        Err(dotenvy::Error::Io(e)) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
