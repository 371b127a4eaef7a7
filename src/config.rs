use std::path::PathBuf;

use crate::errors::{Result, TagError};

pub const DATABASE_ENV: &str = "SITTAGGER_DATABASE";

const APP_DIR: &str = "sit-tagger";
const DB_FILE: &str = "files.sqlite";
const LEGACY_DB_FILE: &str = "sit-tagger.sqlite";

/// Inputs deciding where the tag database lives.
#[derive(Debug, Clone, Default)]
pub struct DbLocation {
    /// Path given on the command line.
    pub explicit: Option<PathBuf>,
    /// Value of `SITTAGGER_DATABASE`.
    pub env: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub config_dir: Option<PathBuf>,
}

impl DbLocation {
    pub fn from_env(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            env: std::env::var_os(DATABASE_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
            data_dir: dirs::data_dir(),
            config_dir: dirs::config_dir(),
        }
    }

    pub fn data_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(APP_DIR).join(DB_FILE))
    }

    /// Where versions that kept the database in the config directory put it.
    pub fn legacy_path(&self) -> Option<PathBuf> {
        self.config_dir.as_ref().map(|dir| dir.join(LEGACY_DB_FILE))
    }

    /// Picks the database file: an explicit path, then the environment,
    /// then whichever of the data and legacy files already exists. A fresh
    /// setup gets the data path; opening it creates the parent directory.
    pub fn resolve(&self) -> Result<PathBuf> {
        if let Some(path) = self.explicit.as_ref().or(self.env.as_ref()) {
            return Ok(path.clone());
        }

        let data = self.data_path();
        if let Some(path) = data.as_ref().filter(|p| p.exists()) {
            return Ok(path.clone());
        }
        if let Some(path) = self.legacy_path().filter(|p| p.exists()) {
            return Ok(path);
        }
        data.ok_or_else(|| TagError::NotFound("no data directory for the tag database".into()))
    }
}
