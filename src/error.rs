use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MuError {
    #[error("Mu error: {0}")]
    Generic(String),
    #[error(transparent)]
    Expected(#[from] MuExpectedError),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TOML decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error(transparent)]
    Format(#[from] crate::codecs::FormatError),
}

/// Errors that are the caller's fault or an expected condition of the library. These are rendered
/// to the user as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MuExpectedError {
    #[error("{0}")]
    Generic(String),
    #[error("Invalid record: {reason}")]
    InvalidRecord { reason: String },
    #[error("A library rescan is already in progress")]
    RescanInProgress,
    #[error("Playlist {id} does not exist")]
    PlaylistDoesNotExist { id: String },
    #[error("Playlist {name} already exists")]
    PlaylistAlreadyExists { name: String },
    #[error("Configuration file not found ({path})")]
    ConfigNotFound { path: PathBuf },
    #[error("Failed to decode configuration file ({path}): {reason}")]
    ConfigDecode { path: PathBuf, reason: String },
    #[error("Invalid value for {key} in configuration file ({path}): {reason}")]
    InvalidConfigValue { key: String, path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, MuError>;

impl MuError {
    /// Returns the expected error, if this is one. Handy for matching in callers and tests.
    pub fn expected(&self) -> Option<&MuExpectedError> {
        match self {
            MuError::Expected(e) => Some(e),
            _ => None,
        }
    }
}
