//! The config module defines the configuration keys and parses them from TOML.
//!
//! We take care to give detailed errors when an invalid configuration is detected, and we emit
//! warnings when unrecognized keys are found.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::warn;

use crate::captions::{CaptionTable, Noun};
use crate::error::{MuError, MuExpectedError, Result};

const KNOWN_KEYS: &[&str] = &[
    "library_dir",
    "playlist_dir",
    "legacy_encoding",
    "verify_interval_seconds",
    "trash_deleted_files",
    "max_filename_bytes",
    "captions",
];

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the library's own data: the playlist catalog database lives here.
    pub library_dir: PathBuf,
    /// Directory holding the native playlist files.
    pub playlist_dir: PathBuf,
    /// Encoding label used for plain M3U files that are not valid UTF-8.
    pub legacy_encoding: String,
    pub verify_interval_seconds: u64,
    /// Send deleted backing files to the trash instead of unlinking them.
    pub trash_deleted_files: bool,
    pub max_filename_bytes: usize,
    pub captions: CaptionTable,
}

impl Config {
    /// A config with every optional value defaulted.
    pub fn new(library_dir: impl Into<PathBuf>) -> Config {
        let library_dir = library_dir.into();
        Config {
            playlist_dir: library_dir.join("Playlist"),
            library_dir,
            legacy_encoding: "windows-1252".to_string(),
            verify_interval_seconds: 60,
            trash_deleted_files: true,
            max_filename_bytes: 180,
            captions: CaptionTable::default(),
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "mu").map(|d| d.config_dir().join("config.toml"))
    }

    pub fn catalog_database_path(&self) -> PathBuf {
        self.library_dir.join("catalog.sqlite3")
    }

    pub fn legacy_encoding(&self) -> &'static encoding_rs::Encoding {
        encoding_rs::Encoding::for_label(self.legacy_encoding.as_bytes()).unwrap_or(encoding_rs::WINDOWS_1252)
    }

    /// Parse the configuration file at `config_path_override`, or at the default location.
    pub fn parse(config_path_override: Option<&Path>) -> Result<Config> {
        let cfgpath = match config_path_override {
            Some(p) => p.to_path_buf(),
            None => Config::default_config_path().ok_or_else(|| MuError::Generic("Failed to get project directories".to_string()))?,
        };
        let cfgtext = fs::read_to_string(&cfgpath).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MuError::Expected(MuExpectedError::ConfigNotFound { path: cfgpath.clone() }),
            _ => MuError::Io(e),
        })?;
        Config::parse_str(&cfgtext, &cfgpath)
    }

    pub fn parse_str(cfgtext: &str, cfgpath: &Path) -> Result<Config> {
        let data: toml::Table = toml::from_str(cfgtext).map_err(|e| MuExpectedError::ConfigDecode {
            path: cfgpath.to_path_buf(),
            reason: e.to_string(),
        })?;
        let invalid = |key: &str, reason: String| MuExpectedError::InvalidConfigValue {
            key: key.to_string(),
            path: cfgpath.to_path_buf(),
            reason,
        };

        let library_dir = match data.get("library_dir") {
            Some(toml::Value::String(s)) => expand_path(s),
            Some(_) => return Err(invalid("library_dir", "must be a path".to_string()).into()),
            None => return Err(invalid("library_dir", "missing required key".to_string()).into()),
        };
        let mut config = Config::new(library_dir);

        match data.get("playlist_dir") {
            Some(toml::Value::String(s)) => config.playlist_dir = expand_path(s),
            Some(_) => return Err(invalid("playlist_dir", "must be a path".to_string()).into()),
            None => {}
        }

        match data.get("legacy_encoding") {
            Some(toml::Value::String(s)) => {
                if encoding_rs::Encoding::for_label(s.as_bytes()).is_none() {
                    return Err(invalid("legacy_encoding", format!("unknown encoding label {s}")).into());
                }
                config.legacy_encoding = s.clone();
            }
            Some(_) => return Err(invalid("legacy_encoding", "must be a string".to_string()).into()),
            None => {}
        }

        match data.get("verify_interval_seconds") {
            Some(toml::Value::Integer(i)) if *i > 0 => config.verify_interval_seconds = *i as u64,
            Some(v) => return Err(invalid("verify_interval_seconds", format!("must be a positive integer: got {v}")).into()),
            None => {}
        }

        match data.get("max_filename_bytes") {
            Some(toml::Value::Integer(i)) if *i > 0 => config.max_filename_bytes = *i as usize,
            Some(v) => return Err(invalid("max_filename_bytes", format!("must be a positive integer: got {v}")).into()),
            None => {}
        }

        match data.get("trash_deleted_files") {
            Some(toml::Value::Boolean(b)) => config.trash_deleted_files = *b,
            Some(v) => return Err(invalid("trash_deleted_files", format!("must be a bool: got {v}")).into()),
            None => {}
        }

        match data.get("captions") {
            Some(toml::Value::Table(t)) => {
                let mut overrides = HashMap::new();
                for (noun, value) in t {
                    let key = format!("captions.{noun}");
                    let noun = Noun::from_config_key(noun).ok_or_else(|| invalid(&key, "unknown caption noun".to_string()))?;
                    let forms = parse_caption_forms(value).map_err(|reason| invalid(&key, reason))?;
                    overrides.insert(noun, forms);
                }
                config.captions = CaptionTable::with_overrides(overrides);
            }
            Some(_) => return Err(invalid("captions", "must be a table".to_string()).into()),
            None => {}
        }

        for key in data.keys() {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                warn!("unrecognized config key {} in configuration file ({})", key, cfgpath.display());
            }
        }

        Ok(config)
    }
}

fn expand_path(s: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(s).into_owned())
}

fn parse_caption_forms(value: &toml::Value) -> std::result::Result<[String; 3], String> {
    let arr = value.as_array().ok_or_else(|| "must be a list of three strings".to_string())?;
    let strings: Vec<String> = arr
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(|| format!("each form must be a string: got {v}")))
        .collect::<std::result::Result<_, _>>()?;
    <[String; 3]>::try_from(strings).map_err(|v| format!("must have exactly three forms (zero, one, many): got {}", v.len()))
}
