//! The common module is our grab bag of small shared toys: the fallback sentinels, path and string
//! normalization, and logging setup.

use std::collections::HashSet;
use std::fs;
use std::hash::Hash;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use directories::ProjectDirs;
use regex::Regex;
use tracing_subscriber::{fmt, EnvFilter};
use unicode_normalization::UnicodeNormalization;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const NO_ARTIST: &str = "No Artist";
pub const NO_ALBUM: &str = "No Album";
pub const NO_GENRE: &str = "No Genre";
pub const VARIOUS_ARTISTS: &str = "Various Artists";

/// Whether a grouping key is one of the fallback sentinels. Sentinels sort after real keys.
/// "Various Artists" is only ever an album's display artist, never a grouping key.
pub fn is_sentinel(key: &str) -> bool {
    matches!(key, NO_ARTIST | NO_ALBUM | NO_GENRE)
}

pub fn uniq<T: Clone + Eq + Hash>(xs: Vec<T>) -> Vec<T> {
    let mut rv = Vec::new();
    let mut seen = HashSet::new();
    for x in xs {
        if seen.insert(x.clone()) {
            rv.push(x);
        }
    }
    rv
}

/// Returns `value` trimmed, or `fallback` when nothing is left.
pub fn or_fallback<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback
    } else {
        trimmed
    }
}

/// Lexically normalize a path: drop `.` components and resolve `..` against the preceding
/// component. The filesystem is never consulted, so this works for files that no longer exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component.as_os_str());
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Case and compatibility folding used for all case-insensitive comparisons (search, sorting).
pub fn fold(s: &str) -> String {
    s.nfkc().collect::<String>().to_lowercase()
}

static ILLEGAL_FS_CHARS_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_illegal_fs_chars_regex() -> &'static Regex {
    ILLEGAL_FS_CHARS_REGEX.get_or_init(|| Regex::new(r#"[:\?<>\\\*\|"/]+"#).unwrap())
}

/// Replace characters that are illegal on common filesystems and cap the stem length, keeping the
/// extension intact.
pub fn sanitize_filename(name: &str, max_filename_bytes: usize) -> String {
    let name = get_illegal_fs_chars_regex().replace_all(name.trim(), "_").to_string();
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 && name.len() - pos <= 6 => name.split_at(pos),
        _ => (name.as_str(), ""),
    };
    let mut end = stem.len().min(max_filename_bytes);
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    let stem = stem[..end].trim();
    format!("{stem}{ext}").nfc().collect()
}

static LOGGING_INITIALIZED: Mutex<Option<HashSet<Option<String>>>> = Mutex::new(None);

/// Install the global tracing subscriber. `output` is either `"stderr"` or `"file"`; file logs go to
/// `mu.log` in the project state directory. Calling this twice for the same logger is a no-op.
pub fn initialize_logging(logger_name: Option<&str>, output: &str) -> crate::Result<()> {
    {
        let mut initialized = LOGGING_INITIALIZED.lock().map_err(|e| crate::MuError::Generic(e.to_string()))?;
        let set = initialized.get_or_insert_with(HashSet::new);
        if !set.insert(logger_name.map(str::to_string)) {
            return Ok(());
        }
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match output {
        "stderr" => {
            let subscriber = fmt::Subscriber::builder().with_env_filter(env_filter).with_target(true).finish();
            tracing::subscriber::set_global_default(subscriber).map_err(|e| crate::MuError::Generic(e.to_string()))?;
        }
        "file" => {
            let proj_dirs = ProjectDirs::from("", "", "mu").ok_or_else(|| crate::MuError::Generic("Failed to get project directories".to_string()))?;
            let log_dir = proj_dirs.state_dir().unwrap_or(proj_dirs.cache_dir()).to_path_buf();
            fs::create_dir_all(&log_dir)?;
            let file_appender = tracing_appender::rolling::never(&log_dir, "mu.log");
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(env_filter)
                .with_writer(file_appender)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .finish();
            tracing::subscriber::set_global_default(subscriber).map_err(|e| crate::MuError::Generic(e.to_string()))?;
        }
        other => return Err(crate::MuError::Generic(format!("Unknown log output {other}: must be one of stderr, file"))),
    }
    Ok(())
}
