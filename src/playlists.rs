//! The playlists module manages the user's playlists.
//!
//! Each playlist is persisted as a native `.mplst` file in the playlist directory and indexed in
//! the sqlite catalog. A playlist imported from or exported to an external file keeps that file as
//! its backing file; backing files that disappear are reported once, in a batch, until they
//! reappear.
//!
//! Entries reference songs by path. Metadata carried inline by an interchange file is kept only
//! for entries the library does not know; on export, the library's metadata wins.

use std::collections::{HashMap, HashSet};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use rusqlite::Connection;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::captions::{CaptionTable, Noun};
use crate::catalog::{self, PlaylistSummary};
use crate::codec_native::{decode_native, encode_native, NativeHeader};
use crate::codecs::{CodecRegistry, DecodeWarning, FormatError, PlaylistDocument, PlaylistFormat, TrackRef};
use crate::common::{fold, normalize_path, sanitize_filename};
use crate::config::Config;
use crate::error::{MuError, MuExpectedError, Result};
use crate::library::Library;
use crate::songs::SongRecord;

const NATIVE_EXTENSION: &str = "mplst";
pub const DEFAULT_PLAYLIST_NAME: &str = "New Playlist";
pub const BROKEN_PLAYLIST_DETAIL: &str = "Those playlists may be moved, deleted or renamed.";
const DELETE_FAILURE_MESSAGE: &str = "Failed to delete the playlist file: \n%1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub entries: Vec<TrackRef>,
    pub source_path: Option<PathBuf>,
    pub source_format: PlaylistFormat,
    pub backing_path: Option<PathBuf>,
    pub native_path: PathBuf,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Playlist {
    fn header(&self) -> NativeHeader {
        NativeHeader {
            id: self.id,
            created_at: self.created_at,
            modified_at: self.modified_at,
            source: self.source_path.clone(),
            source_format: self.source_format,
            backing_path: self.backing_path.clone(),
        }
    }

    fn document(&self) -> PlaylistDocument {
        PlaylistDocument {
            name: self.name.clone(),
            tracks: self.entries.clone(),
        }
    }

    fn summary(&self, broken: bool) -> PlaylistSummary {
        PlaylistSummary {
            id: self.id,
            name: self.name.clone(),
            native_path: self.native_path.clone(),
            source_path: self.source_path.clone(),
            source_format: self.source_format,
            backing_path: self.backing_path.clone(),
            track_count: self.entries.len(),
            created_at: self.created_at,
            modified_at: self.modified_at,
            broken,
        }
    }
}

/// A playlist entry joined with the library record for its path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub position: usize,
    pub entry: TrackRef,
    pub record: Option<Arc<SongRecord>>,
}

impl ResolvedEntry {
    /// The entry refers to a path the library does not have.
    pub fn is_broken(&self) -> bool {
        self.record.is_none()
    }

    pub fn title(&self) -> String {
        match (&self.record, &self.entry.title) {
            (Some(record), _) => record.display_title(),
            (None, Some(title)) => title.clone(),
            (None, None) => self.entry.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default(),
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        match &self.record {
            Some(record) => Some(record.duration_ms),
            None => self.entry.duration_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportReport {
    pub playlist: PlaylistSummary,
    pub format: PlaylistFormat,
    pub added: usize,
    pub warnings: Vec<DecodeWarning>,
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Playlist file {0} does not exist")]
    NotFound(PathBuf),
    #[error("Failed to read playlist file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Playlist file {0} is not in a supported format")]
    UnsupportedFormat(PathBuf),
    #[error("Failed to import playlist file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error("Failed to save playlist imported from {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: MuError,
    },
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Playlist {0} does not exist")]
    PlaylistDoesNotExist(Uuid),
    #[error("Failed to write playlist file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to export playlist to {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },
    #[error("Failed to save playlist exported to {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: MuError,
    },
}

/// Playlists whose backing file went missing since the last check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrokenPlaylistReport {
    pub playlists: Vec<PlaylistSummary>,
}

impl BrokenPlaylistReport {
    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    /// e.g. "2 playlists cannot be loaded."
    pub fn caption(&self, captions: &CaptionTable) -> String {
        captions.count(Noun::BrokenPlaylist, self.len() as u64)
    }

    pub fn detail(&self) -> &'static str {
        BROKEN_PLAYLIST_DETAIL
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub playlist: PlaylistSummary,
    pub removed_backing_file: Option<PathBuf>,
    /// Set when the backing file exists but could not be removed. The playlist itself is gone
    /// either way.
    pub backing_file_error: Option<String>,
}

struct ManagerState {
    conn: Connection,
    playlists: HashMap<Uuid, Playlist>,
    /// Playlists whose backing file was missing at the last check. Persisted in the catalog.
    broken: HashSet<Uuid>,
    /// Playlists whose missing backing file has been reported since the manager was opened.
    reported: HashSet<Uuid>,
}

impl ManagerState {
    fn get(&self, id: Uuid) -> Result<&Playlist> {
        self.playlists
            .get(&id)
            .ok_or_else(|| MuExpectedError::PlaylistDoesNotExist { id: id.to_string() }.into())
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        let folded = fold(name);
        self.playlists.values().any(|p| Some(p.id) != except && fold(&p.name) == folded)
    }

    /// `base` if no playlist has that name yet, otherwise `base 2`, `base 3`, ...
    fn unique_name(&self, base: &str) -> String {
        if !self.name_taken(base, None) {
            return base.to_string();
        }
        (2..)
            .map(|i| format!("{base} {i}"))
            .find(|candidate| !self.name_taken(candidate, None))
            .unwrap_or_else(|| base.to_string())
    }

    fn save(&mut self, playlist: Playlist) -> Result<PlaylistSummary> {
        let bytes = encode_native(Some(&playlist.header()), &playlist.document())?;
        fs::write(&playlist.native_path, bytes)?;
        let summary = playlist.summary(self.broken.contains(&playlist.id));
        catalog::upsert_summary(&self.conn, &summary)?;
        debug!("saved playlist {} to {}", playlist.name, playlist.native_path.display());
        self.playlists.insert(playlist.id, playlist);
        Ok(summary)
    }
}

pub struct PlaylistManager {
    config: Config,
    library: Arc<Library>,
    codecs: CodecRegistry,
    state: Mutex<ManagerState>,
}

impl PlaylistManager {
    /// Load every native playlist file and bring the catalog in line with them: rows are added for
    /// new files and evicted for files that no longer exist.
    pub fn open(config: Config, library: Arc<Library>) -> Result<PlaylistManager> {
        fs::create_dir_all(&config.library_dir)?;
        fs::create_dir_all(&config.playlist_dir)?;
        catalog::maybe_invalidate_catalog_database(&config)?;
        let mut conn = catalog::connect(&config)?;

        let known: HashMap<Uuid, PlaylistSummary> =
            catalog::list_summaries(&conn)?.into_iter().map(|s| (s.id, s)).collect();
        let mut playlists: HashMap<Uuid, Playlist> = HashMap::new();
        let mut adopted = Vec::new();
        for entry in fs::read_dir(&config.playlist_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(NATIVE_EXTENSION) {
                continue;
            }
            match load_native_file(&path) {
                Ok(Some(playlist)) if !playlists.contains_key(&playlist.id) => {
                    playlists.insert(playlist.id, playlist);
                }
                // Files without a header, or copies of another playlist's file, get a fresh id.
                Ok(_) => adopted.push(path),
                Err(e) => warn!("skipping unreadable playlist file {}: {}", path.display(), e),
            }
        }

        let mut broken = HashSet::new();
        let tx = conn.transaction()?;
        for playlist in playlists.values() {
            let was_broken = known.get(&playlist.id).is_some_and(|s| s.broken);
            if was_broken {
                broken.insert(playlist.id);
            }
            catalog::upsert_summary(&tx, &playlist.summary(was_broken))?;
        }
        for (id, summary) in &known {
            if !playlists.contains_key(id) {
                info!("evicting playlist {} from catalog: {} no longer exists", summary.name, summary.native_path.display());
                catalog::delete_summary(&tx, *id)?;
            }
        }
        tx.commit()?;

        let manager = PlaylistManager {
            codecs: CodecRegistry::new(config.legacy_encoding()),
            config,
            library,
            state: Mutex::new(ManagerState {
                conn,
                playlists,
                broken,
                reported: HashSet::new(),
            }),
        };
        for path in adopted {
            if let Err(e) = manager.adopt_native_file(&path) {
                warn!("skipping playlist file {}: {}", path.display(), e);
            }
        }
        info!("loaded {} playlists", manager.state.lock().playlists.len());
        Ok(manager)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    fn adopt_native_file(&self, path: &Path) -> Result<()> {
        let bytes = fs::read(path)?;
        let (_, decoded) = decode_native(&bytes, &self.config.playlist_dir)?;
        let mut state = self.state.lock();
        let now = Utc::now();
        let id = Uuid::now_v7();
        let name = state.unique_name(decoded.name.as_deref().unwrap_or(DEFAULT_PLAYLIST_NAME));
        let playlist = Playlist {
            id,
            name,
            entries: decoded.tracks,
            source_path: None,
            source_format: PlaylistFormat::Native,
            backing_path: None,
            native_path: self.native_path(id),
            created_at: now,
            modified_at: now,
        };
        state.save(playlist)?;
        fs::remove_file(path)?;
        info!("adopted playlist file {} as {}", path.display(), id);
        Ok(())
    }

    fn native_path(&self, id: Uuid) -> PathBuf {
        self.config.playlist_dir.join(format!("{id}.{NATIVE_EXTENSION}"))
    }

    /// Every playlist as recorded in the catalog.
    pub fn list_playlists(&self) -> Result<Vec<PlaylistSummary>> {
        let state = self.state.lock();
        catalog::list_summaries(&state.conn)
    }

    pub fn get_playlist(&self, id: Uuid) -> Option<Playlist> {
        self.state.lock().playlists.get(&id).cloned()
    }

    /// The catalog row of one playlist.
    pub fn playlist_summary(&self, id: Uuid) -> Result<PlaylistSummary> {
        let state = self.state.lock();
        catalog::get_summary(&state.conn, id)?
            .ok_or_else(|| MuExpectedError::PlaylistDoesNotExist { id: id.to_string() }.into())
    }

    /// Create an empty playlist. Without a name, the first free "New Playlist", "New Playlist 2",
    /// ... is used.
    pub fn create_playlist(&self, name: Option<&str>) -> Result<PlaylistSummary> {
        let mut state = self.state.lock();
        let name = match name.map(str::trim) {
            Some("") => return Err(MuExpectedError::Generic("Playlist name must not be empty".to_string()).into()),
            Some(name) if state.name_taken(name, None) => {
                return Err(MuExpectedError::PlaylistAlreadyExists { name: name.to_string() }.into())
            }
            Some(name) => name.to_string(),
            None => state.unique_name(DEFAULT_PLAYLIST_NAME),
        };
        let now = Utc::now();
        let id = Uuid::now_v7();
        let summary = state.save(Playlist {
            id,
            name,
            entries: Vec::new(),
            source_path: None,
            source_format: PlaylistFormat::Native,
            backing_path: None,
            native_path: self.native_path(id),
            created_at: now,
            modified_at: now,
        })?;
        info!("created playlist {}", summary.name);
        Ok(summary)
    }

    pub fn rename_playlist(&self, id: Uuid, new_name: &str) -> Result<PlaylistSummary> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(MuExpectedError::Generic("Playlist name must not be empty".to_string()).into());
        }
        let mut state = self.state.lock();
        let mut playlist = state.get(id)?.clone();
        if state.name_taken(new_name, Some(id)) {
            return Err(MuExpectedError::PlaylistAlreadyExists {
                name: new_name.to_string(),
            }
            .into());
        }
        info!("renamed playlist {} to {}", playlist.name, new_name);
        playlist.name = new_name.to_string();
        playlist.modified_at = Utc::now();
        state.save(playlist)
    }

    /// Duplicate a playlist under the next free variant of its name. The copy has no backing file.
    pub fn copy_playlist(&self, id: Uuid) -> Result<PlaylistSummary> {
        let mut state = self.state.lock();
        let original = state.get(id)?.clone();
        let now = Utc::now();
        let copy_id = Uuid::now_v7();
        let copy = Playlist {
            id: copy_id,
            name: state.unique_name(&original.name),
            entries: original.entries,
            source_path: original.source_path,
            source_format: original.source_format,
            backing_path: None,
            native_path: self.native_path(copy_id),
            created_at: now,
            modified_at: now,
        };
        let summary = state.save(copy)?;
        info!("copied playlist {} to {}", original.name, summary.name);
        Ok(summary)
    }

    fn modify<T>(&self, id: Uuid, f: impl FnOnce(&mut Playlist) -> Result<T>) -> Result<T> {
        let mut state = self.state.lock();
        let mut playlist = state.get(id)?.clone();
        let out = f(&mut playlist)?;
        playlist.modified_at = Utc::now();
        state.save(playlist)?;
        Ok(out)
    }

    /// Append songs by path. Returns the number of entries added.
    pub fn add_tracks(&self, id: Uuid, paths: &[PathBuf]) -> Result<usize> {
        self.modify(id, |playlist| {
            for path in paths {
                playlist.entries.push(TrackRef::new(normalize_path(path)));
            }
            info!("added {} tracks to playlist {}", paths.len(), playlist.name);
            Ok(paths.len())
        })
    }

    /// Remove the entries at `positions`. Out of range positions are ignored. Returns the number
    /// of entries removed.
    pub fn remove_tracks(&self, id: Uuid, positions: &[usize]) -> Result<usize> {
        self.modify(id, |playlist| {
            let mut positions: Vec<usize> = positions.iter().copied().filter(|p| *p < playlist.entries.len()).collect();
            positions.sort_unstable();
            positions.dedup();
            for position in positions.iter().rev() {
                playlist.entries.remove(*position);
            }
            info!("removed {} tracks from playlist {}", positions.len(), playlist.name);
            Ok(positions.len())
        })
    }

    pub fn move_track(&self, id: Uuid, from: usize, to: usize) -> Result<()> {
        self.modify(id, |playlist| {
            let len = playlist.entries.len();
            if from >= len || to >= len {
                return Err(MuExpectedError::Generic(format!(
                    "Cannot move track {from} to {to} in playlist {}: it has {len} tracks",
                    playlist.name
                ))
                .into());
            }
            let entry = playlist.entries.remove(from);
            playlist.entries.insert(to, entry);
            debug!("moved track {} to {} in playlist {}", from, to, playlist.name);
            Ok(())
        })
    }

    /// Join every entry with the library's record for its path.
    pub fn resolve_entries(&self, id: Uuid) -> Result<Vec<ResolvedEntry>> {
        let entries = self.state.lock().get(id)?.entries.clone();
        let snapshot = self.library.snapshot();
        Ok(entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| ResolvedEntry {
                position,
                record: snapshot.get(&entry.path),
                entry,
            })
            .collect())
    }

    /// e.g. "3 songs, 1 hour and 1 minute."
    pub fn summary_caption(&self, id: Uuid) -> Result<String> {
        let entries = self.resolve_entries(id)?;
        let total_ms: u64 = entries.iter().filter_map(|e| e.duration_ms()).sum();
        Ok(self.config.captions.playlist_summary(entries.len() as u64, total_ms / 1000))
    }

    /// Decode a playlist file in any supported format into a new playlist. The file becomes the
    /// playlist's backing file.
    pub fn import_file(&self, path: &Path) -> std::result::Result<ImportReport, ImportError> {
        let path = absolute(path).map_err(|source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bytes = fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ImportError::NotFound(path.clone()),
            _ => ImportError::Io {
                path: path.clone(),
                source: e,
            },
        })?;
        let codec = self
            .codecs
            .resolve(&path, &bytes)
            .ok_or_else(|| ImportError::UnsupportedFormat(path.clone()))?;
        let base_dir = path.parent().unwrap_or(Path::new("/"));
        let decoded = codec.decode(&bytes, base_dir).map_err(|source| ImportError::Format {
            path: path.clone(),
            source,
        })?;

        let name = decoded
            .name
            .clone()
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLAYLIST_NAME.to_string());
        let snapshot = self.library.snapshot();
        let entries: Vec<TrackRef> = decoded
            .tracks
            .into_iter()
            .map(|t| if snapshot.contains(&t.path) { TrackRef::new(t.path) } else { t })
            .collect();
        let added = entries.len();

        let mut state = self.state.lock();
        let now = Utc::now();
        let id = Uuid::now_v7();
        let playlist = Playlist {
            id,
            name: state.unique_name(name.trim()),
            entries,
            source_path: Some(path.clone()),
            source_format: codec.format(),
            backing_path: Some(path.clone()),
            native_path: self.native_path(id),
            created_at: now,
            modified_at: now,
        };
        let summary = state.save(playlist).map_err(|source| ImportError::Catalog {
            path: path.clone(),
            source,
        })?;
        info!(
            "imported playlist {} from {} ({}): {} tracks, {} skipped",
            summary.name,
            path.display(),
            codec.format(),
            added,
            decoded.warnings.len()
        );
        Ok(ImportReport {
            playlist: summary,
            format: codec.format(),
            added,
            warnings: decoded.warnings,
        })
    }

    /// Write a playlist to `path` in `format` and make that file its backing file. The playlist is
    /// locked for the whole export, so concurrent edits land either before or after it.
    pub fn export_file(&self, id: Uuid, path: &Path, format: PlaylistFormat) -> std::result::Result<(), ExportError> {
        let path = absolute(path).map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut playlist = state.playlists.get(&id).cloned().ok_or(ExportError::PlaylistDoesNotExist(id))?;

        let document = self.export_document(&playlist);
        let bytes = self.codecs.for_kind(format).encode(&document).map_err(|source| ExportError::Format {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        playlist.backing_path = Some(path.clone());
        playlist.modified_at = Utc::now();
        state.broken.remove(&id);
        state.reported.remove(&id);
        let summary = state.save(playlist).map_err(|source| ExportError::Catalog {
            path: path.clone(),
            source,
        })?;
        info!("exported playlist {} to {} ({})", summary.name, path.display(), format);
        Ok(())
    }

    /// A suggested export file name for a playlist, e.g. "Road Trip.m3u8".
    pub fn export_file_name(&self, id: Uuid, format: PlaylistFormat) -> Result<String> {
        let state = self.state.lock();
        let name = format!("{}.{}", state.get(id)?.name, format.extension());
        Ok(sanitize_filename(&name, self.config.max_filename_bytes))
    }

    fn export_document(&self, playlist: &Playlist) -> PlaylistDocument {
        let snapshot = self.library.snapshot();
        let tracks = playlist
            .entries
            .iter()
            .map(|entry| match snapshot.get(&entry.path) {
                Some(record) => TrackRef {
                    path: entry.path.clone(),
                    title: Some(record.display_title()),
                    artist: Some(record.artist.trim().to_string()).filter(|a| !a.is_empty()),
                    duration_ms: Some(record.duration_ms).filter(|d| *d > 0),
                },
                None => entry.clone(),
            })
            .collect();
        PlaylistDocument {
            name: playlist.name.clone(),
            tracks,
        }
    }

    /// Check every backing file. Playlists with a missing file are returned in one batch, once per
    /// manager: they are not reported again until their file reappears and goes missing anew. The
    /// first check after opening reports every missing file, including ones flagged in an earlier
    /// session.
    pub fn verify_backing_files(&self) -> Result<BrokenPlaylistReport> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let mut newly_broken = Vec::new();
        let mut recovered = Vec::new();
        for playlist in state.playlists.values() {
            let Some(backing) = &playlist.backing_path else {
                continue;
            };
            let missing = !backing.exists();
            if missing && !state.reported.contains(&playlist.id) {
                newly_broken.push(playlist.id);
            } else if !missing && (state.broken.contains(&playlist.id) || state.reported.contains(&playlist.id)) {
                recovered.push(playlist.id);
            }
        }

        for id in recovered {
            state.broken.remove(&id);
            state.reported.remove(&id);
            catalog::set_broken(&state.conn, id, false)?;
            debug!("backing file of playlist {} is back", id);
        }
        let mut report = BrokenPlaylistReport::default();
        for id in newly_broken {
            state.reported.insert(id);
            if state.broken.insert(id) {
                catalog::set_broken(&state.conn, id, true)?;
            }
            if let Some(playlist) = state.playlists.get(&id) {
                report.playlists.push(playlist.summary(true));
            }
        }
        report.playlists.sort_by(|a, b| fold(&a.name).cmp(&fold(&b.name)));
        if !report.is_empty() {
            let names: Vec<&str> = report.playlists.iter().map(|p| p.name.as_str()).collect();
            warn!("backing files missing for playlists: {}", names.join(", "));
        }
        Ok(report)
    }

    /// Delete a playlist, its native file and its backing file. Failing to remove the backing file
    /// is reported in the outcome rather than failing the delete.
    pub fn delete_playlist(&self, id: Uuid) -> Result<DeleteOutcome> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let playlist = state.get(id)?.clone();
        match fs::remove_file(&playlist.native_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        catalog::delete_summary(&state.conn, id)?;
        state.playlists.remove(&id);
        let broken = state.broken.remove(&id);
        state.reported.remove(&id);

        let mut outcome = DeleteOutcome {
            playlist: playlist.summary(broken),
            removed_backing_file: None,
            backing_file_error: None,
        };
        if let Some(backing) = playlist.backing_path.as_ref().filter(|p| p.exists()) {
            match self.remove_backing_file(backing) {
                Ok(()) => outcome.removed_backing_file = Some(backing.clone()),
                Err(e) => {
                    warn!("failed to delete backing file {} of playlist {}: {}", backing.display(), playlist.name, e);
                    outcome.backing_file_error = Some(DELETE_FAILURE_MESSAGE.replace("%1", &backing.to_string_lossy()));
                }
            }
        }
        info!("deleted playlist {}", playlist.name);
        Ok(outcome)
    }

    fn remove_backing_file(&self, path: &Path) -> std::result::Result<(), String> {
        if self.config.trash_deleted_files {
            trash::delete(path).map_err(|e| e.to_string())
        } else {
            fs::remove_file(path).map_err(|e| e.to_string())
        }
    }

    /// Verify backing files on a background thread, once right away and then every `interval`, and
    /// deliver non-empty reports. The thread stops when the watcher is dropped or the manager goes
    /// away.
    pub fn spawn_backing_file_watcher(self: &Arc<Self>, interval: Duration) -> BackingFileWatcher {
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (report_tx, report_rx) = unbounded();
        let manager: Weak<PlaylistManager> = Arc::downgrade(self);
        let handle = thread::spawn(move || loop {
            let Some(manager) = manager.upgrade() else {
                break;
            };
            match manager.verify_backing_files() {
                Ok(report) if !report.is_empty() => {
                    if report_tx.send(report).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("failed to verify playlist backing files: {}", e),
            }
            // Only the weak reference is held between checks.
            drop(manager);
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        BackingFileWatcher {
            reports: report_rx,
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// A watcher polling at the configured `verify_interval_seconds`.
    pub fn spawn_default_backing_file_watcher(self: &Arc<Self>) -> BackingFileWatcher {
        self.spawn_backing_file_watcher(Duration::from_secs(self.config.verify_interval_seconds))
    }
}

pub struct BackingFileWatcher {
    reports: Receiver<BrokenPlaylistReport>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackingFileWatcher {
    pub fn reports(&self) -> &Receiver<BrokenPlaylistReport> {
        &self.reports
    }
}

impl Drop for BackingFileWatcher {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Read a native playlist file. Returns `None` for a file without a header.
fn load_native_file(path: &Path) -> Result<Option<Playlist>> {
    let bytes = fs::read(path)?;
    let base_dir = path.parent().unwrap_or(Path::new("/"));
    let (header, decoded) = decode_native(&bytes, base_dir)?;
    let Some(header) = header else {
        return Ok(None);
    };
    if !decoded.warnings.is_empty() {
        warn!("playlist file {} has {} unreadable entries", path.display(), decoded.warnings.len());
    }
    Ok(Some(Playlist {
        id: header.id,
        name: decoded.name.unwrap_or_else(|| DEFAULT_PLAYLIST_NAME.to_string()),
        entries: decoded.tracks,
        source_path: header.source,
        source_format: header.source_format,
        backing_path: header.backing_path,
        native_path: path.to_path_buf(),
        created_at: header.created_at,
        modified_at: header.modified_at,
    }))
}

fn absolute(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize_path(path))
    } else {
        Ok(normalize_path(&env::current_dir()?.join(path)))
    }
}
