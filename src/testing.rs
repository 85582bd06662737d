use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use tempfile::TempDir;

use crate::config::Config;
use crate::library::Library;
use crate::songs::SongRecord;

static INIT: Once = Once::new();

pub fn init() -> TempDir {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")))
            .with_test_writer()
            .try_init();
    });
    TempDir::new().expect("failed to create temp dir")
}

// Creates a test config rooted in a temp dir. Deleted backing files are unlinked rather than trashed.
pub fn config() -> (Config, TempDir) {
    let temp_dir = init();
    let mut config = Config::new(temp_dir.path().join("library"));
    config.trash_deleted_files = false;
    (config, temp_dir)
}

pub fn song(path: &str, title: &str, artist: &str, album: &str, genre: &str, duration_ms: u64) -> SongRecord {
    SongRecord {
        title: title.to_string(),
        artist: artist.to_string(),
        album: album.to_string(),
        genre: genre.to_string(),
        duration_ms,
        file_size: duration_ms * 16,
        ..SongRecord::new(path)
    }
}

// The fixture library. The files on disk are not real.
//
//   /music/blue/01.flac   So What          Miles Davis   Kind of Blue   Jazz     9:22
//   /music/blue/02.flac   Freddie Freeloader  Miles Davis  Kind of Blue  Jazz   9:46
//   /music/mix/01.mp3     Love Song        Adele         Mixtape        Pop      3:30
//   /music/mix/02.mp3     Crazy in Love    Beyonce       Mixtape        (empty)  3:56
//   /music/loose/love.mp3 (no title)       (empty)       (empty)        (empty)  2:00
//   /music/loose/rain.ogg Rain             (empty)       (empty)        Ambient  5:00
pub fn seeded_library() -> Arc<Library> {
    let library = Library::new();
    let change = library.upsert_many(seeded_songs());
    assert!(change.rejected.is_empty());
    Arc::new(library)
}

pub fn seeded_songs() -> Vec<SongRecord> {
    vec![
        song("/music/blue/01.flac", "So What", "Miles Davis", "Kind of Blue", "Jazz", 562_000),
        song("/music/blue/02.flac", "Freddie Freeloader", "Miles Davis", "Kind of Blue", "Jazz", 586_000),
        song("/music/mix/01.mp3", "Love Song", "Adele", "Mixtape", "Pop", 210_000),
        song("/music/mix/02.mp3", "Crazy in Love", "Beyonce", "Mixtape", "", 236_000),
        song("/music/loose/love.mp3", "", "", "", "", 120_000),
        song("/music/loose/rain.ogg", "Rain", "", "", "Ambient", 300_000),
    ]
}

pub fn p(path: &str) -> PathBuf {
    Path::new(path).to_path_buf()
}
