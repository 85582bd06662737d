use mu_core::codecs::all_supported_filter;
use mu_core::search::Searcher;
use mu_core::{Config, Dimension, Library, PlaylistFormat, PlaylistManager, SongRecord};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

fn song(path: &str, title: &str, artist: &str, album: &str, duration_ms: u64) -> SongRecord {
    SongRecord {
        title: title.to_string(),
        artist: artist.to_string(),
        album: album.to_string(),
        duration_ms,
        ..SongRecord::new(path)
    }
}

fn setup() -> (TempDir, Config, Arc<Library>) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::new(temp_dir.path().join("library"));
    config.trash_deleted_files = false;
    let library = Arc::new(Library::new());
    let change = library.upsert_many(vec![
        song("/music/a/01.flac", "Opening", "The Band", "First", 200_000),
        song("/music/a/02.flac", "Closing", "The Band", "First", 250_000),
        song("/music/b/01.mp3", "", "", "", 90_000),
    ]);
    assert!(change.rejected.is_empty());
    (temp_dir, config, library)
}

#[test]
fn test_search_to_playlist_to_file_and_back() {
    let (temp_dir, config, library) = setup();
    let manager = PlaylistManager::open(config, library.clone()).unwrap();
    let searcher = Searcher::new(library.clone());

    let found: Vec<PathBuf> = searcher.search("artist:\"the band\"").unwrap().iter().map(|r| r.path.clone()).collect();
    assert_eq!(found.len(), 2);

    let id = manager.create_playlist(Some("Band")).unwrap().id;
    manager.add_tracks(id, &found).unwrap();
    assert_eq!(manager.summary_caption(id).unwrap(), "2 songs, 7 minutes.");

    let out = temp_dir.path().join(manager.export_file_name(id, PlaylistFormat::ITunes).unwrap());
    assert!(all_supported_filter().accepts(&out));
    manager.export_file(id, &out, PlaylistFormat::ITunes).unwrap();

    let report = manager.import_file(&out).unwrap();
    assert_eq!(report.format, PlaylistFormat::ITunes);
    assert_eq!(report.playlist.name, "Band 2");
    let imported = manager.get_playlist(report.playlist.id).unwrap();
    let paths: Vec<PathBuf> = imported.entries.into_iter().map(|e| e.path).collect();
    assert_eq!(paths, found);
}

#[test]
fn test_library_changes_show_in_playlists_and_categories() {
    let (_temp_dir, config, library) = setup();
    let manager = PlaylistManager::open(config, library.clone()).unwrap();
    let id = manager.create_playlist(None).unwrap().id;
    manager.add_tracks(id, &[PathBuf::from("/music/b/01.mp3")]).unwrap();

    let entries = manager.resolve_entries(id).unwrap();
    assert_eq!(entries[0].title(), "01");
    let no_album = library.group(Dimension::Album, "No Album").unwrap();
    assert_eq!(no_album.song_count(), 1);

    library.upsert(song("/music/b/01.mp3", "Found", "Solo", "Second", 90_000)).unwrap();
    let entries = manager.resolve_entries(id).unwrap();
    assert_eq!(entries[0].title(), "Found");
    assert!(library.group(Dimension::Album, "No Album").is_none());
    assert_eq!(library.group(Dimension::Album, "Second").unwrap().display_artist.as_deref(), Some("Solo"));

    library.remove(&PathBuf::from("/music/b/01.mp3"));
    assert!(manager.resolve_entries(id).unwrap()[0].is_broken());
}

#[test]
fn test_missing_backing_file_is_reported_once() {
    let (temp_dir, config, library) = setup();
    let manager = PlaylistManager::open(config, library).unwrap();
    let playlist = temp_dir.path().join("list.m3u");
    fs::write(&playlist, "#EXTM3U\n#PLAYLIST:Radio\n/music/a/01.flac\n").unwrap();
    let report = manager.import_file(&playlist).unwrap();
    assert_eq!(report.format, PlaylistFormat::ExtM3u);
    assert_eq!(report.playlist.name, "Radio");

    fs::remove_file(&playlist).unwrap();
    let broken = manager.verify_backing_files().unwrap();
    assert_eq!(broken.caption(&manager.config().captions), "1 playlist cannot be loaded.");
    assert!(manager.verify_backing_files().unwrap().is_empty());
}
