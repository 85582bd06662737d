use crate::codecs::{PlaylistFormat, TrackRef};
use crate::error::MuExpectedError;
use crate::playlists::*;
use crate::testing;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

fn manager() -> (PlaylistManager, tempfile::TempDir) {
    let (config, temp_dir) = testing::config();
    let manager = PlaylistManager::open(config, testing::seeded_library()).unwrap();
    (manager, temp_dir)
}

fn names(manager: &PlaylistManager) -> Vec<String> {
    manager.list_playlists().unwrap().into_iter().map(|s| s.name).collect()
}

fn entry_paths(manager: &PlaylistManager, id: uuid::Uuid) -> Vec<PathBuf> {
    manager.get_playlist(id).unwrap().entries.into_iter().map(|e| e.path).collect()
}

fn lists_dir(temp_dir: &tempfile::TempDir) -> PathBuf {
    let dir = temp_dir.path().join("lists");
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_create_playlist_names() {
    let (m, _temp_dir) = manager();
    assert_eq!(m.create_playlist(None).unwrap().name, "New Playlist");
    assert_eq!(m.create_playlist(None).unwrap().name, "New Playlist 2");
    assert_eq!(m.create_playlist(Some(" Road Trip ")).unwrap().name, "Road Trip");

    let err = m.create_playlist(Some("road trip")).unwrap_err();
    assert_eq!(
        err.expected(),
        Some(&MuExpectedError::PlaylistAlreadyExists {
            name: "road trip".to_string()
        })
    );
    assert!(m.create_playlist(Some("   ")).is_err());
    assert_eq!(names(&m), vec!["New Playlist", "New Playlist 2", "Road Trip"]);
}

#[test]
fn test_create_playlist_writes_native_file() {
    let (m, _temp_dir) = manager();
    let summary = m.create_playlist(Some("Road Trip")).unwrap();
    assert_eq!(summary.native_path, m.config().playlist_dir.join(format!("{}.mplst", summary.id)));
    assert!(summary.native_path.is_file());
    assert_eq!(m.playlist_summary(summary.id).unwrap(), summary);
}

#[test]
fn test_rename_playlist() {
    let (m, _temp_dir) = manager();
    let a = m.create_playlist(Some("Morning")).unwrap();
    m.create_playlist(Some("Evening")).unwrap();

    let err = m.rename_playlist(a.id, "EVENING").unwrap_err();
    assert!(matches!(err.expected(), Some(MuExpectedError::PlaylistAlreadyExists { .. })));
    // A case change of its own name is fine.
    assert_eq!(m.rename_playlist(a.id, "MORNING").unwrap().name, "MORNING");
    assert_eq!(m.rename_playlist(a.id, "Dawn").unwrap().name, "Dawn");
    assert_eq!(names(&m), vec!["Dawn", "Evening"]);

    let missing = uuid::Uuid::now_v7();
    let err = m.rename_playlist(missing, "x").unwrap_err();
    assert_eq!(
        err.expected(),
        Some(&MuExpectedError::PlaylistDoesNotExist { id: missing.to_string() })
    );
}

#[test]
fn test_copy_playlist() {
    let (m, temp_dir) = manager();
    let original = m.create_playlist(Some("Road Trip")).unwrap();
    m.add_tracks(original.id, &[testing::p("/music/blue/01.flac")]).unwrap();
    m.export_file(original.id, &lists_dir(&temp_dir).join("trip.m3u8"), PlaylistFormat::M3u8).unwrap();

    let copy = m.copy_playlist(original.id).unwrap();
    assert_eq!(copy.name, "Road Trip 2");
    assert_ne!(copy.id, original.id);
    assert_eq!(copy.backing_path, None);
    assert_eq!(entry_paths(&m, copy.id), vec![testing::p("/music/blue/01.flac")]);
    assert_eq!(m.copy_playlist(original.id).unwrap().name, "Road Trip 3");
}

#[test]
fn test_edit_tracks() {
    let (m, _temp_dir) = manager();
    let id = m.create_playlist(None).unwrap().id;
    let added = m
        .add_tracks(
            id,
            &[
                testing::p("/music/blue/01.flac"),
                testing::p("/music/mix/./01.mp3"),
                testing::p("/music/gone.mp3"),
                testing::p("/music/blue/01.flac"),
            ],
        )
        .unwrap();
    assert_eq!(added, 4);
    assert_eq!(m.playlist_summary(id).unwrap().track_count, 4);

    // Duplicate and out of range positions are ignored.
    assert_eq!(m.remove_tracks(id, &[3, 3, 9]).unwrap(), 1);
    m.move_track(id, 0, 2).unwrap();
    assert_eq!(
        entry_paths(&m, id),
        vec![testing::p("/music/mix/01.mp3"), testing::p("/music/gone.mp3"), testing::p("/music/blue/01.flac")]
    );
    assert!(m.move_track(id, 0, 3).is_err());
}

#[test]
fn test_resolve_entries_and_summary_caption() {
    let (m, _temp_dir) = manager();
    let id = m.create_playlist(None).unwrap().id;
    assert_eq!(m.summary_caption(id).unwrap(), "No song.");

    m.add_tracks(
        id,
        &[testing::p("/music/blue/01.flac"), testing::p("/music/mix/01.mp3"), testing::p("/music/gone.mp3")],
    )
    .unwrap();
    let entries = m.resolve_entries(id).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].title(), "So What");
    assert!(!entries[0].is_broken());
    assert!(entries[2].is_broken());
    assert_eq!(entries[2].title(), "gone");
    assert_eq!(entries[2].duration_ms(), None);
    // 562s + 210s
    assert_eq!(m.summary_caption(id).unwrap(), "3 songs, 12 minutes.");
}

#[test]
fn test_export_prefers_library_metadata() {
    let (m, temp_dir) = manager();
    let id = m.create_playlist(Some("Mix")).unwrap().id;
    m.add_tracks(id, &[testing::p("/music/blue/01.flac"), testing::p("/music/loose/love.mp3")]).unwrap();
    let path = lists_dir(&temp_dir).join("mix.xspf");
    m.export_file(id, &path, PlaylistFormat::Xspf).unwrap();

    let bytes = fs::read(&path).unwrap();
    let decoded = m.codecs().for_kind(PlaylistFormat::Xspf).decode(&bytes, Path::new("/")).unwrap();
    assert_eq!(decoded.name.as_deref(), Some("Mix"));
    assert_eq!(
        decoded.tracks,
        vec![
            TrackRef {
                path: testing::p("/music/blue/01.flac"),
                title: Some("So What".to_string()),
                artist: Some("Miles Davis".to_string()),
                duration_ms: Some(562_000),
            },
            TrackRef {
                path: testing::p("/music/loose/love.mp3"),
                title: Some("love".to_string()),
                artist: None,
                duration_ms: Some(120_000),
            },
        ]
    );
    assert_eq!(m.get_playlist(id).unwrap().backing_path, Some(path));
}

#[test]
fn test_export_then_import_every_format() {
    let (m, temp_dir) = manager();
    let dir = lists_dir(&temp_dir);
    let id = m.create_playlist(Some("Mix")).unwrap().id;
    m.add_tracks(id, &[testing::p("/music/blue/01.flac"), testing::p("/music/unknown/x.mp3")]).unwrap();

    for (i, format) in PlaylistFormat::ALL.into_iter().enumerate() {
        let path = dir.join(format!("out{i}.{}", format.extension()));
        m.export_file(id, &path, format).unwrap();
        let report = m.import_file(&path).unwrap();
        assert_eq!(report.format, format);
        assert_eq!(report.playlist.source_format, format);
        assert_eq!(report.added, 2);
        assert!(report.warnings.is_empty());
        assert_eq!(report.playlist.backing_path.as_ref(), Some(&path));
        assert_eq!(report.playlist.source_path.as_ref(), Some(&path));
        // Entries the library knows keep only their path.
        assert_eq!(
            m.get_playlist(report.playlist.id).unwrap().entries,
            vec![TrackRef::new("/music/blue/01.flac"), TrackRef::new("/music/unknown/x.mp3")],
            "{format}"
        );
    }
    // Plain M3U stores no name, so the file stem is used.
    assert!(names(&m).contains(&"out1".to_string()));
    assert!(names(&m).contains(&"Mix 2".to_string()));
}

#[test]
fn test_import_keeps_metadata_of_unknown_entries() {
    let (m, temp_dir) = manager();
    let path = lists_dir(&temp_dir).join("mixtape.m3u");
    fs::write(
        &path,
        "#EXTM3U\n#EXTINF:100,Someone - Thing\n/music/unknown.mp3\n#EXTINF:5,Wrong - Wrong\n/music/blue/01.flac\nhttp://radio/stream\n",
    )
    .unwrap();

    let report = m.import_file(&path).unwrap();
    assert_eq!(report.format, PlaylistFormat::ExtM3u);
    assert_eq!(report.playlist.name, "mixtape");
    assert_eq!(report.added, 2);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].line, 6);

    let entries = m.resolve_entries(report.playlist.id).unwrap();
    assert!(entries[0].is_broken());
    assert_eq!(entries[0].entry.artist.as_deref(), Some("Someone"));
    assert_eq!(entries[0].title(), "Thing");
    assert_eq!(entries[0].duration_ms(), Some(100_000));
    assert_eq!(entries[1].entry, TrackRef::new("/music/blue/01.flac"));
    assert_eq!(entries[1].title(), "So What");
}

#[test]
fn test_import_resolves_relative_entries() {
    let (m, temp_dir) = manager();
    let dir = lists_dir(&temp_dir);
    let path = dir.join("relative.m3u");
    fs::write(&path, "songs/a.mp3\n../b.mp3\n").unwrap();
    let report = m.import_file(&path).unwrap();
    assert_eq!(report.format, PlaylistFormat::M3u);
    assert_eq!(entry_paths(&m, report.playlist.id), vec![dir.join("songs/a.mp3"), temp_dir.path().join("b.mp3")]);
}

#[test]
fn test_import_errors() {
    let (m, temp_dir) = manager();
    let dir = lists_dir(&temp_dir);

    let missing = dir.join("missing.m3u");
    assert!(matches!(m.import_file(&missing), Err(ImportError::NotFound(p)) if p == missing));

    let binary = dir.join("blob.bin");
    fs::write(&binary, b"\x00\x01\x02").unwrap();
    assert!(matches!(m.import_file(&binary), Err(ImportError::UnsupportedFormat(_))));

    let broken = dir.join("broken.xspf");
    fs::write(&broken, "<playlist><trackList>").unwrap();
    match m.import_file(&broken) {
        Err(ImportError::Format { source, .. }) => assert_eq!(source.format, PlaylistFormat::Xspf),
        other => panic!("unexpected result {other:?}"),
    }
    assert!(names(&m).is_empty());
}

#[test]
fn test_export_missing_playlist() {
    let (m, temp_dir) = manager();
    let id = uuid::Uuid::now_v7();
    let path = lists_dir(&temp_dir).join("x.m3u");
    assert!(matches!(m.export_file(id, &path, PlaylistFormat::M3u), Err(ExportError::PlaylistDoesNotExist(i)) if i == id));
    assert!(!path.exists());
}

#[test]
fn test_export_file_name() {
    let (m, _temp_dir) = manager();
    let id = m.create_playlist(Some("AC/DC: Live")).unwrap().id;
    assert_eq!(m.export_file_name(id, PlaylistFormat::M3u8).unwrap(), "AC_DC_ Live.m3u8");
    assert_eq!(m.export_file_name(id, PlaylistFormat::ITunes).unwrap(), "AC_DC_ Live.xml");
}

#[test]
fn test_playlists_survive_reopen() {
    let (config, temp_dir) = testing::config();
    let library = testing::seeded_library();
    let (id, gone) = {
        let m = PlaylistManager::open(config.clone(), library.clone()).unwrap();
        let id = m.create_playlist(Some("Keep")).unwrap().id;
        m.add_tracks(id, &[testing::p("/music/mix/02.mp3"), testing::p("/music/gone.mp3")]).unwrap();
        let gone = m.create_playlist(Some("Gone")).unwrap();
        (id, gone)
    };
    // Removed behind the catalog's back.
    fs::remove_file(&gone.native_path).unwrap();

    let m = PlaylistManager::open(config, library).unwrap();
    assert_eq!(names(&m), vec!["Keep"]);
    assert_eq!(entry_paths(&m, id), vec![testing::p("/music/mix/02.mp3"), testing::p("/music/gone.mp3")]);
    assert!(m.playlist_summary(gone.id).is_err());
    drop(temp_dir);
}

#[test]
fn test_open_adopts_headerless_files() {
    let (config, _temp_dir) = testing::config();
    fs::create_dir_all(&config.playlist_dir).unwrap();
    let hand_made = config.playlist_dir.join("hand.mplst");
    fs::write(&hand_made, r#"{"name": "Hand Made", "tracks": [{"path": "/music/blue/02.flac"}]}"#).unwrap();

    let m = PlaylistManager::open(config, testing::seeded_library()).unwrap();
    let summaries = m.list_playlists().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].name, "Hand Made");
    assert_eq!(summaries[0].track_count, 1);
    assert!(!hand_made.exists());
    assert!(summaries[0].native_path.is_file());
}

#[test]
fn test_verify_backing_files_reports_once() {
    let (m, temp_dir) = manager();
    let dir = lists_dir(&temp_dir);
    let b = m.create_playlist(Some("beta")).unwrap().id;
    let a = m.create_playlist(Some("Alpha")).unwrap().id;
    m.create_playlist(Some("Unbacked")).unwrap();
    let a_path = dir.join("a.m3u8");
    let b_path = dir.join("b.m3u8");
    m.export_file(a, &a_path, PlaylistFormat::M3u8).unwrap();
    m.export_file(b, &b_path, PlaylistFormat::M3u8).unwrap();
    assert!(m.verify_backing_files().unwrap().is_empty());

    fs::remove_file(&a_path).unwrap();
    fs::remove_file(&b_path).unwrap();
    let report = m.verify_backing_files().unwrap();
    let reported: Vec<&str> = report.playlists.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(reported, vec!["Alpha", "beta"]);
    assert!(report.playlists.iter().all(|p| p.broken));
    assert_eq!(report.caption(&m.config().captions), "2 playlists cannot be loaded.");
    assert_eq!(report.detail(), "Those playlists may be moved, deleted or renamed.");
    assert!(m.playlist_summary(a).unwrap().broken);

    // Already reported.
    assert!(m.verify_backing_files().unwrap().is_empty());

    // Once the file is back, a later disappearance is reported again.
    fs::write(&a_path, b"").unwrap();
    assert!(m.verify_backing_files().unwrap().is_empty());
    assert!(!m.playlist_summary(a).unwrap().broken);
    fs::remove_file(&a_path).unwrap();
    let report = m.verify_backing_files().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.caption(&m.config().captions), "1 playlist cannot be loaded.");
}

#[test]
fn test_missing_backing_file_is_reported_again_after_reopen() {
    let (config, temp_dir) = testing::config();
    let library = testing::seeded_library();
    let path = lists_dir(&temp_dir).join("a.xspf");
    let id = {
        let m = PlaylistManager::open(config.clone(), library.clone()).unwrap();
        let id = m.create_playlist(Some("A")).unwrap().id;
        m.export_file(id, &path, PlaylistFormat::Xspf).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(m.verify_backing_files().unwrap().len(), 1);
        id
    };

    let m = PlaylistManager::open(config, library).unwrap();
    // The flag is listed before any check runs.
    assert!(m.playlist_summary(id).unwrap().broken);
    let report = m.verify_backing_files().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.playlists[0].id, id);
    assert!(m.verify_backing_files().unwrap().is_empty());

    fs::write(&path, b"").unwrap();
    assert!(m.verify_backing_files().unwrap().is_empty());
    assert!(!m.playlist_summary(id).unwrap().broken);
}

#[test]
fn test_export_clears_broken_flag() {
    let (m, temp_dir) = manager();
    let path = lists_dir(&temp_dir).join("a.wpl");
    let id = m.create_playlist(Some("A")).unwrap().id;
    m.export_file(id, &path, PlaylistFormat::Wpl).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(m.verify_backing_files().unwrap().len(), 1);

    m.export_file(id, &path, PlaylistFormat::Wpl).unwrap();
    assert!(!m.playlist_summary(id).unwrap().broken);
    fs::remove_file(&path).unwrap();
    assert_eq!(m.verify_backing_files().unwrap().len(), 1);
}

#[test]
fn test_delete_playlist() {
    let (m, temp_dir) = manager();
    let path = lists_dir(&temp_dir).join("a.ttpl");
    let summary = m.create_playlist(Some("A")).unwrap();
    m.export_file(summary.id, &path, PlaylistFormat::Ttpl).unwrap();

    let outcome = m.delete_playlist(summary.id).unwrap();
    assert_eq!(outcome.removed_backing_file, Some(path.clone()));
    assert_eq!(outcome.backing_file_error, None);
    assert!(!path.exists());
    assert!(!summary.native_path.exists());
    assert!(names(&m).is_empty());
    assert!(m.get_playlist(summary.id).is_none());
    assert!(m.delete_playlist(summary.id).is_err());
}

#[test]
fn test_delete_playlist_reports_backing_file_failure() {
    let (m, temp_dir) = manager();
    let path = lists_dir(&temp_dir).join("a.m3u");
    let id = m.create_playlist(Some("A")).unwrap().id;
    m.export_file(id, &path, PlaylistFormat::ExtM3u).unwrap();
    // A directory cannot be removed as a file.
    fs::remove_file(&path).unwrap();
    fs::create_dir(&path).unwrap();

    let outcome = m.delete_playlist(id).unwrap();
    assert_eq!(outcome.removed_backing_file, None);
    assert_eq!(
        outcome.backing_file_error,
        Some(format!("Failed to delete the playlist file: \n{}", path.display()))
    );
    assert!(names(&m).is_empty());
}

#[test]
fn test_backing_file_watcher() {
    let (m, temp_dir) = manager();
    let m = Arc::new(m);
    let path = lists_dir(&temp_dir).join("a.m3u8");
    let id = m.create_playlist(Some("A")).unwrap().id;
    m.export_file(id, &path, PlaylistFormat::M3u8).unwrap();

    let watcher = m.spawn_backing_file_watcher(Duration::from_millis(10));
    fs::remove_file(&path).unwrap();
    let report = watcher.reports().recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(report.playlists[0].id, id);
    drop(watcher);
}

#[test]
fn test_backing_file_watcher_checks_on_start() {
    let (m, temp_dir) = manager();
    let m = Arc::new(m);
    let path = lists_dir(&temp_dir).join("a.xspf");
    let id = m.create_playlist(Some("A")).unwrap().id;
    m.export_file(id, &path, PlaylistFormat::Xspf).unwrap();
    fs::remove_file(&path).unwrap();

    // The interval is far longer than the wait: only the startup check can deliver.
    let watcher = m.spawn_backing_file_watcher(Duration::from_secs(3600));
    let report = watcher.reports().recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report.playlists[0].id, id);
    drop(watcher);
}
