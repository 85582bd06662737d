use crate::captions::Noun;
use crate::config::*;
use crate::error::{MuError, MuExpectedError};
use crate::testing;
use std::fs;
use std::path::PathBuf;

#[test]
fn test_config_minimal() {
    let temp_dir = testing::init();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, r#"library_dir = "~/Music/.mu""#).unwrap();

    let c = Config::parse(Some(&config_path)).unwrap();
    let home = directories::BaseDirs::new().unwrap().home_dir().to_path_buf();
    assert_eq!(c.library_dir, home.join("Music/.mu"));
    assert_eq!(c.playlist_dir, home.join("Music/.mu/Playlist"));
    assert_eq!(c.catalog_database_path(), home.join("Music/.mu/catalog.sqlite3"));
    assert_eq!(c.legacy_encoding, "windows-1252");
    assert_eq!(c.verify_interval_seconds, 60);
    assert!(c.trash_deleted_files);
    assert_eq!(c.max_filename_bytes, 180);
}

#[test]
fn test_config_full() {
    let temp_dir = testing::init();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        r#"
        library_dir = "/srv/mu"
        playlist_dir = "/srv/playlists"
        legacy_encoding = "shift_jis"
        verify_interval_seconds = 5
        trash_deleted_files = false
        max_filename_bytes = 64

        [captions]
        song = ["Nothing.", "One song.", "%1 tunes."]
        "#,
    )
    .unwrap();

    let c = Config::parse(Some(&config_path)).unwrap();
    assert_eq!(c.library_dir, PathBuf::from("/srv/mu"));
    assert_eq!(c.playlist_dir, PathBuf::from("/srv/playlists"));
    assert_eq!(c.legacy_encoding(), encoding_rs::SHIFT_JIS);
    assert_eq!(c.verify_interval_seconds, 5);
    assert!(!c.trash_deleted_files);
    assert_eq!(c.max_filename_bytes, 64);
    assert_eq!(c.captions.count(Noun::Song, 3), "3 tunes.");
    assert_eq!(c.captions.count(Noun::Result, 3), "3 results.");
}

#[test]
fn test_config_not_found() {
    let temp_dir = testing::init();
    let config_path = temp_dir.path().join("config.toml");
    let err = Config::parse(Some(&config_path)).unwrap_err();
    assert_eq!(err.expected(), Some(&MuExpectedError::ConfigNotFound { path: config_path }));
}

#[test]
fn test_config_missing_library_dir() {
    let err = Config::parse_str("playlist_dir = \"/x\"", &PathBuf::from("/c.toml")).unwrap_err();
    match err {
        MuError::Expected(MuExpectedError::InvalidConfigValue { key, reason, .. }) => {
            assert_eq!(key, "library_dir");
            assert_eq!(reason, "missing required key");
        }
        e => panic!("unexpected error {e}"),
    }
}

#[test]
fn test_config_decode_error() {
    let err = Config::parse_str("library_dir = ", &PathBuf::from("/c.toml")).unwrap_err();
    assert!(matches!(err.expected(), Some(MuExpectedError::ConfigDecode { .. })));
}

#[test]
fn test_config_invalid_values() {
    let cases = [
        ("library_dir = 1", "library_dir"),
        ("library_dir = \"/x\"\nlegacy_encoding = \"klingon\"", "legacy_encoding"),
        ("library_dir = \"/x\"\nverify_interval_seconds = 0", "verify_interval_seconds"),
        ("library_dir = \"/x\"\nmax_filename_bytes = \"big\"", "max_filename_bytes"),
        ("library_dir = \"/x\"\ntrash_deleted_files = \"yes\"", "trash_deleted_files"),
        ("library_dir = \"/x\"\ncaptions = 3", "captions"),
        ("library_dir = \"/x\"\n[captions]\nalbum = [\"a\", \"b\", \"c\"]", "captions.album"),
        ("library_dir = \"/x\"\n[captions]\nsong = [\"a\", \"b\"]", "captions.song"),
    ];
    for (text, expected_key) in cases {
        let err = Config::parse_str(text, &PathBuf::from("/c.toml")).unwrap_err();
        match err.expected() {
            Some(MuExpectedError::InvalidConfigValue { key, .. }) => assert_eq!(key, expected_key, "{text}"),
            other => panic!("unexpected error for {text}: {other:?}"),
        }
    }
}

#[test]
fn test_config_unknown_keys_are_ignored() {
    let _ = testing::init();
    let c = Config::parse_str("library_dir = \"/x\"\ncolour = \"blue\"", &PathBuf::from("/c.toml")).unwrap();
    assert_eq!(c.library_dir, PathBuf::from("/x"));
}
