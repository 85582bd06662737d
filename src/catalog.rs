//! The catalog module is the sqlite index over the native playlist files.
//!
//! The catalog is a read cache: the native files are the source of truth. On a schema, config or
//! version change the database is deleted and recreated, and the playlist manager repopulates it
//! from the files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codecs::PlaylistFormat;
use crate::common::VERSION;
use crate::config::Config;
use crate::error::{MuError, Result};

static CATALOG_SCHEMA: &str = include_str!("catalog.sql");

pub fn connect(c: &Config) -> Result<Connection> {
    let conn = Connection::open(c.catalog_database_path())?;
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA busy_timeout = 15000;
        ",
    )?;
    Ok(conn)
}

/// Recreate the database if its schema, the config fields it depends on, or the crate version
/// changed since it was created. Returns whether the database was recreated.
pub fn maybe_invalidate_catalog_database(c: &Config) -> Result<bool> {
    let mut hasher = Sha256::new();
    hasher.update(CATALOG_SCHEMA.as_bytes());
    let schema_hash = format!("{:x}", hasher.finalize());

    let config_hash_fields = serde_json::json!({
        "playlist_dir": c.playlist_dir.to_string_lossy(),
    });
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(&config_hash_fields)?.as_bytes());
    let config_hash = format!("{:x}", hasher.finalize());

    {
        let conn = connect(c)?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(
                SELECT * FROM sqlite_master
                WHERE type = 'table' AND name = '_schema_hash'
            )",
            [],
            |row| row.get(0),
        )?;
        if exists {
            let result: Option<(String, String, String)> = conn
                .query_row("SELECT schema_hash, config_hash, version FROM _schema_hash", [], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })
                .optional()?;
            if let Some((db_schema_hash, db_config_hash, db_version)) = result {
                if db_schema_hash == schema_hash && db_config_hash == config_hash && db_version == VERSION {
                    return Ok(false);
                }
            }
        }
    }

    info!("recreating playlist catalog at {}", c.catalog_database_path().display());
    let path = c.catalog_database_path();
    for suffix in ["", "-wal", "-shm"] {
        let p = PathBuf::from(format!("{}{}", path.display(), suffix));
        if p.exists() {
            fs::remove_file(&p)?;
        }
    }

    let conn = connect(c)?;
    conn.execute_batch(CATALOG_SCHEMA)?;
    conn.execute_batch(
        "
        CREATE TABLE _schema_hash (
            schema_hash TEXT
          , config_hash TEXT
          , version TEXT
          , PRIMARY KEY (schema_hash, config_hash, version)
        )
        ",
    )?;
    conn.execute(
        "INSERT INTO _schema_hash (schema_hash, config_hash, version) VALUES (?1, ?2, ?3)",
        params![schema_hash, config_hash, VERSION],
    )?;
    Ok(true)
}

/// A catalog row: everything needed to list a playlist without reading its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub id: Uuid,
    pub name: String,
    pub native_path: PathBuf,
    /// The file the playlist was imported from.
    pub source_path: Option<PathBuf>,
    pub source_format: PlaylistFormat,
    /// The external file the playlist is kept in sync with.
    pub backing_path: Option<PathBuf>,
    pub track_count: usize,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// The backing file is missing and this has already been reported.
    pub broken: bool,
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<PlaylistSummary> {
    let id: String = row.get("id")?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e)))?;
    let source_format: String = row.get("source_format")?;
    let source_format = PlaylistFormat::from_key(&source_format).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown playlist format {source_format}").into(),
        )
    })?;
    Ok(PlaylistSummary {
        id,
        name: row.get("name")?,
        native_path: PathBuf::from(row.get::<_, String>("native_path")?),
        source_path: row.get::<_, Option<String>>("source_path")?.map(PathBuf::from),
        source_format,
        backing_path: row.get::<_, Option<String>>("backing_path")?.map(PathBuf::from),
        track_count: row.get::<_, i64>("track_count")? as usize,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
        broken: row.get("broken")?,
    })
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

pub(crate) fn upsert_summary(conn: &Connection, s: &PlaylistSummary) -> Result<()> {
    debug!("catalog: upserting playlist {} ({})", s.id, s.name);
    conn.execute(
        "
        INSERT INTO playlists
        (id, name, native_path, source_path, source_format, backing_path, track_count, created_at, modified_at, broken)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT (id) DO UPDATE SET
            name = excluded.name
          , native_path = excluded.native_path
          , source_path = excluded.source_path
          , source_format = excluded.source_format
          , backing_path = excluded.backing_path
          , track_count = excluded.track_count
          , created_at = excluded.created_at
          , modified_at = excluded.modified_at
          , broken = excluded.broken
        ",
        params![
            s.id.to_string(),
            s.name,
            path_str(&s.native_path),
            s.source_path.as_deref().map(path_str),
            s.source_format.key(),
            s.backing_path.as_deref().map(path_str),
            s.track_count as i64,
            s.created_at,
            s.modified_at,
            s.broken,
        ],
    )?;
    Ok(())
}

pub(crate) fn delete_summary(conn: &Connection, id: Uuid) -> Result<()> {
    conn.execute("DELETE FROM playlists WHERE id = ?1", params![id.to_string()])?;
    Ok(())
}

pub(crate) fn set_broken(conn: &Connection, id: Uuid, broken: bool) -> Result<()> {
    conn.execute("UPDATE playlists SET broken = ?2 WHERE id = ?1", params![id.to_string(), broken])?;
    Ok(())
}

pub(crate) fn get_summary(conn: &Connection, id: Uuid) -> Result<Option<PlaylistSummary>> {
    let mut stmt = conn.prepare("SELECT * FROM playlists WHERE id = ?1")?;
    Ok(stmt.query_row(params![id.to_string()], summary_from_row).optional()?)
}

/// Every playlist ordered case-insensitively by name, then by creation.
pub(crate) fn list_summaries(conn: &Connection) -> Result<Vec<PlaylistSummary>> {
    let mut stmt = conn.prepare("SELECT * FROM playlists ORDER BY name COLLATE NOCASE, created_at, id")?;
    let rows = stmt.query_map([], summary_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(MuError::from)
}
