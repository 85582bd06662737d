//! The native `.mplst` playlist format: a JSON document.
//!
//! ```json
//! {
//!   "mu": { "id": "...", "created_at": "...", "modified_at": "...", "source": null, "source_format": "native", "backing_path": null },
//!   "name": "Road Trip",
//!   "tracks": [{ "path": "/music/a.flac", "title": "A", "artist": "B", "duration": 183000 }]
//! }
//! ```
//!
//! The `mu` header is only written for playlists persisted by the playlist manager; interchange
//! files exported in the native format omit it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::codecs::{
    resolve_location, strip_bom, DecodedPlaylist, FormatDescriptor, FormatError, PlaylistCodec, PlaylistDocument,
    PlaylistFormat, TrackRef,
};

/// Bookkeeping stored alongside a persisted playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeHeader {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// The file this playlist was imported from, if any.
    #[serde(default)]
    pub source: Option<PathBuf>,
    /// The format of `source`; native for playlists created in place.
    #[serde(default)]
    pub source_format: PlaylistFormat,
    /// The external file this playlist was last exported to, if any.
    #[serde(default)]
    pub backing_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NativeFile {
    #[serde(rename = "mu", default, skip_serializing_if = "Option::is_none")]
    header: Option<NativeHeader>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    tracks: Vec<NativeTrack>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NativeTrack {
    #[serde(default)]
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<u64>,
}

pub struct NativeCodec;

impl PlaylistCodec for NativeCodec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        PlaylistFormat::Native.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        decode_native(bytes, base_dir).map(|(_, decoded)| decoded)
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        encode_native(None, document)
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let (bytes, _) = strip_bom(bytes);
        let text = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
        let text = text.trim_start();
        text.starts_with('{') && (text.contains("\"tracks\"") || text.contains("\"mu\""))
    }
}

/// Decode a native file, returning its header too when present.
pub(crate) fn decode_native(bytes: &[u8], base_dir: &Path) -> Result<(Option<NativeHeader>, DecodedPlaylist), FormatError> {
    let (bytes, _) = strip_bom(bytes);
    let file: NativeFile =
        serde_json::from_slice(bytes).map_err(|e| FormatError::malformed(PlaylistFormat::Native, e.line(), e))?;

    let mut decoded = DecodedPlaylist {
        name: Some(file.name).filter(|n| !n.trim().is_empty()),
        ..DecodedPlaylist::default()
    };
    for (i, track) in file.tracks.into_iter().enumerate() {
        match resolve_location(&track.path, base_dir) {
            Ok(path) => decoded.tracks.push(TrackRef {
                path,
                title: track.title,
                artist: track.artist,
                duration_ms: track.duration,
            }),
            Err(reason) => decoded.warn(i + 1, reason),
        }
    }
    Ok((file.header, decoded))
}

pub(crate) fn encode_native(header: Option<&NativeHeader>, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
    let file = NativeFile {
        header: header.cloned(),
        name: document.name.clone(),
        tracks: document
            .tracks
            .iter()
            .map(|t| NativeTrack {
                path: t.path.to_string_lossy().into_owned(),
                title: t.title.clone(),
                artist: t.artist.clone(),
                duration: t.duration_ms,
            })
            .collect(),
    };
    let mut out = serde_json::to_vec_pretty(&file).map_err(|e| FormatError::io(PlaylistFormat::Native, e))?;
    out.push(b'\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = NativeHeader {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            modified_at: Utc::now(),
            source: Some(PathBuf::from("/lists/old.m3u")),
            source_format: PlaylistFormat::M3u,
            backing_path: None,
        };
        let doc = PlaylistDocument {
            name: "Road Trip".to_string(),
            tracks: vec![TrackRef::new("/music/a.flac")],
        };
        let bytes = encode_native(Some(&header), &doc).unwrap();
        let (decoded_header, decoded) = decode_native(&bytes, Path::new("/")).unwrap();
        assert_eq!(decoded_header, Some(header));
        assert_eq!(decoded.name.as_deref(), Some("Road Trip"));
        assert_eq!(decoded.tracks, doc.tracks);
    }

    #[test]
    fn test_interchange_omits_header() {
        let doc = PlaylistDocument {
            name: "x".to_string(),
            tracks: vec![],
        };
        let bytes = NativeCodec.encode(&doc).unwrap();
        assert!(!String::from_utf8(bytes).unwrap().contains("\"mu\""));
    }

    #[test]
    fn test_bad_entries_become_warnings() {
        let bytes = br#"{"name": "x", "tracks": [{"path": ""}, {"path": "a.mp3", "duration": 5}]}"#;
        let decoded = NativeCodec.decode(bytes, Path::new("/lists")).unwrap();
        assert_eq!(decoded.tracks.len(), 1);
        assert_eq!(decoded.tracks[0].path, PathBuf::from("/lists/a.mp3"));
        assert_eq!(decoded.tracks[0].duration_ms, Some(5));
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].line, 1);
    }

    #[test]
    fn test_malformed_json_fails() {
        let err = NativeCodec.decode(b"{\"name\": ", Path::new("/")).unwrap_err();
        assert_eq!(err.format, PlaylistFormat::Native);
    }
}
