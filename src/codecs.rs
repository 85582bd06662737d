//! The codecs module holds the playlist codec contract and the registry of supported formats.
//!
//! Every format decodes into a `DecodedPlaylist` of `TrackRef`s and encodes from a
//! `PlaylistDocument`. Decoding is lenient: malformed lines and elements are skipped and reported as
//! warnings. Only unreadable input (a bad encoding where the format mandates one, or a malformed
//! document) fails the decode.

use std::fmt;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::codec_itunes::ITunesCodec;
use crate::codec_m3u::{ExtM3uCodec, M3u8Codec, M3uCodec};
use crate::codec_native::NativeCodec;
use crate::codec_ttpl::TtplCodec;
use crate::codec_wpl::WplCodec;
use crate::codec_xspf::XspfCodec;
use crate::common::{normalize_path, uniq};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistFormat {
    #[default]
    Native,
    M3u,
    ExtM3u,
    M3u8,
    Wpl,
    Xspf,
    ITunes,
    Ttpl,
}

impl PlaylistFormat {
    pub const ALL: [PlaylistFormat; 8] = [
        PlaylistFormat::Native,
        PlaylistFormat::M3u,
        PlaylistFormat::ExtM3u,
        PlaylistFormat::M3u8,
        PlaylistFormat::Wpl,
        PlaylistFormat::Xspf,
        PlaylistFormat::ITunes,
        PlaylistFormat::Ttpl,
    ];

    pub fn descriptor(self) -> &'static FormatDescriptor {
        match self {
            PlaylistFormat::Native => &DESCRIPTORS[0],
            PlaylistFormat::M3u => &DESCRIPTORS[1],
            PlaylistFormat::ExtM3u => &DESCRIPTORS[2],
            PlaylistFormat::M3u8 => &DESCRIPTORS[3],
            PlaylistFormat::Wpl => &DESCRIPTORS[4],
            PlaylistFormat::Xspf => &DESCRIPTORS[5],
            PlaylistFormat::ITunes => &DESCRIPTORS[6],
            PlaylistFormat::Ttpl => &DESCRIPTORS[7],
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Stable lowercase identifier, as stored in native files and the catalog.
    pub fn key(self) -> &'static str {
        match self {
            PlaylistFormat::Native => "native",
            PlaylistFormat::M3u => "m3u",
            PlaylistFormat::ExtM3u => "extm3u",
            PlaylistFormat::M3u8 => "m3u8",
            PlaylistFormat::Wpl => "wpl",
            PlaylistFormat::Xspf => "xspf",
            PlaylistFormat::ITunes => "itunes",
            PlaylistFormat::Ttpl => "ttpl",
        }
    }

    pub fn from_key(key: &str) -> Option<PlaylistFormat> {
        PlaylistFormat::ALL.into_iter().find(|f| f.key() == key)
    }

    /// The extension used when exporting in this format.
    pub fn extension(self) -> &'static str {
        self.descriptor().extensions[0]
    }

    pub fn is_m3u_family(self) -> bool {
        matches!(self, PlaylistFormat::M3u | PlaylistFormat::ExtM3u | PlaylistFormat::M3u8)
    }

    /// Whether the format can carry title, artist and duration alongside each path.
    pub fn carries_metadata(self) -> bool {
        !matches!(self, PlaylistFormat::M3u | PlaylistFormat::Wpl)
    }
}

impl fmt::Display for PlaylistFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub format: PlaylistFormat,
    pub name: &'static str,
    /// Lowercase, without the leading dot.
    pub extensions: &'static [&'static str],
    pub mime_type: &'static str,
}

static DESCRIPTORS: [FormatDescriptor; 8] = [
    FormatDescriptor {
        format: PlaylistFormat::Native,
        name: "Mu Playlist",
        extensions: &["mplst"],
        mime_type: "application/json",
    },
    FormatDescriptor {
        format: PlaylistFormat::M3u,
        name: "M3U Playlist",
        extensions: &["m3u"],
        mime_type: "audio/x-mpegurl",
    },
    FormatDescriptor {
        format: PlaylistFormat::ExtM3u,
        name: "Extended M3U Playlist",
        extensions: &["m3u"],
        mime_type: "audio/x-mpegurl",
    },
    FormatDescriptor {
        format: PlaylistFormat::M3u8,
        name: "M3U8 Playlist",
        extensions: &["m3u8"],
        mime_type: "application/vnd.apple.mpegurl",
    },
    FormatDescriptor {
        format: PlaylistFormat::Wpl,
        name: "Windows Media Player Playlist",
        extensions: &["wpl"],
        mime_type: "application/vnd.ms-wpl",
    },
    FormatDescriptor {
        format: PlaylistFormat::Xspf,
        name: "XSPF Playlist",
        extensions: &["xspf"],
        mime_type: "application/xspf+xml",
    },
    FormatDescriptor {
        format: PlaylistFormat::ITunes,
        name: "iTunes XML Playlist",
        extensions: &["xml"],
        mime_type: "application/x-plist",
    },
    FormatDescriptor {
        format: PlaylistFormat::Ttpl,
        name: "TTPlayer Playlist",
        extensions: &["ttpl"],
        mime_type: "application/xml",
    },
];

/// A file-dialog style filter: a display name and the extensions it accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<&'static str>,
}

impl FileFilter {
    pub fn accepts(&self, path: &Path) -> bool {
        extension_of(path).is_some_and(|ext| self.extensions.contains(&ext.as_str()))
    }
}

/// One filter per format, in registry order.
pub fn format_filters() -> Vec<FileFilter> {
    DESCRIPTORS
        .iter()
        .map(|d| FileFilter {
            name: d.name.to_string(),
            extensions: d.extensions.to_vec(),
        })
        .collect()
}

/// The synthetic filter accepting every extension of every registered format.
pub fn all_supported_filter() -> FileFilter {
    FileFilter {
        name: "All Supported Playlist".to_string(),
        extensions: uniq(DESCRIPTORS.iter().flat_map(|d| d.extensions.iter().copied()).collect()),
    }
}

/// A playlist entry as carried by a file: the path plus whatever metadata the format stores.
/// The metadata is only a fallback for when the library has no record for the path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackRef {
    pub path: PathBuf,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration_ms: Option<u64>,
}

impl TrackRef {
    pub fn new(path: impl Into<PathBuf>) -> TrackRef {
        TrackRef {
            path: path.into(),
            ..TrackRef::default()
        }
    }

    pub fn has_metadata(&self) -> bool {
        self.title.is_some() || self.artist.is_some() || self.duration_ms.is_some()
    }
}

/// What an encoder writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistDocument {
    pub name: String,
    pub tracks: Vec<TrackRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedPlaylist {
    /// The name stored in the file, if the format stores one.
    pub name: Option<String>,
    pub tracks: Vec<TrackRef>,
    pub warnings: Vec<DecodeWarning>,
}

impl DecodedPlaylist {
    pub(crate) fn warn(&mut self, line: usize, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("skipping playlist entry at line {}: {}", line, message);
        self.warnings.push(DecodeWarning { line, message });
    }
}

/// A skipped line or element. `line` is the 1-based line number for text and XML formats, and the
/// 1-based entry number for the native format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeWarning {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    #[error("invalid text encoding: {0}")]
    Encoding(String),
    #[error("malformed document at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("failed to write document: {0}")]
    Io(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {kind}", .format.name())]
pub struct FormatError {
    pub format: PlaylistFormat,
    pub kind: FormatErrorKind,
}

impl FormatError {
    pub fn encoding(format: PlaylistFormat, reason: impl fmt::Display) -> FormatError {
        FormatError {
            format,
            kind: FormatErrorKind::Encoding(reason.to_string()),
        }
    }

    pub fn malformed(format: PlaylistFormat, line: usize, reason: impl fmt::Display) -> FormatError {
        FormatError {
            format,
            kind: FormatErrorKind::Malformed {
                line,
                reason: reason.to_string(),
            },
        }
    }

    pub fn io(format: PlaylistFormat, reason: impl fmt::Display) -> FormatError {
        FormatError {
            format,
            kind: FormatErrorKind::Io(reason.to_string()),
        }
    }
}

pub trait PlaylistCodec: Send + Sync {
    fn descriptor(&self) -> &'static FormatDescriptor;

    /// Decode a playlist. Relative entry paths are resolved against `base_dir`, normally the
    /// directory holding the playlist file.
    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError>;

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError>;

    /// Whether `bytes` look like this format. Used when the extension does not decide.
    fn sniff(&self, bytes: &[u8]) -> bool;

    fn format(&self) -> PlaylistFormat {
        self.descriptor().format
    }
}

/// The fixed table of codecs, one per `PlaylistFormat`.
pub struct CodecRegistry {
    codecs: Vec<Box<dyn PlaylistCodec>>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        CodecRegistry::new(encoding_rs::WINDOWS_1252)
    }
}

impl CodecRegistry {
    /// `legacy_encoding` decodes plain and extended M3U files that are not valid UTF-8.
    pub fn new(legacy_encoding: &'static Encoding) -> CodecRegistry {
        let codecs: Vec<Box<dyn PlaylistCodec>> = vec![
            Box::new(NativeCodec),
            Box::new(M3uCodec::new(legacy_encoding)),
            Box::new(ExtM3uCodec::new(legacy_encoding)),
            Box::new(M3u8Codec),
            Box::new(WplCodec),
            Box::new(XspfCodec),
            Box::new(ITunesCodec),
            Box::new(TtplCodec),
        ];
        CodecRegistry { codecs }
    }

    pub fn codecs(&self) -> impl Iterator<Item = &dyn PlaylistCodec> {
        self.codecs.iter().map(|c| c.as_ref())
    }

    pub fn for_kind(&self, format: PlaylistFormat) -> &dyn PlaylistCodec {
        let index = PlaylistFormat::ALL.iter().position(|f| *f == format).unwrap_or(0);
        self.codecs[index].as_ref()
    }

    /// The first codec registered for `extension` (case-insensitive, with or without the dot).
    pub fn for_extension(&self, extension: &str) -> Option<&dyn PlaylistCodec> {
        let ext = extension.trim_start_matches('.').to_lowercase();
        self.codecs().find(|c| c.descriptor().extensions.contains(&ext.as_str()))
    }

    pub fn for_mime_type(&self, mime_type: &str) -> Option<&dyn PlaylistCodec> {
        let mime_type = mime_type.trim().to_lowercase();
        self.codecs().find(|c| c.descriptor().mime_type == mime_type)
    }

    /// Pick the codec for a file: by extension first, then by sniffing the content.
    ///
    /// `.m3u` files are told apart by content: a UTF-8 BOM means M3U8, a leading `#EXTM3U` means
    /// Extended M3U, anything else is plain M3U.
    pub fn resolve(&self, path: &Path, bytes: &[u8]) -> Option<&dyn PlaylistCodec> {
        match extension_of(path).as_deref() {
            Some("m3u") => {
                let format = [PlaylistFormat::M3u8, PlaylistFormat::ExtM3u]
                    .into_iter()
                    .find(|f| self.for_kind(*f).sniff(bytes))
                    .unwrap_or(PlaylistFormat::M3u);
                return Some(self.for_kind(format));
            }
            Some(ext) => {
                if let Some(codec) = self.for_extension(ext) {
                    return Some(codec);
                }
            }
            None => {}
        }
        // The M3U family goes last: a BOM alone means M3U8 only once no root element matched, and
        // plain M3U accepts nearly any text.
        self.codecs()
            .filter(|c| !c.format().is_m3u_family())
            .chain(M3U_SNIFF_ORDER.iter().map(|f| self.for_kind(*f)))
            .find(|c| c.sniff(bytes))
    }
}

const M3U_SNIFF_ORDER: [PlaylistFormat; 3] = [PlaylistFormat::M3u8, PlaylistFormat::ExtM3u, PlaylistFormat::M3u];

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

pub(crate) fn strip_bom(bytes: &[u8]) -> (&[u8], bool) {
    match bytes.strip_prefix(UTF8_BOM) {
        Some(rest) => (rest, true),
        None => (bytes, false),
    }
}

/// UTF-8 when the bytes are valid UTF-8, otherwise the legacy encoding.
pub(crate) fn decode_text_lenient(bytes: &[u8], legacy: &'static Encoding) -> String {
    let (bytes, _) = strip_bom(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (text, had_errors) = legacy.decode_without_bom_handling(bytes);
            if had_errors {
                tracing::debug!("replaced undecodable bytes while decoding as {}", legacy.name());
            }
            text.into_owned()
        }
    }
}

pub(crate) fn decode_text_strict(format: PlaylistFormat, bytes: &[u8]) -> Result<&str, FormatError> {
    let (bytes, _) = strip_bom(bytes);
    std::str::from_utf8(bytes).map_err(|e| FormatError::encoding(format, e))
}

/// Turn an entry location (a path or a `file://` URI) into a normalized absolute path.
pub(crate) fn resolve_location(raw: &str, base_dir: &Path) -> Result<PathBuf, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("empty location".to_string());
    }
    if let Ok(url) = Url::parse(raw) {
        // Single letter schemes are Windows drive letters.
        if url.scheme().len() > 1 {
            if url.scheme() != "file" {
                return Err(format!("unsupported location {raw}: only local files can be played"));
            }
            return url
                .to_file_path()
                .map(|p| normalize_path(&p))
                .map_err(|_| format!("invalid file URI {raw}"));
        }
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(normalize_path(&path))
    } else {
        Ok(normalize_path(&base_dir.join(path)))
    }
}

/// The `file://` URI of a path, or the plain path when it cannot be expressed as one.
pub(crate) fn location_uri(path: &Path) -> String {
    match Url::from_file_path(path) {
        Ok(url) => url.to_string(),
        Err(()) => path.to_string_lossy().into_owned(),
    }
}

/// Milliseconds from a decimal string, for formats storing durations as text.
pub(crate) fn parse_duration_ms(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    raw.parse::<u64>().ok().or_else(|| raw.parse::<f64>().ok().filter(|f| *f >= 0.0).map(|f| f as u64))
}
