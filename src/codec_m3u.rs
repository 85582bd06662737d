//! The M3U family: plain M3U, Extended M3U and M3U8.
//!
//! Plain M3U is one location per line with `#` comments. Extended M3U adds a `#EXTM3U` header,
//! an optional `#PLAYLIST:<name>` directive and `#EXTINF:<seconds>,<artist> - <title>` before each
//! location, followed by `#EXTART:<artist>` when the entry has an artist. Seconds may be
//! fractional. M3U8 is Extended M3U in mandatory UTF-8, written with a BOM.

use std::path::Path;

use encoding_rs::Encoding;

use crate::codecs::{
    decode_text_lenient, decode_text_strict, resolve_location, strip_bom, DecodedPlaylist, FormatDescriptor, FormatError,
    PlaylistCodec, PlaylistDocument, PlaylistFormat, TrackRef, UTF8_BOM,
};

const EXTM3U: &str = "#EXTM3U";
const EXTINF: &str = "#EXTINF:";
const EXTART: &str = "#EXTART:";
const PLAYLIST: &str = "#PLAYLIST:";
const SEPARATOR: &str = " - ";

pub struct M3uCodec {
    legacy: &'static Encoding,
}

impl M3uCodec {
    pub fn new(legacy: &'static Encoding) -> M3uCodec {
        M3uCodec { legacy }
    }
}

impl PlaylistCodec for M3uCodec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        PlaylistFormat::M3u.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        Ok(decode_lines(&decode_text_lenient(bytes, self.legacy), base_dir, false))
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        let mut out = String::new();
        for track in &document.tracks {
            out.push_str(&track.path.to_string_lossy());
            out.push('\n');
        }
        Ok(out.into_bytes())
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        if bytes.contains(&0) {
            return false;
        }
        let (bytes, _) = strip_bom(bytes);
        let head = String::from_utf8_lossy(&bytes[..bytes.len().min(64)]);
        !matches!(head.trim_start().chars().next(), Some('<') | Some('{'))
    }
}

pub struct ExtM3uCodec {
    legacy: &'static Encoding,
}

impl ExtM3uCodec {
    pub fn new(legacy: &'static Encoding) -> ExtM3uCodec {
        ExtM3uCodec { legacy }
    }
}

impl PlaylistCodec for ExtM3uCodec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        PlaylistFormat::ExtM3u.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        Ok(decode_lines(&decode_text_lenient(bytes, self.legacy), base_dir, true))
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        Ok(encode_extended(document).into_bytes())
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        let (bytes, _) = strip_bom(bytes);
        String::from_utf8_lossy(&bytes[..bytes.len().min(64)]).trim_start().starts_with(EXTM3U)
    }
}

pub struct M3u8Codec;

impl PlaylistCodec for M3u8Codec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        PlaylistFormat::M3u8.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        let text = decode_text_strict(PlaylistFormat::M3u8, bytes)?;
        Ok(decode_lines(text, base_dir, true))
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        let mut out = UTF8_BOM.to_vec();
        out.extend_from_slice(encode_extended(document).as_bytes());
        Ok(out)
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        bytes.starts_with(UTF8_BOM)
    }
}

fn encode_extended(document: &PlaylistDocument) -> String {
    let mut out = String::new();
    out.push_str(EXTM3U);
    out.push('\n');
    if !document.name.is_empty() {
        out.push_str(&format!("{PLAYLIST}{}\n", single_line(&document.name)));
    }
    for track in &document.tracks {
        if track.has_metadata() {
            let seconds = track.duration_ms.map(format_seconds).unwrap_or_else(|| "-1".to_string());
            out.push_str(&format!("{EXTINF}{seconds},{}\n", extinf_display(track)));
            if let Some(artist) = &track.artist {
                out.push_str(&format!("{EXTART}{}\n", single_line(artist)));
            }
        }
        out.push_str(&track.path.to_string_lossy());
        out.push('\n');
    }
    out
}

/// Whole seconds, or seconds with millisecond precision: `183`, `183.500`.
fn format_seconds(ms: u64) -> String {
    match ms % 1000 {
        0 => (ms / 1000).to_string(),
        frac => format!("{}.{frac:03}", ms / 1000),
    }
}

/// The `<artist> - <title>` part of an `#EXTINF` line. Without an artist, a title containing
/// " - " gets an empty artist in front so that it is not split when read back.
fn extinf_display(track: &TrackRef) -> String {
    let artist = track.artist.as_deref().map(single_line);
    let title = track.title.as_deref().map(single_line);
    match (artist, title) {
        (Some(a), Some(t)) => format!("{a} - {t}"),
        (Some(_), None) => String::new(),
        (None, Some(t)) if t.contains(SEPARATOR) => format!("{SEPARATOR}{t}"),
        (None, Some(t)) => t,
        (None, None) => String::new(),
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

fn nonblank(s: &str) -> Option<String> {
    Some(s.to_string()).filter(|s| !s.trim().is_empty())
}

/// Directives collected for the next location line.
#[derive(Debug, Default, PartialEq, Eq)]
struct ExtInf {
    duration_ms: Option<u64>,
    display: String,
    /// From `#EXTART`.
    artist: Option<String>,
}

impl ExtInf {
    /// Split the display into artist and title. An `#EXTART` artist takes precedence and is
    /// stripped from the front of the display.
    fn artist_and_title(&self) -> (Option<String>, Option<String>) {
        if let Some(artist) = &self.artist {
            let prefix = format!("{artist}{SEPARATOR}");
            let title = self.display.strip_prefix(prefix.as_str()).unwrap_or(&self.display);
            return (nonblank(artist), nonblank(title));
        }
        match self.display.split_once(SEPARATOR) {
            Some((a, t)) => (nonblank(a), nonblank(t)),
            None => (None, nonblank(&self.display)),
        }
    }
}

fn parse_extinf(rest: &str) -> Option<ExtInf> {
    let (duration, display) = rest.split_once(',')?;
    // Attributes such as tvg-id may follow the duration.
    let seconds: f64 = duration.split_whitespace().next()?.parse().ok()?;
    if !seconds.is_finite() {
        return None;
    }
    Some(ExtInf {
        duration_ms: (seconds >= 0.0).then(|| (seconds * 1000.0).round() as u64),
        display: display.to_string(),
        artist: None,
    })
}

fn decode_lines(text: &str, base_dir: &Path, extended: bool) -> DecodedPlaylist {
    let mut decoded = DecodedPlaylist::default();
    let mut pending: Option<ExtInf> = None;
    for (i, raw) in text.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.trim_start();
        if line.starts_with('#') {
            if !extended {
                continue;
            }
            // Directive values keep their spaces.
            let line = line.trim_end_matches('\r');
            if let Some(rest) = line.strip_prefix(EXTINF) {
                pending = parse_extinf(rest);
                if pending.is_none() {
                    decoded.warn(lineno, format!("malformed #EXTINF directive: {line}"));
                }
            } else if let Some(artist) = line.strip_prefix(EXTART) {
                pending.get_or_insert_with(ExtInf::default).artist = Some(artist.to_string());
            } else if let Some(name) = line.strip_prefix(PLAYLIST) {
                decoded.name = Some(name.trim().to_string()).filter(|n| !n.is_empty());
            }
            continue;
        }
        let line = line.trim_end_matches(['\r', ' ', '\t']);
        if line.is_empty() {
            continue;
        }
        match resolve_location(line, base_dir) {
            Ok(path) => {
                let info = pending.take().unwrap_or_default();
                let (artist, title) = info.artist_and_title();
                decoded.tracks.push(TrackRef {
                    path,
                    title,
                    artist,
                    duration_ms: info.duration_ms,
                });
            }
            Err(reason) => {
                pending = None;
                decoded.warn(lineno, reason);
            }
        }
    }
    decoded
}
