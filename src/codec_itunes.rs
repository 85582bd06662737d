//! iTunes XML library exports (`.xml`), an Apple property list.
//!
//! Tracks live in a `Tracks` dictionary keyed by track ID; the first entry of `Playlists` lists the
//! playlist's `Playlist Items` by track ID. A file without `Playlists` yields every track in
//! `Tracks` order.

use std::collections::HashMap;
use std::path::Path;

use quick_xml::events::{BytesText, Event};

use crate::codecs::{
    location_uri, resolve_location, DecodedPlaylist, FormatDescriptor, FormatError, PlaylistCodec, PlaylistDocument,
    PlaylistFormat, TrackRef,
};
use crate::common::VERSION;
use crate::xml::{self, Element, XmlWriter};

const FORMAT: PlaylistFormat = PlaylistFormat::ITunes;
const PLIST_DOCTYPE: &str =
    r#"plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd""#;

#[derive(Debug, Clone, PartialEq)]
enum Plist<'a> {
    Dict(Vec<(&'a str, Plist<'a>)>, usize),
    Array(Vec<Plist<'a>>),
    String(&'a str),
    Integer(i64),
    /// Dates, reals, booleans and data: nothing a playlist needs.
    Other,
}

impl<'a> Plist<'a> {
    fn from_element(el: &'a Element) -> Plist<'a> {
        match el.name.as_str() {
            "dict" => {
                let mut entries = Vec::new();
                let mut children = el.children.iter();
                while let Some(key) = children.next() {
                    if key.name != "key" {
                        continue;
                    }
                    if let Some(value) = children.next() {
                        entries.push((key.text.trim(), Plist::from_element(value)));
                    }
                }
                Plist::Dict(entries, el.line)
            }
            "array" => Plist::Array(el.children.iter().map(Plist::from_element).collect()),
            "string" => Plist::String(&el.text),
            "integer" => el.text.trim().parse().map(Plist::Integer).unwrap_or(Plist::Other),
            _ => Plist::Other,
        }
    }

    fn get(&self, key: &str) -> Option<&Plist<'a>> {
        match self {
            Plist::Dict(entries, _) => entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    fn as_str(&self) -> Option<&'a str> {
        match self {
            Plist::String(s) => Some(*s),
            _ => None,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Plist::Integer(i) => Some(*i),
            _ => None,
        }
    }

    fn line(&self) -> usize {
        match self {
            Plist::Dict(_, line) => *line,
            _ => 0,
        }
    }
}

pub struct ITunesCodec;

impl PlaylistCodec for ITunesCodec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        FORMAT.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        let root = xml::parse(bytes).map_err(|(line, reason)| FormatError::malformed(FORMAT, line, reason))?;
        if root.name != "plist" {
            return Err(FormatError::malformed(FORMAT, root.line, format!("expected <plist>, found <{}>", root.name)));
        }
        let top = root
            .child("dict")
            .map(Plist::from_element)
            .ok_or_else(|| FormatError::malformed(FORMAT, root.line, "plist has no top-level dict"))?;

        let mut decoded = DecodedPlaylist::default();
        let mut order = Vec::new();
        let mut tracks: HashMap<i64, TrackRef> = HashMap::new();
        if let Some(Plist::Dict(entries, _)) = top.get("Tracks") {
            for (key, track) in entries {
                let Some(id) = track.get("Track ID").and_then(Plist::as_int).or_else(|| key.parse().ok()) else {
                    decoded.warn(track.line(), format!("track {key} has no Track ID"));
                    continue;
                };
                let Some(location) = track.get("Location").and_then(Plist::as_str) else {
                    decoded.warn(track.line(), format!("track {id} has no Location"));
                    continue;
                };
                match resolve_location(location, base_dir) {
                    Ok(path) => {
                        let duration_ms = track
                            .get("Total Time")
                            .and_then(Plist::as_int)
                            .and_then(|ms| u64::try_from(ms).ok());
                        let text = |k: &str| {
                            track
                                .get(k)
                                .and_then(Plist::as_str)
                                .filter(|s| !s.trim().is_empty())
                                .map(str::to_string)
                        };
                        tracks.insert(
                            id,
                            TrackRef {
                                path,
                                title: text("Name"),
                                artist: text("Artist"),
                                duration_ms,
                            },
                        );
                        order.push(id);
                    }
                    Err(reason) => decoded.warn(track.line(), reason),
                }
            }
        }

        let playlist = match top.get("Playlists") {
            Some(Plist::Array(playlists)) => playlists.first(),
            _ => None,
        };
        match playlist {
            Some(playlist) => {
                decoded.name = playlist
                    .get("Name")
                    .and_then(Plist::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string);
                if let Some(Plist::Array(items)) = playlist.get("Playlist Items") {
                    for item in items {
                        let id = item.get("Track ID").and_then(Plist::as_int);
                        match id.and_then(|id| tracks.get(&id)) {
                            Some(track) => decoded.tracks.push(track.clone()),
                            None => decoded.warn(item.line(), format!("playlist item refers to unknown track {id:?}")),
                        }
                    }
                }
            }
            None => decoded.tracks = order.iter().filter_map(|id| tracks.get(id).cloned()).collect(),
        }
        Ok(decoded)
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        write(document).map_err(|e| FormatError::io(FORMAT, e))
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        xml::root_name(bytes).as_deref() == Some("plist")
    }
}

fn key_value(w: &mut XmlWriter, key: &str, kind: &str, value: &str) -> Result<(), String> {
    w.text_element("key", key)?;
    w.text_element(kind, value)
}

fn write(document: &PlaylistDocument) -> Result<Vec<u8>, String> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.event(Event::DocType(BytesText::from_escaped(PLIST_DOCTYPE)))?;
    w.start("plist", &[("version", "1.0")])?;
    w.start("dict", &[])?;
    key_value(&mut w, "Major Version", "integer", "1")?;
    key_value(&mut w, "Minor Version", "integer", "1")?;
    key_value(&mut w, "Application Version", "string", &format!("mu-core {VERSION}"))?;

    // Each entry gets its own track ID, so repeated paths keep their positions.
    w.text_element("key", "Tracks")?;
    w.start("dict", &[])?;
    for (i, track) in document.tracks.iter().enumerate() {
        let id = (i + 1).to_string();
        w.text_element("key", &id)?;
        w.start("dict", &[])?;
        key_value(&mut w, "Track ID", "integer", &id)?;
        if let Some(title) = &track.title {
            key_value(&mut w, "Name", "string", title)?;
        }
        if let Some(artist) = &track.artist {
            key_value(&mut w, "Artist", "string", artist)?;
        }
        if let Some(duration) = track.duration_ms {
            key_value(&mut w, "Total Time", "integer", &duration.to_string())?;
        }
        key_value(&mut w, "Location", "string", &location_uri(&track.path))?;
        w.end("dict")?;
    }
    w.end("dict")?;

    w.text_element("key", "Playlists")?;
    w.start("array", &[])?;
    w.start("dict", &[])?;
    key_value(&mut w, "Name", "string", &document.name)?;
    w.text_element("key", "Playlist Items")?;
    w.start("array", &[])?;
    for i in 0..document.tracks.len() {
        w.start("dict", &[])?;
        key_value(&mut w, "Track ID", "integer", &(i + 1).to_string())?;
        w.end("dict")?;
    }
    w.end("array")?;
    w.end("dict")?;
    w.end("array")?;

    w.end("dict")?;
    w.end("plist")?;
    Ok(w.finish())
}
