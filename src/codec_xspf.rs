//! XML Shareable Playlist Format (`.xspf`).
//!
//! ```xml
//! <playlist version="1" xmlns="http://xspf.org/ns/0/">
//!   <title>Road Trip</title>
//!   <trackList>
//!     <track>
//!       <location>file:///music/a.flac</location>
//!       <title>A</title><creator>B</creator><duration>183000</duration>
//!     </track>
//!   </trackList>
//! </playlist>
//! ```

use std::path::Path;

use crate::codecs::{
    location_uri, parse_duration_ms, resolve_location, DecodedPlaylist, FormatDescriptor, FormatError, PlaylistCodec,
    PlaylistDocument, PlaylistFormat, TrackRef,
};
use crate::xml::{self, XmlWriter};

const FORMAT: PlaylistFormat = PlaylistFormat::Xspf;
const XSPF_NAMESPACE: &str = "http://xspf.org/ns/0/";

pub struct XspfCodec;

impl PlaylistCodec for XspfCodec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        FORMAT.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        let root = xml::parse(bytes).map_err(|(line, reason)| FormatError::malformed(FORMAT, line, reason))?;
        if root.name != "playlist" {
            return Err(FormatError::malformed(
                FORMAT,
                root.line,
                format!("expected <playlist>, found <{}>", root.name),
            ));
        }

        let mut decoded = DecodedPlaylist {
            name: root.child_text("title").map(str::to_string),
            ..DecodedPlaylist::default()
        };
        let Some(track_list) = root.child("trackList") else {
            return Ok(decoded);
        };
        for track in track_list.children_named("track") {
            let Some(location) = track.child_text("location") else {
                decoded.warn(track.line, "track without location");
                continue;
            };
            let path = match resolve_location(location, base_dir) {
                Ok(path) => path,
                Err(reason) => {
                    decoded.warn(track.line, reason);
                    continue;
                }
            };
            let duration_ms = match track.child_text("duration") {
                Some(raw) => {
                    let parsed = parse_duration_ms(raw);
                    if parsed.is_none() {
                        decoded.warn(track.line, format!("ignoring invalid duration {raw}"));
                    }
                    parsed
                }
                None => None,
            };
            decoded.tracks.push(TrackRef {
                path,
                title: track.child_text("title").map(str::to_string),
                artist: track.child_text("creator").map(str::to_string),
                duration_ms,
            });
        }
        Ok(decoded)
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        write(document).map_err(|e| FormatError::io(FORMAT, e))
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        xml::root_name(bytes).as_deref() == Some("playlist")
    }
}

fn write(document: &PlaylistDocument) -> Result<Vec<u8>, String> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.start("playlist", &[("version", "1"), ("xmlns", XSPF_NAMESPACE)])?;
    if !document.name.is_empty() {
        w.text_element("title", &document.name)?;
    }
    w.start("trackList", &[])?;
    for track in &document.tracks {
        w.start("track", &[])?;
        w.text_element("location", &location_uri(&track.path))?;
        if let Some(title) = &track.title {
            w.text_element("title", title)?;
        }
        if let Some(artist) = &track.artist {
            w.text_element("creator", artist)?;
        }
        if let Some(duration) = track.duration_ms {
            w.text_element("duration", &duration.to_string())?;
        }
        w.end("track")?;
    }
    w.end("trackList")?;
    w.end("playlist")?;
    Ok(w.finish())
}
