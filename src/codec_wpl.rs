//! Windows Media Player playlists (`.wpl`): a SMIL document listing `media` sources.
//!
//! ```xml
//! <?wpl version="1.0"?>
//! <smil>
//!   <head><title>Road Trip</title></head>
//!   <body><seq><media src="/music/a.flac"/></seq></body>
//! </smil>
//! ```

use std::path::Path;

use quick_xml::events::{BytesPI, Event};

use crate::codecs::{
    resolve_location, DecodedPlaylist, FormatDescriptor, FormatError, PlaylistCodec, PlaylistDocument, PlaylistFormat,
    TrackRef,
};
use crate::common::VERSION;
use crate::xml::{self, XmlWriter};

const FORMAT: PlaylistFormat = PlaylistFormat::Wpl;

pub struct WplCodec;

impl PlaylistCodec for WplCodec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        FORMAT.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        let root = xml::parse(bytes).map_err(|(line, reason)| FormatError::malformed(FORMAT, line, reason))?;
        if root.name != "smil" {
            return Err(FormatError::malformed(FORMAT, root.line, format!("expected <smil>, found <{}>", root.name)));
        }

        let mut decoded = DecodedPlaylist {
            name: root.child("head").and_then(|h| h.child_text("title")).map(str::to_string),
            ..DecodedPlaylist::default()
        };
        let Some(seq) = root.child("body").and_then(|b| b.child("seq")) else {
            return Ok(decoded);
        };
        for media in seq.children_named("media") {
            match media.attr("src").map(|src| resolve_location(src, base_dir)) {
                Some(Ok(path)) => decoded.tracks.push(TrackRef::new(path)),
                Some(Err(reason)) => decoded.warn(media.line, reason),
                None => decoded.warn(media.line, "media element without src"),
            }
        }
        Ok(decoded)
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        write(document).map_err(|e| FormatError::io(FORMAT, e))
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        xml::root_name(bytes).as_deref() == Some("smil")
    }
}

fn write(document: &PlaylistDocument) -> Result<Vec<u8>, String> {
    let generator = format!("mu-core -- {VERSION}");
    let mut w = XmlWriter::new();
    w.event(Event::PI(BytesPI::new("wpl version=\"1.0\"")))?;
    w.start("smil", &[])?;
    w.start("head", &[])?;
    let item_count = document.tracks.len().to_string();
    w.empty("meta", &[("name", "Generator"), ("content", generator.as_str())])?;
    w.empty("meta", &[("name", "ItemCount"), ("content", item_count.as_str())])?;
    w.text_element("title", &document.name)?;
    w.end("head")?;
    w.start("body", &[])?;
    w.start("seq", &[])?;
    for track in &document.tracks {
        let src = track.path.to_string_lossy();
        w.empty("media", &[("src", src.as_ref())])?;
    }
    w.end("seq")?;
    w.end("body")?;
    w.end("smil")?;
    Ok(w.finish())
}
