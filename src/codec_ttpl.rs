//! TTPlayer playlists (`.ttpl`).
//!
//! ```xml
//! <ttplaylist>
//!   <info name="Road Trip"/>
//!   <items>
//!     <item file="/music/a.flac" title="A" artist="B" duration="183000"/>
//!   </items>
//! </ttplaylist>
//! ```
//!
//! Durations are milliseconds. Everything but `file` is optional.

use std::path::Path;

use crate::codecs::{
    parse_duration_ms, resolve_location, DecodedPlaylist, FormatDescriptor, FormatError, PlaylistCodec,
    PlaylistDocument, PlaylistFormat, TrackRef,
};
use crate::xml::{self, XmlWriter};

const FORMAT: PlaylistFormat = PlaylistFormat::Ttpl;

pub struct TtplCodec;

impl PlaylistCodec for TtplCodec {
    fn descriptor(&self) -> &'static FormatDescriptor {
        FORMAT.descriptor()
    }

    fn decode(&self, bytes: &[u8], base_dir: &Path) -> Result<DecodedPlaylist, FormatError> {
        let root = xml::parse(bytes).map_err(|(line, reason)| FormatError::malformed(FORMAT, line, reason))?;
        if root.name != "ttplaylist" {
            return Err(FormatError::malformed(
                FORMAT,
                root.line,
                format!("expected <ttplaylist>, found <{}>", root.name),
            ));
        }

        let mut decoded = DecodedPlaylist {
            name: root
                .child("info")
                .and_then(|i| i.attr("name"))
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            ..DecodedPlaylist::default()
        };
        let Some(items) = root.child("items") else {
            return Ok(decoded);
        };
        for item in items.children_named("item") {
            let path = match item.attr("file").map(|f| resolve_location(f, base_dir)) {
                Some(Ok(path)) => path,
                Some(Err(reason)) => {
                    decoded.warn(item.line, reason);
                    continue;
                }
                None => {
                    decoded.warn(item.line, "item without file");
                    continue;
                }
            };
            let attr = |name: &str| item.attr(name).filter(|v| !v.is_empty()).map(str::to_string);
            decoded.tracks.push(TrackRef {
                path,
                title: attr("title"),
                artist: attr("artist"),
                duration_ms: item.attr("duration").and_then(parse_duration_ms),
            });
        }
        Ok(decoded)
    }

    fn encode(&self, document: &PlaylistDocument) -> Result<Vec<u8>, FormatError> {
        write(document).map_err(|e| FormatError::io(FORMAT, e))
    }

    fn sniff(&self, bytes: &[u8]) -> bool {
        xml::root_name(bytes).as_deref() == Some("ttplaylist")
    }
}

fn write(document: &PlaylistDocument) -> Result<Vec<u8>, String> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.start("ttplaylist", &[])?;
    w.empty("info", &[("name", document.name.as_str())])?;
    w.start("items", &[])?;
    for track in &document.tracks {
        let file = track.path.to_string_lossy();
        let duration = track.duration_ms.map(|d| d.to_string());
        let mut attributes = vec![("file", file.as_ref())];
        if let Some(title) = &track.title {
            attributes.push(("title", title.as_str()));
        }
        if let Some(artist) = &track.artist {
            attributes.push(("artist", artist.as_str()));
        }
        if let Some(duration) = &duration {
            attributes.push(("duration", duration.as_str()));
        }
        w.empty("item", &attributes)?;
    }
    w.end("items")?;
    w.end("ttplaylist")?;
    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_decode() {
        let doc = br#"<ttplaylist>
  <info name="Late Night"/>
  <items>
    <item file="/music/a.mp3" title="A &amp; B" duration="1000"/>
    <item title="orphan"/>
    <item file="b.mp3" duration="x"/>
  </items>
</ttplaylist>"#;
        let decoded = TtplCodec.decode(doc, Path::new("/lists")).unwrap();
        assert_eq!(decoded.name.as_deref(), Some("Late Night"));
        assert_eq!(
            decoded.tracks,
            vec![
                TrackRef {
                    path: PathBuf::from("/music/a.mp3"),
                    title: Some("A & B".to_string()),
                    artist: None,
                    duration_ms: Some(1000),
                },
                TrackRef::new("/lists/b.mp3"),
            ]
        );
        assert_eq!(decoded.warnings.len(), 1);
        assert_eq!(decoded.warnings[0].line, 5);
    }
}
