//! A minimal element tree over quick-xml, shared by the XML based playlist codecs. Playlists are
//! small, so reading the whole document into a tree keeps each codec a plain tree walk.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::codecs::strip_bom;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Element {
    /// Local name, without any namespace prefix.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Element>,
    pub text: String,
    /// Line on which the start tag ends.
    pub line: usize,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text of the first child named `name`, unless it is only whitespace. Surrounding spaces are
    /// part of the value.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str()).filter(|t| !t.trim().is_empty())
    }
}

/// Parse a document and return its root element. Errors carry the line they were detected on.
pub(crate) fn parse(bytes: &[u8]) -> Result<Element, (usize, String)> {
    let (bytes, _) = strip_bom(bytes);
    let mut reader = Reader::from_reader(bytes);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut line = 1;
    let mut seen = 0;

    loop {
        let event = reader.read_event();
        let pos = (reader.buffer_position() as usize).min(bytes.len());
        if pos > seen {
            line += bytes[seen..pos].iter().filter(|b| **b == b'\n').count();
            seen = pos;
        }
        let event = event.map_err(|e| (line, e.to_string()))?;
        match event {
            Event::Start(e) => stack.push(element(&e, line).map_err(|e| (line, e))?),
            Event::Empty(e) => {
                let el = element(&e, line).map_err(|e| (line, e))?;
                attach(&mut stack, &mut root, el);
            }
            Event::End(_) => {
                if let Some(el) = stack.pop() {
                    attach(&mut stack, &mut root, el);
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| (line, e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err((line, format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| (line, "document has no root element".to_string()))
}

fn element(e: &BytesStart<'_>, line: usize) -> Result<Element, String> {
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
        attributes,
        children: Vec::new(),
        text: String::new(),
        line,
    })
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None if root.is_none() => *root = Some(el),
        None => {}
    }
}

/// The name of the root element, without parsing the rest of the document.
pub(crate) fn root_name(bytes: &[u8]) -> Option<String> {
    let (bytes, _) = strip_bom(bytes);
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(Event::Text(_)) => return None,
            Ok(_) => {}
        }
    }
}

/// An indenting document writer. Errors are rendered to strings for the codec to wrap.
pub(crate) struct XmlWriter {
    writer: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> XmlWriter {
        XmlWriter {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    pub fn event<'a>(&mut self, event: impl Into<Event<'a>>) -> Result<(), String> {
        self.writer.write_event(event).map_err(|e| e.to_string())
    }

    pub fn declaration(&mut self) -> Result<(), String> {
        self.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
    }

    pub fn start(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), String> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.event(Event::Start(start))
    }

    pub fn end(&mut self, name: &str) -> Result<(), String> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), String> {
        let mut start = BytesStart::new(name);
        for attr in attributes {
            start.push_attribute(*attr);
        }
        self.event(Event::Empty(start))
    }

    /// `<name>text</name>`
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<(), String> {
        self.start(name, &[])?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = self.writer.into_inner();
        out.push(b'\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tree() {
        let doc = b"<?xml version=\"1.0\"?>\n<a x=\"1 &amp; 2\">\n  <b>hi &lt;there&gt;</b>\n  <c/>\n</a>\n";
        let root = parse(doc).unwrap();
        assert_eq!(root.name, "a");
        assert_eq!(root.attr("x"), Some("1 & 2"));
        assert_eq!(root.child_text("b"), Some("hi <there>"));
        assert_eq!(root.child("b").unwrap().line, 3);
        assert!(root.child("c").is_some());
        assert_eq!(root_name(doc).as_deref(), Some("a"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(b"<a><b></a>").is_err());
        assert!(parse(b"<a>").is_err());
        assert!(parse(b"").is_err());
    }

    #[test]
    fn test_text_keeps_surrounding_spaces() {
        let doc = b"<a>\n  <b> padded </b>\n  <c>\n  </c>\n</a>\n";
        let root = parse(doc).unwrap();
        assert_eq!(root.child_text("b"), Some(" padded "));
        assert_eq!(root.child_text("c"), None);
        assert_eq!(root.child("b").unwrap().line, 2);
    }

    #[test]
    fn test_writer_escapes() {
        let mut w = XmlWriter::new();
        w.start("a", &[("x", "1 & 2")]).unwrap();
        w.text_element("b", "<hi>").unwrap();
        w.end("a").unwrap();
        let out = String::from_utf8(w.finish()).unwrap();
        assert!(out.contains("x=\"1 &amp; 2\""));
        assert!(out.contains("<b>&lt;hi&gt;</b>"));
        let root = parse(out.as_bytes()).unwrap();
        assert_eq!(root.child_text("b"), Some("<hi>"));
    }
}
