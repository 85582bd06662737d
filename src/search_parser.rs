//! The search_parser module parses search queries into predicate trees.
//!
//! A query is a sequence of whitespace-separated terms, all of which must match:
//!
//! - `field:value` matches one field. Field names are case-insensitive and ignore spaces,
//!   underscores and hyphens, so `File Name`, `file_name` and `filename` are the same field.
//! - A bare term is free text and matches title, artist, album, genre and path.
//! - Double quotes group words into a single value (`artist:"No Artist"`); `\"` and `\\` escape
//!   inside quotes. A quoted field name (`"file name":intro`) is accepted too.
//!
//! Only conjunction is supported. New operators belong in `Predicate`.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;

use crate::common::fold;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSyntaxError {
    pub query: String,
    /// Character (not byte) index of the offending position.
    pub index: usize,
    pub feedback: String,
}

impl fmt::Display for SearchSyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to parse search query, invalid syntax:\n\n    {}\n    {}^\n    {}{}",
            self.query,
            " ".repeat(self.index),
            " ".repeat(self.index),
            self.feedback
        )
    }
}

impl std::error::Error for SearchSyntaxError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Path,
    FileName,
    Title,
    Artist,
    Album,
    AlbumArtist,
    Composer,
    Genre,
    Comment,
    Kind,
    TrackNumber,
    TrackCount,
    DiscNumber,
    DiscCount,
    Year,
    Rating,
    Plays,
    BitRate,
    SampleRate,
    Size,
    /// Whole seconds.
    Duration,
}

impl Field {
    pub const ALL: [Field; 21] = [
        Field::Path,
        Field::FileName,
        Field::Title,
        Field::Artist,
        Field::Album,
        Field::AlbumArtist,
        Field::Composer,
        Field::Genre,
        Field::Comment,
        Field::Kind,
        Field::TrackNumber,
        Field::TrackCount,
        Field::DiscNumber,
        Field::DiscCount,
        Field::Year,
        Field::Rating,
        Field::Plays,
        Field::BitRate,
        Field::SampleRate,
        Field::Size,
        Field::Duration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Path => "path",
            Field::FileName => "filename",
            Field::Title => "title",
            Field::Artist => "artist",
            Field::Album => "album",
            Field::AlbumArtist => "albumartist",
            Field::Composer => "composer",
            Field::Genre => "genre",
            Field::Comment => "comment",
            Field::Kind => "kind",
            Field::TrackNumber => "track",
            Field::TrackCount => "trackcount",
            Field::DiscNumber => "disc",
            Field::DiscCount => "disccount",
            Field::Year => "year",
            Field::Rating => "rating",
            Field::Plays => "plays",
            Field::BitRate => "bitrate",
            Field::SampleRate => "samplerate",
            Field::Size => "size",
            Field::Duration => "duration",
        }
    }

    /// The label shown next to search results, e.g. "File Name".
    pub fn label(&self) -> &'static str {
        match self {
            Field::Path => "Path",
            Field::FileName => "File Name",
            Field::Title => "Name",
            Field::Artist => "Artist",
            Field::Album => "Album",
            Field::AlbumArtist => "Album Artist",
            Field::Composer => "Composer",
            Field::Genre => "Genre",
            Field::Comment => "Comments",
            Field::Kind => "Kind",
            Field::TrackNumber => "Track Number",
            Field::TrackCount => "Track Count",
            Field::DiscNumber => "Disc Number",
            Field::DiscCount => "Disc Count",
            Field::Year => "Year",
            Field::Rating => "Rating",
            Field::Plays => "Plays",
            Field::BitRate => "Bit Rate",
            Field::SampleRate => "Sample Rate",
            Field::Size => "Size",
            Field::Duration => "Time",
        }
    }

    /// Numeric fields match by exact value; all others by substring.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Field::TrackNumber
                | Field::TrackCount
                | Field::DiscNumber
                | Field::DiscCount
                | Field::Year
                | Field::Rating
                | Field::Plays
                | Field::BitRate
                | Field::SampleRate
                | Field::Size
                | Field::Duration
        )
    }

    /// Look a field up by any of its accepted spellings.
    pub fn lookup(name: &str) -> Option<Field> {
        FIELD_NAMES.get(&normalize_field_name(name)).copied()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn normalize_field_name(name: &str) -> String {
    name.chars().filter(|c| !matches!(c, ' ' | '_' | '-')).flat_map(char::to_lowercase).collect()
}

/// Every accepted field spelling, after normalization, mapped to its field.
static FIELD_NAMES: Lazy<HashMap<String, Field>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for field in Field::ALL {
        map.insert(field.as_str().to_string(), field);
        map.insert(normalize_field_name(field.label()), field);
    }
    let aliases = [
        ("tracknumber", Field::TrackNumber),
        ("discnumber", Field::DiscNumber),
        ("comments", Field::Comment),
        ("playcount", Field::Plays),
        ("filesize", Field::Size),
        ("length", Field::Duration),
    ];
    for (alias, field) in aliases {
        map.insert(alias.to_string(), field);
    }
    map
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Case-folded needle.
    Text(String),
    Number(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Field { field: Field, value: FieldValue },
    /// Case-folded needle matched against title, artist, album, genre and path.
    FreeText(String),
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Field {
                field,
                value: FieldValue::Text(t),
            } => write!(f, "{}:{}", field, quote(t)),
            Predicate::Field {
                field,
                value: FieldValue::Number(n),
            } => write!(f, "{field}:{n}"),
            Predicate::FreeText(t) => write!(f, "{}", quote(t)),
        }
    }
}

/// A parsed query: the conjunction of its terms. An empty tree matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PredicateTree {
    pub terms: Vec<Predicate>,
}

impl PredicateTree {
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl fmt::Display for PredicateTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.terms.iter().map(|t| t.to_string()).collect();
        write!(f, "{}", terms.join(" "))
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty() && !s.chars().any(|c| c.is_whitespace() || c == '"' || c == ':' || c == '\\') {
        return s.to_string();
    }
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Parse a search query.
pub fn parse(query: &str) -> Result<PredicateTree, SearchSyntaxError> {
    let chars: Vec<char> = query.chars().collect();
    let err = |index: usize, feedback: String| SearchSyntaxError {
        query: query.to_string(),
        index,
        feedback,
    };

    let mut terms = Vec::new();
    let mut idx = 0;
    loop {
        while idx < chars.len() && chars[idx].is_whitespace() {
            idx += 1;
        }
        if idx >= chars.len() {
            break;
        }

        let start = idx;
        let (head, quoted, fwd) = take_segment(&chars[idx..], true).map_err(|feedback| err(start, feedback))?;
        idx += fwd;

        if idx < chars.len() && chars[idx] == ':' {
            let field = Field::lookup(&head).ok_or_else(|| {
                let names: Vec<&str> = Field::ALL.iter().map(|f| f.as_str()).collect();
                err(start, format!("Unknown field {head}: must be one of {{{}}}.", names.join(", ")))
            })?;
            idx += 1;
            let value_start = idx;
            if idx >= chars.len() || chars[idx].is_whitespace() {
                return Err(err(value_start, format!("Empty value: {field} must be followed by a value.")));
            }
            let (value, _, fwd) = take_segment(&chars[idx..], false).map_err(|feedback| err(value_start, feedback))?;
            idx += fwd;
            if value.is_empty() {
                return Err(err(value_start, format!("Empty value: {field} must be followed by a value.")));
            }
            terms.push(field_predicate(field, &value).map_err(|feedback| err(value_start, feedback))?);
        } else {
            if head.is_empty() {
                return Err(err(start, "Empty search term: remove the empty quotes.".to_string()));
            }
            if quoted && idx < chars.len() && !chars[idx].is_whitespace() {
                return Err(err(idx, "Expected whitespace after closing quote.".to_string()));
            }
            terms.push(Predicate::FreeText(fold(&head)));
        }

        if idx < chars.len() && !chars[idx].is_whitespace() {
            return Err(err(idx, "Expected whitespace after closing quote.".to_string()));
        }
    }

    let tree = PredicateTree { terms };
    tracing::debug!("parsed search query {:?} as {:?}", query, tree);
    Ok(tree)
}

fn field_predicate(field: Field, value: &str) -> Result<Predicate, String> {
    let value = if field.is_numeric() {
        let n = value
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("Invalid value for {field}: must be a whole number."))?;
        FieldValue::Number(n)
    } else {
        FieldValue::Text(fold(value))
    };
    Ok(Predicate::Field { field, value })
}

/// Take one segment: a quoted string, or a run of characters up to whitespace (and, for a term
/// head, up to the first colon). Returns the unescaped text, whether it was quoted, and the number
/// of characters consumed.
fn take_segment(x: &[char], stop_at_colon: bool) -> Result<(String, bool, usize), String> {
    if x.first() == Some(&'"') {
        let mut out = String::new();
        let mut i = 1;
        while i < x.len() {
            match x[i] {
                '\\' if i + 1 < x.len() && matches!(x[i + 1], '"' | '\\') => {
                    out.push(x[i + 1]);
                    i += 2;
                }
                '"' => return Ok((out, true, i + 1)),
                c => {
                    out.push(c);
                    i += 1;
                }
            }
        }
        return Err("Unterminated quote: add a closing \" to the end of this term.".to_string());
    }

    let mut i = 0;
    while i < x.len() && !x[i].is_whitespace() && !(stop_at_colon && x[i] == ':') {
        i += 1;
    }
    Ok((x[..i].iter().collect(), false, i))
}
