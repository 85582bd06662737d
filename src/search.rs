//! The search module evaluates parsed queries against library snapshots.
//!
//! `Searcher` implements last-query-wins: every prepared job takes a generation number, and a job
//! delivers its results only while its generation is still the latest. Superseding a job and
//! delivering its results both happen under the same lock, so once `prepare` returns, no older job
//! can deliver.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::captions::{CaptionTable, Noun};
use crate::common::fold;
use crate::library::Library;
use crate::search_parser::{parse, Field, FieldValue, Predicate, PredicateTree, SearchSyntaxError};
use crate::songs::SongRecord;

/// Records evaluated between two staleness checks.
const CHECK_INTERVAL: usize = 256;

const FREE_TEXT_FIELDS: [Field; 5] = [Field::Title, Field::Artist, Field::Album, Field::Genre, Field::Path];

/// The text of a field as matched by the search engine. Artist, album and genre use their
/// fallback values so that `artist:"No Artist"` finds untagged songs.
pub fn field_text(record: &SongRecord, field: Field) -> Option<Cow<'_, str>> {
    Some(match field {
        Field::Path => record.path.to_string_lossy(),
        Field::FileName => Cow::Owned(record.file_name()),
        Field::Title => Cow::Owned(record.display_title()),
        Field::Artist => Cow::Borrowed(record.artist_key()),
        Field::Album => Cow::Borrowed(record.album_key()),
        Field::AlbumArtist => Cow::Borrowed(record.album_artist.as_str()),
        Field::Composer => Cow::Borrowed(record.composer.as_str()),
        Field::Genre => Cow::Borrowed(record.genre_key()),
        Field::Comment => Cow::Borrowed(record.comment.as_str()),
        Field::Kind => Cow::Borrowed(record.kind()),
        _ => return None,
    })
}

pub fn field_number(record: &SongRecord, field: Field) -> Option<u64> {
    Some(match field {
        Field::TrackNumber => record.track_number.into(),
        Field::TrackCount => record.track_count.into(),
        Field::DiscNumber => record.disc_number.into(),
        Field::DiscCount => record.disc_count.into(),
        Field::Year => record.year?.into(),
        Field::Rating => record.rating.into(),
        Field::Plays => record.play_count.into(),
        Field::BitRate => record.bit_rate.into(),
        Field::SampleRate => record.sample_rate.into(),
        Field::Size => record.file_size,
        Field::Duration => record.duration_seconds(),
        _ => return None,
    })
}

fn contains_folded(record: &SongRecord, field: Field, needle: &str) -> bool {
    field_text(record, field).is_some_and(|t| fold(&t).contains(needle))
}

/// Free text looks at the tags as stored, so fallback values like "No Album" are not matched.
fn free_text_contains(record: &SongRecord, field: Field, needle: &str) -> bool {
    let text = match field {
        Field::Title => Cow::Borrowed(record.title.as_str()),
        Field::Artist => Cow::Borrowed(record.artist.as_str()),
        Field::Album => Cow::Borrowed(record.album.as_str()),
        Field::Genre => Cow::Borrowed(record.genre.as_str()),
        _ => match field_text(record, field) {
            Some(text) => text,
            None => return false,
        },
    };
    fold(&text).contains(needle)
}

impl Predicate {
    pub fn matches(&self, record: &SongRecord) -> bool {
        match self {
            Predicate::Field {
                field,
                value: FieldValue::Text(needle),
            } => contains_folded(record, *field, needle),
            Predicate::Field {
                field,
                value: FieldValue::Number(n),
            } => field_number(record, *field) == Some(*n),
            Predicate::FreeText(needle) => FREE_TEXT_FIELDS.iter().any(|f| free_text_contains(record, *f, needle)),
        }
    }
}

impl PredicateTree {
    pub fn matches(&self, record: &SongRecord) -> bool {
        self.terms.iter().all(|t| t.matches(record))
    }

    /// Lazily filter `source`. Evaluating the same tree again over a fresh iterator starts over.
    pub fn evaluate<'a, I>(&'a self, source: I) -> impl Iterator<Item = I::Item> + 'a
    where
        I: IntoIterator + 'a,
        I::IntoIter: 'a,
        I::Item: AsRef<SongRecord>,
    {
        source.into_iter().filter(move |r| self.matches(r.as_ref()))
    }
}

/// Results of a search job that was still current when it finished.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub generation: u64,
    pub query: String,
    /// Snapshot version the results were computed against.
    pub version: u64,
    pub records: Vec<Arc<SongRecord>>,
}

impl SearchResults {
    /// e.g. "12 results."
    pub fn caption(&self, captions: &CaptionTable) -> String {
        captions.count(Noun::Result, self.records.len() as u64)
    }
}

#[derive(Debug, Default)]
struct SearchState {
    generation: AtomicU64,
    delivery: Mutex<()>,
}

impl SearchState {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::Acquire) == generation
    }

    fn supersede(&self) -> u64 {
        let _guard = self.delivery.lock();
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

pub struct Searcher {
    library: Arc<Library>,
    state: Arc<SearchState>,
    tx: Sender<SearchResults>,
    rx: Receiver<SearchResults>,
}

impl Searcher {
    pub fn new(library: Arc<Library>) -> Searcher {
        let (tx, rx) = unbounded();
        Searcher {
            library,
            state: Arc::new(SearchState::default()),
            tx,
            rx,
        }
    }

    /// The channel on which current jobs deliver their results.
    pub fn results(&self) -> Receiver<SearchResults> {
        self.rx.clone()
    }

    /// Evaluate `query` against the current snapshot synchronously. Does not affect prepared jobs.
    pub fn search(&self, query: &str) -> Result<Vec<Arc<SongRecord>>, SearchSyntaxError> {
        let tree = parse(query)?;
        let snapshot = self.library.snapshot();
        Ok(tree.evaluate(snapshot.records()).cloned().collect())
    }

    /// Prepare a job for `query`, superseding every job prepared before it. A query that fails to
    /// parse still supersedes older jobs.
    pub fn prepare(&self, query: &str) -> Result<SearchJob, SearchSyntaxError> {
        let generation = self.state.supersede();
        let tree = parse(query)?;
        debug!("prepared search job {} for query {:?}", generation, query);
        Ok(SearchJob {
            generation,
            query: query.to_string(),
            tree,
            library: self.library.clone(),
            state: self.state.clone(),
            tx: self.tx.clone(),
        })
    }

    /// Supersede every outstanding job without starting a new one.
    pub fn cancel(&self) {
        self.state.supersede();
    }

    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::Acquire)
    }
}

pub struct SearchJob {
    generation: u64,
    query: String,
    tree: PredicateTree,
    library: Arc<Library>,
    state: Arc<SearchState>,
    tx: Sender<SearchResults>,
}

impl SearchJob {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tree(&self) -> &PredicateTree {
        &self.tree
    }

    pub fn is_current(&self) -> bool {
        self.state.is_current(self.generation)
    }

    /// Evaluate against the snapshot current at the time of the call and deliver the results if
    /// this job has not been superseded. Returns whether the results were delivered.
    pub fn run(self) -> bool {
        let snapshot = self.library.snapshot();
        let mut records = Vec::new();
        for (i, record) in snapshot.records().enumerate() {
            if i % CHECK_INTERVAL == 0 && !self.is_current() {
                debug!("search job {} superseded after {} records", self.generation, i);
                return false;
            }
            if self.tree.matches(record) {
                records.push(record.clone());
            }
        }

        let _guard = self.state.delivery.lock();
        if !self.is_current() {
            debug!("search job {} superseded before delivery", self.generation);
            return false;
        }
        debug!("search job {} delivering {} results", self.generation, records.len());
        self.tx
            .send(SearchResults {
                generation: self.generation,
                query: self.query,
                version: snapshot.version(),
                records,
            })
            .is_ok()
    }

    pub fn spawn(self) -> JoinHandle<bool> {
        thread::spawn(move || self.run())
    }
}
