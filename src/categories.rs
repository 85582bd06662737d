//! The category index maintains the four browsable groupings (songs, albums, artists, genres) over
//! the record store.
//!
//! Aggregates never own records. They hold member keys into the store's record map, and their
//! derived attributes (display artist, totals) are recomputed from the records whenever their
//! membership or a member changes. Only touched aggregates are recomputed on a mutation; the full
//! rebuild is reserved for an explicit rescan.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;

use crate::common::{fold, is_sentinel, VARIOUS_ARTISTS};
use crate::songs::SongRecord;

pub type RecordMap = IndexMap<Arc<Path>, Arc<SongRecord>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dimension {
    Song,
    Album,
    Artist,
    Genre,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [Dimension::Song, Dimension::Album, Dimension::Artist, Dimension::Genre];

    fn index(self) -> usize {
        match self {
            Dimension::Song => 0,
            Dimension::Album => 1,
            Dimension::Artist => 2,
            Dimension::Genre => 3,
        }
    }

    /// The grouping key of a record along this dimension.
    pub fn key_of(self, record: &SongRecord) -> String {
        match self {
            Dimension::Song => record.path.to_string_lossy().into_owned(),
            Dimension::Album => record.album_key().to_string(),
            Dimension::Artist => record.artist_key().to_string(),
            Dimension::Genre => record.genre_key().to_string(),
        }
    }
}

/// (sentinels last, case-folded display name, key)
type SortKey = (bool, String, String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub dimension: Dimension,
    pub key: String,
    /// For songs this is the title; for every other dimension it is the key itself.
    pub name: String,
    /// Member record paths in the order they joined the group.
    pub members: IndexSet<Arc<Path>>,
    pub total_duration_ms: u64,
    pub total_size: u64,
    /// Albums only: the shared artist of every member, or "Various Artists".
    pub display_artist: Option<String>,
    /// Albums only: the latest year tagged on any member.
    pub year: Option<u32>,
}

impl Aggregate {
    fn new(dimension: Dimension, key: String) -> Aggregate {
        Aggregate {
            dimension,
            name: key.clone(),
            key,
            members: IndexSet::new(),
            total_duration_ms: 0,
            total_size: 0,
            display_artist: None,
            year: None,
        }
    }

    pub fn song_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_sentinel(&self) -> bool {
        self.dimension != Dimension::Song && is_sentinel(&self.key)
    }

    fn sort_key(&self) -> SortKey {
        (self.is_sentinel(), fold(&self.name), self.key.clone())
    }

    fn recompute(&mut self, records: &RecordMap) {
        let members: Vec<&SongRecord> = self.members.iter().filter_map(|p| records.get(p).map(|r| r.as_ref())).collect();
        self.total_duration_ms = members.iter().map(|r| r.duration_ms).sum();
        self.total_size = members.iter().map(|r| r.file_size).sum();
        match self.dimension {
            Dimension::Song => {
                self.name = members.first().map(|r| r.display_title()).unwrap_or_else(|| self.key.clone());
            }
            Dimension::Album => {
                self.display_artist = Some(album_display_artist(&members));
                self.year = members.iter().filter_map(|r| r.year).max();
            }
            Dimension::Artist | Dimension::Genre => {}
        }
    }
}

/// The single artist shared by every member when it is non-empty, otherwise "Various Artists".
fn album_display_artist(members: &[&SongRecord]) -> String {
    let mut artists = members.iter().map(|r| r.artist.trim());
    match artists.next() {
        Some(first) if !first.is_empty() && artists.all(|a| a == first) => first.to_string(),
        _ => VARIOUS_ARTISTS.to_string(),
    }
}

/// The keys whose aggregates changed along one dimension during a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryDelta {
    pub added: BTreeSet<String>,
    pub updated: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}

impl CategoryDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    fn note_added(&mut self, key: &str) {
        if self.removed.remove(key) {
            self.updated.insert(key.to_string());
        } else {
            self.added.insert(key.to_string());
        }
    }

    fn note_updated(&mut self, key: &str) {
        if !self.added.contains(key) {
            self.updated.insert(key.to_string());
        }
    }

    fn note_removed(&mut self, key: &str) {
        if self.added.remove(key) {
            return;
        }
        self.updated.remove(key);
        self.removed.insert(key.to_string());
    }
}

#[derive(Debug, Clone, Default)]
struct DimensionIndex {
    groups: HashMap<String, Arc<Aggregate>>,
    order: BTreeSet<SortKey>,
}

impl DimensionIndex {
    fn build(dimension: Dimension, records: &RecordMap) -> DimensionIndex {
        let mut groups: IndexMap<String, Aggregate> = IndexMap::new();
        for (path, record) in records {
            let key = dimension.key_of(record);
            groups
                .entry(key.clone())
                .or_insert_with(|| Aggregate::new(dimension, key))
                .members
                .insert(path.clone());
        }
        let mut index = DimensionIndex::default();
        for (key, mut aggregate) in groups {
            aggregate.recompute(records);
            index.order.insert(aggregate.sort_key());
            index.groups.insert(key, Arc::new(aggregate));
        }
        index
    }

    fn remove_member(&mut self, key: &str, path: &Path, records: &RecordMap, delta: &mut CategoryDelta) {
        let Some(existing) = self.groups.get(key) else {
            return;
        };
        let mut aggregate = (**existing).clone();
        self.order.remove(&aggregate.sort_key());
        aggregate.members.shift_remove(path);
        if aggregate.members.is_empty() {
            self.groups.remove(key);
            delta.note_removed(key);
            return;
        }
        aggregate.recompute(records);
        self.order.insert(aggregate.sort_key());
        self.groups.insert(key.to_string(), Arc::new(aggregate));
        delta.note_updated(key);
    }

    fn add_member(&mut self, dimension: Dimension, key: &str, path: &Arc<Path>, records: &RecordMap, delta: &mut CategoryDelta) {
        let mut aggregate = match self.groups.get(key) {
            Some(existing) => {
                self.order.remove(&existing.sort_key());
                delta.note_updated(key);
                (**existing).clone()
            }
            None => {
                delta.note_added(key);
                Aggregate::new(dimension, key.to_string())
            }
        };
        aggregate.members.insert(path.clone());
        aggregate.recompute(records);
        self.order.insert(aggregate.sort_key());
        self.groups.insert(key.to_string(), Arc::new(aggregate));
    }

    fn refresh(&mut self, key: &str, records: &RecordMap, delta: &mut CategoryDelta) {
        let Some(existing) = self.groups.get(key) else {
            return;
        };
        let mut aggregate = (**existing).clone();
        self.order.remove(&aggregate.sort_key());
        aggregate.recompute(records);
        self.order.insert(aggregate.sort_key());
        self.groups.insert(key.to_string(), Arc::new(aggregate));
        delta.note_updated(key);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    dimensions: [DimensionIndex; 4],
}

impl CategoryIndex {
    /// Build every grouping from scratch. The four dimensions are built in parallel.
    pub fn build(records: &RecordMap) -> CategoryIndex {
        let built: Vec<DimensionIndex> = Dimension::ALL.par_iter().map(|d| DimensionIndex::build(*d, records)).collect();
        let mut index = CategoryIndex::default();
        for (dimension, dimension_index) in Dimension::ALL.iter().zip(built) {
            index.dimensions[dimension.index()] = dimension_index;
        }
        index
    }

    /// Every aggregate of a dimension in display order: case-insensitive by name, sentinels last.
    pub fn groups(&self, dimension: Dimension) -> Vec<Arc<Aggregate>> {
        let index = &self.dimensions[dimension.index()];
        index.order.iter().filter_map(|(_, _, key)| index.groups.get(key).cloned()).collect()
    }

    pub fn group(&self, dimension: Dimension, key: &str) -> Option<Arc<Aggregate>> {
        self.dimensions[dimension.index()].groups.get(key).cloned()
    }

    pub fn len(&self, dimension: Dimension) -> usize {
        self.dimensions[dimension.index()].groups.len()
    }

    pub fn is_empty(&self, dimension: Dimension) -> bool {
        self.len(dimension) == 0
    }

    /// Apply one record replacement. `records` must already reflect the change: `new` (if any) is
    /// present under `path` and a removed record is gone.
    pub(crate) fn apply(
        &mut self,
        records: &RecordMap,
        path: &Arc<Path>,
        old: Option<&SongRecord>,
        new: Option<&SongRecord>,
        deltas: &mut HashMap<Dimension, CategoryDelta>,
    ) {
        for dimension in Dimension::ALL {
            let old_key = old.map(|r| dimension.key_of(r));
            let new_key = new.map(|r| dimension.key_of(r));
            let delta = deltas.entry(dimension).or_default();
            let index = &mut self.dimensions[dimension.index()];
            match (old_key, new_key) {
                (Some(o), Some(n)) if o == n => index.refresh(&n, records, delta),
                (o, n) => {
                    if let Some(o) = o {
                        index.remove_member(&o, path, records, delta);
                    }
                    if let Some(n) = n {
                        index.add_member(dimension, &n, path, records, delta);
                    }
                }
            }
        }
    }
}
