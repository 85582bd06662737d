//! The library module is the tag record store: the sole owner of song records.
//!
//! Readers work on immutable snapshots published through an `ArcSwap`, so listing categories or
//! evaluating a search never waits on ingestion and never sees a half-applied mutation. Writers
//! are serialized; each mutation copies the current snapshot, applies the record change and the
//! incremental category update together, then swaps the new snapshot in and notifies subscribers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::categories::{Aggregate, CategoryDelta, CategoryIndex, Dimension, RecordMap};
use crate::common::normalize_path;
use crate::error::{MuExpectedError, Result};
use crate::songs::SongRecord;

/// An immutable view of the library at one version.
#[derive(Debug, Clone, Default)]
pub struct LibrarySnapshot {
    version: u64,
    records: RecordMap,
    categories: CategoryIndex,
}

impl LibrarySnapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, path: &Path) -> Option<Arc<SongRecord>> {
        self.records.get(normalize_path(path).as_path()).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.records.contains_key(normalize_path(path).as_path())
    }

    /// Records in insertion order.
    pub fn records(&self) -> impl Iterator<Item = &Arc<SongRecord>> + '_ {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn categories(&self) -> &CategoryIndex {
        &self.categories
    }

    /// The records grouped under `key`, in the order they joined the group.
    pub fn members(&self, dimension: Dimension, key: &str) -> Vec<Arc<SongRecord>> {
        let Some(aggregate) = self.categories.group(dimension, key) else {
            return Vec::new();
        };
        aggregate.members.iter().filter_map(|p| self.records.get(p).cloned()).collect()
    }

    fn put(&mut self, record: SongRecord, deltas: &mut HashMap<Dimension, CategoryDelta>) -> PathBuf {
        let path = record.path.clone();
        let new = Arc::new(record);
        let (key, old) = match self.records.get_key_value(path.as_path()) {
            Some((key, old)) => (key.clone(), Some(old.clone())),
            None => (Arc::from(path.as_path()), None),
        };
        self.records.insert(key.clone(), new.clone());
        self.categories.apply(&self.records, &key, old.as_deref(), Some(new.as_ref()), deltas);
        path
    }

    fn take(&mut self, path: &Path, deltas: &mut HashMap<Dimension, CategoryDelta>) -> Option<Arc<SongRecord>> {
        let (key, old) = self.records.shift_remove_entry(path)?;
        self.categories.apply(&self.records, &key, Some(old.as_ref()), None, deltas);
        Some(old)
    }
}

/// Notification emitted after every mutation, once the new snapshot is visible to readers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibraryChange {
    pub version: u64,
    pub upserted: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
    /// Reasons for records skipped by a batch upsert.
    pub rejected: Vec<String>,
    /// Aggregates touched per dimension. Empty on a rescan, where everything must be reloaded.
    pub categories: HashMap<Dimension, CategoryDelta>,
    pub rescan: bool,
}

impl LibraryChange {
    pub fn delta(&self, dimension: Dimension) -> Option<&CategoryDelta> {
        self.categories.get(&dimension).filter(|d| !d.is_empty())
    }
}

pub struct Library {
    snapshot: ArcSwap<LibrarySnapshot>,
    writer: Mutex<()>,
    subscribers: Mutex<Vec<Sender<LibraryChange>>>,
    rescanning: AtomicBool,
}

/// Marks a rescan as in flight until dropped.
pub(crate) struct RescanTicket<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RescanTicket<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Default for Library {
    fn default() -> Self {
        Library::new()
    }
}

impl Library {
    pub fn new() -> Library {
        Library {
            snapshot: ArcSwap::from_pointee(LibrarySnapshot::default()),
            writer: Mutex::new(()),
            subscribers: Mutex::new(Vec::new()),
            rescanning: AtomicBool::new(false),
        }
    }

    /// The current snapshot. Cheap; never blocks on writers.
    pub fn snapshot(&self) -> Arc<LibrarySnapshot> {
        self.snapshot.load_full()
    }

    pub fn version(&self) -> u64 {
        self.snapshot.load().version
    }

    pub fn get(&self, path: &Path) -> Option<Arc<SongRecord>> {
        self.snapshot.load().get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.snapshot.load().contains(path)
    }

    /// Every record in insertion order.
    pub fn all(&self) -> Vec<Arc<SongRecord>> {
        self.snapshot.load().records().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn groups(&self, dimension: Dimension) -> Vec<Arc<Aggregate>> {
        self.snapshot.load().categories().groups(dimension)
    }

    pub fn group(&self, dimension: Dimension, key: &str) -> Option<Arc<Aggregate>> {
        self.snapshot.load().categories().group(dimension, key)
    }

    pub fn members(&self, dimension: Dimension, key: &str) -> Vec<Arc<SongRecord>> {
        self.snapshot.load().members(dimension, key)
    }

    /// Receive a `LibraryChange` for every subsequent mutation.
    pub fn subscribe(&self) -> Receiver<LibraryChange> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Insert or replace a record by its path.
    pub fn upsert(&self, record: SongRecord) -> Result<LibraryChange> {
        let record = record.normalized()?;
        Ok(self.mutate(|next, change| {
            let path = next.put(record, &mut change.categories);
            debug!("upserted record {}", path.display());
            change.upserted.push(path);
        }))
    }

    /// Insert or replace many records in a single snapshot swap. Invalid records are skipped and
    /// reported in `rejected`; they never abort the batch.
    pub fn upsert_many(&self, records: impl IntoIterator<Item = SongRecord>) -> LibraryChange {
        let mut valid = Vec::new();
        let mut rejected = Vec::new();
        for record in records {
            match record.normalized() {
                Ok(r) => valid.push(r),
                Err(e) => {
                    warn!("skipping record: {}", e);
                    rejected.push(e.to_string());
                }
            }
        }
        self.mutate(|next, change| {
            for record in valid {
                let path = next.put(record, &mut change.categories);
                change.upserted.push(path);
            }
            change.rejected = rejected;
        })
    }

    /// Remove the record at `path`, returning it if it existed.
    pub fn remove(&self, path: &Path) -> Option<Arc<SongRecord>> {
        let path = normalize_path(path);
        if !self.contains(&path) {
            return None;
        }
        let mut removed = None;
        self.mutate(|next, change| {
            removed = next.take(&path, &mut change.categories);
            if removed.is_some() {
                debug!("removed record {}", path.display());
                change.removed.push(path.clone());
            }
        });
        removed
    }

    pub(crate) fn begin_rescan(&self) -> Result<RescanTicket<'_>> {
        if self.rescanning.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(MuExpectedError::RescanInProgress.into());
        }
        Ok(RescanTicket { flag: &self.rescanning })
    }

    /// Rebuild every category grouping from the records. Only one rescan may run at a time; a
    /// concurrent request fails with `RescanInProgress` instead of queueing.
    pub fn rescan(&self) -> Result<LibraryChange> {
        let _ticket = self.begin_rescan()?;
        info!("rescanning library categories");
        let change = self.mutate(|next, change| {
            next.categories = CategoryIndex::build(&next.records);
            change.rescan = true;
        });
        let snapshot = self.snapshot();
        let categories = snapshot.categories();
        info!(
            "rescanned {} records into {} albums, {} artists, {} genres",
            snapshot.len(),
            categories.len(Dimension::Album),
            categories.len(Dimension::Artist),
            categories.len(Dimension::Genre)
        );
        Ok(change)
    }

    fn mutate(&self, f: impl FnOnce(&mut LibrarySnapshot, &mut LibraryChange)) -> LibraryChange {
        let _guard = self.writer.lock();
        let current = self.snapshot.load_full();
        let mut next = (*current).clone();
        let mut change = LibraryChange::default();
        f(&mut next, &mut change);
        next.version = current.version + 1;
        change.version = next.version;
        change.categories.retain(|_, d| !d.is_empty());
        self.snapshot.store(Arc::new(next));
        self.subscribers.lock().retain(|tx| tx.send(change.clone()).is_ok());
        change
    }
}
