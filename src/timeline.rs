//! Timeline - the bounded, timestamp-ordered store

use std::collections::BTreeMap;
use std::ops::Bound::Included;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::{ElementKind, TimelineConfig};
use crate::element::{BufferWriter, Element, Payload, Timestamp};
use crate::error::{Result, TimelineError};
use crate::observer::{Notifier, TimelineEvent, TimelineObserver};
use crate::pool::Pool;
use crate::query::{self, first_at, last_at, Direction, EntryKey, TimeKey};

/// State guarded by the timeline's lock.
#[derive(Debug)]
struct Store {
    entries: BTreeMap<EntryKey, Element>,
    capacity: usize,
    pool: Option<Pool>,
    /// Arrival counter; orders entries sharing a timestamp.
    next_seq: u64,
}

impl Store {
    fn insert(&mut self, key: TimeKey, element: Element) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((key, seq), element);
    }

    /// Key of the most recent arrival at `key`.
    fn last_key_at(&self, key: TimeKey) -> Option<EntryKey> {
        self.entries
            .range((Included(first_at(key)), Included(last_at(key))))
            .next_back()
            .map(|(k, _)| *k)
    }
}

/// A bounded, timestamp-ordered buffer of elements shared between producer
/// and consumer threads.
///
/// Mutators take the write lock for their whole duration, readers take the
/// read lock. Once `len() == capacity()` each push evicts the entry with the
/// lowest timestamp. Share it as `Arc<Timeline>`.
pub struct Timeline {
    kind: ElementKind,
    store: RwLock<Store>,
    notifier: Notifier,
}

impl Timeline {
    /// Create an empty timeline.
    ///
    /// Fixed-stride timelines must be [`allocate`](Self::allocate)d before
    /// buffers can be created or pushed.
    pub fn new(config: TimelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kind: config.kind,
            store: RwLock::new(Store {
                entries: BTreeMap::new(),
                capacity: config.capacity,
                pool: None,
                next_seq: 0,
            }),
            notifier: Notifier::default(),
        })
    }

    // =========================================================================
    // ALLOCATION
    // =========================================================================

    /// Clear the timeline and resize it to hold `size` entries.
    ///
    /// Fixed-stride timelines get a fresh pool of `size` buffers; anything
    /// carved from the previous pool stays valid but is no longer recycled.
    pub fn allocate(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(TimelineError::InvalidArgument("allocation size must be > 0".into()));
        }
        let pool = match self.kind {
            ElementKind::Variable => None,
            ElementKind::FixedStride(layout) => Some(Pool::new(size, layout.stride())?),
        };

        let discarded = {
            let mut store = self.store.write();
            let discarded = store.entries.len();
            store.entries.clear();
            store.capacity = size;
            store.pool = pool;
            discarded
        };

        info!(capacity = size, kind = %self.kind, "timeline allocated");
        if discarded > 0 {
            self.notifier.notify(TimelineEvent::Cleared);
        }
        Ok(())
    }

    /// Carve a zeroed buffer from the pool, stamped with `timestamp`.
    pub fn create_buffer(&self, timestamp: Timestamp) -> Result<BufferWriter> {
        let layout = match self.kind {
            ElementKind::FixedStride(layout) => layout,
            ElementKind::Variable => {
                return Err(TimelineError::TypeMismatch {
                    expected: self.kind.to_string(),
                    got: "fixed-stride buffer".into(),
                })
            }
        };
        check_timestamp(timestamp)?;

        let (slot, refilled) = {
            let mut store = self.store.write();
            store.pool.as_mut().ok_or_else(not_allocated)?.take_slot()
        };
        if refilled {
            debug!(stride = layout.stride(), "pool arena refilled");
        }
        Ok(BufferWriter::new(timestamp, layout, slot))
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Insert an element under its own timestamp, evicting the oldest entry
    /// when full.
    ///
    /// A timestamp already present is not replaced: both entries are kept,
    /// and exact-match reads see the newer one.
    pub fn push(&self, element: impl Into<Element>) -> Result<()> {
        let element = element.into();
        self.check_kind(&element)?;
        let key = check_timestamp(element.timestamp())?;

        let evicted = {
            let mut store = self.store.write();
            if matches!(self.kind, ElementKind::FixedStride(_)) && store.pool.is_none() {
                return Err(not_allocated());
            }
            let evicted = if store.entries.len() >= store.capacity {
                store.entries.pop_first()
            } else {
                None
            };
            store.insert(key, element);
            evicted
        };
        // Logged once the guard is released.
        if let Some(((oldest, _), _)) = evicted {
            debug!(timestamp = oldest.get(), "evicted oldest entry");
        }
        Ok(())
    }

    /// Remove and return the entry at `timestamp`.
    pub fn pop(&self, timestamp: Timestamp) -> Result<Element> {
        let key = check_timestamp(timestamp)?;
        let mut store = self.store.write();
        store
            .last_key_at(key)
            .and_then(|k| store.entries.remove(&k))
            .ok_or(TimelineError::NotFound(timestamp))
    }

    /// Move the entry at `old` to `new`.
    pub fn modify_time(&self, old: Timestamp, new: Timestamp) -> Result<()> {
        let old_key = check_timestamp(old)?;
        let new_key = check_timestamp(new)?;

        let mut store = self.store.write();
        let entry = store
            .last_key_at(old_key)
            .ok_or(TimelineError::NotFound(old))?;
        if store.last_key_at(new_key).is_some() {
            return Err(TimelineError::Conflict(new));
        }
        if let Some(element) = store.entries.remove(&entry) {
            store.insert(new_key, element.with_timestamp(new_key.get()));
        }
        Ok(())
    }

    /// Replace the element stored at an existing `timestamp`.
    ///
    /// The replacement is re-stamped with `timestamp`.
    pub fn set_object(&self, timestamp: Timestamp, element: impl Into<Element>) -> Result<()> {
        let element = element.into();
        self.check_kind(&element)?;
        let key = check_timestamp(timestamp)?;

        let mut store = self.store.write();
        let entry = store
            .last_key_at(key)
            .ok_or(TimelineError::NotFound(timestamp))?;
        store.entries.insert(entry, element.with_timestamp(key.get()));
        Ok(())
    }

    /// Remove every entry and notify observers.
    pub fn clear(&self) {
        self.store.write().entries.clear();
        self.notifier.notify(TimelineEvent::Cleared);
    }

    // =========================================================================
    // READING
    // =========================================================================

    /// Exact-match read. A miss is logged, not an error.
    pub fn get_object(&self, timestamp: Timestamp) -> Option<Element> {
        let found = {
            let store = self.store.read();
            check_timestamp(timestamp)
                .ok()
                .and_then(|key| store.last_key_at(key))
                .and_then(|k| store.entries.get(&k).cloned())
        };
        if found.is_none() {
            warn!(timestamp, "no entry at requested timestamp");
        }
        found
    }

    /// Entry closest to `timestamp` in `direction`.
    pub fn get_closest(&self, timestamp: Timestamp, direction: Direction) -> Option<Element> {
        let key = check_timestamp(timestamp).ok()?;
        let store = self.store.read();
        query::closest(&store.entries, key, direction).map(|(_, element)| element.clone())
    }

    /// Entry with the highest timestamp.
    pub fn get_newest(&self) -> Option<Element> {
        let store = self.store.read();
        store.entries.last_key_value().map(|(_, e)| e.clone())
    }

    pub fn newest_timestamp(&self) -> Option<Timestamp> {
        let store = self.store.read();
        store.entries.last_key_value().map(|((k, _), _)| k.get())
    }

    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        let store = self.store.read();
        store.entries.first_key_value().map(|((k, _), _)| k.get())
    }

    /// Stored timestamps in ascending order.
    pub fn timestamps(&self) -> Vec<Timestamp> {
        let store = self.store.read();
        store.entries.keys().map(|(k, _)| k.get()).collect()
    }

    // =========================================================================
    // NOTIFICATION
    // =========================================================================

    /// Receive an event each time the timeline is cleared.
    pub fn subscribe(&self) -> Receiver<TimelineEvent> {
        self.notifier.subscribe()
    }

    pub fn add_observer(&self, observer: Arc<dyn TimelineObserver>) {
        self.notifier.add(observer);
    }

    // =========================================================================
    // METRICS
    // =========================================================================

    pub fn len(&self) -> usize {
        self.store.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.store.read().capacity
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Current configuration.
    pub fn config(&self) -> TimelineConfig {
        TimelineConfig {
            capacity: self.capacity(),
            kind: self.kind,
        }
    }

    /// True when `element` matches this timeline's declared kind.
    pub fn is_object_valid(&self, element: &Element) -> bool {
        element.kind() == self.kind
    }

    // =========================================================================
    // COPY
    // =========================================================================

    /// Independent copy: same capacity and kind, own pool, every payload
    /// copied into fresh memory. Observers are not carried over.
    pub fn deep_copy(&self) -> Result<Timeline> {
        let store = self.store.read();
        let mut pool = match &store.pool {
            Some(pool) => Some(Pool::new(pool.slots(), pool.stride())?),
            None => None,
        };

        let mut entries = BTreeMap::new();
        for (key, element) in &store.entries {
            let copy = match element.payload() {
                Payload::Slots(buffer) => {
                    let (slot, _) = pool.as_mut().ok_or_else(not_allocated)?.take_slot();
                    BufferWriter::copy_of(buffer, element.timestamp(), slot).finish()
                }
                Payload::Blob(data) => {
                    Element::blob(element.timestamp(), Bytes::copy_from_slice(data))
                }
            };
            entries.insert(*key, copy);
        }

        Ok(Timeline {
            kind: self.kind,
            store: RwLock::new(Store {
                entries,
                capacity: store.capacity,
                pool,
                next_seq: store.next_seq,
            }),
            notifier: Notifier::default(),
        })
    }

    fn check_kind(&self, element: &Element) -> Result<()> {
        if self.is_object_valid(element) {
            Ok(())
        } else {
            Err(TimelineError::TypeMismatch {
                expected: self.kind.to_string(),
                got: element.kind().to_string(),
            })
        }
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.read();
        f.debug_struct("Timeline")
            .field("kind", &self.kind)
            .field("capacity", &store.capacity)
            .field("len", &store.entries.len())
            .field("observers", &self.notifier.len())
            .finish()
    }
}

fn check_timestamp(timestamp: Timestamp) -> Result<TimeKey> {
    if timestamp.is_nan() {
        return Err(TimelineError::InvalidArgument("timestamp is NaN".into()));
    }
    Ok(TimeKey::new(timestamp))
}

fn not_allocated() -> TimelineError {
    TimelineError::InvalidArgument("fixed-stride timeline used before allocate()".into())
}
