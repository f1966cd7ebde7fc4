//! First-touch cache of synapse decoders.
//!
//! The decoder the mapping stage assigned is the only value that re-enables a
//! synapse after a disabled sweep point. It is captured the first time the
//! sweep touches a synapse and never replaced afterwards.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use hicann_chip::{SynapseDecoder, SynapseOnWafer};

/// Insert-if-absent map: the first value recorded for a key wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstTouchCache<K, V> {
    entries: BTreeMap<K, V>,
}

impl<K, V> Default for FirstTouchCache<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord, V: Copy> FirstTouchCache<K, V> {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `current` under `key` unless the key is present; return the
    /// stored value either way.
    pub fn record_if_absent(&mut self, key: K, current: V) -> V {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => *entry.insert(current),
        }
    }

    /// Stored value for `key`
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).copied()
    }

    /// True if `key` has been recorded
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of recorded keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Decoder of each touched synapse as observed on first touch; `None` for a
/// synapse that was already dark.
pub type OriginalDecoderCache = FirstTouchCache<SynapseOnWafer, Option<SynapseDecoder>>;
