//! Per-realm counter tables.
//!
//! A [`Snapshot`] holds buffer occupancy (or thresholds) for every realm as a
//! sparse table keyed by [`Index`]. Absent entries read as zero. Values are
//! always stored in cells; conversion to bytes or percent happens on encode.

use std::collections::BTreeMap;

use crate::realm::Realm;

/// Widest entry across all realms (egress-port-service-pool).
pub const MAX_COUNTERS: usize = 4;

/// Counter values of a single entry, aligned with [`Realm::counters`].
pub type Counters = [u64; MAX_COUNTERS];

/// Position of an entry within its realm.
///
/// `first` is the outermost index key (port for port-indexed realms), and
/// `second` the inner one. Unused positions are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Index {
    pub first: u32,
    pub second: u32,
}

impl Index {
    pub const DEVICE: Index = Index {
        first: 0,
        second: 0,
    };

    pub fn new(first: u32, second: u32) -> Self {
        Self { first, second }
    }

    pub fn single(first: u32) -> Self {
        Self { first, second: 0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    tables: BTreeMap<Realm, BTreeMap<Index, Counters>>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(|t| t.is_empty())
    }

    pub fn clear(&mut self) {
        self.tables.clear();
    }

    pub fn get(&self, realm: Realm, index: Index) -> Option<&Counters> {
        self.tables.get(&realm).and_then(|t| t.get(&index))
    }

    /// Read one counter; absent entries read as zero.
    pub fn value(&self, realm: Realm, index: Index, position: usize) -> u64 {
        self.get(realm, index).map(|c| c[position]).unwrap_or(0)
    }

    pub fn set(&mut self, realm: Realm, index: Index, position: usize, value: u64) {
        let entry = self
            .tables
            .entry(realm)
            .or_default()
            .entry(index)
            .or_insert([0; MAX_COUNTERS]);
        entry[position] = value;
    }

    pub fn insert(&mut self, realm: Realm, index: Index, counters: Counters) {
        self.tables.entry(realm).or_default().insert(index, counters);
    }

    /// Entries of `realm` in index order.
    pub fn entries(&self, realm: Realm) -> impl Iterator<Item = (Index, &Counters)> + '_ {
        self.tables
            .get(&realm)
            .into_iter()
            .flat_map(|t| t.iter().map(|(i, c)| (*i, c)))
    }

    pub fn realms(&self) -> impl Iterator<Item = Realm> + '_ {
        self.tables
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(r, _)| *r)
    }

    /// Fold `other` into `self`, keeping the larger value of every counter.
    pub fn merge_peak(&mut self, other: &Snapshot) {
        for (realm, table) in &other.tables {
            let ours = self.tables.entry(*realm).or_default();
            for (index, counters) in table {
                let entry = ours.entry(*index).or_insert([0; MAX_COUNTERS]);
                for (mine, theirs) in entry.iter_mut().zip(counters.iter()) {
                    *mine = (*mine).max(*theirs);
                }
            }
        }
    }

    /// Entries whose counters differ from `previous` (or are new).
    pub fn changed_since(&self, previous: &Snapshot) -> Snapshot {
        let mut out = Snapshot::new();
        for (realm, table) in &self.tables {
            for (index, counters) in table {
                if previous.get(*realm, *index) != Some(counters) {
                    out.insert(*realm, *index, *counters);
                }
            }
        }
        out
    }
}
