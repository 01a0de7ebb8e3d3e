//! Designation map: which levels each physical page is believed to act as.
//!
//! A page may carry several designations when different roots reach it at
//! different depths. That ambiguity is evidence and is kept as a set; the
//! map only ever grows during a discovery run.

use crate::paging::Level;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

/// Monotonic mapping from page offset to a set of levels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Designations {
    pages: BTreeMap<u64, BTreeSet<Level>>,
}

impl Designations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `offset` has an entry, possibly with no designation.
    pub fn ensure(&mut self, offset: u64) -> &BTreeSet<Level> {
        self.pages.entry(offset).or_default()
    }

    /// Add `level` to the page's set. Returns true if it was not there yet.
    ///
    /// This is the check-and-set that guards at-most-once expansion of a
    /// `(page, level)` pair.
    pub fn designate(&mut self, offset: u64, level: Level) -> bool {
        self.pages.entry(offset).or_default().insert(level)
    }

    pub fn get(&self, offset: u64) -> Option<&BTreeSet<Level>> {
        self.pages.get(&offset)
    }

    pub fn contains(&self, offset: u64, level: Level) -> bool {
        self.pages
            .get(&offset)
            .is_some_and(|levels| levels.contains(&level))
    }

    /// Pages in ascending offset order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &BTreeSet<Level>)> + '_ {
        self.pages.iter().map(|(o, l)| (*o, l))
    }

    pub fn offsets(&self) -> impl Iterator<Item = u64> + '_ {
        self.pages.keys().copied()
    }

    /// Number of pages with an entry (including empty sets).
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Union `other` into this map.
    pub fn merge(&mut self, other: &Designations) {
        for (offset, levels) in &other.pages {
            match self.pages.entry(*offset) {
                Entry::Occupied(mut e) => e.get_mut().extend(levels.iter().copied()),
                Entry::Vacant(e) => {
                    e.insert(levels.clone());
                }
            }
        }
    }

    /// Counts per level plus ambiguity statistics.
    pub fn summary(&self) -> DesignationSummary {
        let mut per_level = BTreeMap::new();
        let mut ambiguous = 0;
        let mut undesignated = 0;
        for levels in self.pages.values() {
            match levels.len() {
                0 => undesignated += 1,
                1 => {}
                _ => ambiguous += 1,
            }
            for level in levels {
                *per_level.entry(*level).or_insert(0usize) += 1;
            }
        }
        DesignationSummary {
            pages: self.pages.len(),
            per_level,
            ambiguous,
            undesignated,
        }
    }
}

impl FromIterator<(u64, BTreeSet<Level>)> for Designations {
    fn from_iter<T: IntoIterator<Item = (u64, BTreeSet<Level>)>>(iter: T) -> Self {
        let mut map = Designations::new();
        for (offset, levels) in iter {
            map.pages.entry(offset).or_default().extend(levels);
        }
        map
    }
}

/// Aggregate view over a designation map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignationSummary {
    /// Pages present in the map
    pub pages: usize,
    /// Pages carrying each level
    pub per_level: BTreeMap<Level, usize>,
    /// Pages carrying more than one level
    pub ambiguous: usize,
    /// Pages present with an empty set
    pub undesignated: usize,
}
