//! Hierarchy levels of a paging structure tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One rung of the paging hierarchy, ordered from root to leaf.
///
/// Profiles give the levels their architecture names (PML4/PDP/PD/PT for
/// x86-64); the ordering is shared by all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Top-level table (PML4)
    Top,
    /// Upper directory (PDP), may map 1 GiB data pages
    Upper,
    /// Middle directory (PD), may map 2 MiB data pages
    Middle,
    /// Leaf table (PT), maps 4 KiB data pages
    Leaf,
}

impl Level {
    /// All levels, root first.
    pub const ALL: [Level; 4] = [Level::Top, Level::Upper, Level::Middle, Level::Leaf];

    /// Position of the level, 0 for the root.
    pub fn index(self) -> usize {
        match self {
            Level::Top => 0,
            Level::Upper => 1,
            Level::Middle => 2,
            Level::Leaf => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Level> {
        Self::ALL.get(index).copied()
    }

    /// The next level towards the leaves, `None` below the leaf level.
    pub fn next(self) -> Option<Level> {
        Self::from_index(self.index() + 1)
    }

    /// The next level towards the root, `None` above the top level.
    pub fn prev(self) -> Option<Level> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Top => "top",
            Level::Upper => "upper",
            Level::Middle => "middle",
            Level::Leaf => "leaf",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
