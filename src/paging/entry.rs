//! Decoded view of one 8-byte paging entry.

use crate::paging::level::Level;
use crate::paging::profile::Profile;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw paging entry paired with the profile that interprets it.
///
/// Pure value type: every property is derived from the raw cell and the
/// level it is assumed to sit at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PagingEntry {
    profile: Profile,
    value: u64,
}

impl PagingEntry {
    pub fn new(profile: Profile, value: u64) -> Self {
        Self { profile, value }
    }

    /// Raw 64-bit cell.
    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn present(&self) -> bool {
        self.profile.present(self.value)
    }

    /// Canonically masked physical base this entry refers to.
    pub fn target(&self) -> u64 {
        self.value & self.profile.target_mask()
    }

    pub fn nx(&self) -> bool {
        self.profile.nx(self.value)
    }

    pub fn user_access(&self) -> bool {
        self.profile.user_access(self.value)
    }

    /// Whether the entry satisfies the reserved-bit rules of `level`.
    pub fn is_valid(&self, level: Level) -> bool {
        self.profile.is_valid(self.value, level)
    }

    /// Whether the target is a data page when this entry is read at `level`.
    pub fn target_is_data(&self, level: Level) -> bool {
        self.profile.target_is_data(self.value, level)
    }

    /// A present structural reference pointing at or beyond `image_size`.
    pub fn is_out_of_bounds(&self, level: Level, image_size: u64) -> bool {
        self.present() && self.target() >= image_size && !self.target_is_data(level)
    }
}

impl fmt::Display for PagingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#018x} (present={}, target={:#x})",
            self.value,
            self.present(),
            self.target()
        )
    }
}
