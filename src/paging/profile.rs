//! Architecture profiles: the closed registry of entry codecs.
//!
//! A profile decides how a raw 64-bit cell is interpreted at each level:
//! where the target address lives, which bit patterns are reserved and
//! when an entry maps a data page instead of a deeper table. Profiles are
//! selected by a plain enumerator; persisted selectors are resolved only
//! against `Profile::REGISTRY`.

use crate::error::{PagehuntError, Result};
use crate::paging::entry::PagingEntry;
use crate::paging::level::Level;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PRESENT: u64 = 1;
const PAGE_SIZE_BIT: u64 = 1 << 7;
const GLOBAL_BIT: u64 = 1 << 8;

/// Physical base address bits 12-51.
const X86_64_TARGET_MASK: u64 = 0x000F_FFFF_FFFF_F000;
/// Bits 12-29 must be clear for a 1 GiB page.
const X86_64_HUGE_ALIGN_MASK: u64 = 0x3FFFF << 12;
/// Bits 12-20 must be clear for a 2 MiB page.
const X86_64_LARGE_ALIGN_MASK: u64 = 0x1FF << 12;

/// Output address bits 12-47 (48-bit physical addresses).
const ARM64_TARGET_MASK: u64 = 0x0000_FFFF_FFFF_F000;

/// A known paging architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Profile {
    /// 4-level x86-64 paging (PML4 -> PDP -> PD -> PT).
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    /// Minimal 4-level ARM64 codec without reserved-bit checks.
    ///
    /// Not validated against the architecture manual; results are evidence
    /// of structure only.
    #[serde(rename = "arm64")]
    Arm64,
}

impl Profile {
    /// Every profile a persisted selector may name.
    pub const REGISTRY: [Profile; 2] = [Profile::X86_64, Profile::Arm64];

    /// Stable selector used in persisted snapshots.
    pub fn selector(self) -> &'static str {
        match self {
            Profile::X86_64 => "x86_64",
            Profile::Arm64 => "arm64",
        }
    }

    /// Resolve a persisted selector against the registry.
    pub fn from_selector(selector: &str) -> Result<Profile> {
        Self::REGISTRY
            .iter()
            .copied()
            .find(|p| p.selector() == selector)
            .ok_or_else(|| PagehuntError::UnknownProfile(selector.to_string()))
    }

    /// False for placeholder codecs whose rules have not been validated.
    pub fn is_authoritative(self) -> bool {
        matches!(self, Profile::X86_64)
    }

    /// Levels of this profile, root first.
    pub fn levels(self) -> &'static [Level] {
        &Level::ALL
    }

    pub fn root_level(self) -> Level {
        self.levels()[0]
    }

    /// Successor of `level` within this profile.
    pub fn next_level(self, level: Level) -> Option<Level> {
        level.next().filter(|l| self.levels().contains(l))
    }

    /// Predecessor of `level` within this profile.
    pub fn prev_level(self, level: Level) -> Option<Level> {
        level.prev().filter(|l| self.levels().contains(l))
    }

    /// Architecture name of a level, as written in persisted snapshots.
    pub fn level_name(self, level: Level) -> &'static str {
        match (self, level) {
            (Profile::X86_64, Level::Top) => "PML4",
            (Profile::X86_64, Level::Upper) => "PDP",
            (Profile::X86_64, Level::Middle) => "PD",
            (Profile::X86_64, Level::Leaf) => "PT",
            (Profile::Arm64, Level::Top) => "L1",
            (Profile::Arm64, Level::Upper) => "L2",
            (Profile::Arm64, Level::Middle) => "L3",
            (Profile::Arm64, Level::Leaf) => "L4",
        }
    }

    /// Inverse of `level_name`.
    pub fn parse_level(self, name: &str) -> Result<Level> {
        self.levels()
            .iter()
            .copied()
            .find(|l| self.level_name(*l) == name)
            .ok_or_else(|| PagehuntError::UnknownLevel {
                profile: self.selector().to_string(),
                name: name.to_string(),
            })
    }

    /// Mask extracting the canonical physical target from a raw entry.
    pub fn target_mask(self) -> u64 {
        match self {
            Profile::X86_64 => X86_64_TARGET_MASK,
            Profile::Arm64 => ARM64_TARGET_MASK,
        }
    }

    /// Shift of the virtual-address bits indexing a table at `level`.
    pub fn index_shift(self, level: Level) -> u32 {
        match level {
            Level::Top => 39,
            Level::Upper => 30,
            Level::Middle => 21,
            Level::Leaf => 12,
        }
    }

    /// Size of the region mapped by one data entry at `level`.
    pub fn mapped_size(self, level: Level) -> u64 {
        1u64 << self.index_shift(level)
    }

    /// Decode a raw cell under this profile.
    pub fn decode(self, value: u64) -> PagingEntry {
        PagingEntry::new(self, value)
    }

    pub(crate) fn present(self, value: u64) -> bool {
        value & PRESENT != 0
    }

    pub(crate) fn is_valid(self, value: u64, level: Level) -> bool {
        match self {
            Profile::X86_64 => {
                let present = value & PRESENT != 0;
                let large = value & PAGE_SIZE_BIT != 0;
                match level {
                    // Bits 7 and 8 are reserved in a present PML4E.
                    Level::Top => !(present && value & (PAGE_SIZE_BIT | GLOBAL_BIT) != 0),
                    Level::Upper => !(present && large && value & X86_64_HUGE_ALIGN_MASK != 0),
                    Level::Middle => !(present && large && value & X86_64_LARGE_ALIGN_MASK != 0),
                    Level::Leaf => true,
                }
            }
            Profile::Arm64 => true,
        }
    }

    pub(crate) fn target_is_data(self, value: u64, level: Level) -> bool {
        match self {
            Profile::X86_64 => match level {
                Level::Top => false,
                Level::Upper | Level::Middle => {
                    self.is_valid(value, level) && value & PAGE_SIZE_BIT != 0
                }
                Level::Leaf => true,
            },
            Profile::Arm64 => level == Level::Leaf,
        }
    }

    pub(crate) fn nx(self, value: u64) -> bool {
        match self {
            Profile::X86_64 => value & (1 << 63) != 0,
            // UXN
            Profile::Arm64 => value & (1 << 54) != 0,
        }
    }

    pub(crate) fn user_access(self, value: u64) -> bool {
        match self {
            Profile::X86_64 => value & (1 << 1) != 0,
            // AP[1]
            Profile::Arm64 => value & (1 << 6) != 0,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl FromStr for Profile {
    type Err = PagehuntError;

    fn from_str(s: &str) -> Result<Self> {
        Profile::from_selector(s)
    }
}
