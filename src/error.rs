//! Error types for the pagehunt paging-structure analysis library.
//!
//! Memory access failures live in [`crate::io::error::MemoryError`] and are
//! wrapped here; everything above the raw image reports [`PagehuntError`].

use crate::io::error::MemoryError;
use crate::paging::Level;
use thiserror::Error;

/// Main error type for pagehunt operations.
#[derive(Debug, Error)]
pub enum PagehuntError {
    /// Raw image access errors (out of range, truncated image, I/O)
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Translation walk hit a non-present entry
    #[error("Virtual address {vaddr:#x} not mapped ({level:?} entry in table {table:#x} not present)")]
    NotMapped { vaddr: u64, level: Level, table: u64 },

    /// Translation walk hit a present entry violating the level's constraints
    #[error("Invalid {level:?} entry {value:#018x} while translating {vaddr:#x}")]
    InvalidEntry { vaddr: u64, level: Level, value: u64 },

    /// Persisted profile selector does not name a registered profile
    #[error("Unknown architecture profile: {0}")]
    UnknownProfile(String),

    /// Persisted level tag is not part of the selected profile
    #[error("Unknown level {name:?} for profile {profile}")]
    UnknownLevel { profile: String, name: String },

    /// Page offset is not a multiple of the paging-structure size
    #[error("Offset {offset:#x} is not page aligned")]
    Misaligned { offset: u64 },

    /// Raw image does not match the one a snapshot was recorded against
    #[error("Image mismatch: expected {expected}, found {found}")]
    ImageMismatch { expected: String, found: String },

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pagehunt operations
pub type Result<T> = std::result::Result<T, PagehuntError>;
