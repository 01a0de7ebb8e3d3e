//! Custom error types for raw memory access.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("read of {len} bytes at {offset:#x} exceeds image size {size:#x}")]
    OutOfRange { offset: u64, len: u64, size: u64 },

    #[error("image of {size:#x} bytes is too short to hold {needed} bytes at {offset:#x}")]
    TruncatedImage { offset: u64, needed: u64, size: u64 },

    #[error("Image size of {found} bytes exceeds the maximum allowed size of {limit} bytes.")]
    ImageTooLarge { limit: u64, found: u64 },

    #[error("An underlying I/O error occurred.")]
    Io(#[from] std::io::Error),
}

impl MemoryError {
    /// True for the bounds conditions a discovery pass tolerates and skips.
    pub fn is_bounds(&self) -> bool {
        matches!(
            self,
            MemoryError::OutOfRange { .. } | MemoryError::TruncatedImage { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
