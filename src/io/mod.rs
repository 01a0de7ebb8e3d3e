//! Bounded, read-only access to raw physical-memory images.
//!
//! This module provides the `MemoryView` trait used by every analysis pass,
//! a memory-mapped implementation (`MappedImage`) for real snapshots and a
//! borrowed implementation (`SliceImage`) for in-memory buffers. The image
//! is opened once and never mutated, so views can be shared freely across
//! threads.

pub mod error;

use crate::io::error::{MemoryError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Size of a paging structure and of the pages the image is divided into.
pub const PAGE_SIZE: u64 = 4096;

/// Default ceiling for images opened without explicit limits (64 GiB).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 64 * 1024 * 1024 * 1024;

/// Bounded random reads by absolute physical offset.
pub trait MemoryView {
    /// Total length of the image in bytes.
    fn size(&self) -> u64;

    /// Borrow `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MemoryError::OutOfRange` if any byte of the range lies at or
    /// beyond `size()`.
    fn read_bytes(&self, offset: u64, len: u64) -> Result<&[u8]>;

    /// Read a little-endian u64 (one paging entry).
    fn read_u64(&self, offset: u64) -> Result<u64> {
        let b = self.read_bytes(offset, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// Borrow the full paging structure starting at `offset`.
    ///
    /// Fails with `MemoryError::TruncatedImage` when the image ends inside
    /// the requested page.
    fn read_page(&self, offset: u64) -> Result<&[u8]> {
        let size = self.size();
        match offset.checked_add(PAGE_SIZE) {
            Some(end) if end <= size => self.read_bytes(offset, PAGE_SIZE),
            _ => Err(MemoryError::TruncatedImage {
                offset,
                needed: PAGE_SIZE,
                size,
            }),
        }
    }
}

fn bounded<'a>(data: &'a [u8], offset: u64, len: u64) -> Result<&'a [u8]> {
    let size = data.len() as u64;
    let end = offset.checked_add(len);
    match end {
        Some(end) if end <= size => Ok(&data[offset as usize..end as usize]),
        _ => Err(MemoryError::OutOfRange { offset, len, size }),
    }
}

/// A memory view over a borrowed byte slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceImage<'a> {
    data: &'a [u8],
}

impl<'a> SliceImage<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }
}

impl MemoryView for SliceImage<'_> {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_bytes(&self, offset: u64, len: u64) -> Result<&[u8]> {
        bounded(self.data, offset, len)
    }
}

/// A read-only memory-mapped raw memory image.
///
/// The mapping is created once at open time; all reads borrow from it.
#[derive(Debug)]
pub struct MappedImage {
    path: PathBuf,
    // None when the file size is zero; memmap cannot map empty files.
    mmap: Option<Mmap>,
    size: u64,
}

impl MappedImage {
    /// Opens and maps an image using `DEFAULT_MAX_IMAGE_SIZE` as the ceiling.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_limit(path, DEFAULT_MAX_IMAGE_SIZE)
    }

    /// Opens and maps an image, refusing files larger than `max_image_size`.
    pub fn open_with_limit<P: AsRef<Path>>(path: P, max_image_size: u64) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size,
            max_image_size,
            "Opening memory image"
        );

        if size > max_image_size {
            warn!(
                path = %path.display(),
                size,
                limit = max_image_size,
                "Image is too large"
            );
            return Err(MemoryError::ImageTooLarge {
                limit: max_image_size,
                found: size,
            });
        }

        if size % PAGE_SIZE != 0 {
            warn!(
                path = %path.display(),
                size,
                tail = size % PAGE_SIZE,
                "Image size is not a multiple of the page size; trailing bytes are not a full page"
            );
        }

        let mmap = if size == 0 {
            None
        } else {
            // Safety: the image is only ever mapped read-only and is treated as
            // immutable for the lifetime of the process.
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            size,
        })
    }

    /// Path the image was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole image as one slice (empty for zero-length images).
    pub fn as_slice(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }
}

impl MemoryView for MappedImage {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_bytes(&self, offset: u64, len: u64) -> Result<&[u8]> {
        bounded(self.as_slice(), offset, len)
    }
}
