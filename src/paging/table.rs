//! Paging structures read as whole tables.
//!
//! Tables are plain values built from `(profile, source, offset)`; there
//! is no wrapper hierarchy around snapshot, page and entries.

use crate::error::{PagehuntError, Result};
use crate::io::{MappedImage, MemoryView, SliceImage};
use crate::paging::entry::PagingEntry;
use crate::paging::profile::Profile;
use crate::paging::{is_page_aligned, ENTRIES_PER_TABLE, PAGING_ENTRY_SIZE};

/// The 512 raw cells of one paging structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    offset: u64,
    profile: Profile,
    values: Vec<u64>,
}

impl PageTable {
    /// Build a table from raw cells; missing trailing cells read as zero.
    pub fn from_values(profile: Profile, offset: u64, mut values: Vec<u64>) -> Self {
        values.resize(ENTRIES_PER_TABLE, 0);
        Self {
            offset,
            profile,
            values,
        }
    }

    /// Decode a table from a 4096-byte little-endian page.
    pub fn from_bytes(profile: Profile, offset: u64, page: &[u8]) -> Self {
        let values = page
            .chunks_exact(PAGING_ENTRY_SIZE as usize)
            .map(|c| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(c);
                u64::from_le_bytes(raw)
            })
            .collect();
        Self::from_values(profile, offset, values)
    }

    /// Physical offset of the table.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Entry at `index` (0..512).
    pub fn entry(&self, index: usize) -> Option<PagingEntry> {
        self.values.get(index).map(|v| self.profile.decode(*v))
    }

    /// All entries with their byte offset inside the table.
    pub fn entries(&self) -> impl Iterator<Item = (u64, PagingEntry)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (i as u64 * PAGING_ENTRY_SIZE, self.profile.decode(*v)))
    }

    /// Present entries only, with their byte offset inside the table.
    pub fn present_entries(&self) -> impl Iterator<Item = (u64, PagingEntry)> + '_ {
        self.entries().filter(|(_, e)| e.present())
    }

    pub fn raw_values(&self) -> &[u64] {
        &self.values
    }
}

/// Read the paging structure at `offset` from a memory view.
pub fn read_table<M: MemoryView + ?Sized>(
    profile: Profile,
    memory: &M,
    offset: u64,
) -> Result<PageTable> {
    if !is_page_aligned(offset) {
        return Err(PagehuntError::Misaligned { offset });
    }
    let page = memory.read_page(offset)?;
    Ok(PageTable::from_bytes(profile, offset, page))
}

/// Anything paging structures can be read from.
///
/// Raw images decode tables from their bytes; legacy full snapshots serve
/// the entries they embed.
pub trait TableSource {
    /// Size of the captured physical memory; targets at or beyond it are
    /// outside the image.
    fn image_size(&self) -> u64;

    /// The paging structure at `offset`, decoded under `profile`.
    fn table(&self, profile: Profile, offset: u64) -> Result<PageTable>;
}

impl TableSource for SliceImage<'_> {
    fn image_size(&self) -> u64 {
        self.size()
    }

    fn table(&self, profile: Profile, offset: u64) -> Result<PageTable> {
        read_table(profile, self, offset)
    }
}

impl TableSource for MappedImage {
    fn image_size(&self) -> u64 {
        self.size()
    }

    fn table(&self, profile: Profile, offset: u64) -> Result<PageTable> {
        read_table(profile, self, offset)
    }
}
