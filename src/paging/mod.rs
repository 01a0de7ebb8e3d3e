//! Paging-structure codec.
//!
//! Levels, the architecture profile registry, decoded entries and whole
//! tables. Everything here is pure: results depend only on raw values,
//! the assumed level and the selected profile.

pub mod entry;
pub mod level;
pub mod profile;
pub mod table;

pub use entry::PagingEntry;
pub use level::Level;
pub use profile::Profile;
pub use table::{read_table, PageTable, TableSource};

/// Size of one paging structure in bytes.
pub const PAGING_STRUCTURE_SIZE: u64 = crate::io::PAGE_SIZE;

/// Size of one paging entry in bytes.
pub const PAGING_ENTRY_SIZE: u64 = 8;

/// Entries per paging structure.
pub const ENTRIES_PER_TABLE: usize = (PAGING_STRUCTURE_SIZE / PAGING_ENTRY_SIZE) as usize;

pub fn is_page_aligned(offset: u64) -> bool {
    offset % PAGING_STRUCTURE_SIZE == 0
}

/// Number of complete paging structures in an image of `image_size` bytes.
pub fn page_count(image_size: u64) -> u64 {
    image_size / PAGING_STRUCTURE_SIZE
}

/// Offset of the last page that starts inside the image.
pub fn max_page_addr(image_size: u64) -> Option<u64> {
    let max_phys = image_size.checked_sub(1)?;
    Some(max_phys - max_phys % PAGING_STRUCTURE_SIZE)
}
