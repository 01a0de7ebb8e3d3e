//! Shared helpers for integration tests: synthetic memory images and
//! temporary files.

use std::io::Write;
use tempfile::NamedTempFile;

pub const PAGE: u64 = 4096;

/// Builds little-endian memory images page by page.
pub struct ImageBuilder {
    data: Vec<u8>,
}

impl ImageBuilder {
    pub fn new(pages: usize) -> Self {
        Self {
            data: vec![0u8; pages * PAGE as usize],
        }
    }

    /// Write `value` into slot `index` of the page at `page`.
    pub fn entry(mut self, page: u64, index: usize, value: u64) -> Self {
        let at = page as usize + index * 8;
        self.data[at..at + 8].copy_from_slice(&value.to_le_bytes());
        self
    }

    /// Append bytes that do not form a complete page.
    pub fn tail(mut self, bytes: usize) -> Self {
        self.data.extend(std::iter::repeat(0xAA).take(bytes));
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.data
    }

    pub fn write_temp(self) -> NamedTempFile {
        create_temp_file(&self.data)
    }
}

/// Creates a temporary file with the given content.
pub fn create_temp_file(content: &[u8]) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content).unwrap();
    temp_file
}

pub const ROOT_A: u64 = 0x1000;
pub const ROOT_B: u64 = 0x2000;

/// Two processes sharing a kernel half, 16 pages.
///
/// ```text
/// A 0x1000 --0--> 0x3000 --0--> 0x6000 --0--> 0x8000 (PT)
///          \511-> 0x5000 --0--> 0x7000 --0--> 0x8000
///                                      \1---> 0x6000 (also a PT)
///                                      \3---> 0x1_0000_0000 (out of bounds)
/// B 0x2000 --0--> 0x4000 --0--> 1 GiB page at 0x4000_0000
///                        \1---> 0x6000
///          \511-> 0x5000
/// ```
pub fn two_process_image() -> ImageBuilder {
    ImageBuilder::new(16)
        .entry(ROOT_A, 0, 0x3007)
        .entry(ROOT_A, 511, 0x5003)
        .entry(ROOT_B, 0, 0x4007)
        .entry(ROOT_B, 511, 0x5003)
        .entry(0x3000, 0, 0x6007)
        .entry(0x4000, 0, 0x4000_0087)
        .entry(0x4000, 1, 0x6007)
        .entry(0x5000, 0, 0x7003)
        .entry(0x6000, 0, 0x8007)
        .entry(0x6000, 1, 0x0020_0087)
        .entry(0x7000, 0, 0x8003)
        .entry(0x7000, 1, 0x6003)
        .entry(0x7000, 3, 0x1_0000_0003)
        .entry(0x8000, 0, 0x9007)
        .entry(0x8000, 1, 0xA007)
        .entry(0x8000, 2, 0x7FFF_0000_0003)
}
