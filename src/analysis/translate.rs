//! Virtual to physical translation through one paging hierarchy.
//!
//! Not used by discovery itself; handy for checking a recovered hierarchy
//! against known mappings. Results are cached per `(table, vaddr)` in a
//! bounded LRU since the image never changes during a run.

use crate::config::TranslatorConfig;
use crate::error::{PagehuntError, Result};
use crate::io::error::MemoryError;
use crate::io::MemoryView;
use crate::paging::{Level, Profile, PAGING_ENTRY_SIZE};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::trace;

const INDEX_MASK: u64 = 0x1FF;

/// A successful translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub paddr: u64,
    /// Level whose entry mapped the data page
    pub level: Level,
}

/// Walks virtual addresses through the tables of a memory image.
pub struct AddressTranslator<'a, M: MemoryView + ?Sized> {
    memory: &'a M,
    profile: Profile,
    cache: Option<Arc<Mutex<LruCache<(u64, u64), Translation>>>>,
}

impl<'a, M: MemoryView + ?Sized> AddressTranslator<'a, M> {
    pub fn new(memory: &'a M, profile: Profile) -> Self {
        Self::with_config(memory, profile, &TranslatorConfig::default())
    }

    pub fn with_config(memory: &'a M, profile: Profile, config: &TranslatorConfig) -> Self {
        let cache = NonZeroUsize::new(config.cache_capacity)
            .map(|cap| Arc::new(Mutex::new(LruCache::new(cap))));
        Self {
            memory,
            profile,
            cache,
        }
    }

    /// Physical address of `vaddr` under the hierarchy rooted at `table`.
    pub fn translate(&self, table: u64, vaddr: u64) -> Result<u64> {
        self.translate_detailed(table, vaddr).map(|t| t.paddr)
    }

    /// Like `translate`, also reporting the level that mapped the page.
    ///
    /// # Errors
    ///
    /// `NotMapped` when a consulted entry is not present, `InvalidEntry`
    /// when it violates its level's rules and `Memory` when a table lies
    /// outside the image.
    pub fn translate_detailed(&self, table: u64, vaddr: u64) -> Result<Translation> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().get(&(table, vaddr)) {
                return Ok(*hit);
            }
        }

        let result = self.walk(table, vaddr)?;

        if let Some(cache) = &self.cache {
            cache.lock().put((table, vaddr), result);
        }
        Ok(result)
    }

    fn walk(&self, root: u64, vaddr: u64) -> Result<Translation> {
        let mut table = root;
        for &level in self.profile.levels() {
            let index = (vaddr >> self.profile.index_shift(level)) & INDEX_MASK;
            let slot = table
                .checked_add(index * PAGING_ENTRY_SIZE)
                .ok_or(MemoryError::OutOfRange {
                    offset: table,
                    len: PAGING_ENTRY_SIZE,
                    size: self.memory.size(),
                })?;
            let value = self.memory.read_u64(slot)?;
            let entry = self.profile.decode(value);

            if !entry.present() {
                return Err(PagehuntError::NotMapped {
                    vaddr,
                    level,
                    table,
                });
            }
            if !entry.is_valid(level) {
                return Err(PagehuntError::InvalidEntry {
                    vaddr,
                    level,
                    value,
                });
            }
            if entry.target_is_data(level) {
                let offset = vaddr & (self.profile.mapped_size(level) - 1);
                let paddr = entry.target() + offset;
                trace!(
                    vaddr = %format_args!("{:#x}", vaddr),
                    paddr = %format_args!("{:#x}", paddr),
                    %level,
                    "Translated"
                );
                return Ok(Translation { paddr, level });
            }
            table = entry.target();
        }
        // The leaf level always maps data, so the loop returns before here.
        Err(PagehuntError::InvalidInput(format!(
            "profile {} has no data level",
            self.profile
        )))
    }

    /// Number of cached translations.
    pub fn cached(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.lock().len())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }
}

impl<M: MemoryView + ?Sized> Clone for AddressTranslator<'_, M> {
    fn clone(&self) -> Self {
        Self {
            memory: self.memory,
            profile: self.profile,
            cache: self.cache.clone(),
        }
    }
}
