//! Brute-force sweep: score every page of the image at every level.
//!
//! Independent of reachability, each complete page is decoded as a table
//! and, per level, two counters are kept: entries that violate the level's
//! reserved-bit rules, and structural references pointing outside the
//! image. Low counts at a level are evidence (not proof) that the page is
//! a table of that level; ranking is left to downstream tooling.
//!
//! Each page's counters depend only on its own bytes and the image size,
//! so pages are scored in parallel with rayon.

use crate::config::SweepConfig;
use crate::error::{PagehuntError, Result};
use crate::paging::{page_count, Level, PageTable, Profile, TableSource, PAGING_STRUCTURE_SIZE};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Per-level evidence counters of one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounts {
    /// Present entries failing the level's validity rules
    pub invalid: u16,
    /// Present structural references with a target outside the image
    pub oob: u16,
}

impl LevelCounts {
    pub fn combined(&self) -> u32 {
        u32::from(self.invalid) + u32::from(self.oob)
    }
}

/// Counters for one page, indexed by level position in the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageScore {
    pub offset: u64,
    pub counts: Vec<LevelCounts>,
}

impl PageScore {
    pub fn counts(&self, level: Level) -> LevelCounts {
        self.counts.get(level.index()).copied().unwrap_or_default()
    }
}

/// Score one decoded table against the image bound.
pub fn score_table(table: &PageTable, image_size: u64) -> PageScore {
    let levels = table.profile().levels();
    let mut counts = vec![LevelCounts::default(); levels.len()];
    for (_, entry) in table.present_entries() {
        for (slot, level) in counts.iter_mut().zip(levels) {
            if !entry.is_valid(*level) {
                slot.invalid += 1;
            }
            if entry.is_out_of_bounds(*level, image_size) {
                slot.oob += 1;
            }
        }
    }
    PageScore {
        offset: table.offset(),
        counts,
    }
}

/// Result of a sweep: one score per complete page, in offset order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub profile: Profile,
    pub image_size: u64,
    /// Bytes after the last complete page; not scored
    pub truncated_tail_bytes: u64,
    /// Pages the source could not provide as a table
    pub skipped_pages: usize,
    pub pages: Vec<PageScore>,
}

impl SweepReport {
    /// Score of the page at `offset`, if it was swept.
    pub fn get(&self, offset: u64) -> Option<&PageScore> {
        self.pages
            .binary_search_by_key(&offset, |p| p.offset)
            .ok()
            .map(|i| &self.pages[i])
    }

    /// Pages whose counters are all zero at `level`.
    pub fn clean_at(&self, level: Level) -> impl Iterator<Item = &PageScore> + '_ {
        self.pages
            .iter()
            .filter(move |p| p.counts(level).combined() == 0)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PagehuntError::Serialization(format!("JSON serialization error: {}", e)))
    }

    pub fn from_json_str(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| PagehuntError::Serialization(format!("JSON deserialization error: {}", e)))
    }
}

/// Page-parallel classifier over a table source.
pub struct SweepClassifier<'a, S: TableSource + Sync + ?Sized> {
    source: &'a S,
    profile: Profile,
    config: SweepConfig,
}

impl<'a, S: TableSource + Sync + ?Sized> SweepClassifier<'a, S> {
    pub fn new(source: &'a S, profile: Profile) -> Self {
        Self::with_config(source, profile, SweepConfig::default())
    }

    pub fn with_config(source: &'a S, profile: Profile, config: SweepConfig) -> Self {
        if !profile.is_authoritative() {
            warn!(profile = %profile, "Sweeping with a placeholder profile; results are unvalidated");
        }
        Self {
            source,
            profile,
            config,
        }
    }

    /// Number of complete pages in the image.
    pub fn total_pages(&self) -> u64 {
        page_count(self.source.image_size())
    }

    /// Score pages with index in `[first_page, end_page)`.
    ///
    /// Chunks may be swept in any order and concatenated; the result for a
    /// page never depends on other pages.
    pub fn sweep_range(&self, first_page: u64, end_page: u64) -> (Vec<PageScore>, usize) {
        let end_page = end_page.min(self.total_pages());
        if first_page >= end_page {
            return (Vec::new(), 0);
        }
        let skipped = AtomicUsize::new(0);
        let score = |index: u64| -> Option<PageScore> {
            let offset = index * PAGING_STRUCTURE_SIZE;
            match self.source.table(self.profile, offset) {
                Ok(table) => Some(score_table(&table, self.source.image_size())),
                Err(e) => {
                    debug!(page = %format_args!("{:#x}", offset), error = %e, "Skipping page");
                    skipped.fetch_add(1, Ordering::Relaxed);
                    None
                }
            }
        };

        let scores: Vec<PageScore> = if self.config.parallel {
            (first_page..end_page)
                .into_par_iter()
                .filter_map(score)
                .collect()
        } else {
            (first_page..end_page).filter_map(score).collect()
        };
        (scores, skipped.into_inner())
    }

    /// Sweep the whole image, reporting `(pages_done, total_pages)` after each chunk.
    pub fn sweep_with_progress<F>(&self, mut progress: F) -> SweepReport
    where
        F: FnMut(u64, u64),
    {
        let image_size = self.source.image_size();
        let total = self.total_pages();
        let chunk = (self.config.chunk_pages.max(1)) as u64;
        info!(
            pages = total,
            image_size,
            profile = %self.profile,
            "Counting invalid and out-of-bounds entries"
        );

        let mut pages = Vec::with_capacity(total as usize);
        let mut skipped_pages = 0;
        let mut last_progress = 0;
        let mut start = 0;
        while start < total {
            let end = (start + chunk).min(total);
            let (scores, skipped) = self.sweep_range(start, end);
            pages.extend(scores);
            skipped_pages += skipped;
            progress(end, total);

            let pct = 100 * end / total;
            if pct != last_progress && pct % 5 == 0 {
                info!("{}% done.", pct);
                last_progress = pct;
            }
            start = end;
        }

        SweepReport {
            profile: self.profile,
            image_size,
            truncated_tail_bytes: image_size % PAGING_STRUCTURE_SIZE,
            skipped_pages,
            pages,
        }
    }

    /// Sweep the whole image.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_with_progress(|_, _| {})
    }
}
