//! Known-root discovery of paging structures.
//!
//! Starting from physical addresses asserted to be top-level tables, the
//! walker expands level by level: every present entry of a table read at
//! level `n` that is not a data reference names a table of level `n + 1`.
//! The walk is layered by level, so it terminates after one pass per level
//! no matter what the (possibly hostile) memory contains.

use crate::core::designations::Designations;
use crate::core::process::RootSpec;
use crate::paging::{is_page_aligned, Profile, TableSource, ENTRIES_PER_TABLE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, trace, warn};

/// Counters describing one discovery run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    /// Roots accepted for walking
    pub roots: usize,
    /// Roots that were misaligned or outside the image
    pub rejected_roots: usize,
    /// `(page, level)` pairs expanded
    pub expanded: usize,
    /// Entries decoded across all expansions
    pub entries_decoded: u64,
    /// Pages that could not be read as a whole table
    pub unreadable_pages: usize,
    /// Structural references dropped because their target lies outside the image
    pub out_of_bounds: usize,
}

impl WalkStats {
    fn absorb(&mut self, other: &WalkStats) {
        self.roots += other.roots;
        self.rejected_roots += other.rejected_roots;
        self.expanded += other.expanded;
        self.entries_decoded += other.entries_decoded;
        self.unreadable_pages += other.unreadable_pages;
        self.out_of_bounds += other.out_of_bounds;
    }
}

/// Breadth-first, level-layered walker over a table source.
pub struct RootWalker<'a, S: TableSource + ?Sized> {
    source: &'a S,
    profile: Profile,
}

impl<'a, S: TableSource + ?Sized> RootWalker<'a, S> {
    pub fn new(source: &'a S, profile: Profile) -> Self {
        if !profile.is_authoritative() {
            warn!(profile = %profile, "Walking with a placeholder profile; results are unvalidated");
        }
        Self { source, profile }
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    /// Walk one root, recording designations into the shared map.
    ///
    /// Each `(page, level)` pair is expanded at most once across all calls
    /// sharing `designations`, which makes repeated and reordered walks
    /// produce the same map.
    pub fn walk_root(&self, root: u64, designations: &mut Designations) -> WalkStats {
        let mut stats = WalkStats::default();
        let size = self.source.image_size();

        if !is_page_aligned(root) || root >= size {
            warn!(
                root = %format_args!("{:#x}", root),
                image_size = size,
                "Rejecting root that is misaligned or outside the image"
            );
            stats.rejected_roots = 1;
            return stats;
        }
        stats.roots = 1;

        let mut frontier = BTreeSet::from([root]);
        for &level in self.profile.levels() {
            let mut next_frontier = BTreeSet::new();
            for &addr in &frontier {
                designations.ensure(addr);
                if !designations.designate(addr, level) {
                    // Already expanded at this level.
                    continue;
                }
                stats.expanded += 1;

                let table = match self.source.table(self.profile, addr) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(
                            page = %format_args!("{:#x}", addr),
                            %level,
                            error = %e,
                            "Skipping unreadable table"
                        );
                        stats.unreadable_pages += 1;
                        continue;
                    }
                };
                stats.entries_decoded += ENTRIES_PER_TABLE as u64;

                for (entry_offset, entry) in table.present_entries() {
                    // Upper and middle entries may map large pages; those are
                    // not tables.
                    if entry.target_is_data(level) {
                        continue;
                    }
                    if entry.target() < size {
                        next_frontier.insert(entry.target());
                    } else {
                        trace!(
                            page = %format_args!("{:#x}", addr),
                            entry_offset,
                            target = %format_args!("{:#x}", entry.target()),
                            "Dropping out-of-bounds reference"
                        );
                        stats.out_of_bounds += 1;
                    }
                }
            }
            frontier = next_frontier;
            if frontier.is_empty() {
                break;
            }
        }

        stats
    }

    /// Walk every root in ascending address order.
    pub fn walk<I>(&self, roots: I, designations: &mut Designations) -> WalkStats
    where
        I: IntoIterator<Item = u64>,
    {
        let roots: BTreeSet<u64> = roots.into_iter().collect();
        let total = roots.len();
        info!(roots = total, profile = %self.profile, "Extracting known paging structures");

        let mut stats = WalkStats::default();
        let mut last_progress = 0;
        for (i, root) in roots.into_iter().enumerate() {
            let progress = 100 * i / total;
            if progress != last_progress && progress % 5 == 0 {
                info!("{}%", progress);
                last_progress = progress;
            }
            let root_stats = self.walk_root(root, designations);
            stats.absorb(&root_stats);
        }

        debug!(?stats, pages = designations.len(), "Known-root walk finished");
        stats
    }

    /// Walk the addresses of `roots`, ignoring their metadata.
    pub fn walk_specs(&self, roots: &[RootSpec], designations: &mut Designations) -> WalkStats {
        self.walk(roots.iter().map(|r| r.address), designations)
    }
}

/// Run a fresh walk and return the resulting designation map.
pub fn discover<S, I>(source: &S, profile: Profile, roots: I) -> (Designations, WalkStats)
where
    S: TableSource + ?Sized,
    I: IntoIterator<Item = u64>,
{
    let mut designations = Designations::new();
    let stats = RootWalker::new(source, profile).walk(roots, &mut designations);
    (designations, stats)
}
