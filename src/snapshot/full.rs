//! Legacy full snapshots with each page's present entries embedded.
//!
//! Full snapshots can be analysed without the raw image, at the cost of
//! size. They are kept for compatibility and convert to the light form by
//! dropping the entries.

use crate::core::designations::Designations;
use crate::error::{PagehuntError, Result};
use crate::paging::{
    is_page_aligned, Level, PageTable, Profile, TableSource, ENTRIES_PER_TABLE, PAGING_ENTRY_SIZE,
    PAGING_STRUCTURE_SIZE,
};
use crate::snapshot::light::{
    decode_levels, encode_levels, resolve_profile, LegacyClasses, LightSnapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct RawEntry {
    value: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawPage {
    designations: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    entries: Option<BTreeMap<u64, RawEntry>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawFullSnapshot {
    path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<String>,
    #[serde(default, skip_serializing)]
    snapshot_cls: Option<String>,
    #[serde(default, skip_serializing)]
    pages_view_cls: Option<String>,
    #[serde(default, skip_serializing)]
    page_view_cls: Option<String>,
    #[serde(default, skip_serializing)]
    entries_view_cls: Option<String>,
    #[serde(default, skip_serializing)]
    paging_entry_cls: Option<String>,
    #[serde(default, skip_serializing)]
    page_types_cls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    pages: BTreeMap<u64, RawPage>,
}

/// One embedded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullPage {
    pub designations: BTreeSet<Level>,
    /// Present entries keyed by offset inside the page; `None` when the
    /// page could not be read at capture time
    pub entries: Option<BTreeMap<u64, u64>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullSnapshot {
    pub path: PathBuf,
    pub profile: Profile,
    /// Image size; files without one use the end of the last embedded page
    pub image_size: u64,
    pub pages: BTreeMap<u64, FullPage>,
}

impl FullSnapshot {
    /// Embed the present entries of every designated page.
    pub fn capture<S, P>(source: &S, path: P, profile: Profile, designations: &Designations) -> Self
    where
        S: TableSource + ?Sized,
        P: Into<PathBuf>,
    {
        let mut pages = BTreeMap::new();
        for (offset, levels) in designations.iter() {
            let entries = match source.table(profile, offset) {
                Ok(table) => Some(
                    table
                        .present_entries()
                        .map(|(o, e)| (o, e.value()))
                        .collect(),
                ),
                Err(e) => {
                    warn!(page = %format_args!("{:#x}", offset), error = %e, "Page not embedded");
                    None
                }
            };
            pages.insert(
                offset,
                FullPage {
                    designations: levels.clone(),
                    entries,
                },
            );
        }
        debug!(pages = pages.len(), "Captured full snapshot");
        Self {
            path: path.into(),
            profile,
            image_size: source.image_size(),
            pages,
        }
    }

    pub fn designations(&self) -> Designations {
        self.pages
            .iter()
            .map(|(offset, page)| (*offset, page.designations.clone()))
            .collect()
    }

    /// Drop the embedded entries.
    pub fn into_light(self) -> LightSnapshot {
        let designations = self.designations();
        LightSnapshot::new(self.path, self.profile, designations)
            .with_image_info(self.image_size, None)
    }

    pub fn to_json_string(&self) -> Result<String> {
        let raw = RawFullSnapshot {
            path: self.path.to_string_lossy().into_owned(),
            profile: Some(self.profile.selector().to_string()),
            snapshot_cls: None,
            pages_view_cls: None,
            page_view_cls: None,
            entries_view_cls: None,
            paging_entry_cls: None,
            page_types_cls: None,
            size: Some(self.image_size),
            pages: self
                .pages
                .iter()
                .map(|(offset, page)| {
                    let entries = page.entries.as_ref().map(|entries| {
                        entries
                            .iter()
                            .map(|(o, v)| (*o, RawEntry { value: *v }))
                            .collect()
                    });
                    (
                        *offset,
                        RawPage {
                            designations: encode_levels(self.profile, &page.designations),
                            entries,
                        },
                    )
                })
                .collect(),
        };
        serde_json::to_string(&raw)
            .map_err(|e| PagehuntError::Serialization(format!("JSON serialization error: {}", e)))
    }

    pub fn from_json_str(json_str: &str) -> Result<Self> {
        let raw: RawFullSnapshot = serde_json::from_str(json_str).map_err(|e| {
            PagehuntError::Serialization(format!("JSON deserialization error: {}", e))
        })?;
        let classes = LegacyClasses {
            snapshot_cls: raw.snapshot_cls,
            pages_view_cls: raw.pages_view_cls,
            page_view_cls: raw.page_view_cls,
            entries_view_cls: raw.entries_view_cls,
            paging_entry_cls: raw.paging_entry_cls,
            page_types_cls: raw.page_types_cls,
        };
        let profile = resolve_profile(raw.profile.as_deref(), &classes)?;

        let mut pages = BTreeMap::new();
        for (offset, page) in raw.pages {
            if !is_page_aligned(offset) {
                return Err(PagehuntError::Misaligned { offset });
            }
            if offset.checked_add(PAGING_STRUCTURE_SIZE).is_none() {
                return Err(PagehuntError::InvalidInput(format!(
                    "page {:#x} ends past the physical address space",
                    offset
                )));
            }
            let entries = match page.entries {
                Some(entries) => {
                    let mut decoded = BTreeMap::new();
                    for (o, entry) in entries {
                        if o % PAGING_ENTRY_SIZE != 0 || o >= PAGING_STRUCTURE_SIZE {
                            return Err(PagehuntError::InvalidInput(format!(
                                "entry offset {:#x} of page {:#x} is not a valid slot",
                                o, offset
                            )));
                        }
                        decoded.insert(o, entry.value);
                    }
                    Some(decoded)
                }
                None => None,
            };
            pages.insert(
                offset,
                FullPage {
                    designations: decode_levels(profile, &page.designations)?,
                    entries,
                },
            );
        }

        let image_size = raw.size.unwrap_or_else(|| {
            pages
                .keys()
                .next_back()
                .map_or(0, |last| last.saturating_add(PAGING_STRUCTURE_SIZE))
        });

        Ok(Self {
            path: PathBuf::from(raw.path),
            profile,
            image_size,
            pages,
        })
    }
}

impl TableSource for FullSnapshot {
    fn image_size(&self) -> u64 {
        self.image_size
    }

    /// Rebuild the table from embedded entries; non-present cells read as zero.
    fn table(&self, profile: Profile, offset: u64) -> Result<PageTable> {
        if !is_page_aligned(offset) {
            return Err(PagehuntError::Misaligned { offset });
        }
        let entries = self
            .pages
            .get(&offset)
            .and_then(|p| p.entries.as_ref())
            .ok_or_else(|| {
                PagehuntError::InvalidInput(format!(
                    "page {:#x} is not embedded in the snapshot",
                    offset
                ))
            })?;
        let mut values = vec![0u64; ENTRIES_PER_TABLE];
        for (o, v) in entries {
            if let Some(slot) = values.get_mut((*o / PAGING_ENTRY_SIZE) as usize) {
                *slot = *v;
            }
        }
        Ok(PageTable::from_values(profile, offset, values))
    }
}
