//! Light snapshots: a designation map plus the path of its raw image.
//!
//! Entries are never stored; they are re-read from the image on replay.
//! Levels are written with the profile's own names (`PML4`, `PDP`, ...)
//! and the profile selector is resolved against the closed registry
//! before anything else is interpreted.

use crate::core::designations::Designations;
use crate::error::{PagehuntError, Result};
use crate::paging::{is_page_aligned, Level, Profile};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Version written by this library.
pub const FORMAT_VERSION: u32 = 1;

/// Fully qualified class names that older tools wrote in place of a
/// profile selector. `None` marks view classes shared by every profile.
const LEGACY_CLASSES: &[(&str, Option<Profile>)] = &[
    ("paging_detection.interfaces.Snapshot", Some(Profile::X86_64)),
    ("paging_detection.mmaped.MemMappedSnapshot", Some(Profile::X86_64)),
    ("paging_detection.PagingEntry", Some(Profile::X86_64)),
    ("paging_detection.PageTypes", Some(Profile::X86_64)),
    ("paging_detection.arm64.ARM64Snapshot", Some(Profile::Arm64)),
    ("paging_detection.arm64.ARM64PagingEntry", Some(Profile::Arm64)),
    ("paging_detection.arm64.ARM64PageTypes", Some(Profile::Arm64)),
    ("paging_detection.interfaces.PagesView", None),
    ("paging_detection.interfaces.PageView", None),
    ("paging_detection.interfaces.EntriesView", None),
];

/// Class-name fields of older snapshot files. Read, never written.
///
/// Not flattened into the raw shapes: flatten breaks integer map keys.
#[derive(Debug, Default)]
pub(crate) struct LegacyClasses {
    pub snapshot_cls: Option<String>,
    pub pages_view_cls: Option<String>,
    pub page_view_cls: Option<String>,
    pub entries_view_cls: Option<String>,
    pub paging_entry_cls: Option<String>,
    pub page_types_cls: Option<String>,
}

impl LegacyClasses {
    fn names(&self) -> impl Iterator<Item = &str> + '_ {
        [
            &self.snapshot_cls,
            &self.pages_view_cls,
            &self.page_view_cls,
            &self.entries_view_cls,
            &self.paging_entry_cls,
            &self.page_types_cls,
        ]
        .into_iter()
        .filter_map(|name| name.as_deref())
    }

    /// Profile named by the class fields, if any of them names one.
    ///
    /// Every class must be a known one and all of them must agree.
    pub(crate) fn profile(&self) -> Result<Option<Profile>> {
        let mut found: Option<Profile> = None;
        for name in self.names() {
            let known = LEGACY_CLASSES
                .iter()
                .find(|(class, _)| *class == name)
                .ok_or_else(|| PagehuntError::UnknownProfile(name.to_string()))?;
            match (found, known.1) {
                (_, None) => {}
                (None, Some(profile)) => found = Some(profile),
                (Some(prev), Some(profile)) if prev != profile => {
                    return Err(PagehuntError::UnknownProfile(format!(
                        "{} conflicts with {}",
                        name, prev
                    )));
                }
                _ => {}
            }
        }
        Ok(found)
    }
}

/// On-disk shape. Files without `profile` or metadata predate those
/// fields and load as x86-64 snapshots unless their class fields say
/// otherwise.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RawLightSnapshot {
    #[serde(default)]
    pub format_version: u32,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing)]
    pub snapshot_cls: Option<String>,
    #[serde(default, skip_serializing)]
    pub pages_view_cls: Option<String>,
    #[serde(default, skip_serializing)]
    pub page_view_cls: Option<String>,
    #[serde(default, skip_serializing)]
    pub entries_view_cls: Option<String>,
    #[serde(default, skip_serializing)]
    pub paging_entry_cls: Option<String>,
    #[serde(default, skip_serializing)]
    pub page_types_cls: Option<String>,
    pub designations: BTreeMap<u64, BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Canonical persisted form of a designation map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightSnapshot {
    pub path: PathBuf,
    pub profile: Profile,
    pub designations: Designations,
    /// Size of the image the map was derived from, when known
    pub image_size: Option<u64>,
    /// BLAKE3 fingerprint of that image, when recorded
    pub fingerprint: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub format_version: u32,
}

impl LightSnapshot {
    pub fn new<P: Into<PathBuf>>(path: P, profile: Profile, designations: Designations) -> Self {
        Self {
            path: path.into(),
            profile,
            designations,
            image_size: None,
            fingerprint: None,
            created_at: Some(Utc::now()),
            format_version: FORMAT_VERSION,
        }
    }

    /// Record the image size and, optionally, its fingerprint.
    pub fn with_image_info(mut self, image_size: u64, fingerprint: Option<String>) -> Self {
        self.image_size = Some(image_size);
        self.fingerprint = fingerprint;
        self
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(&self.to_raw())
            .map_err(|e| PagehuntError::Serialization(format!("JSON serialization error: {}", e)))
    }

    /// Parse a light snapshot.
    ///
    /// # Errors
    ///
    /// `UnknownProfile` for an unregistered selector, `UnknownLevel` for a
    /// level name the profile does not define and `Misaligned` for a page
    /// offset that is not a multiple of the page size.
    pub fn from_json_str(json_str: &str) -> Result<Self> {
        let raw: RawLightSnapshot = serde_json::from_str(json_str).map_err(|e| {
            PagehuntError::Serialization(format!("JSON deserialization error: {}", e))
        })?;
        Self::from_raw(raw)
    }

    pub(crate) fn to_raw(&self) -> RawLightSnapshot {
        RawLightSnapshot {
            format_version: self.format_version,
            path: self.path.to_string_lossy().into_owned(),
            profile: Some(self.profile.selector().to_string()),
            snapshot_cls: None,
            pages_view_cls: None,
            page_view_cls: None,
            entries_view_cls: None,
            paging_entry_cls: None,
            page_types_cls: None,
            designations: encode_designations(self.profile, &self.designations),
            image_size: self.image_size,
            fingerprint: self.fingerprint.clone(),
            created_at: self.created_at,
        }
    }

    pub(crate) fn from_raw(raw: RawLightSnapshot) -> Result<Self> {
        if raw.format_version > FORMAT_VERSION {
            return Err(PagehuntError::InvalidInput(format!(
                "snapshot format version {} is newer than supported version {}",
                raw.format_version, FORMAT_VERSION
            )));
        }
        let classes = LegacyClasses {
            snapshot_cls: raw.snapshot_cls,
            pages_view_cls: raw.pages_view_cls,
            page_view_cls: raw.page_view_cls,
            entries_view_cls: raw.entries_view_cls,
            paging_entry_cls: raw.paging_entry_cls,
            page_types_cls: raw.page_types_cls,
        };
        let profile = resolve_profile(raw.profile.as_deref(), &classes)?;
        let designations = decode_designations(profile, raw.designations)?;
        Ok(Self {
            path: PathBuf::from(raw.path),
            profile,
            designations,
            image_size: raw.image_size,
            fingerprint: raw.fingerprint,
            created_at: raw.created_at,
            format_version: raw.format_version,
        })
    }
}

/// Resolve the selector and any legacy class names to one registered
/// profile. Neither present means x86-64.
pub(crate) fn resolve_profile(
    selector: Option<&str>,
    classes: &LegacyClasses,
) -> Result<Profile> {
    let named = selector.map(Profile::from_selector).transpose()?;
    match (named, classes.profile()?) {
        (Some(profile), Some(legacy)) if profile != legacy => {
            Err(PagehuntError::UnknownProfile(format!(
                "{} conflicts with legacy classes of {}",
                profile, legacy
            )))
        }
        (Some(profile), _) | (None, Some(profile)) => Ok(profile),
        (None, None) => Ok(Profile::default()),
    }
}

pub(crate) fn encode_levels(profile: Profile, levels: &BTreeSet<Level>) -> BTreeSet<String> {
    levels
        .iter()
        .map(|l| profile.level_name(*l).to_string())
        .collect()
}

pub(crate) fn decode_levels(profile: Profile, names: &BTreeSet<String>) -> Result<BTreeSet<Level>> {
    names.iter().map(|n| profile.parse_level(n)).collect()
}

fn encode_designations(
    profile: Profile,
    designations: &Designations,
) -> BTreeMap<u64, BTreeSet<String>> {
    designations
        .iter()
        .map(|(offset, levels)| (offset, encode_levels(profile, levels)))
        .collect()
}

fn decode_designations(
    profile: Profile,
    raw: BTreeMap<u64, BTreeSet<String>>,
) -> Result<Designations> {
    raw.into_iter()
        .map(|(offset, names)| {
            if !is_page_aligned(offset) {
                return Err(PagehuntError::Misaligned { offset });
            }
            Ok((offset, decode_levels(profile, &names)?))
        })
        .collect()
}
