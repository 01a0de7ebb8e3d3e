//! Snapshots: a designation map bound to its raw image and profile.
//!
//! `Snapshot` is the live value used for analysis: one mapped image, one
//! profile tag and the designation map. Tables are read on demand through
//! plain functions of `(profile, memory, offset)`; there are no per-page
//! view objects. `LightSnapshot` and `FullSnapshot` are the persisted
//! forms, handled by the `store` module.

pub mod full;
pub mod light;
pub mod store;

pub use full::{FullPage, FullSnapshot};
pub use light::{LightSnapshot, FORMAT_VERSION};

use crate::analysis::walker::{RootWalker, WalkStats};
use crate::config::IoConfig;
use crate::core::designations::Designations;
use crate::error::{PagehuntError, Result};
use crate::hashing;
use crate::io::{MappedImage, MemoryView};
use crate::paging::{PageTable, Profile, TableSource};
use std::path::Path;
use tracing::{info, warn};

/// A raw image, the profile it is decoded with and its designation map.
#[derive(Debug)]
pub struct Snapshot {
    image: MappedImage,
    profile: Profile,
    designations: Designations,
}

impl Snapshot {
    pub fn new(image: MappedImage, profile: Profile) -> Self {
        Self::from_parts(image, profile, Designations::new())
    }

    pub fn from_parts(image: MappedImage, profile: Profile, designations: Designations) -> Self {
        Self {
            image,
            profile,
            designations,
        }
    }

    /// Map an image for analysis with the limits of `io`.
    pub fn open<P: AsRef<Path>>(path: P, profile: Profile, io: &IoConfig) -> Result<Self> {
        let image = MappedImage::open_with_limit(path, io.max_image_size)?;
        Ok(Self::new(image, profile))
    }

    /// Replay a light snapshot against the image at its recorded path.
    pub fn replay(light: &LightSnapshot, io: &IoConfig, verify_fingerprint: bool) -> Result<Self> {
        Self::replay_at(light, &light.path, io, verify_fingerprint)
    }

    /// Replay a light snapshot against the image at `image_path`.
    ///
    /// # Errors
    ///
    /// `ImageMismatch` when the image size differs from the recorded one,
    /// or when `verify_fingerprint` is set and the recorded fingerprint
    /// does not match.
    pub fn replay_at<P: AsRef<Path>>(
        light: &LightSnapshot,
        image_path: P,
        io: &IoConfig,
        verify_fingerprint: bool,
    ) -> Result<Self> {
        let image = MappedImage::open_with_limit(image_path, io.max_image_size)?;

        if let Some(expected) = light.image_size {
            if expected != image.size() {
                return Err(PagehuntError::ImageMismatch {
                    expected: format!("{} bytes", expected),
                    found: format!("{} bytes", image.size()),
                });
            }
        }
        if verify_fingerprint {
            match &light.fingerprint {
                Some(expected) => {
                    let found = hashing::fingerprint(&image)?;
                    if *expected != found {
                        return Err(PagehuntError::ImageMismatch {
                            expected: expected.clone(),
                            found,
                        });
                    }
                }
                None => warn!(
                    path = %image.path().display(),
                    "Snapshot has no fingerprint; image not verified"
                ),
            }
        }

        info!(
            path = %image.path().display(),
            profile = %light.profile,
            pages = light.designations.len(),
            "Replaying light snapshot"
        );
        Ok(Self::from_parts(
            image,
            light.profile,
            light.designations.clone(),
        ))
    }

    pub fn image(&self) -> &MappedImage {
        &self.image
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn designations(&self) -> &Designations {
        &self.designations
    }

    pub fn into_designations(self) -> Designations {
        self.designations
    }

    /// The paging structure at `offset` under this snapshot's profile.
    pub fn page(&self, offset: u64) -> Result<PageTable> {
        self.image.table(self.profile, offset)
    }

    /// Walk `roots` and merge the results into the designation map.
    pub fn discover<I>(&mut self, roots: I) -> WalkStats
    where
        I: IntoIterator<Item = u64>,
    {
        RootWalker::new(&self.image, self.profile).walk(roots, &mut self.designations)
    }

    /// Persistable form; fingerprinting reads the whole image.
    pub fn to_light(&self, with_fingerprint: bool) -> Result<LightSnapshot> {
        let fingerprint = if with_fingerprint {
            Some(hashing::fingerprint(&self.image)?)
        } else {
            None
        };
        Ok(LightSnapshot::new(
            self.image.path(),
            self.profile,
            self.designations.clone(),
        )
        .with_image_info(self.image.size(), fingerprint))
    }

    /// Embed the designated pages' entries.
    pub fn to_full(&self) -> FullSnapshot {
        FullSnapshot::capture(
            &self.image,
            self.image.path(),
            self.profile,
            &self.designations,
        )
    }
}

impl TableSource for Snapshot {
    fn image_size(&self) -> u64 {
        self.image.size()
    }

    fn table(&self, profile: Profile, offset: u64) -> Result<PageTable> {
        self.image.table(profile, offset)
    }
}
