//! Reading and writing persisted snapshot files.

use crate::error::{PagehuntError, Result};
use crate::snapshot::full::FullSnapshot;
use crate::snapshot::light::LightSnapshot;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Either persisted form, as found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnySnapshot {
    Light(LightSnapshot),
    Full(FullSnapshot),
}

impl AnySnapshot {
    /// Light view of either form.
    pub fn into_light(self) -> LightSnapshot {
        match self {
            AnySnapshot::Light(light) => light,
            AnySnapshot::Full(full) => full.into_light(),
        }
    }
}

pub fn load_light<P: AsRef<Path>>(path: P) -> Result<LightSnapshot> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading light snapshot");
    LightSnapshot::from_json_str(&fs::read_to_string(path)?)
}

pub fn load_full<P: AsRef<Path>>(path: P) -> Result<FullSnapshot> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Loading full snapshot");
    FullSnapshot::from_json_str(&fs::read_to_string(path)?)
}

/// Load a snapshot file, telling the forms apart by their top-level keys.
pub fn load_any<P: AsRef<Path>>(path: P) -> Result<AnySnapshot> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)
        .map_err(|e| PagehuntError::Serialization(format!("JSON deserialization error: {}", e)))?;

    let is_full = value.get("pages").is_some();
    let is_light = value.get("designations").is_some();
    match (is_full, is_light) {
        (true, false) => Ok(AnySnapshot::Full(FullSnapshot::from_json_str(&text)?)),
        (false, true) => Ok(AnySnapshot::Light(LightSnapshot::from_json_str(&text)?)),
        _ => Err(PagehuntError::InvalidInput(format!(
            "{} is neither a light nor a full snapshot",
            path.display()
        ))),
    }
}

pub fn save_light<P: AsRef<Path>>(snapshot: &LightSnapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, snapshot.to_json_string()?)?;
    info!(
        path = %path.display(),
        pages = snapshot.designations.len(),
        "Saved light snapshot"
    );
    Ok(())
}

pub fn save_full<P: AsRef<Path>>(snapshot: &FullSnapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, snapshot.to_json_string()?)?;
    info!(path = %path.display(), pages = snapshot.pages.len(), "Saved full snapshot");
    Ok(())
}

/// Rewrite a legacy full snapshot file as a light one.
pub fn convert_full_to_light<P, Q>(input: P, output: Q) -> Result<LightSnapshot>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let light = load_full(input)?.into_light();
    save_light(&light, output)?;
    Ok(light)
}
