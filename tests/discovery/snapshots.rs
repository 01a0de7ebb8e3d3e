use crate::common::*;
use pagehunt::config::IoConfig;
use pagehunt::error::PagehuntError;
use pagehunt::paging::{Profile, TableSource};
use pagehunt::snapshot::store::{self, AnySnapshot};
use pagehunt::snapshot::{FullSnapshot, LightSnapshot, Snapshot};
use tempfile::TempDir;

fn discovered(file: &tempfile::NamedTempFile) -> Snapshot {
    let mut snap = Snapshot::open(file.path(), Profile::X86_64, &IoConfig::default()).unwrap();
    snap.discover([ROOT_A, ROOT_B]);
    snap
}

#[test]
fn light_round_trip_rereads_identical_entries() {
    let image = two_process_image().write_temp();
    let dir = TempDir::new().unwrap();
    let snap = discovered(&image);
    let before: Vec<_> = snap
        .designations()
        .offsets()
        .map(|o| snap.page(o).unwrap())
        .collect();

    let path = dir.path().join("light.json");
    store::save_light(&snap.to_light(true).unwrap(), &path).unwrap();
    drop(snap);

    let light = store::load_light(&path).unwrap();
    let replayed = Snapshot::replay(&light, &IoConfig::default(), true).unwrap();
    let after: Vec<_> = replayed
        .designations()
        .offsets()
        .map(|o| replayed.page(o).unwrap())
        .collect();
    assert_eq!(before, after);
}

#[test]
fn legacy_and_light_forms_decode_the_same_entries() {
    let image = two_process_image().write_temp();
    let dir = TempDir::new().unwrap();
    let snap = discovered(&image);

    let full_path = dir.path().join("full.json");
    let light_path = dir.path().join("light.json");
    store::save_full(&snap.to_full(), &full_path).unwrap();
    store::save_light(&snap.to_light(false).unwrap(), &light_path).unwrap();

    let full = store::load_full(&full_path).unwrap();
    let light = store::load_light(&light_path).unwrap();
    let replayed = Snapshot::replay(&light, &IoConfig::default(), false).unwrap();

    assert_eq!(full.designations(), light.designations);
    for offset in light.designations.offsets() {
        assert_eq!(
            full.table(Profile::X86_64, offset).unwrap(),
            replayed.page(offset).unwrap(),
            "page {:#x}",
            offset
        );
    }
}

#[test]
fn converted_legacy_file_replays() {
    let image = two_process_image().write_temp();
    let dir = TempDir::new().unwrap();
    let snap = discovered(&image);
    let full_path = dir.path().join("full.json");
    let light_path = dir.path().join("light.json");
    store::save_full(&snap.to_full(), &full_path).unwrap();

    let light = store::convert_full_to_light(&full_path, &light_path).unwrap();
    assert!(matches!(store::load_any(&light_path).unwrap(), AnySnapshot::Light(_)));
    let replayed = Snapshot::replay(&light, &IoConfig::default(), false).unwrap();
    assert_eq!(replayed.designations(), snap.designations());
}

#[test]
fn light_file_without_profile_loads() {
    let image = two_process_image().write_temp();
    let json = format!(
        r#"{{"path": {:?}, "designations": {{"4096": ["PML4"], "12288": ["PDP"], "24576": ["PD", "PT"]}}}}"#,
        image.path().to_string_lossy()
    );
    let light = LightSnapshot::from_json_str(&json).unwrap();
    assert_eq!(light.profile, Profile::X86_64);
    let replayed = Snapshot::replay(&light, &IoConfig::default(), false).unwrap();
    assert_eq!(replayed.designations().len(), 3);
}

#[test]
fn unknown_selector_fails_before_touching_the_image() {
    let json = r#"{"path": "/does/not/exist.raw", "profile": "evil.module.Loader", "designations": {}}"#;
    assert!(matches!(
        LightSnapshot::from_json_str(json),
        Err(PagehuntError::UnknownProfile(_))
    ));
    let json = r#"{"path": "/does/not/exist.raw", "profile": "riscv", "pages": {}}"#;
    assert!(matches!(
        FullSnapshot::from_json_str(json),
        Err(PagehuntError::UnknownProfile(_))
    ));
}

#[test]
fn replay_against_a_different_image_is_refused() {
    let image = two_process_image().write_temp();
    let other = two_process_image().entry(0x9000, 0, 1).write_temp();
    let light = discovered(&image).to_light(true).unwrap();
    assert!(matches!(
        Snapshot::replay_at(&light, other.path(), &IoConfig::default(), true),
        Err(PagehuntError::ImageMismatch { .. })
    ));
}
