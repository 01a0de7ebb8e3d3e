use crate::common::*;
use pagehunt::analysis::{discover, SweepClassifier, SweepReport};
use pagehunt::config::SweepConfig;
use pagehunt::io::MappedImage;
use pagehunt::paging::{Level, Profile};

#[test]
fn designated_pages_are_clean_at_their_levels() {
    let file = two_process_image().write_temp();
    let image = MappedImage::open(file.path()).unwrap();
    let report = SweepClassifier::new(&image, Profile::X86_64).sweep();
    let (map, _) = discover(&image, Profile::X86_64, [ROOT_A, ROOT_B]);

    assert_eq!(report.pages.len(), 16);
    for (offset, levels) in map.iter() {
        let score = report.get(offset).unwrap();
        for level in levels {
            assert_eq!(score.counts(*level).invalid, 0, "{:#x} {}", offset, level);
        }
    }
    // The kernel PD holds one structural reference past the image end.
    assert_eq!(report.get(0x7000).unwrap().counts(Level::Middle).oob, 1);
    // Read as a PML4, the PDP with a 1 GiB mapping is malformed.
    assert_eq!(report.get(0x4000).unwrap().counts(Level::Top).invalid, 1);
}

#[test]
fn chunked_sweep_resumes_to_the_same_report() {
    let data = two_process_image().tail(17).build();
    let mem = pagehunt::io::SliceImage::new(&data);
    let whole = SweepClassifier::new(&mem, Profile::X86_64).sweep();
    assert_eq!(whole.truncated_tail_bytes, 17);

    let sweeper = SweepClassifier::with_config(
        &mem,
        Profile::X86_64,
        SweepConfig {
            chunk_pages: 5,
            parallel: false,
        },
    );
    let mut pages = Vec::new();
    for start in (0..sweeper.total_pages()).step_by(5) {
        let (scores, skipped) = sweeper.sweep_range(start, start + 5);
        assert_eq!(skipped, 0);
        pages.extend(scores);
    }
    assert_eq!(pages, whole.pages);
}

#[test]
fn report_json_round_trip() {
    let data = two_process_image().build();
    let mem = pagehunt::io::SliceImage::new(&data);
    let report = SweepClassifier::new(&mem, Profile::X86_64).sweep();
    let json = report.to_json_string().unwrap();
    assert_eq!(SweepReport::from_json_str(&json).unwrap(), report);
}

#[test]
fn placeholder_profile_only_flags_out_of_bounds() {
    let data = two_process_image().build();
    let mem = pagehunt::io::SliceImage::new(&data);
    let report = SweepClassifier::new(&mem, Profile::Arm64).sweep();
    for page in &report.pages {
        assert!(page.counts.iter().all(|c| c.invalid == 0));
    }
    assert_eq!(report.get(0x7000).unwrap().counts(Level::Upper).oob, 1);
}
