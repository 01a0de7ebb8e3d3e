#![no_main]
use libfuzzer_sys::fuzz_target;
use pagehunt::analysis::SweepClassifier;
use pagehunt::io::SliceImage;
use pagehunt::paging::Profile;

fuzz_target!(|data: &[u8]| {
    let mem = SliceImage::new(data);
    for profile in Profile::REGISTRY {
        let report = SweepClassifier::new(&mem, profile).sweep();
        assert_eq!(report.pages.len() as u64, data.len() as u64 / 4096);
    }
});
