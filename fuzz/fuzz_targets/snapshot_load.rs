#![no_main]
use libfuzzer_sys::fuzz_target;
use pagehunt::snapshot::{FullSnapshot, LightSnapshot};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = LightSnapshot::from_json_str(text);
        let _ = FullSnapshot::from_json_str(text);
    }
});
