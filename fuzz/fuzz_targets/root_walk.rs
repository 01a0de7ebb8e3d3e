#![no_main]
use libfuzzer_sys::fuzz_target;
use pagehunt::analysis::{discover, GraphBuilder};
use pagehunt::io::SliceImage;
use pagehunt::paging::{page_count, Profile};

fuzz_target!(|data: &[u8]| {
    let mem = SliceImage::new(data);
    let roots = (0..page_count(data.len() as u64)).map(|p| p * 4096);
    let (map, stats) = discover(&mem, Profile::X86_64, roots);
    assert!(stats.expanded as u64 <= page_count(data.len() as u64) * 4);
    let build = GraphBuilder::new(&mem, Profile::X86_64).build(&map);
    for edge in &build.graph.edges {
        assert!(edge.target < data.len() as u64);
    }
});
