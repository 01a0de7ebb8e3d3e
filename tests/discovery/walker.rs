use crate::common::*;
use pagehunt::analysis::{discover, RootWalker};
use pagehunt::core::Designations;
use pagehunt::io::SliceImage;
use pagehunt::paging::{page_count, Level, Profile, ENTRIES_PER_TABLE};
use std::collections::BTreeSet;

fn levels(map: &Designations, offset: u64) -> Vec<Level> {
    map.get(offset)
        .map(|s| s.iter().copied().collect())
        .unwrap_or_default()
}

#[test]
fn two_processes_share_kernel_tables() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let (map, stats) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);

    assert_eq!(levels(&map, ROOT_A), vec![Level::Top]);
    assert_eq!(levels(&map, ROOT_B), vec![Level::Top]);
    assert_eq!(levels(&map, 0x5000), vec![Level::Upper]);
    assert_eq!(levels(&map, 0x7000), vec![Level::Middle]);
    // Reached as a PD from A's user half and as a PT through the kernel half.
    assert_eq!(levels(&map, 0x6000), vec![Level::Middle, Level::Leaf]);
    assert_eq!(levels(&map, 0x8000), vec![Level::Leaf]);
    assert_eq!(map.len(), 8);

    // Data pages are never designated.
    for data_page in [0x9000, 0xA000] {
        assert!(map.get(data_page).is_none());
    }

    assert_eq!(stats.roots, 2);
    assert_eq!(stats.expanded, 9);
    assert_eq!(stats.out_of_bounds, 1);
    assert_eq!(stats.unreadable_pages, 0);
    assert_eq!(map.summary().ambiguous, 1);
}

#[test]
fn walking_twice_is_byte_identical() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let (first, _) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    let (second, _) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    // Re-walking into an existing map expands nothing new.
    let mut map = first.clone();
    let stats = RootWalker::new(&mem, Profile::X86_64).walk([ROOT_A, ROOT_B], &mut map);
    assert_eq!(stats.expanded, 0);
    assert_eq!(map, first);
}

#[test]
fn root_order_does_not_matter() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let walker = RootWalker::new(&mem, Profile::X86_64);

    let mut forward = Designations::new();
    walker.walk_root(ROOT_A, &mut forward);
    walker.walk_root(ROOT_B, &mut forward);

    let mut backward = Designations::new();
    walker.walk_root(ROOT_B, &mut backward);
    walker.walk_root(ROOT_A, &mut backward);

    assert_eq!(forward, backward);
}

#[test]
fn decodes_are_bounded() {
    // Linear chains: one page per level and root.
    let mut image = ImageBuilder::new(64);
    let roots: Vec<u64> = (0..3u64).map(|i| 0x1000 + i * 0x5000).collect();
    for root in &roots {
        for depth in 0..3u64 {
            let page = root + depth * PAGE;
            image = image.entry(page, 7, (page + PAGE) | 3);
        }
    }
    let data = image.build();
    let mem = SliceImage::new(&data);
    let depth = Profile::X86_64.levels().len() as u64;
    let (_, stats) = discover(&mem, Profile::X86_64, roots.iter().copied());
    assert!(stats.entries_decoded <= roots.len() as u64 * depth * ENTRIES_PER_TABLE as u64);

    // With fan-out, each (page, level) pair is still expanded at most once.
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let (_, stats) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    let pages = page_count(data.len() as u64);
    assert!(stats.expanded as u64 <= pages * depth);
    assert_eq!(stats.entries_decoded, stats.expanded as u64 * ENTRIES_PER_TABLE as u64);
}

#[test]
fn large_page_is_not_walked_into() {
    // PML4 at 0x2000 -> PDP at 0x1000 whose single entry maps the 1 GiB
    // page at 0 (page B).
    let data = ImageBuilder::new(3)
        .entry(0x2000, 0, 0x1003)
        .entry(0x1000, 0, 0x0083)
        .build();
    let mem = SliceImage::new(&data);
    let (map, stats) = discover(&mem, Profile::X86_64, [0x2000]);
    assert!(map.get(0).is_none());
    assert_eq!(map.offsets().collect::<BTreeSet<_>>(), BTreeSet::from([0x1000, 0x2000]));
    assert_eq!(stats.out_of_bounds, 0);
}

#[test]
fn hostile_memory_does_not_stop_discovery() {
    // Every slot of the root points at the root itself or past the end.
    let mut image = ImageBuilder::new(2);
    for i in 0..512 {
        let value = if i % 2 == 0 { 0x1003 } else { 0xFFFF_FFFF_FFFF_FFFF };
        image = image.entry(0x1000, i, value);
    }
    let data = image.tail(123).build();
    let mem = SliceImage::new(&data);
    let (map, stats) = discover(&mem, Profile::X86_64, [0x1000, 0x1001, 0x10_0000]);
    assert_eq!(map.len(), 1);
    assert_eq!(map.get(0x1000).unwrap().len(), 4);
    assert_eq!(stats.rejected_roots, 2);
    assert!(stats.out_of_bounds > 0);
}

#[test]
fn walker_from_task_info() {
    let json = format!(
        r#"[{{"PID": 1, "PPID": 0, "COMM": "init", "phy_pgd": {}}},
            {{"PID": 2, "PPID": 1, "COMM": "sh", "phy_pgd": {}}},
            {{"PID": 3, "PPID": 1, "COMM": "zombie", "phy_pgd": -1}}]"#,
        ROOT_A, ROOT_B
    );
    let tasks = pagehunt::core::process::parse_task_info(&json).unwrap();
    let roots = pagehunt::core::process::roots_from_tasks(&tasks, false);
    assert_eq!(roots.len(), 2);

    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let mut map = Designations::new();
    RootWalker::new(&mem, Profile::X86_64).walk_specs(&roots, &mut map);
    let (expected, _) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    assert_eq!(map, expected);
}
