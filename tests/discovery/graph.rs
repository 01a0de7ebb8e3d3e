use crate::common::*;
use pagehunt::analysis::graph::mapped_pages;
use pagehunt::analysis::{discover, GraphBuilder, OutOfBoundsEntry, SweepClassifier};
use pagehunt::config::GraphConfig;
use pagehunt::core::{Designations, ProcessInfo, RootKind, RootSpec};
use pagehunt::io::SliceImage;
use pagehunt::paging::{Level, Profile};

#[test]
fn edges_are_well_formed() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let (map, _) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    let build = GraphBuilder::new(&mem, Profile::X86_64).build(&map);
    let graph = &build.graph;

    assert_eq!(graph.edge_count(), 10);
    for edge in &graph.edges {
        let level = edge.level.unwrap();
        assert!(map.contains(edge.source, level), "{:?}", edge);
        assert!(edge.target < data.len() as u64);
        assert!(edge.entry_offset >= edge.source && edge.entry_offset < edge.source + PAGE);
        assert_eq!(edge.entry_offset % 8, 0);
    }

    let kernel_pdp = graph.node(0x5000).unwrap();
    assert_eq!(kernel_pdp.in_degree, 2);
    assert_eq!(kernel_pdp.out_degree, 1);
    // PD entries mapping 2 MiB plus both entries read as PT entries.
    assert_eq!(graph.node(0x6000).unwrap().data_pages, 3);
    assert_eq!(graph.node(0x8000).unwrap().data_pages, 3);
    assert_eq!(graph.node(0x4000).unwrap().data_pages, 1);
    assert_eq!(
        graph.node(0x6000).unwrap().membership(),
        [false, false, true, true]
    );
}

#[test]
fn out_of_bounds_entries_are_reported_exactly() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let (map, _) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    let build = GraphBuilder::new(&mem, Profile::X86_64).build(&map);
    assert_eq!(
        build.out_of_bounds,
        vec![OutOfBoundsEntry {
            designation: Level::Middle,
            page_offset: 0x7000,
            entry_offset: 24,
            target: 0x1_0000_0000,
            value: 0x1_0000_0003,
        }]
    );
    assert!(build.graph.node(0x1_0000_0000).is_none());
}

#[test]
fn target_at_image_end_is_out_of_bounds() {
    let data = ImageBuilder::new(2).entry(0x1000, 5, 0x2003).build();
    let mem = SliceImage::new(&data);
    let mut map = Designations::new();
    map.designate(0x1000, Level::Top);
    let build = GraphBuilder::new(&mem, Profile::X86_64).build(&map);
    assert_eq!(build.graph.edge_count(), 0);
    assert_eq!(
        build.out_of_bounds,
        vec![OutOfBoundsEntry {
            designation: Level::Top,
            page_offset: 0x1000,
            entry_offset: 40,
            target: 0x2000,
            value: 0x2003,
        }]
    );
}

#[test]
fn large_page_counts_as_data_not_edge() {
    let data = ImageBuilder::new(3)
        .entry(0x2000, 0, 0x1003)
        .entry(0x1000, 0, 0x0083)
        .build();
    let mem = SliceImage::new(&data);
    let (map, _) = discover(&mem, Profile::X86_64, [0x2000]);
    let graph = GraphBuilder::new(&mem, Profile::X86_64).build(&map).graph;
    let pdp = graph.node(0x1000).unwrap();
    assert_eq!(pdp.data_pages, 1);
    assert_eq!(pdp.out_degree, 0);
    assert!(graph.node(0).is_none());

    let graph = GraphBuilder::with_config(
        &mem,
        Profile::X86_64,
        GraphConfig {
            data_page_nodes: true,
        },
    )
    .build(&map)
    .graph;
    assert_eq!(graph.node(0x1000).unwrap().out_degree, 1);
    assert!(graph.node(0).unwrap().designations.is_empty());
}

#[test]
fn process_annotations_reach_root_nodes() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let (map, _) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    let mut graph = GraphBuilder::new(&mem, Profile::X86_64).build(&map).graph;
    let roots = vec![
        RootSpec {
            address: ROOT_A,
            kind: RootKind::Kernel,
            process: Some(ProcessInfo {
                pid: 10,
                ppid: 1,
                name: "sshd".into(),
            }),
        },
        RootSpec {
            address: ROOT_A,
            kind: RootKind::Kernel,
            process: Some(ProcessInfo {
                pid: 11,
                ppid: 10,
                name: "sshd".into(),
            }),
        },
    ];
    assert_eq!(graph.annotate_processes(&roots), 2);
    assert_eq!(graph.node(ROOT_A).unwrap().processes.len(), 2);
    assert!(graph.node(ROOT_B).unwrap().processes.is_empty());
}

#[test]
fn mapped_pages_of_two_processes() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let (map, _) = discover(&mem, Profile::X86_64, [ROOT_A, ROOT_B]);
    let mapped = mapped_pages(&mem, Profile::X86_64, &map);
    for page in [0x9000, 0xA000, 0x8000, 0x20_0000, 0x4000_0000, 0x7FFF_0000_0000] {
        assert!(mapped.contains(&page), "{:#x}", page);
    }
    assert!(!mapped.contains(&0x3000));
}

#[test]
fn candidate_graph_covers_every_page() {
    let data = two_process_image().build();
    let mem = SliceImage::new(&data);
    let report = SweepClassifier::new(&mem, Profile::X86_64).sweep();
    let graph = GraphBuilder::new(&mem, Profile::X86_64).build_candidate_graph(&report);
    assert_eq!(graph.node_count(), 16);
    assert!(graph.edges.iter().all(|e| e.target < data.len() as u64));
    // 0x7000 -> 0x8000 and 0x7000 -> 0x6000; the out-of-bounds slot adds nothing.
    assert_eq!(graph.edges_from(0x7000).count(), 2);
    let json = graph.to_json_string().unwrap();
    assert!(json.contains("\"sweep\""));
}
