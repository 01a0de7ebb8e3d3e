//! Discover paging structures reachable from the top-level tables listed
//! by a process-listing plugin, then save a light snapshot.
//!
//! Usage: known_structures <image> <tasks.json> <out.json> [--kpti] [--config scan.json]

use anyhow::{bail, Context, Result};
use pagehunt::analysis::GraphBuilder;
use pagehunt::config::ScanConfig;
use pagehunt::core::process::{load_task_info, roots_from_tasks};
use pagehunt::logging::init_tracing;
use pagehunt::snapshot::{store, Snapshot};

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let kpti = args.iter().any(|a| a == "--kpti");
    let config = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            ScanConfig::from_json_file(path)?
        }
        None => ScanConfig::default(),
    };
    let positional: Vec<&String> = args
        .iter()
        .enumerate()
        .filter(|(i, a)| !a.starts_with("--") && (*i == 0 || args[i - 1] != "--config"))
        .map(|(_, a)| a)
        .collect();
    let [image, tasks, out] = positional[..] else {
        bail!("usage: known_structures <image> <tasks.json> <out.json> [--kpti] [--config scan.json]");
    };

    let tasks = load_task_info(tasks).with_context(|| format!("reading {}", tasks))?;
    let roots = roots_from_tasks(&tasks, kpti);

    let mut snapshot = Snapshot::open(image, config.profile, &config.io)
        .with_context(|| format!("opening {}", image))?;
    let stats = snapshot.discover(roots.iter().map(|r| r.address));

    let build = GraphBuilder::with_config(&snapshot, config.profile, config.graph.clone())
        .build(snapshot.designations());
    let mut graph = build.graph;
    let annotated = graph.annotate_processes(&roots);

    let summary = snapshot.designations().summary();
    println!("roots walked:        {} ({} rejected)", stats.roots, stats.rejected_roots);
    println!("designated pages:    {}", summary.pages);
    for (level, count) in &summary.per_level {
        println!("  {:<6} {}", config.profile.level_name(*level), count);
    }
    println!("ambiguous pages:     {}", summary.ambiguous);
    println!("graph:               {} nodes, {} edges", graph.node_count(), graph.edge_count());
    println!("annotated roots:     {}", annotated);
    println!("out-of-bounds:       {}", build.out_of_bounds.len());
    for oob in build.out_of_bounds.iter().take(10) {
        println!(
            "  {} page {:#x} +{:#x} -> {:#x} ({:#018x})",
            config.profile.level_name(oob.designation),
            oob.page_offset,
            oob.entry_offset,
            oob.target,
            oob.value
        );
    }

    store::save_light(&snapshot.to_light(true)?, out)?;
    Ok(())
}
