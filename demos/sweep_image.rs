//! Score every page of an image at every level and list the cleanest
//! candidates per level.
//!
//! Usage: sweep_image <image> [report.json] [--json-logs]

use anyhow::{Context, Result};
use pagehunt::analysis::SweepClassifier;
use pagehunt::config::ScanConfig;
use pagehunt::io::MappedImage;
use pagehunt::logging::{init_tracing, init_tracing_json};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--json-logs") {
        init_tracing_json();
    } else {
        init_tracing();
    }
    let mut positional = args.iter().filter(|a| !a.starts_with("--"));
    let image_path = positional
        .next()
        .context("usage: sweep_image <image> [report.json] [--json-logs]")?;
    let report_path = positional.next();

    let config = ScanConfig::default();
    let image = MappedImage::open_with_limit(image_path, config.io.max_image_size)
        .with_context(|| format!("opening {}", image_path))?;
    let report = SweepClassifier::with_config(&image, config.profile, config.sweep.clone()).sweep();

    println!(
        "{} pages swept, {} tail bytes ignored",
        report.pages.len(),
        report.truncated_tail_bytes
    );
    for level in config.profile.levels() {
        let clean: Vec<u64> = report
            .clean_at(*level)
            .filter(|p| p.counts.iter().any(|c| c.combined() > 0))
            .map(|p| p.offset)
            .collect();
        println!(
            "{:<5} {} pages clean only at some levels, first: {:x?}",
            config.profile.level_name(*level),
            clean.len(),
            &clean[..clean.len().min(8)]
        );
    }

    if let Some(path) = report_path {
        std::fs::write(path, report.to_json_string()?)?;
    }
    Ok(())
}
