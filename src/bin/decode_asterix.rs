//! Decode a file of length-framed ASTERIX blocks and print what's inside.
//!
//! ```text
//! decode_asterix <asterix_file> [category_definitions_dir] [--json] [--stats] [--strict] [--verbose]
//! ```
//!
//! Category definitions are XML files, one per category, loaded from the
//! given directory (default `data/asterix_categories`). `--json` prints the
//! decoded blocks as JSON instead of the text report. `RUST_LOG` controls
//! log filtering.

use std::path::PathBuf;

use asterix_decoder::{dump, Decoder, RecordStatistics};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let mut take_flag = |name: &str| {
        raw_args
            .iter()
            .position(|a| a == name)
            .map(|pos| raw_args.remove(pos))
            .is_some()
    };
    let json = take_flag("--json");
    let stats = take_flag("--stats");
    let strict = take_flag("--strict");
    let verbose = take_flag("--verbose") | take_flag("-v");

    let mut args = raw_args.into_iter();
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("usage: decode_asterix <asterix_file> [category_definitions_dir] [--json] [--stats] [--strict] [--verbose]");
        std::process::exit(1);
    };
    let schema_dir = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data/asterix_categories"));

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(if verbose { "debug" } else { "warn" })
        }))
        .with_writer(std::io::stderr)
        .init();

    let mut decoder = Decoder::new();
    decoder.set_strict_validation(strict);
    decoder.set_debug_trace(verbose);
    let categories = decoder
        .load_categories_from_directory(&schema_dir)
        .map_err(|e| anyhow::anyhow!("loading {}: {e}", schema_dir.display()))?;
    if categories.is_empty() {
        anyhow::bail!("no category definitions found in {}", schema_dir.display());
    }
    eprintln!(
        "loaded categories: {}",
        categories
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let blocks = decoder.decode_file(&input)?;
    if blocks.is_empty() {
        anyhow::bail!("no blocks decoded from {}", input.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
    } else {
        for (i, block) in blocks.iter().enumerate() {
            println!("=== Block {} ===", i + 1);
            print!("{}", dump::block_report(block));
            for record in &block.records {
                let report = decoder.validate(record);
                for diag in &report.diagnostics {
                    println!("  {:?}: {}", diag.severity, diag.message);
                }
                if !report.valid {
                    println!("  validation FAILED");
                }
            }
            println!();
        }
    }

    if stats {
        let summary = RecordStatistics::from_blocks(blocks.iter());
        eprintln!("{summary}");
    }

    eprintln!(
        "decoded {} blocks ({} valid) from {}",
        blocks.len(),
        blocks.iter().filter(|b| b.valid).count(),
        input.display()
    );
    Ok(())
}
