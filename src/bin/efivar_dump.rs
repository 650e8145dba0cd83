// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Inspect the variable records carried by a device tree blob.
// Author: Lukas Bower

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use efivar_restore::{
    CacheBuildStats, LifecycleChannel, MemoryStore, RecordCache, RecordSummary, RestoreConfig,
    RestoreEngine, RestoreOutcome, RestoreReport,
};
use serde::Serialize;

#[derive(Parser)]
#[command(
    name = "efivar-dump",
    about = "List and replay variable records from a device tree blob",
    version
)]
struct Cli {
    /// Flattened device tree blob.
    dtb: PathBuf,
    /// Record tag to match instead of the configured one.
    #[arg(long)]
    magic: Option<String>,
    /// TOML configuration file; defaults to $EFIVAR_RESTORE_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print JSON instead of text.
    #[arg(long)]
    json: bool,
    /// Replay the records into an in-memory store and report the result.
    #[arg(long)]
    restore: bool,
}

#[derive(Serialize)]
struct Dump {
    stats: CacheBuildStats,
    records: Vec<RecordSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    restore: Option<RestoreReport>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => RestoreConfig::load(path)?,
        None => RestoreConfig::load_active(),
    };
    if let Some(magic) = cli.magic {
        config.magic = magic;
    }

    let blob = std::fs::read(&cli.dtb)
        .with_context(|| format!("failed to read {}", cli.dtb.display()))?;
    let cache = RecordCache::from_blob(&blob, &config.parser())
        .with_context(|| format!("failed to cache records from {}", cli.dtb.display()))?;

    let restore = if cli.restore {
        let mut channel = LifecycleChannel::new();
        let mut engine = RestoreEngine::new();
        engine.arm(&mut channel)?;
        let mut store = MemoryStore::new();
        match engine.on_exit_boot_services(&cache, &mut store, &mut channel) {
            RestoreOutcome::Completed(report) => Some(report),
            RestoreOutcome::AlreadyDone => None,
        }
    } else {
        None
    };

    let dump = Dump {
        stats: cache.stats(),
        records: cache.iter().map(|record| record.summary()).collect(),
        restore,
    };
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&dump)?);
    } else {
        print_text(&cache, &dump);
    }
    Ok(())
}

fn print_text(cache: &RecordCache, dump: &Dump) {
    for record in cache {
        println!("{record}");
    }
    let stats = dump.stats;
    println!(
        "{} cached, {} tagged, {} malformed, {} dropped",
        stats.cached, stats.tagged, stats.malformed, stats.dropped
    );
    if let Some(report) = &dump.restore {
        println!(
            "restore: {}/{} restored, {} failed, {} conflicts deleted",
            report.restored, report.total, report.failed, report.conflicts_deleted
        );
        for failure in &report.failures {
            println!(
                "  {} ({}) attr=0x{:x} size={}: {}",
                failure.name, failure.scope, failure.attributes, failure.size, failure.error
            );
        }
    }
}
