//! Compact command implementation.

use super::format_size;
use seglog_storage::FileEngine;
use std::path::Path;

/// Runs the compact command.
pub fn run(path: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    println!("Compacting store at {}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    if dry_run {
        let stats = FileEngine::inspect(path)?;
        println!("Compaction Analysis:");
        println!("  Records:    {}", stats.records);
        println!("  Live keys:  {} in {} domains", stats.live_keys, stats.domains);
        println!("  File size:  {}", format_size(stats.file_size));
        println!("  Live data:  {}", format_size(stats.live_bytes));
        return Ok(());
    }

    let stats = FileEngine::new(path).compact()?;
    let saved = stats.bytes_saved();

    println!("Compaction Result:");
    println!("  Records:     {} -> {}", stats.records_before, stats.records_after);
    println!("  Live keys:   {}", stats.live_keys);
    println!("  Size before: {}", format_size(stats.bytes_before));
    println!("  Size after:  {}", format_size(stats.bytes_after));
    println!(
        "  Space saved: {} ({:.1}%)",
        format_size(saved),
        if stats.bytes_before > 0 {
            (saved as f64 / stats.bytes_before as f64) * 100.0
        } else {
            0.0
        }
    );

    Ok(())
}
