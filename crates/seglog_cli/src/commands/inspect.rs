//! Inspect command implementation.

use super::format_size;
use seglog_storage::{FileEngine, StoreStats};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// File epoch, if the file has a header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<String>,
    /// Number of commit records.
    pub records: u64,
    /// Sequence number of the last commit.
    pub last_sequence: u64,
    /// Number of non-empty domains.
    pub domains: usize,
    /// Number of live keys.
    pub live_keys: u64,
    /// Total size of live values.
    pub live_bytes: u64,
    /// Bytes of an incomplete trailing record.
    pub tail_bytes: u64,
}

impl InspectResult {
    fn new(path: &Path, stats: &StoreStats) -> Self {
        Self {
            path: path.display().to_string(),
            file_size: stats.file_size,
            epoch: stats.epoch.map(|e| e.to_string()),
            records: stats.records,
            last_sequence: stats.last_sequence,
            domains: stats.domains,
            live_keys: stats.live_keys,
            live_bytes: stats.live_bytes,
            tail_bytes: stats.tail_bytes,
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let stats = FileEngine::inspect(path)?;
    let result = InspectResult::new(path, &stats);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Seglog Store Inspection");
    println!("=======================");
    println!();
    println!("Path:  {}", result.path);
    println!("Epoch: {}", result.epoch.as_deref().unwrap_or("(none)"));
    println!();
    println!("Storage:");
    println!("  File size:  {}", format_size(result.file_size));
    println!("  Live data:  {}", format_size(result.live_bytes));
    if result.tail_bytes > 0 {
        println!("  Torn tail:  {} (truncated by the next write)", format_size(result.tail_bytes));
    }
    println!();
    println!("Records:");
    println!("  Commits:       {}", result.records);
    println!("  Last sequence: {}", result.last_sequence);
    println!();
    println!("Keys:");
    println!("  Domains:   {}", result.domains);
    println!("  Live keys: {}", result.live_keys);
}
