//! Verify command implementation.

use seglog_storage::{CommitRecord, FileEngine, FileHeader, StorageError};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: usize,
    /// Bytes of an incomplete trailing record.
    pub tail_bytes: u64,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    println!("Verifying store at {}", path.display());
    println!();

    let result = verify(path)?;

    println!("  Records checked: {}", result.records_checked);
    if result.tail_bytes > 0 {
        println!(
            "  Torn tail: {} bytes (ignored by readers, truncated by the next write)",
            result.tail_bytes
        );
    }
    for error in &result.errors {
        println!("  ERROR: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}

/// Checks every record's envelope and checksum, and that commit sequences
/// never go backwards.
///
/// Corruption is reported in the result; only I/O failures are returned as
/// errors.
pub fn verify(path: &Path) -> Result<VerifyResult, StorageError> {
    let mut result = VerifyResult::default();

    let (header, records) = match FileEngine::records(path) {
        Ok(found) => found,
        Err(err @ StorageError::Io(_)) => return Err(err),
        Err(err) => {
            result.errors.push(err.to_string());
            return Ok(result);
        }
    };

    check_records(header.as_ref(), &records, &mut result);
    result.tail_bytes = FileEngine::inspect(path)?.tail_bytes;

    Ok(result)
}

fn check_records(
    header: Option<&FileHeader>,
    records: &[(u64, CommitRecord)],
    result: &mut VerifyResult,
) {
    if header.is_none() {
        result.errors.push("file is too short to hold a store header".into());
        return;
    }

    let mut last_sequence = 0;
    for (index, (offset, record)) in records.iter().enumerate() {
        result.records_checked += 1;
        if record.sequence < last_sequence {
            result.errors.push(format!(
                "record at offset {offset} has sequence {} after {last_sequence}",
                record.sequence
            ));
        }
        // Compacting a store with no live keys leaves one empty record that
        // carries the sequence. Commits never write empty records.
        if record.ops.is_empty() && index > 0 {
            result
                .errors
                .push(format!("record at offset {offset} holds no operations"));
        }
        last_sequence = last_sequence.max(record.sequence);
    }
}
