//! Dump command implementation.

use super::render_value;
use seglog_dal::EntityKey;
use seglog_storage::{CommitRecord, FileEngine, Op};
use serde::Serialize;
use std::path::Path;

/// One operation of a commit record, for output.
#[derive(Debug, Serialize)]
pub struct OpInfo {
    /// Offset of the containing record in the store file.
    pub offset: u64,
    /// Commit sequence number.
    pub sequence: u64,
    /// `put` or `delete`.
    pub op: &'static str,
    /// Domain.
    pub domain: String,
    /// Raw key.
    pub key: String,
    /// Entity kind the key encodes, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    /// Value size in bytes (puts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_size: Option<usize>,
    /// Rendered value (puts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Runs the dump command.
pub fn run(path: &Path, limit: Option<usize>, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }

    let (_, records) = FileEngine::records(path)?;
    let ops = describe(&records, limit);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&ops)?);
        }
        _ => {
            print_text_output(&ops);
        }
    }

    Ok(())
}

/// Flattens the first `limit` records into per-operation rows.
pub fn describe(records: &[(u64, CommitRecord)], limit: Option<usize>) -> Vec<OpInfo> {
    records
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .flat_map(|(offset, record)| {
            record.ops.iter().map(move |op| {
                let entity = EntityKey::parse(op.key()).map(|k| k.kind().to_string());
                let (kind, value) = match op {
                    Op::Put { value, .. } => ("put", Some(value)),
                    Op::Delete { .. } => ("delete", None),
                };
                OpInfo {
                    offset: *offset,
                    sequence: record.sequence,
                    op: kind,
                    domain: op.domain().to_string(),
                    key: op.key().to_string(),
                    entity,
                    value_size: value.map(Vec::len),
                    value: value.map(|v| render_value(v)),
                }
            })
        })
        .collect()
}

fn print_text_output(ops: &[OpInfo]) {
    for info in ops {
        let entity = info.entity.as_deref().unwrap_or("-");
        match (&info.value, info.value_size) {
            (Some(value), Some(size)) => println!(
                "{:>10} #{:<6} {:<6} {:<8} {}/{} ({size} B) = {value}",
                info.offset, info.sequence, info.op, entity, info.domain, info.key
            ),
            _ => println!(
                "{:>10} #{:<6} {:<6} {:<8} {}/{}",
                info.offset, info.sequence, info.op, entity, info.domain, info.key
            ),
        }
    }
    println!();
    println!("{} operations", ops.len());
}
