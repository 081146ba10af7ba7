use serde_json::Value;
use std::io::Write;

use super::validation::EntityConfig;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush export: {0}")]
    Io(#[from] std::io::Error),
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item.get("name").and_then(Value::as_str) {
                Some(name) => name.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
    }
}

/// Writes `records` as CSV with one column per configured field, keyed by
/// field name in the header row. Returns the number of data rows.
pub fn export_csv<W: Write>(
    records: &[Value],
    entity: &EntityConfig,
    writer: W,
) -> Result<usize, ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(entity.fields.iter().map(|field| field.key.as_str()))?;

    for record in records {
        csv.write_record(
            entity
                .fields
                .iter()
                .map(|field| cell(record.get(&field.key))),
        )?;
    }

    csv.flush()?;
    Ok(records.len())
}
