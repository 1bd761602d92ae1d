//! Flatten records of any shape into one CSV document.
//!
//! Fixed metadata columns come first, followed by the sorted union of every
//! data key seen across the exported records.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

use crate::record::RecordData;

pub const FIXED_COLUMNS: &[&str] = &[
    "Record ID",
    "Event Title",
    "Event Date",
    "Collected By",
    "Collector Email",
    "Collection Date",
    "Retrieval Code",
];

/// One record joined with the metadata shown in the fixed columns.
#[derive(Debug, Clone)]
pub struct ExportRow {
    pub record_id: i32,
    pub event_title: String,
    pub event_date: Option<NaiveDate>,
    pub collector_name: Option<String>,
    pub collector_email: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub retrieval_code: String,
    pub data: RecordData,
}

/// Sorted union of data keys across all rows.
pub fn dynamic_columns(rows: &[ExportRow]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.data.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Render the full CSV document. Lines are separated by `\n` with no
/// trailing newline.
pub fn to_csv(rows: &[ExportRow]) -> String {
    let columns = dynamic_columns(rows);
    let mut lines = Vec::with_capacity(rows.len() + 1);

    let header: Vec<String> = FIXED_COLUMNS
        .iter()
        .map(|c| escape(c))
        .chain(columns.iter().map(|c| escape(c)))
        .collect();
    lines.push(header.join(","));

    for row in rows {
        let mut cells = vec![
            row.record_id.to_string(),
            escape(&row.event_title),
            row.event_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            escape(row.collector_name.as_deref().unwrap_or_default()),
            escape(row.collector_email.as_deref().unwrap_or_default()),
            row.collected_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            escape(&row.retrieval_code),
        ];
        cells.extend(
            columns
                .iter()
                .map(|key| row.data.get(key).map(cell_text).unwrap_or_default())
                .map(|text| escape(&text)),
        );
        lines.push(cells.join(","));
    }

    lines.join("\n")
}

/// Text shown in a cell for a stored value.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    }
}

/// Quote a field if it contains a delimiter, quote or line break.
pub fn escape(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Attachment name for an export produced on `date`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("outreach_data_export_{}.csv", date.format("%Y-%m-%d"))
}
