//! Per-event summary statistics computed from a snapshot of its records.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::form::{FieldType, FormField};
use crate::record::{RecordData, is_populated, parse_number};

/// The parts of a stored record the aggregator looks at.
#[derive(Debug, Clone)]
pub struct RecordSample {
    pub data: RecordData,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct AnalyticsReport {
    pub kpis: Kpis,
    pub fields: Vec<FieldSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Kpis {
    /// Number of records collected for the event.
    #[schema(example = 2)]
    pub total_patients: u64,
    /// Rounded percentage of records with every required field populated.
    #[schema(example = 50)]
    pub completion_rate: u32,
    /// Creation time of the newest record.
    pub last_entry: Option<DateTime<Utc>>,
}

/// Breakdown of a single field. Number fields get numeric stats, every
/// other type gets a frequency table.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldSummary {
    Categorical {
        label: String,
        #[serde(rename = "totalResponses")]
        total_responses: u64,
        /// Distinct answers in order of first appearance.
        data: Vec<Frequency>,
    },
    Numerical {
        label: String,
        #[serde(rename = "totalResponses")]
        total_responses: u64,
        /// Null when no value could be parsed as a number.
        stats: Option<NumericStats>,
    },
}

impl FieldSummary {
    pub fn label(&self) -> &str {
        match self {
            Self::Categorical { label, .. } | Self::Numerical { label, .. } => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct Frequency {
    #[schema(example = "Positive")]
    pub name: String,
    #[schema(example = 1)]
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, utoipa::ToSchema)]
pub struct NumericStats {
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

/// Summarize `records` against the event's current field list.
///
/// Completion is judged against today's schema, so records collected before
/// a field became required count as incomplete.
pub fn summarize(fields: &[FormField], records: &[RecordSample]) -> AnalyticsReport {
    AnalyticsReport {
        kpis: kpis(fields, records),
        fields: fields.iter().map(|f| summarize_field(f, records)).collect(),
    }
}

fn kpis(fields: &[FormField], records: &[RecordSample]) -> Kpis {
    let total = records.len() as u64;
    let required: Vec<&FormField> = fields.iter().filter(|f| f.required).collect();

    let complete = records
        .iter()
        .filter(|r| required.iter().all(|f| is_answered(f, &r.data)))
        .count() as u64;

    Kpis {
        total_patients: total,
        completion_rate: completion_rate(complete, total),
        last_entry: records.iter().map(|r| r.created_at).max(),
    }
}

/// A required field is answered when populated; number fields also need a
/// parseable value.
fn is_answered(field: &FormField, data: &RecordData) -> bool {
    match data.get(&field.label) {
        Some(value) if field.field_type == FieldType::Number => parse_number(value).is_some(),
        Some(value) => is_populated(value),
        None => false,
    }
}

fn completion_rate(complete: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (complete as f64 * 100.0 / total as f64).round() as u32
}

fn summarize_field(field: &FormField, records: &[RecordSample]) -> FieldSummary {
    let values = records.iter().filter_map(|r| r.data.get(&field.label));

    match field.field_type {
        FieldType::Number => {
            let numbers: Vec<f64> = values.filter_map(parse_number).collect();
            FieldSummary::Numerical {
                label: field.label.clone(),
                total_responses: numbers.len() as u64,
                stats: numeric_stats(&numbers),
            }
        }
        _ => {
            let mut table = FrequencyTable::default();
            let mut responses = 0;
            for value in values.filter(|v| is_populated(v)) {
                responses += 1;
                match value {
                    Value::Array(items) => {
                        for item in items.iter().filter(|v| is_populated(v)) {
                            table.add(answer_text(item));
                        }
                    }
                    other => table.add(answer_text(other)),
                }
            }
            FieldSummary::Categorical {
                label: field.label.clone(),
                total_responses: responses,
                data: table.into_entries(),
            }
        }
    }
}

fn numeric_stats(numbers: &[f64]) -> Option<NumericStats> {
    if numbers.is_empty() {
        return None;
    }
    let sum: f64 = numbers.iter().sum();
    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(NumericStats {
        average: sum / numbers.len() as f64,
        min,
        max,
    })
}

fn answer_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Counts keyed by answer, remembering first-seen order.
#[derive(Default)]
struct FrequencyTable {
    index: HashMap<String, usize>,
    entries: Vec<Frequency>,
}

impl FrequencyTable {
    fn add(&mut self, name: String) {
        if let Some(&i) = self.index.get(&name) {
            self.entries[i].value += 1;
            return;
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push(Frequency { name, value: 1 });
    }

    fn into_entries(self) -> Vec<Frequency> {
        self.entries
    }
}
