use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::{RecordData, is_populated, is_unsafe_key, parse_number};

/// Maximum number of fields in one event's form.
pub const MAX_FIELDS: usize = 200;

/// Maximum label length in characters.
pub const MAX_LABEL_LEN: usize = 128;

/// Input kind of a form field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Select,
    Radio,
    Checkbox,
}

impl FieldType {
    /// Field types whose answers come from a fixed option list.
    pub fn is_enumerated(&self) -> bool {
        matches!(self, Self::Select | Self::Radio | Self::Checkbox)
    }
}

/// Layout width of a field in the rendered form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FieldWidth {
    #[default]
    Full,
    Half,
}

/// One typed, labeled input definition within an event's form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct FormField {
    /// Unique within the event; used as the key in record data.
    #[schema(example = "Age")]
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Vec<String>,
    /// Master-data category supplying the options at submission time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "locations")]
    pub master_list: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub width: FieldWidth,
}

impl FormField {
    pub fn new(label: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            label: label.into(),
            field_type,
            options: Vec::new(),
            master_list: None,
            required: false,
            width: FieldWidth::Full,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// Problems with an event's field definitions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("A form may have at most 200 fields")]
    TooManyFields,
    #[error("Field labels must be 1-128 characters")]
    InvalidLabel,
    #[error("Field label '{0}' is not allowed")]
    UnsafeLabel(String),
    #[error("Duplicate field label '{0}'")]
    DuplicateLabel(String),
    #[error("Field '{0}' needs at least one option")]
    MissingOptions(String),
}

/// Trim labels and option strings in place, then check the schema.
pub fn normalize_schema(fields: &mut [FormField]) -> Result<(), SchemaError> {
    for field in fields.iter_mut() {
        field.label = field.label.trim().to_string();
        for option in field.options.iter_mut() {
            *option = option.trim().to_string();
        }
        field.options.retain(|o| !o.is_empty());
        if let Some(list) = field.master_list.take() {
            let list = list.trim().to_string();
            field.master_list = (!list.is_empty()).then_some(list);
        }
    }
    validate_schema(fields)
}

pub fn validate_schema(fields: &[FormField]) -> Result<(), SchemaError> {
    if fields.len() > MAX_FIELDS {
        return Err(SchemaError::TooManyFields);
    }
    let mut seen = HashSet::new();
    for field in fields {
        let label = field.label.as_str();
        if label.is_empty() || label.chars().count() > MAX_LABEL_LEN {
            return Err(SchemaError::InvalidLabel);
        }
        if is_unsafe_key(label) {
            return Err(SchemaError::UnsafeLabel(label.to_string()));
        }
        if !seen.insert(label) {
            return Err(SchemaError::DuplicateLabel(label.to_string()));
        }
        if matches!(field.field_type, FieldType::Select | FieldType::Radio)
            && field.options.is_empty()
            && field.master_list.is_none()
        {
            return Err(SchemaError::MissingOptions(label.to_string()));
        }
    }
    Ok(())
}

/// A single problem found while checking a record against a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldViolation {
    Missing(String),
    NotANumber(String),
    NotADate(String),
    NotAnOption { label: String, value: String },
    WrongShape(String),
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(label) => write!(f, "'{label}' is required"),
            Self::NotANumber(label) => write!(f, "'{label}' must be a number"),
            Self::NotADate(label) => write!(f, "'{label}' must be a date (YYYY-MM-DD)"),
            Self::NotAnOption { label, value } => {
                write!(f, "'{value}' is not a valid option for '{label}'")
            }
            Self::WrongShape(label) => write!(f, "'{label}' has an unsupported value"),
        }
    }
}

/// Check `data` against the fields of its event.
///
/// Keys not named by any field pass through untouched. Every violation is
/// reported, in field order.
pub fn validate_record(fields: &[FormField], data: &RecordData) -> Result<(), Vec<FieldViolation>> {
    let mut violations = Vec::new();

    for field in fields {
        let label = &field.label;
        let value = match data.get(label) {
            Some(v) if is_populated(v) => v,
            _ => {
                if field.required {
                    violations.push(FieldViolation::Missing(label.clone()));
                }
                continue;
            }
        };

        match field.field_type {
            FieldType::Text => {
                if value.is_object() {
                    violations.push(FieldViolation::WrongShape(label.clone()));
                }
            }
            FieldType::Number => {
                if parse_number(value).is_none() {
                    violations.push(FieldViolation::NotANumber(label.clone()));
                }
            }
            FieldType::Date => {
                if !value.as_str().is_some_and(is_date) {
                    violations.push(FieldViolation::NotADate(label.clone()));
                }
            }
            FieldType::Select | FieldType::Radio => match value {
                Value::String(s) => check_option(field, s, &mut violations),
                _ => violations.push(FieldViolation::WrongShape(label.clone())),
            },
            FieldType::Checkbox => match value {
                Value::Bool(_) => {}
                Value::String(s) => check_option(field, s, &mut violations),
                Value::Array(items) => {
                    for item in items {
                        match item.as_str() {
                            Some(s) => check_option(field, s, &mut violations),
                            None => {
                                violations.push(FieldViolation::WrongShape(label.clone()));
                                break;
                            }
                        }
                    }
                }
                _ => violations.push(FieldViolation::WrongShape(label.clone())),
            },
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_option(field: &FormField, value: &str, violations: &mut Vec<FieldViolation>) {
    // Options are unknown until a master list has been resolved.
    if field.options.is_empty() {
        return;
    }
    if !field.options.iter().any(|o| o == value) {
        violations.push(FieldViolation::NotAnOption {
            label: field.label.clone(),
            value: value.to_string(),
        });
    }
}

fn is_date(s: &str) -> bool {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}
