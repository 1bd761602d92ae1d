use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::shared::Pagination;

/// Request body for submitting or correcting a record.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct SubmitRecordRequest {
    /// Field label -> value. Must be a JSON object.
    #[schema(value_type = Object, example = json!({"Age": 34, "Result": "Negative"}))]
    pub data: serde_json::Value,
    /// When present, updates the record holding this code instead of
    /// creating a new one.
    #[schema(example = "K7QM2XPA")]
    pub retrieval_code: Option<String>,
    /// Access code for non-public events.
    pub access_code: Option<String>,
}

/// Query parameters for record listing.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct RecordListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Sort by creation time: `asc` or `desc` (default).
    #[param(example = "desc")]
    pub sort_order: Option<String>,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// A stored record.
#[derive(Serialize, utoipa::ToSchema)]
pub struct RecordResponse {
    #[schema(example = 17)]
    pub id: i32,
    pub event_id: i32,
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
    pub submitted_by: Option<i32>,
    /// Keep this to correct the record later.
    #[schema(example = "K7QM2XPA")]
    pub retrieval_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::record::Model> for RecordResponse {
    fn from(m: crate::entity::record::Model) -> Self {
        Self {
            id: m.id,
            event_id: m.event_id,
            data: m.data,
            submitted_by: m.submitted_by,
            retrieval_code: m.retrieval_code,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Response to a submission.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SubmitRecordResponse {
    pub record: RecordResponse,
    /// True when an existing record was updated through its retrieval code.
    pub updated: bool,
    /// Number of unsafe keys stripped from the payload.
    pub removed_keys: usize,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RecordListResponse {
    pub data: Vec<RecordResponse>,
    pub pagination: Pagination,
}
