use chrono::{DateTime, Utc};
use common::{EventStatus, FormField};
use serde::{Deserialize, Serialize};

use super::shared::{Pagination, double_option, validate_title};
use crate::error::AppError;

/// Request body for creating an event.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateEventRequest {
    /// Event title (1-256 characters).
    #[schema(example = "Riverside Health Screening")]
    pub title: String,
    #[serde(default)]
    #[schema(example = "Blood pressure and glucose checks at the community hall.")]
    pub description: String,
    pub event_date: DateTime<Utc>,
    /// Ordered form fields. Labels become the keys of submitted records.
    #[serde(default)]
    pub fields: Vec<FormField>,
    /// Allow anonymous submissions without an access code. Default: false.
    #[serde(default)]
    pub is_public: bool,
    /// Shared code letting anonymous visitors open a non-public form.
    #[schema(example = "RIVER24")]
    pub access_code: Option<String>,
}

/// Partial update of an event. Absent fields are left unchanged.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    /// Replaces the whole field list. Existing records are not rewritten.
    pub fields: Option<Vec<FormField>>,
    pub is_public: Option<bool>,
    /// `null` clears the access code.
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>)]
    pub access_code: Option<Option<String>>,
}

/// Review decision on a pending event.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReviewEventRequest {
    /// `approved` or `rejected`.
    pub status: EventStatus,
    /// Optional note shown to the event owner.
    #[schema(example = "Please add a consent field.")]
    pub note: Option<String>,
}

/// Query parameters for event listing.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct EventListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Case-insensitive title search.
    #[param(example = "screening")]
    pub search: Option<String>,
    /// Filter by review status.
    pub status: Option<EventStatus>,
    /// Sort field: `created_at` (default), `updated_at`, `event_date`, `title`.
    #[param(example = "created_at")]
    pub sort_by: Option<String>,
    /// Sort direction: `asc` or `desc` (default).
    #[param(example = "desc")]
    pub sort_order: Option<String>,
}

/// Query parameters accepted by the public form endpoint.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct FormQuery {
    /// Access code for non-public events.
    pub access_code: Option<String>,
}

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// Full event details.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EventResponse {
    #[schema(example = 1)]
    pub id: i32,
    pub title: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub fields: Vec<FormField>,
    pub owner_id: i32,
    pub status: EventStatus,
    pub is_public: bool,
    /// Only shown to the owner and event managers.
    pub access_code: Option<String>,
    pub review_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventResponse {
    pub fn new(
        model: crate::entity::event::Model,
        fields: Vec<FormField>,
        show_access_code: bool,
    ) -> Self {
        Self {
            id: model.id,
            title: model.title,
            description: model.description,
            event_date: model.event_date,
            fields,
            owner_id: model.owner_id,
            status: model.status,
            is_public: model.is_public,
            access_code: model.access_code.filter(|_| show_access_code),
            review_note: model.review_note,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Event summary used in list responses.
#[derive(Serialize, utoipa::ToSchema)]
pub struct EventListItem {
    pub id: i32,
    pub title: String,
    pub event_date: DateTime<Utc>,
    pub owner_id: i32,
    pub status: EventStatus,
    pub is_public: bool,
    /// Number of records collected so far.
    pub record_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct EventListResponse {
    pub data: Vec<EventListItem>,
    pub pagination: Pagination,
}

/// The form a collector fills in, with master-data options resolved.
#[derive(Serialize, utoipa::ToSchema)]
pub struct FormResponse {
    pub event_id: i32,
    pub title: String,
    pub description: String,
    pub event_date: DateTime<Utc>,
    pub fields: Vec<FormField>,
    /// Whether the event currently accepts new records.
    pub accepting_submissions: bool,
}

fn validate_description(description: &str) -> Result<(), AppError> {
    if description.len() > 100_000 {
        return Err(AppError::Validation(
            "Description must be at most 100KB".into(),
        ));
    }
    Ok(())
}

fn validate_access_code(code: &str) -> Result<(), AppError> {
    let code = code.trim();
    if code.is_empty() || code.chars().count() > 64 {
        return Err(AppError::Validation(
            "Access code must be 1-64 characters".into(),
        ));
    }
    Ok(())
}

pub fn validate_create_event(req: &CreateEventRequest) -> Result<(), AppError> {
    validate_title(&req.title)?;
    validate_description(&req.description)?;
    if let Some(ref code) = req.access_code {
        validate_access_code(code)?;
    }
    Ok(())
}

pub fn validate_update_event(req: &UpdateEventRequest) -> Result<(), AppError> {
    if let Some(ref title) = req.title {
        validate_title(title)?;
    }
    if let Some(ref description) = req.description {
        validate_description(description)?;
    }
    if let Some(Some(ref code)) = req.access_code {
        validate_access_code(code)?;
    }
    Ok(())
}

pub fn validate_review(req: &ReviewEventRequest) -> Result<(), AppError> {
    if req.status == EventStatus::Pending {
        return Err(AppError::Validation(
            "Review status must be approved or rejected".into(),
        ));
    }
    if req.note.as_ref().is_some_and(|n| n.len() > 10_000) {
        return Err(AppError::Validation(
            "Review note must be at most 10KB".into(),
        ));
    }
    Ok(())
}
