use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::UserStatus;
use serde::{Deserialize, Serialize};

use super::auth::{UserResponse, validate_email};
use super::shared::Pagination;
use crate::error::AppError;

/// Query parameters for user listing.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct UserListQuery {
    #[param(example = 1)]
    pub page: Option<u64>,
    #[param(example = 20)]
    pub per_page: Option<u64>,
    /// Case-insensitive username or email search.
    pub search: Option<String>,
    /// Filter by role name.
    #[param(example = "volunteer")]
    pub role: Option<String>,
    pub status: Option<UserStatus>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<UserResponse>,
    pub pagination: Pagination,
}

/// Change a user's role or status.
#[derive(Deserialize, Default, PartialEq, utoipa::ToSchema)]
pub struct UpdateUserRequest {
    #[schema(example = "staff")]
    pub role: Option<String>,
    pub status: Option<UserStatus>,
}

/// Site-wide settings.
#[derive(Serialize, utoipa::ToSchema)]
pub struct SiteConfigResponse {
    #[schema(example = "Community Outreach")]
    pub site_name: String,
    pub support_email: Option<String>,
    pub registration_open: bool,
    pub submissions_open: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<crate::entity::site_config::Model> for SiteConfigResponse {
    fn from(m: crate::entity::site_config::Model) -> Self {
        Self {
            site_name: m.site_name,
            support_email: m.support_email,
            registration_open: m.registration_open,
            submissions_open: m.submissions_open,
            updated_at: m.updated_at,
        }
    }
}

/// Full replacement of the site settings.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateSiteConfigRequest {
    #[schema(example = "Community Outreach")]
    pub site_name: String,
    pub support_email: Option<String>,
    pub registration_open: bool,
    pub submissions_open: bool,
}

pub fn validate_site_config(req: &UpdateSiteConfigRequest) -> Result<(), AppError> {
    let name = req.site_name.trim();
    if name.is_empty() || name.chars().count() > 128 {
        return Err(AppError::Validation(
            "Site name must be 1-128 characters".into(),
        ));
    }
    if let Some(ref email) = req.support_email
        && !email.trim().is_empty()
    {
        validate_email(email)?;
    }
    Ok(())
}

/// Replacement value list for one master-data category.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ReplaceMasterDataRequest {
    /// Values in display order. Blank entries are dropped.
    #[schema(example = json!(["North Clinic", "Riverside Hall"]))]
    pub values: Vec<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MasterDataResponse {
    #[schema(example = "locations")]
    pub category: String,
    pub values: Vec<String>,
}

/// Every category and its values.
#[derive(Serialize, utoipa::ToSchema)]
pub struct MasterDataCatalog {
    #[schema(example = json!({"locations": ["North Clinic"]}))]
    pub categories: BTreeMap<String, Vec<String>>,
}

pub fn validate_category(category: &str) -> Result<(), AppError> {
    let valid = !category.is_empty()
        && category.len() <= 64
        && category
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(AppError::Validation(
            "Category must be 1-64 characters of letters, digits, '_' or '-'".into(),
        ));
    }
    Ok(())
}

/// Trim values, drop blanks and duplicates while keeping the first occurrence.
pub fn normalize_master_values(values: Vec<String>) -> Result<Vec<String>, AppError> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = value.trim().to_string();
        if value.is_empty() || out.contains(&value) {
            continue;
        }
        if value.chars().count() > 256 {
            return Err(AppError::Validation(
                "Master data values must be at most 256 characters".into(),
            ));
        }
        out.push(value);
    }
    if out.len() > 1000 {
        return Err(AppError::Validation(
            "A category may hold at most 1000 values".into(),
        ));
    }
    Ok(out)
}
