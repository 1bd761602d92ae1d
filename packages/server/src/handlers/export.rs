use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use common::export::{ExportRow, export_filename, to_csv};
use common::record::RecordData;
use sea_orm::*;
use serde::Deserialize;
use tracing::instrument;

use crate::entity::{event, record, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::state::AppState;
use crate::utils::event::find_event;

/// Query parameters for the CSV export.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct ExportQuery {
    /// Limit the export to one event. Omit to export every event.
    #[param(example = 1)]
    pub event_id: Option<i32>,
}

#[utoipa::path(
    get,
    path = "/api/v1/export",
    tag = "Export",
    operation_id = "exportRecords",
    summary = "Download records as CSV",
    description = "Fixed metadata columns come first, followed by the sorted union of every data key across the exported records. Exporting every event requires `data:export`; a single event may also be exported by its owner. Any failure aborts the whole export.",
    params(ExportQuery),
    responses(
        (status = 200, description = "CSV document", content_type = "text/csv", body = String),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(event_id = ?query.event_id))]
pub async fn export_csv(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let events: HashMap<i32, event::Model> = match query.event_id {
        Some(id) => {
            let model = find_event(&state.db, id).await?;
            if !auth_user.has_permission("data:export") && model.owner_id != auth_user.user_id {
                return Err(AppError::PermissionDenied);
            }
            HashMap::from([(model.id, model)])
        }
        None => {
            auth_user.require_permission("data:export")?;
            event::Entity::find()
                .all(&state.db)
                .await?
                .into_iter()
                .map(|e| (e.id, e))
                .collect()
        }
    };

    let mut select = record::Entity::find();
    if let Some(id) = query.event_id {
        select = select.filter(record::Column::EventId.eq(id));
    }
    let records = select
        .order_by_asc(record::Column::CreatedAt)
        .order_by_asc(record::Column::Id)
        .all(&state.db)
        .await?;

    let submitter_ids: Vec<i32> = records.iter().filter_map(|r| r.submitted_by).collect();
    let collectors: HashMap<i32, user::Model> = if submitter_ids.is_empty() {
        HashMap::new()
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(submitter_ids))
            .all(&state.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect()
    };

    let rows = records
        .into_iter()
        .map(|r| {
            let owner = events.get(&r.event_id).ok_or_else(|| {
                AppError::Internal(format!("Record {} references missing event {}", r.id, r.event_id))
            })?;
            let collector = r.submitted_by.and_then(|id| collectors.get(&id));
            Ok(ExportRow {
                record_id: r.id,
                event_title: owner.title.clone(),
                event_date: Some(owner.event_date.date_naive()),
                collector_name: collector.map(|u| u.username.clone()),
                collector_email: collector.map(|u| u.email.clone()),
                collected_at: r.created_at,
                retrieval_code: r.retrieval_code,
                data: RecordData::from_stored(&r.data),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let filename = export_filename(chrono::Utc::now().date_naive());
    tracing::info!(rows = rows.len(), exported_by = auth_user.user_id, "CSV export");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        to_csv(&rows),
    ))
}
