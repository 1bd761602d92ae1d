use axum::Json;
use axum::extract::{Path, State};
use common::analytics::{AnalyticsReport, RecordSample, summarize};
use common::record::RecordData;
use sea_orm::*;
use tracing::instrument;

use crate::entity::record;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::state::AppState;
use crate::utils::event::{event_fields, find_event, require_data_access};

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/analytics",
    tag = "Analytics",
    operation_id = "getEventAnalytics",
    summary = "Summary statistics of an event's records",
    description = "Computes headline numbers and a per-field breakdown over every record of the event, judged against the event's current fields. Number fields get average/min/max over parseable values; other fields get a frequency table in order of first appearance. Allowed for the event owner and users with `record:view_all`.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Analytics report", body = AnalyticsReport),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(event_id))]
pub async fn get_analytics(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let model = find_event(&state.db, event_id).await?;
    require_data_access(&auth_user, &model)?;
    let fields = event_fields(&model)?;

    let samples: Vec<RecordSample> = record::Entity::find()
        .filter(record::Column::EventId.eq(event_id))
        .order_by_asc(record::Column::CreatedAt)
        .order_by_asc(record::Column::Id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|r| RecordSample {
            data: RecordData::from_stored(&r.data),
            created_at: r.created_at,
        })
        .collect();

    tracing::debug!(records = samples.len(), fields = fields.len(), "Summarizing event");
    Ok(Json(summarize(&fields, &samples)))
}
