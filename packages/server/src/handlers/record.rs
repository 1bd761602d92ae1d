use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::record::{RecordData, sanitize};
use common::{FormField, form, retrieval};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{event, record};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::client::ClientAddr;
use crate::extractors::json::AppJson;
use crate::models::record::*;
use crate::models::shared::{Pagination, sort_order};
use crate::state::AppState;
use crate::utils::event::{
    access_code_matches, check_event_visible, event_fields, find_event, require_data_access,
    resolve_master_options,
};
use crate::utils::rate_limit::check_rate_limit;
use crate::utils::site::load_site_config;

/// Attempts at drawing an unused retrieval code before giving up.
const MAX_CODE_ATTEMPTS: usize = 5;

fn record_not_found() -> AppError {
    AppError::NotFound("Record not found".into())
}

async fn find_record<C: ConnectionTrait>(db: &C, id: i32) -> Result<record::Model, AppError> {
    record::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(record_not_found)
}

/// Fields of the event with master-data options filled in, ready for validation.
async fn resolved_fields<C: ConnectionTrait>(
    db: &C,
    model: &event::Model,
) -> Result<Vec<FormField>, AppError> {
    let mut fields = event_fields(model)?;
    resolve_master_options(db, &mut fields).await?;
    Ok(fields)
}

#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/records",
    tag = "Records",
    operation_id = "submitRecord",
    summary = "Submit or correct a record",
    description = "Without `retrieval_code`, creates a new record and returns its retrieval code (201). With `retrieval_code`, merges the submitted keys into the record holding that code (200); a `null` value removes a key. Unknown codes return 404 and create nothing. Anonymous callers may submit to public events or with the event's access code. Every attempt, accepted or not, is rate limited per user or client address.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = SubmitRecordRequest,
    responses(
        (status = 201, description = "Record created", body = SubmitRecordResponse),
        (status = 200, description = "Record updated", body = SubmitRecordResponse),
        (status = 400, description = "Validation error or event closed (VALIDATION_ERROR)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event or record not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Rate limited (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, client, payload), fields(event_id))]
pub async fn submit_record(
    auth_user: Option<AuthUser>,
    client: ClientAddr,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    AppJson(payload): AppJson<SubmitRecordRequest>,
) -> Result<(StatusCode, Json<SubmitRecordResponse>), AppError> {
    let model = find_event(&state.db, event_id).await?;

    // Every attempt counts, including ones rejected further down.
    let bucket = client.bucket(auth_user.as_ref().map(|u| u.user_id));
    check_rate_limit(
        &state.db,
        &bucket,
        state.config.submission.rate_limit_per_minute,
    )
    .await?;

    // A retrieval code is a credential of its own; visibility only gates new records.
    let code = match payload.retrieval_code.as_deref() {
        Some(raw) => Some(retrieval::normalize(raw).ok_or_else(record_not_found)?),
        None => {
            check_event_visible(auth_user.as_ref(), &model, payload.access_code.as_deref())?;
            None
        }
    };

    if !model.status.accepts_submissions() {
        return Err(AppError::Validation(
            "This event is not accepting submissions".into(),
        ));
    }
    if !load_site_config(&state.db).await?.submissions_open {
        return Err(AppError::Validation(
            "Submissions are currently closed".into(),
        ));
    }

    if code.is_none() {
        let allowed = match auth_user {
            Some(ref user) => {
                user.has_permission("record:submit")
                    || model.is_public
                    || access_code_matches(&model, payload.access_code.as_deref())
            }
            None => true,
        };
        if !allowed {
            return Err(AppError::PermissionDenied);
        }
    }

    let sanitized = sanitize(payload.data)?;
    if sanitized.removed > 0 {
        tracing::warn!(
            event_id,
            removed = sanitized.removed,
            client = %client.0,
            "Stripped unsafe keys from submitted record"
        );
    }
    let size = serde_json::to_vec(&sanitized.data)
        .map_err(|e| AppError::Internal(format!("Record serialization error: {}", e)))?
        .len();
    if size > state.config.submission.max_size {
        return Err(AppError::Validation(format!(
            "Record data must be at most {} bytes",
            state.config.submission.max_size
        )));
    }

    let fields = resolved_fields(&state.db, &model).await?;

    let response = match code {
        Some(code) => {
            let existing = record::Entity::find()
                .filter(record::Column::EventId.eq(event_id))
                .filter(record::Column::RetrievalCode.eq(&code))
                .one(&state.db)
                .await?
                .ok_or_else(record_not_found)?;

            let mut data = RecordData::from_stored(&existing.data);
            data.merge(sanitized.data);
            form::validate_record(&fields, &data)?;

            let mut active: record::ActiveModel = existing.into();
            active.data = Set(data.into_value());
            active.client_key = Set(bucket);
            active.updated_at = Set(chrono::Utc::now());
            let updated = active.update(&state.db).await?;

            tracing::info!(event_id, record_id = updated.id, "Record updated by retrieval code");
            (
                StatusCode::OK,
                SubmitRecordResponse {
                    record: updated.into(),
                    updated: true,
                    removed_keys: sanitized.removed,
                },
            )
        }
        None => {
            form::validate_record(&fields, &sanitized.data)?;
            let created = insert_with_fresh_code(
                &state.db,
                event_id,
                sanitized.data,
                auth_user.as_ref().map(|u| u.user_id),
                bucket,
            )
            .await?;

            tracing::info!(event_id, record_id = created.id, "Record created");
            (
                StatusCode::CREATED,
                SubmitRecordResponse {
                    record: created.into(),
                    updated: false,
                    removed_keys: sanitized.removed,
                },
            )
        }
    };

    Ok((response.0, Json(response.1)))
}

/// Insert a record, drawing a new retrieval code whenever the unique index
/// reports a collision.
async fn insert_with_fresh_code<C: ConnectionTrait>(
    db: &C,
    event_id: i32,
    data: RecordData,
    submitted_by: Option<i32>,
    client_key: String,
) -> Result<record::Model, AppError> {
    let data = data.into_value();
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = retrieval::generate(&mut rand::rng());
        let now = chrono::Utc::now();
        let new_record = record::ActiveModel {
            event_id: Set(event_id),
            data: Set(data.clone()),
            submitted_by: Set(submitted_by),
            retrieval_code: Set(code),
            client_key: Set(client_key.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };

        match new_record.insert(db).await {
            Ok(model) => return Ok(model),
            Err(e) => match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    tracing::debug!(attempt, "Retrieval code collision, drawing another");
                }
                _ => return Err(e.into()),
            },
        }
    }
    Err(AppError::Internal(format!(
        "No unused retrieval code after {} attempts",
        MAX_CODE_ATTEMPTS
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/records/by-code/{code}",
    tag = "Records",
    operation_id = "getRecordByCode",
    summary = "Look up a record by retrieval code",
    description = "Returns the record so a collector can prefill a correction. Codes are matched case-insensitively; dashes and spaces are ignored. Lookups are rate limited per user or client address, failed ones included.",
    params(("code" = String, Path, description = "Retrieval code")),
    responses(
        (status = 200, description = "Record", body = RecordResponse),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
        (status = 429, description = "Rate limited (RATE_LIMITED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, client, code))]
pub async fn get_record_by_code(
    auth_user: Option<AuthUser>,
    client: ClientAddr,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<RecordResponse>, AppError> {
    let bucket = format!(
        "lookup:{}",
        client.bucket(auth_user.as_ref().map(|u| u.user_id))
    );
    check_rate_limit(
        &state.db,
        &bucket,
        state.config.submission.lookup_rate_limit_per_minute,
    )
    .await?;

    let code = retrieval::normalize(&code).ok_or_else(record_not_found)?;
    let model = record::Entity::find()
        .filter(record::Column::RetrievalCode.eq(code))
        .one(&state.db)
        .await?
        .ok_or_else(record_not_found)?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/records",
    tag = "Records",
    operation_id = "listRecords",
    summary = "List the records of an event",
    description = "Paginated, ordered by creation time. Allowed for the event owner and users with `record:view_all`.",
    params(
        ("id" = i32, Path, description = "Event ID"),
        RecordListQuery,
    ),
    responses(
        (status = 200, description = "List of records", body = RecordListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query), fields(event_id))]
pub async fn list_records(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(event_id): Path<i32>,
    Query(query): Query<RecordListQuery>,
) -> Result<Json<RecordListResponse>, AppError> {
    let model = find_event(&state.db, event_id).await?;
    require_data_access(&auth_user, &model)?;

    let (page, per_page) = Pagination::normalize(query.page, query.per_page);
    let select = record::Entity::find().filter(record::Column::EventId.eq(event_id));

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let order = sort_order(query.sort_order.as_deref());
    let data = select
        .order_by(record::Column::CreatedAt, order.clone())
        .order_by(record::Column::Id, order)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(RecordResponse::from)
        .collect();

    Ok(Json(RecordListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/records/{id}",
    tag = "Records",
    operation_id = "getRecord",
    summary = "Get a record by ID",
    params(("id" = i32, Path, description = "Record ID")),
    responses(
        (status = 200, description = "Record", body = RecordResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_record(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<RecordResponse>, AppError> {
    let model = find_record(&state.db, id).await?;
    let owner_event = find_event(&state.db, model.event_id).await?;
    require_data_access(&auth_user, &owner_event)?;
    Ok(Json(model.into()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/records/{id}",
    tag = "Records",
    operation_id = "deleteRecord",
    summary = "Delete a record",
    description = "Requires `record:delete` permission.",
    params(("id" = i32, Path, description = "Record ID")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Record not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_record(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission("record:delete")?;

    let result = record::Entity::delete_by_id(id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(record_not_found());
    }

    tracing::info!(record_id = id, deleted_by = auth_user.user_id, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
