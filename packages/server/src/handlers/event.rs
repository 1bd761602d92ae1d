use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use common::EventStatus;
use common::form::normalize_schema;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{event, record};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::event::*;
use crate::models::shared::{Pagination, escape_like, sort_order};
use crate::state::AppState;
use crate::utils::event::{
    can_manage_event, check_event_visible, event_fields, fields_to_json, find_event,
    resolve_master_options,
};
use crate::utils::site::load_site_config;

#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    operation_id = "createEvent",
    summary = "Create an event",
    description = "Creates an event with its form fields. New events start as `pending` and accept no records until approved. Requires `event:create` permission.",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(title = %payload.title))]
pub async fn create_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(mut payload): AppJson<CreateEventRequest>,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission("event:create")?;
    validate_create_event(&payload)?;
    normalize_schema(&mut payload.fields)?;

    let now = chrono::Utc::now();
    let new_event = event::ActiveModel {
        title: Set(payload.title.trim().to_string()),
        description: Set(payload.description),
        event_date: Set(payload.event_date),
        fields: Set(fields_to_json(&payload.fields)),
        owner_id: Set(auth_user.user_id),
        status: Set(EventStatus::Pending),
        is_public: Set(payload.is_public),
        access_code: Set(payload.access_code.map(|c| c.trim().to_string())),
        review_note: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_event.insert(&state.db).await?;
    tracing::info!(event_id = model.id, "Event created");

    Ok((
        StatusCode::CREATED,
        Json(EventResponse::new(model, payload.fields, true)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    operation_id = "listEvents",
    summary = "List events with pagination and search",
    description = "Users with `event:manage` see every event. Other signed-in users see approved events and their own; anonymous callers see approved public events. Supports sorting by `created_at`, `updated_at`, `event_date`, or `title`.",
    params(EventListQuery),
    responses(
        (status = 200, description = "List of events", body = EventListResponse),
        (status = 400, description = "Invalid sort field (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_events(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<EventListQuery>,
) -> Result<Json<EventListResponse>, AppError> {
    let (page, per_page) = Pagination::normalize(query.page, query.per_page);

    let mut select = event::Entity::find();

    match auth_user {
        Some(ref user) if user.has_permission("event:manage") => {}
        Some(ref user) => {
            select = select.filter(
                Condition::any()
                    .add(event::Column::Status.eq(EventStatus::Approved))
                    .add(event::Column::OwnerId.eq(user.user_id)),
            );
        }
        None => {
            select = select
                .filter(event::Column::Status.eq(EventStatus::Approved))
                .filter(event::Column::IsPublic.eq(true));
        }
    }

    if let Some(status) = query.status {
        select = select.filter(event::Column::Status.eq(status));
    }

    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(event::Column::Title)))
                    .like(LikeExpr::new(format!("%{}%", term.to_lowercase())).escape('\\')),
            );
        }
    }

    let sort_column = match query.sort_by.as_deref().unwrap_or("created_at") {
        "created_at" => event::Column::CreatedAt,
        "updated_at" => event::Column::UpdatedAt,
        "event_date" => event::Column::EventDate,
        "title" => event::Column::Title,
        _ => {
            return Err(AppError::Validation(
                "sort_by must be one of: created_at, updated_at, event_date, title".into(),
            ));
        }
    };

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let events = select
        .order_by(sort_column, sort_order(query.sort_order.as_deref()))
        .order_by_asc(event::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    let record_counts: HashMap<i32, i64> = if events.is_empty() {
        HashMap::new()
    } else {
        record::Entity::find()
            .select_only()
            .column(record::Column::EventId)
            .column_as(Expr::from(Func::count(Expr::col(record::Column::Id))), "record_count")
            .filter(record::Column::EventId.is_in(events.iter().map(|e| e.id)))
            .group_by(record::Column::EventId)
            .into_tuple::<(i32, i64)>()
            .all(&state.db)
            .await?
            .into_iter()
            .collect()
    };

    let data = events
        .into_iter()
        .map(|e| EventListItem {
            record_count: record_counts.get(&e.id).copied().unwrap_or(0) as u64,
            id: e.id,
            title: e.title,
            event_date: e.event_date,
            owner_id: e.owner_id,
            status: e.status,
            is_public: e.is_public,
            created_at: e.created_at,
            updated_at: e.updated_at,
        })
        .collect();

    Ok(Json(EventListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    operation_id = "getEvent",
    summary = "Get an event by ID",
    description = "Returns 404 (not 403) for events the caller cannot see. The access code is only included for the owner and event managers.",
    params(("id" = i32, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event details", body = EventResponse),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_event(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<EventResponse>, AppError> {
    let model = find_event(&state.db, id).await?;
    check_event_visible(auth_user.as_ref(), &model, None)?;

    let manager = auth_user
        .as_ref()
        .is_some_and(|user| can_manage_event(user, &model));
    let fields = event_fields(&model)?;
    Ok(Json(EventResponse::new(model, fields, manager)))
}

#[utoipa::path(
    patch,
    path = "/api/v1/events/{id}",
    tag = "Events",
    operation_id = "updateEvent",
    summary = "Update an event",
    description = "Partially updates an event using PATCH semantics. Allowed for the owner and users with `event:manage`. Replacing `fields` does not rewrite records already collected. An empty payload returns the current resource unchanged.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = UpdateEventRequest,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(mut payload): AppJson<UpdateEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    validate_update_event(&payload)?;
    if let Some(ref mut fields) = payload.fields {
        normalize_schema(fields)?;
    }

    let txn = state.db.begin().await?;
    let existing = event::Entity::find_by_id(id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))?;

    if !can_manage_event(&auth_user, &existing) {
        check_event_visible(Some(&auth_user), &existing, None)?;
        return Err(AppError::PermissionDenied);
    }

    if payload == UpdateEventRequest::default() {
        txn.commit().await?;
        let fields = event_fields(&existing)?;
        return Ok(Json(EventResponse::new(existing, fields, true)));
    }

    let mut active: event::ActiveModel = existing.into();

    if let Some(ref title) = payload.title {
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    if let Some(event_date) = payload.event_date {
        active.event_date = Set(event_date);
    }
    if let Some(ref fields) = payload.fields {
        active.fields = Set(fields_to_json(fields));
    }
    if let Some(is_public) = payload.is_public {
        active.is_public = Set(is_public);
    }
    if let Some(access_code) = payload.access_code {
        active.access_code = Set(access_code.map(|c| c.trim().to_string()));
    }
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&txn).await?;
    txn.commit().await?;

    let fields = event_fields(&model)?;
    Ok(Json(EventResponse::new(model, fields, true)))
}

#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/review",
    tag = "Events",
    operation_id = "reviewEvent",
    summary = "Approve or reject an event",
    description = "Sets the review status of an event with an optional note. Only approved events accept records. Requires `event:manage` permission.",
    params(("id" = i32, Path, description = "Event ID")),
    request_body = ReviewEventRequest,
    responses(
        (status = 200, description = "Event reviewed", body = EventResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id, status = %payload.status))]
pub async fn review_event(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ReviewEventRequest>,
) -> Result<Json<EventResponse>, AppError> {
    auth_user.require_permission("event:manage")?;
    validate_review(&payload)?;

    let existing = find_event(&state.db, id).await?;
    let mut active: event::ActiveModel = existing.into();
    active.status = Set(payload.status);
    active.review_note = Set(payload
        .note
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty()));
    active.updated_at = Set(chrono::Utc::now());

    let model = active.update(&state.db).await?;
    tracing::info!(event_id = model.id, status = %model.status, reviewer = auth_user.user_id, "Event reviewed");

    let fields = event_fields(&model)?;
    Ok(Json(EventResponse::new(model, fields, true)))
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/form",
    tag = "Events",
    operation_id = "getEventForm",
    summary = "Get the collection form of an event",
    description = "Returns the fields a collector fills in, with options of master-data backed fields resolved. Anonymous callers need the event to be approved and either public or unlocked with `access_code`.",
    params(
        ("id" = i32, Path, description = "Event ID"),
        FormQuery,
    ),
    responses(
        (status = 200, description = "Form definition", body = FormResponse),
        (status = 404, description = "Event not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, auth_user, query), fields(id))]
pub async fn get_event_form(
    auth_user: Option<AuthUser>,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<FormQuery>,
) -> Result<Json<FormResponse>, AppError> {
    let model = find_event(&state.db, id).await?;
    check_event_visible(auth_user.as_ref(), &model, query.access_code.as_deref())?;

    let mut fields = event_fields(&model)?;
    resolve_master_options(&state.db, &mut fields).await?;

    let site = load_site_config(&state.db).await?;

    Ok(Json(FormResponse {
        event_id: model.id,
        title: model.title,
        description: model.description,
        event_date: model.event_date,
        fields,
        accepting_submissions: model.status.accepts_submissions() && site.submissions_open,
    }))
}
