use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use common::UserStatus;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LikeExpr, OnConflict};
use sea_orm::*;
use tracing::instrument;

use crate::entity::{master_data_item, role, site_config, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::admin::*;
use crate::models::auth::UserResponse;
use crate::models::shared::{Pagination, escape_like};
use crate::state::AppState;
use crate::utils::site::load_site_config;

#[utoipa::path(
    get,
    path = "/api/v1/admin/users",
    tag = "Admin",
    operation_id = "listUsers",
    summary = "List user accounts",
    description = "Paginated list of accounts, newest first. Requires `user:manage` permission.",
    params(UserListQuery),
    responses(
        (status = 200, description = "List of users", body = UserListResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> Result<Json<UserListResponse>, AppError> {
    auth_user.require_permission("user:manage")?;

    let (page, per_page) = Pagination::normalize(query.page, query.per_page);
    let mut select = user::Entity::find();

    if let Some(ref search) = query.search {
        let term = escape_like(search.trim());
        if !term.is_empty() {
            let pattern = format!("%{}%", term.to_lowercase());
            select = select.filter(
                Condition::any()
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::Username)))
                            .like(LikeExpr::new(pattern.clone()).escape('\\')),
                    )
                    .add(
                        Expr::expr(Func::lower(Expr::col(user::Column::Email)))
                            .like(LikeExpr::new(pattern).escape('\\')),
                    ),
            );
        }
    }
    if let Some(ref role) = query.role {
        select = select.filter(user::Column::Role.eq(role.trim()));
    }
    if let Some(status) = query.status {
        select = select.filter(user::Column::Status.eq(status));
    }

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let data = select
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .offset(Some((page - 1) * per_page))
        .limit(Some(per_page))
        .all(&state.db)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(Json(UserListResponse {
        data,
        pagination: Pagination::new(page, per_page, total),
    }))
}

#[utoipa::path(
    patch,
    path = "/api/v1/admin/users/{id}",
    tag = "Admin",
    operation_id = "updateUser",
    summary = "Change a user's role or status",
    description = "Suspended users can no longer log in. Administrators cannot change their own role or status. Takes effect on the user's next login. Requires `user:manage` permission.",
    params(("id" = i32, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    auth_user.require_permission("user:manage")?;

    let existing = user::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if payload == UpdateUserRequest::default() {
        return Ok(Json(existing.into()));
    }
    if id == auth_user.user_id {
        return Err(AppError::Validation(
            "You cannot change your own role or status".into(),
        ));
    }

    let mut active: user::ActiveModel = existing.into();

    if let Some(ref role_name) = payload.role {
        let role_name = role_name.trim();
        role::Entity::find_by_id(role_name.to_string())
            .one(&state.db)
            .await?
            .ok_or_else(|| AppError::Validation(format!("Unknown role '{}'", role_name)))?;
        active.role = Set(role_name.to_string());
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }

    let model = active.update(&state.db).await?;
    if model.status == UserStatus::Suspended {
        tracing::warn!(user_id = model.id, by = auth_user.user_id, "User suspended");
    } else {
        tracing::info!(user_id = model.id, role = %model.role, by = auth_user.user_id, "User updated");
    }

    Ok(Json(model.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "Site",
    operation_id = "getSiteConfig",
    summary = "Public site settings",
    responses((status = 200, description = "Site settings", body = SiteConfigResponse)),
)]
#[instrument(skip(state))]
pub async fn get_site_config(
    State(state): State<AppState>,
) -> Result<Json<SiteConfigResponse>, AppError> {
    Ok(Json(load_site_config(&state.db).await?.into()))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/config",
    tag = "Admin",
    operation_id = "updateSiteConfig",
    summary = "Replace site settings",
    description = "Upserts the single settings row. Requires `config:manage` permission.",
    request_body = UpdateSiteConfigRequest,
    responses(
        (status = 200, description = "Settings saved", body = SiteConfigResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload))]
pub async fn update_site_config(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<UpdateSiteConfigRequest>,
) -> Result<Json<SiteConfigResponse>, AppError> {
    auth_user.require_permission("config:manage")?;
    validate_site_config(&payload)?;

    let model = site_config::ActiveModel {
        id: Set(site_config::SINGLETON_ID),
        site_name: Set(payload.site_name.trim().to_string()),
        support_email: Set(payload
            .support_email
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())),
        registration_open: Set(payload.registration_open),
        submissions_open: Set(payload.submissions_open),
        updated_at: Set(chrono::Utc::now()),
    };

    site_config::Entity::insert(model)
        .on_conflict(
            OnConflict::column(site_config::Column::Id)
                .update_columns([
                    site_config::Column::SiteName,
                    site_config::Column::SupportEmail,
                    site_config::Column::RegistrationOpen,
                    site_config::Column::SubmissionsOpen,
                    site_config::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(&state.db)
        .await?;

    tracing::info!(by = auth_user.user_id, "Site configuration updated");
    Ok(Json(load_site_config(&state.db).await?.into()))
}

#[utoipa::path(
    get,
    path = "/api/v1/master-data",
    tag = "Site",
    operation_id = "listMasterData",
    summary = "All master-data categories",
    responses((status = 200, description = "Every category with its values", body = MasterDataCatalog)),
)]
#[instrument(skip(state))]
pub async fn list_master_data(
    State(state): State<AppState>,
) -> Result<Json<MasterDataCatalog>, AppError> {
    let items = master_data_item::Entity::find()
        .order_by_asc(master_data_item::Column::Category)
        .order_by_asc(master_data_item::Column::Position)
        .order_by_asc(master_data_item::Column::Id)
        .all(&state.db)
        .await?;

    let mut categories: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in items {
        categories.entry(item.category).or_default().push(item.value);
    }
    Ok(Json(MasterDataCatalog { categories }))
}

async fn category_values<C: ConnectionTrait>(
    db: &C,
    category: &str,
) -> Result<Vec<String>, AppError> {
    Ok(master_data_item::Entity::find()
        .filter(master_data_item::Column::Category.eq(category))
        .order_by_asc(master_data_item::Column::Position)
        .order_by_asc(master_data_item::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|item| item.value)
        .collect())
}

#[utoipa::path(
    get,
    path = "/api/v1/master-data/{category}",
    tag = "Site",
    operation_id = "getMasterDataCategory",
    summary = "Values of one master-data category",
    description = "Unknown categories return an empty list.",
    params(("category" = String, Path, description = "Category name")),
    responses(
        (status = 200, description = "Category values", body = MasterDataResponse),
        (status = 400, description = "Invalid category name (VALIDATION_ERROR)", body = ErrorBody),
    ),
)]
#[instrument(skip(state), fields(category))]
pub async fn get_master_data(
    State(state): State<AppState>,
    Path(category): Path<String>,
) -> Result<Json<MasterDataResponse>, AppError> {
    validate_category(&category)?;
    let values = category_values(&state.db, &category).await?;
    Ok(Json(MasterDataResponse { category, values }))
}

#[utoipa::path(
    put,
    path = "/api/v1/admin/master-data/{category}",
    tag = "Admin",
    operation_id = "replaceMasterData",
    summary = "Replace the values of a master-data category",
    description = "Atomically replaces the whole list; an empty list removes the category. Requires `config:manage` permission.",
    params(("category" = String, Path, description = "Category name")),
    request_body = ReplaceMasterDataRequest,
    responses(
        (status = 200, description = "Category replaced", body = MasterDataResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(category))]
pub async fn replace_master_data(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(category): Path<String>,
    AppJson(payload): AppJson<ReplaceMasterDataRequest>,
) -> Result<Json<MasterDataResponse>, AppError> {
    auth_user.require_permission("config:manage")?;
    validate_category(&category)?;
    let values = normalize_master_values(payload.values)?;

    let txn = state.db.begin().await?;

    master_data_item::Entity::delete_many()
        .filter(master_data_item::Column::Category.eq(&category))
        .exec(&txn)
        .await?;

    if !values.is_empty() {
        let now = chrono::Utc::now();
        let models = values
            .iter()
            .enumerate()
            .map(|(i, value)| master_data_item::ActiveModel {
                category: Set(category.clone()),
                value: Set(value.clone()),
                position: Set(i as i32),
                created_at: Set(now),
                ..Default::default()
            });
        master_data_item::Entity::insert_many(models)
            .exec_without_returning(&txn)
            .await?;
    }

    let values = category_values(&txn, &category).await?;
    txn.commit().await?;

    tracing::info!(category = %category, count = values.len(), by = auth_user.user_id, "Master data replaced");
    Ok(Json(MasterDataResponse { category, values }))
}
