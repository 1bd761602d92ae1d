use std::collections::HashMap;

use common::FormField;
use sea_orm::*;

use crate::entity::{event, master_data_item};
use crate::error::AppError;
use crate::extractors::auth::AuthUser;

/// Look up an event by ID, returning 404 if not found.
pub async fn find_event<C: ConnectionTrait>(db: &C, id: i32) -> Result<event::Model, AppError> {
    event::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".into()))
}

/// Decode the stored field list of an event.
pub fn event_fields(model: &event::Model) -> Result<Vec<FormField>, AppError> {
    serde_json::from_value(model.fields.clone()).map_err(|e| {
        AppError::Internal(format!("Event {} has malformed fields: {}", model.id, e))
    })
}

pub fn fields_to_json(fields: &[FormField]) -> serde_json::Value {
    serde_json::to_value(fields).unwrap_or_else(|_| serde_json::Value::Array(vec![]))
}

/// Owners and holders of `event:manage` may edit an event.
pub fn can_manage_event(auth_user: &AuthUser, model: &event::Model) -> bool {
    auth_user.has_permission("event:manage") || model.owner_id == auth_user.user_id
}

/// Check that the caller may read an event's collected data.
pub fn require_data_access(auth_user: &AuthUser, model: &event::Model) -> Result<(), AppError> {
    if auth_user.has_permission("record:view_all") || model.owner_id == auth_user.user_id {
        Ok(())
    } else {
        Err(AppError::PermissionDenied)
    }
}

/// Returns true if `supplied` matches the event's access code.
pub fn access_code_matches(model: &event::Model, supplied: Option<&str>) -> bool {
    match (model.access_code.as_deref(), supplied) {
        (Some(expected), Some(given)) => !expected.is_empty() && expected == given.trim(),
        _ => false,
    }
}

/// Verify the caller can see an event.
///
/// Managers and the owner always can; signed-in users can see approved
/// events; anonymous callers need the event to be approved and either
/// public or unlocked with its access code. Returns 404 (not 403) so that
/// hidden events cannot be enumerated.
pub fn check_event_visible(
    auth_user: Option<&AuthUser>,
    model: &event::Model,
    access_code: Option<&str>,
) -> Result<(), AppError> {
    if let Some(user) = auth_user
        && can_manage_event(user, model)
    {
        return Ok(());
    }
    if model.status.accepts_submissions()
        && (auth_user.is_some() || model.is_public || access_code_matches(model, access_code))
    {
        return Ok(());
    }
    Err(AppError::NotFound("Event not found".into()))
}

/// Fill the options of fields backed by a master-data list.
pub async fn resolve_master_options<C: ConnectionTrait>(
    db: &C,
    fields: &mut [FormField],
) -> Result<(), AppError> {
    let categories: Vec<String> = fields
        .iter()
        .filter(|f| f.field_type.is_enumerated())
        .filter_map(|f| f.master_list.clone())
        .collect();
    if categories.is_empty() {
        return Ok(());
    }

    let items = master_data_item::Entity::find()
        .filter(master_data_item::Column::Category.is_in(categories))
        .order_by_asc(master_data_item::Column::Position)
        .order_by_asc(master_data_item::Column::Id)
        .all(db)
        .await?;

    let mut by_category: HashMap<String, Vec<String>> = HashMap::new();
    for item in items {
        by_category.entry(item.category).or_default().push(item.value);
    }

    for field in fields.iter_mut().filter(|f| f.field_type.is_enumerated()) {
        if let Some(values) = field
            .master_list
            .as_ref()
            .and_then(|list| by_category.get(list))
        {
            field.options = values.clone();
        }
    }
    Ok(())
}
