use sea_orm::*;

use crate::entity::site_config;
use crate::error::AppError;

/// Load the settings row written by the startup seed.
pub async fn load_site_config<C: ConnectionTrait>(db: &C) -> Result<site_config::Model, AppError> {
    site_config::Entity::find_by_id(site_config::SINGLETON_ID)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal("Site configuration row is missing".into()))
}
