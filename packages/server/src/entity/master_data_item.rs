use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One admin-curated dropdown choice, grouped by category.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "master_data_item")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique_key = "category_value")]
    pub category: String,
    #[sea_orm(unique_key = "category_value")]
    pub value: String,

    #[sea_orm(default_value = 0)]
    pub position: i32,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
