use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Primary key of the only row in the table.
pub const SINGLETON_ID: i32 = 1;

/// Site-wide settings. The table holds exactly one row, created by the
/// startup seed and updated by upsert.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "site_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub site_name: String,
    pub support_email: Option<String>,
    pub registration_open: bool,
    pub submissions_open: bool,

    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
