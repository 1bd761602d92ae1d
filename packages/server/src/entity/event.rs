use common::EventStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An outreach project and the form its records are collected with.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub event_date: DateTimeUtc,

    /// Ordered form fields stored as a JSON array of `FormField` objects.
    #[sea_orm(column_type = "JsonBinary")]
    pub fields: serde_json::Value,

    #[sea_orm(indexed)]
    pub owner_id: i32,
    #[sea_orm(belongs_to, from = "owner_id", to = "id")]
    pub owner: HasOne<super::user::Entity>,

    #[sea_orm(indexed)]
    pub status: EventStatus,
    pub is_public: bool,
    /// Shared secret letting anonymous visitors submit to a non-public event.
    pub access_code: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub review_note: Option<String>,

    #[sea_orm(has_many)]
    pub records: HasMany<super::record::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
