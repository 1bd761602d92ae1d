use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One submitted data document for an event.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "record")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub event_id: i32,
    #[sea_orm(belongs_to, from = "event_id", to = "id")]
    pub event: HasOne<super::event::Entity>,

    /// Field label -> submitted value. Not checked against the event's
    /// current fields on read.
    #[sea_orm(column_type = "JsonBinary")]
    pub data: serde_json::Value,

    /// NULL for anonymous submissions.
    pub submitted_by: Option<i32>,
    #[sea_orm(belongs_to, from = "submitted_by", to = "id")]
    pub submitter: HasOne<super::user::Entity>,

    #[sea_orm(unique)]
    pub retrieval_code: String,

    /// Bucket of the last writer ("user:<id>" or "ip:<addr>").
    pub client_key: String,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
