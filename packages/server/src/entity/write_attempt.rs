use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One throttled request (record write or code lookup) by a client bucket.
/// Rows older than the rate-limit window are pruned on the next check.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "write_attempt")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// "user:<id>" or "ip:<addr>", optionally prefixed by the throttle scope.
    pub client_key: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
