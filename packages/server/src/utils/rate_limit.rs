use std::cmp;

use chrono::{Duration, Utc};
use sea_orm::*;

use crate::entity::write_attempt;
use crate::error::AppError;

/// Check and record one attempt for a client bucket.
///
/// Every call that passes is logged, whether or not the request later
/// succeeds, so repeated invalid payloads and repeated updates of the same
/// record both use up the allowance. Uses an optimistic (non-locking)
/// count, so concurrent requests within a very short window may both pass.
pub async fn check_rate_limit<C: ConnectionTrait>(
    db: &C,
    client_key: &str,
    limit_per_minute: u32,
) -> Result<(), AppError> {
    if limit_per_minute == 0 {
        return Ok(()); // Rate limiting disabled
    }

    let now = Utc::now();
    let one_minute_ago = now - Duration::minutes(1);

    write_attempt::Entity::delete_many()
        .filter(write_attempt::Column::ClientKey.eq(client_key))
        .filter(write_attempt::Column::CreatedAt.lte(one_minute_ago))
        .exec(db)
        .await?;

    let recent = write_attempt::Entity::find()
        .filter(write_attempt::Column::ClientKey.eq(client_key))
        .filter(write_attempt::Column::CreatedAt.gt(one_minute_ago));

    let count = recent.clone().count(db).await?;

    if count >= limit_per_minute as u64 {
        let oldest = recent
            .order_by_asc(write_attempt::Column::CreatedAt)
            .one(db)
            .await?;

        let retry_after = oldest
            .map(|a| {
                let expires = a.created_at + Duration::minutes(1);
                cmp::max((expires - Utc::now()).num_seconds(), 1) as u64
            })
            .unwrap_or(60);

        tracing::warn!(client_key, count, "Rate limit exceeded");
        return Err(AppError::RateLimited { retry_after });
    }

    write_attempt::ActiveModel {
        client_key: Set(client_key.to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    Ok(())
}
