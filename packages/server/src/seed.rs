use sea_orm::sea_query::{Index, OnConflict, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::entity::{record, role, role_permission, site_config, write_attempt};

/// Default roles seeded on startup.
const DEFAULT_ROLES: &[&str] = &["admin", "staff", "volunteer"];

/// Default role-permission mappings seeded on startup.
const DEFAULT_MAPPINGS: &[(&str, &str)] = &[
    // Admin: all permissions
    ("admin", "event:create"),
    ("admin", "event:manage"),
    ("admin", "record:submit"),
    ("admin", "record:view_all"),
    ("admin", "record:delete"),
    ("admin", "data:export"),
    ("admin", "user:manage"),
    ("admin", "config:manage"),
    // Staff: run their own events
    ("staff", "event:create"),
    ("staff", "record:submit"),
    // Volunteer
    ("volunteer", "record:submit"),
];

/// Seed the `role` and `role_permission` tables with defaults.
pub async fn seed_role_permissions(db: &DatabaseConnection) -> Result<(), DbErr> {
    let mut roles_inserted = 0u32;
    for &name in DEFAULT_ROLES {
        let model = role::ActiveModel {
            name: Set(name.to_string()),
        };

        let result = role::Entity::insert(model)
            .on_conflict(OnConflict::column(role::Column::Name).do_nothing().to_owned())
            .exec_without_returning(db)
            .await;

        match result {
            Ok(_) => roles_inserted += 1,
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    if roles_inserted > 0 {
        info!("Seeded {} new roles", roles_inserted);
    }

    let mut perms_inserted = 0u32;
    for &(role, permission) in DEFAULT_MAPPINGS {
        let model = role_permission::ActiveModel {
            role: Set(role.to_string()),
            permission: Set(permission.to_string()),
        };

        let result = role_permission::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    role_permission::Column::Role,
                    role_permission::Column::Permission,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(_) => perms_inserted += 1,
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    if perms_inserted > 0 {
        info!("Seeded {} new role-permission mappings", perms_inserted);
    }

    Ok(())
}

/// Create the site settings row if it does not exist yet. Existing settings
/// are left untouched.
pub async fn seed_site_config(db: &DatabaseConnection) -> Result<(), DbErr> {
    let model = site_config::ActiveModel {
        id: Set(site_config::SINGLETON_ID),
        site_name: Set("Outreach".to_string()),
        support_email: Set(None),
        registration_open: Set(true),
        submissions_open: Set(true),
        updated_at: Set(chrono::Utc::now()),
    };

    let result = site_config::Entity::insert(model)
        .on_conflict(
            OnConflict::column(site_config::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await;

    match result {
        Ok(0) | Err(DbErr::RecordNotInserted) => Ok(()),
        Ok(_) => {
            info!("Seeded default site configuration");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Per-event listing, analytics and export:
    // SELECT ... FROM record WHERE event_id = ? ORDER BY created_at
    let event_created = Index::create()
        .if_not_exists()
        .name("idx_record_event_created")
        .table(record::Entity)
        .col(record::Column::EventId)
        .col(record::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);

    // Rate limiting:
    // SELECT COUNT(*) FROM write_attempt WHERE client_key = ? AND created_at > ?
    let attempt_client_created = Index::create()
        .if_not_exists()
        .name("idx_write_attempt_client_created")
        .table(write_attempt::Entity)
        .col(write_attempt::Column::ClientKey)
        .col(write_attempt::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);

    for (name, stmt) in [
        ("idx_record_event_created", event_created),
        ("idx_write_attempt_client_created", attempt_client_created),
    ] {
        match db.execute_unprepared(&stmt).await {
            Ok(_) => info!("Ensured index {} exists", name),
            Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
        }
    }

    Ok(())
}
