use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes())
        .nest("/events", event_routes())
        .nest("/records", record_routes())
        .nest("/admin", admin_routes())
        .route("/export", get(handlers::export::export_csv))
        .route("/config", get(handlers::admin::get_site_config))
        .route("/master-data", get(handlers::admin::list_master_data))
        .route(
            "/master-data/{category}",
            get(handlers::admin::get_master_data),
        )
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/me", get(handlers::auth::me))
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::event::list_events).post(handlers::event::create_event),
        )
        .route(
            "/{id}",
            get(handlers::event::get_event).patch(handlers::event::update_event),
        )
        .route("/{id}/review", post(handlers::event::review_event))
        .route("/{id}/form", get(handlers::event::get_event_form))
        .route("/{id}/analytics", get(handlers::analytics::get_analytics))
        .route(
            "/{id}/records",
            get(handlers::record::list_records).post(handlers::record::submit_record),
        )
}

fn record_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/by-code/{code}",
            get(handlers::record::get_record_by_code),
        )
        .route(
            "/{id}",
            get(handlers::record::get_record).delete(handlers::record::delete_record),
        )
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(handlers::admin::list_users))
        .route("/users/{id}", patch(handlers::admin::update_user))
        .route("/config", put(handlers::admin::update_site_config))
        .route(
            "/master-data/{category}",
            put(handlers::admin::replace_master_data),
        )
}
