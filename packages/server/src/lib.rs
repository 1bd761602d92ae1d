pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod seed;
pub mod state;
pub mod utils;

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Outreach Data Collection API",
        version = "1.0.0",
        description = "Events with custom forms, record collection with retrieval codes, analytics and CSV export"
    ),
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::event::create_event,
        handlers::event::list_events,
        handlers::event::get_event,
        handlers::event::update_event,
        handlers::event::review_event,
        handlers::event::get_event_form,
        handlers::record::submit_record,
        handlers::record::get_record_by_code,
        handlers::record::list_records,
        handlers::record::get_record,
        handlers::record::delete_record,
        handlers::analytics::get_analytics,
        handlers::export::export_csv,
        handlers::admin::list_users,
        handlers::admin::update_user,
        handlers::admin::get_site_config,
        handlers::admin::update_site_config,
        handlers::admin::list_master_data,
        handlers::admin::get_master_data,
        handlers::admin::replace_master_data,
    ),
    tags(
        (name = "Auth", description = "Registration, login and sessions"),
        (name = "Events", description = "Events and their collection forms"),
        (name = "Records", description = "Submitting, correcting and reading records"),
        (name = "Analytics", description = "Per-event summary statistics"),
        (name = "Export", description = "CSV download of collected records"),
        (name = "Site", description = "Public site settings and master data"),
        (name = "Admin", description = "User, settings and master data administration"),
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();
        components.add_security_scheme(
            "jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(config.max_age))
}

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let api = ApiDoc::openapi();
    let cors = cors_layer(&state.config.server.cors);

    axum::Router::new()
        .nest("/api", routes::api_routes())
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
