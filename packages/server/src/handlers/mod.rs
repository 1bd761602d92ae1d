pub mod admin;
pub mod analytics;
pub mod auth;
pub mod event;
pub mod export;
pub mod record;
