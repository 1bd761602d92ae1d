pub mod event;
pub mod master_data_item;
pub mod record;
pub mod role;
pub mod role_permission;
pub mod site_config;
pub mod user;
pub mod write_attempt;
