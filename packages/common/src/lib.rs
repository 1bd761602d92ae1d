pub mod analytics;
pub mod export;
pub mod form;
pub mod record;
pub mod retrieval;
pub mod status;

pub use form::{FieldType, FieldWidth, FormField};
pub use record::RecordData;
pub use status::{EventStatus, UserStatus};
