pub mod js;
pub mod errors;
pub mod config;

pub use config::TimeoutConfig;
pub use errors::{is_context_loss, to_audit_error};
