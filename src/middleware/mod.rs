mod error_handler;
mod rate_limit;
mod request_id;

pub use error_handler::log_errors;
pub use rate_limit::{ClientKey, admission, metrics_path};
pub use request_id::{RequestId, request_id};
