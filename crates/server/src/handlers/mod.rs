//! HTTP request handlers.

pub mod health;
pub mod uploads;

pub use health::health_check;
pub use uploads::{complete_upload, init_upload, upload_chunk, upload_status};
