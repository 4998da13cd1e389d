//! Shared types for the CodeBook backend
//!
//! Domain models, error codes and the API error envelope, plus small time
//! and id helpers. Free of I/O so it can be reused by any binary or test.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
