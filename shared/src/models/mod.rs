//! Data models
//!
//! Documents as stored in the four tables (`products`, `users`, `orders`,
//! `activity_log`) and the payloads that create or patch them. Readers are
//! tolerant of older records; writers always emit the canonical form.

pub mod activity_log;
pub mod flag;
pub mod order;
pub mod product;
pub mod user;

// Re-exports
pub use activity_log::*;
pub use order::*;
pub use product::*;
pub use user::*;
