//! Data models shared across persistence and API handlers.

pub mod backup;
pub mod user;
