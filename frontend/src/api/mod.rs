mod auth;
mod backups;
pub mod client;
pub mod types;

pub use client::*;
pub use types::*;
