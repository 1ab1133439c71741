//! Canonical book records, request/response envelopes and configuration for shelfscope.

pub mod config;
pub mod error;
pub mod models;

pub use config::ShelfscopeConfig;
pub use error::{CoreError, Result};
pub use models::*;
