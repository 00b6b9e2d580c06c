//! Shared types, config, and error definitions for Bird Hotspot.

pub mod config;
pub mod error;
pub mod http;
pub mod region;
pub mod types;

pub use config::AppConfig;
pub use error::Error;
pub use types::*;
