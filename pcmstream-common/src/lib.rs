//! # pcmstream common library
//!
//! Shared code for the pcmstream workspace:
//! - Configuration file resolution and TOML loading
//! - Logging configuration section
//! - Common error type

pub mod config;
pub mod error;

pub use config::{load_toml_file, resolve_config_path, LoggingConfig};
pub use error::{Error, Result};
