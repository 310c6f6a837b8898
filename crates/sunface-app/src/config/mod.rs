//! Configuration file parsing for sunface
//!
//! Supports a single `config.toml` with `[clock]`, `[session]`, `[sync]`
//! and `[peer]` tables.

pub mod settings;
pub mod types;

pub use settings::{
    default_config_path, load_settings, load_settings_from, resolve_config_path, CONFIG_ENV_VAR,
};
pub use types::*;
