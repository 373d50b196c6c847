//! Configuration loading, validation, and env substitution.
//!
//! Config files: `chatrelay.toml`, `chatrelay.yaml`, or `chatrelay.json`
//! (plus the legacy flat `config.json`), searched in `./` then
//! `~/.config/chatrelay/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-default}` substitution in raw config text.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{
        apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config,
        load_config_value,
    },
    schema::{
        BotConfig, CommandsConfig, MetricsConfig, ProxyConfig, RelayConfig, ReplierConfig,
        ServerConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate, validate_file},
};
