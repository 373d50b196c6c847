use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Context, Error, Result},
    schema::{LegacyConfig, RelayConfig},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "chatrelay.toml",
    "chatrelay.yaml",
    "chatrelay.yml",
    "chatrelay.json",
];

/// Flat config file written by older deployments, only looked up in `./`.
const LEGACY_FILENAME: &str = "config.json";

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<RelayConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Load the config file as a format-neutral JSON value, after env substitution.
pub fn load_config_value(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw = substitute_env(&raw);
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => {
            let v: toml::Value = toml::from_str(&raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "yaml" | "yml" => {
            let v: serde_yaml::Value = serde_yaml::from_str(&raw)?;
            Ok(serde_json::to_value(v)?)
        },
        "json" => Ok(serde_json::from_str(&raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}

/// Discover and load config from standard locations, then apply environment
/// overrides.
///
/// Search order:
/// 1. `./chatrelay.{toml,yaml,yml,json}` (project-local)
/// 2. `./config.json` (legacy flat layout)
/// 3. `~/.config/chatrelay/chatrelay.{toml,yaml,yml,json}` (user-global)
///
/// Returns defaults if no config file is found or the file fails to parse.
pub fn discover_and_load() -> RelayConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                RelayConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        RelayConfig::default()
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .chain(std::iter::once(&LEGACY_FILENAME))
        .map(|name| PathBuf::from(*name))
        .find(|p| p.exists())
        .or_else(|| {
            let dir = config_dir()?;
            CONFIG_FILENAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.exists())
        })
}

/// Returns the user-global config directory (`~/.config/chatrelay/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chatrelay").map(|d| d.config_dir().to_path_buf())
}

/// Override bot identity fields from `CHATRELAY_BOT_*` environment variables.
pub fn apply_env_overrides(config: &mut RelayConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut RelayConfig, lookup: impl Fn(&str) -> Option<String>) {
    let overrides: [(&str, &mut String); 3] = [
        ("CHATRELAY_BOT_ID", &mut config.bot.id),
        ("CHATRELAY_BOT_NAME", &mut config.bot.name),
        ("CHATRELAY_BOT_ENDPOINT", &mut config.bot.endpoint),
    ];
    for (var, slot) in overrides {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            debug!(var, "config value overridden from environment");
            *slot = value;
        }
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<RelayConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => parse_json_config(raw),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}

/// JSON files may use either the sectioned layout or the legacy flat one.
fn parse_json_config(raw: &str) -> Result<RelayConfig> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    if value.get("bot_endpoint").is_some() {
        let legacy: LegacyConfig = serde_json::from_value(value)?;
        return Ok(legacy.into());
    }
    Ok(serde_json::from_value(value)?)
}
