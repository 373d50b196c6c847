/// Config schema types (bot identity, inbound server, replier, proxy, commands, metrics).
use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bot: BotConfig,
    pub server: ServerConfig,
    pub replier: ReplierConfig,
    pub proxy: ProxyConfig,
    pub commands: CommandsConfig,
    pub metrics: MetricsConfig,
}

/// Identity of the bot account and the base URL of the bot-hosting process.
///
/// `endpoint` is the base for `/reply`, `/query` and `/decrypt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// User id the bot posts as. Numeric ids in config files are accepted.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Display name reported for the bot's own messages.
    pub name: String,
    /// Base URL of the bot-hosting process, e.g. `http://127.0.0.1:3000`.
    pub endpoint: String,
}

impl BotConfig {
    /// Endpoint with any trailing slash removed, ready for path joining.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

/// Inbound HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "0.0.0.0".
    pub bind: String,
    /// Port to listen on. Defaults to 5000.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 5000,
        }
    }
}

/// Outbound reply dispatcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplierConfig {
    /// Minimum spacing between delivery attempt starts, in milliseconds.
    pub min_interval_ms: u64,
    /// Per-request timeout for `/reply` calls, in seconds.
    pub timeout_secs: u64,
}

impl Default for ReplierConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 100,
            timeout_secs: 10,
        }
    }
}

/// Remote data proxy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Per-request timeout for `/query` and `/decrypt` calls, in seconds.
    pub timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self { timeout_secs: 10 }
    }
}

/// Built-in chat command handler settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Whether the built-in command handler answers at all.
    pub enabled: bool,
    /// Prefix that marks a chat message as a command.
    pub prefix: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: "!".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}

/// Flat `config.json` layout used by older deployments:
/// `{"bot_id": ..., "bot_name": ..., "bot_endpoint": ...}`.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyConfig {
    #[serde(deserialize_with = "string_or_number")]
    pub bot_id: String,
    pub bot_name: String,
    pub bot_endpoint: String,
}

impl From<LegacyConfig> for RelayConfig {
    fn from(legacy: LegacyConfig) -> Self {
        Self {
            bot: BotConfig {
                id: legacy.bot_id,
                name: legacy.bot_name,
                endpoint: legacy.bot_endpoint,
            },
            ..Self::default()
        }
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        UInt(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::UInt(n) => n.to_string(),
    })
}
