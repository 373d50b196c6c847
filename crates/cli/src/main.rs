mod config_commands;
mod relay_commands;

use std::path::{Path, PathBuf};

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use chatrelay_config::{RelayConfig, apply_env_overrides, discover_and_load};

#[derive(Parser)]
#[command(name = "chatrelay", about = "chatrelay: chat event relay for a bot host", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file to use instead of searching the standard locations.
    #[arg(long, global = true, env = "CHATRELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the inbound gateway (default when no subcommand is provided).
    Serve,
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Delete chat logs older than the given number of days.
    Purge {
        #[arg(long)]
        days: String,
    },
    /// Send a reply to a room through the bot host.
    Send {
        #[arg(long)]
        room: String,
        #[arg(short, long)]
        message: Option<String>,
        /// Image file to send after the message.
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load config from an explicit path, or discover it in the standard
/// locations. Environment overrides apply either way.
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<RelayConfig> {
    match path {
        Some(path) => {
            let mut config = chatrelay_config::load_config(path)?;
            apply_env_overrides(&mut config);
            Ok(config)
        },
        None => Ok(discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "chatrelay starting");

    match cli.command {
        None | Some(Commands::Serve) => {
            let config = load_config(cli.config.as_deref())?;
            chatrelay_gateway::start_gateway(config, cli.bind.as_deref(), cli.port).await
        },
        Some(Commands::Config { action }) => {
            config_commands::handle_config(action, cli.config.as_deref())
        },
        Some(Commands::Purge { days }) => {
            let config = load_config(cli.config.as_deref())?;
            relay_commands::purge(&config, &days).await
        },
        Some(Commands::Send {
            room,
            message,
            image,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            relay_commands::send(&config, &room, message, image).await
        },
    }
}
