use std::{sync::Arc, time::Duration};

use {
    chatrelay_config::RelayConfig,
    chatrelay_proxy::{BotIdentity, RemoteDataProxy},
    chatrelay_replier::{DispatcherOptions, HttpReplyTransport, ReplyDispatcher, ReplyTransport},
};

use crate::handler::{CommandHandler, InboundHandler};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayConfig>,
    pub proxy: Arc<RemoteDataProxy>,
    pub transport: Arc<dyn ReplyTransport>,
    pub handler: Arc<dyn InboundHandler>,
    pub dispatcher_options: DispatcherOptions,
    pub version: &'static str,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<chatrelay_metrics::MetricsHandle>,
}

impl AppState {
    /// Build state from config with the built-in [`CommandHandler`].
    pub fn from_config(config: RelayConfig) -> anyhow::Result<Self> {
        let handler = Arc::new(CommandHandler::from_config(&config.commands));
        Self::with_handler(config, handler)
    }

    /// Build state from config with a custom business-logic handler.
    pub fn with_handler(
        config: RelayConfig,
        handler: Arc<dyn InboundHandler>,
    ) -> anyhow::Result<Self> {
        let base_url = config.bot.base_url();
        let proxy = RemoteDataProxy::new(
            base_url,
            BotIdentity {
                id: config.bot.id.clone(),
                name: config.bot.name.clone(),
            },
            Duration::from_secs(config.proxy.timeout_secs),
        )?;
        let transport =
            HttpReplyTransport::new(base_url, Duration::from_secs(config.replier.timeout_secs))?;
        let dispatcher_options = DispatcherOptions {
            min_interval: Duration::from_millis(config.replier.min_interval_ms),
            ..DispatcherOptions::default()
        };

        Ok(Self {
            config: Arc::new(config),
            proxy: Arc::new(proxy),
            transport: Arc::new(transport),
            handler,
            dispatcher_options,
            version: env!("CARGO_PKG_VERSION"),
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        })
    }

    /// A fresh dispatcher whose default room is `room`.
    pub fn dispatcher_for(&self, room: &str) -> ReplyDispatcher {
        ReplyDispatcher::with_options(
            Arc::clone(&self.transport),
            room,
            self.dispatcher_options.clone(),
        )
    }
}
