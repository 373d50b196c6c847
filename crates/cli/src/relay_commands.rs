use std::{
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    anyhow::{Result, bail},
    chatrelay_config::RelayConfig,
    chatrelay_proxy::{BotIdentity, PURGE_FAILED_MESSAGE, RemoteDataProxy},
    chatrelay_replier::{
        DeadLetterSink, DispatcherOptions, Error as ReplyError, HttpReplyTransport, OutboundMessage,
        ReplyDispatcher,
    },
    tracing::info,
};

fn proxy_from(config: &RelayConfig) -> Result<RemoteDataProxy> {
    Ok(RemoteDataProxy::new(
        config.bot.base_url(),
        BotIdentity {
            id: config.bot.id.clone(),
            name: config.bot.name.clone(),
        },
        Duration::from_secs(config.proxy.timeout_secs),
    )?)
}

/// Run one purge through the bot host and print its result message.
pub async fn purge(config: &RelayConfig, days: &str) -> Result<()> {
    let message = proxy_from(config)?.purge_logs_older_than(days).await;
    println!("{message}");
    if message == PURGE_FAILED_MESSAGE {
        bail!("purge failed");
    }
    Ok(())
}

#[derive(Default)]
struct FailureCount(AtomicUsize);

impl DeadLetterSink for FailureCount {
    fn dead_letter(&self, message: OutboundMessage, error: &ReplyError) {
        eprintln!("failed to deliver {} reply to {}: {error}", message.kind, message.room);
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

/// Send replies to `room` and wait until they have been attempted.
pub async fn send(
    config: &RelayConfig,
    room: &str,
    message: Option<String>,
    image: Option<PathBuf>,
) -> Result<()> {
    if message.is_none() && image.is_none() {
        bail!("nothing to send: pass --message and/or --image");
    }

    let transport = HttpReplyTransport::new(
        config.bot.base_url(),
        Duration::from_secs(config.replier.timeout_secs),
    )?;
    let failures = Arc::new(FailureCount::default());
    let dispatcher = ReplyDispatcher::with_options(
        Arc::new(transport),
        room,
        DispatcherOptions {
            min_interval: Duration::from_millis(config.replier.min_interval_ms),
            dead_letters: Some(failures.clone()),
        },
    );

    if let Some(text) = message {
        dispatcher.enqueue_text(text)?;
    }
    if let Some(path) = image {
        dispatcher.enqueue_image_file(path)?;
    }
    dispatcher.wait_idle().await;

    let failed = failures.0.load(Ordering::Relaxed);
    if failed > 0 {
        bail!("{failed} reply(ies) could not be delivered");
    }
    info!(room, "replies delivered");
    Ok(())
}
