//! Business-logic seam for accepted inbound events.

use std::sync::Arc;

use {
    async_trait::async_trait,
    chatrelay_config::CommandsConfig,
    chatrelay_protocol::InboundEvent,
    chatrelay_proxy::RemoteDataProxy,
    chatrelay_replier::ReplyDispatcher,
    tracing::debug,
};

/// Everything a handler gets for one event. `replier` is bound to the
/// event's chat id.
pub struct InboundContext {
    pub event: InboundEvent,
    pub replier: ReplyDispatcher,
    pub proxy: Arc<RemoteDataProxy>,
}

/// Reacts to an accepted inbound event. Runs after the HTTP response has
/// been sent.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    async fn handle(&self, ctx: InboundContext) -> anyhow::Result<()>;
}

/// A recognised chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Delete chat logs older than the given number of days (unparsed).
    Purge(String),
    WhoAmI,
    Ping,
}

impl Command {
    /// Parse `text` as `<prefix><name> [args]`. Anything else is `None`.
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix(prefix)?;
        let mut parts = rest.split_whitespace();
        match parts.next()? {
            "purge" => Some(Self::Purge(parts.next().unwrap_or_default().to_string())),
            "whoami" => Some(Self::WhoAmI),
            "ping" => Some(Self::Ping),
            _ => None,
        }
    }
}

/// Built-in handler answering a small set of prefixed commands.
pub struct CommandHandler {
    enabled: bool,
    prefix: String,
}

impl CommandHandler {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            enabled: true,
            prefix: prefix.into(),
        }
    }

    pub fn from_config(config: &CommandsConfig) -> Self {
        Self {
            enabled: config.enabled,
            prefix: config.prefix.clone(),
        }
    }

    async fn reply_for(&self, command: Command, ctx: &InboundContext) -> Option<String> {
        match command {
            Command::Ping => Some("pong".to_string()),
            Command::Purge(days) => Some(ctx.proxy.purge_logs_older_than(&days).await),
            Command::WhoAmI => {
                let log = ctx.event.chat_log()?;
                let chat_id = log.chat_id()?;
                let user_id = log.user_id.as_deref()?;
                let (room, sender) = ctx.proxy.resolve_room_and_sender(chat_id, user_id).await;
                Some(format!("room: {room}\nsender: {sender}"))
            },
        }
    }
}

#[async_trait]
impl InboundHandler for CommandHandler {
    async fn handle(&self, ctx: InboundContext) -> anyhow::Result<()> {
        if !self.enabled || self.prefix.is_empty() {
            return Ok(());
        }
        let Some(command) = Command::parse(&ctx.event.msg, &self.prefix) else {
            return Ok(());
        };
        debug!(?command, room = %ctx.replier.default_room(), "running chat command");

        if let Some(reply) = self.reply_for(command, &ctx).await {
            ctx.replier.enqueue_text(reply)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        chatrelay_proxy::BotIdentity,
        chatrelay_replier::{OutboundMessage, ReplyTransport},
        rstest::rstest,
        serde_json::json,
        std::{sync::Mutex, time::Duration},
    };

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<OutboundMessage>>,
    }

    #[async_trait]
    impl ReplyTransport for Recorder {
        async fn deliver(&self, message: &OutboundMessage) -> chatrelay_replier::Result<()> {
            self.sent.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    fn context(server: &mockito::ServerGuard, msg: &str, recorder: Arc<Recorder>) -> InboundContext {
        let event: InboundEvent = serde_json::from_value(json!({
            "room": "room",
            "msg": msg,
            "sender": "alice",
            "json": {"chat_id": 18_000_000_001_i64, "user_id": 555, "message": msg},
        }))
        .unwrap();
        let proxy = RemoteDataProxy::new(
            &server.url(),
            BotIdentity {
                id: "1000".into(),
                name: "relaybot".into(),
            },
            Duration::from_secs(5),
        )
        .unwrap();
        InboundContext {
            replier: ReplyDispatcher::new(recorder, event.chat_id().unwrap()),
            event,
            proxy: Arc::new(proxy),
        }
    }

    #[rstest]
    #[case("!ping", Some(Command::Ping))]
    #[case("  !ping  ", Some(Command::Ping))]
    #[case("!whoami", Some(Command::WhoAmI))]
    #[case("!purge 7", Some(Command::Purge("7".into())))]
    #[case("!purge", Some(Command::Purge(String::new())))]
    #[case("ping", None)]
    #[case("!dance", None)]
    #[case("!", None)]
    fn parses_commands(#[case] text: &str, #[case] expected: Option<Command>) {
        assert_eq!(Command::parse(text, "!"), expected);
    }

    #[tokio::test]
    async fn ping_replies_pong_to_event_room() {
        let server = mockito::Server::new_async().await;
        let recorder = Arc::new(Recorder::default());
        let ctx = context(&server, "!ping", recorder.clone());
        let replier = ctx.replier.clone();

        CommandHandler::new("!").handle(ctx).await.unwrap();
        replier.wait_idle().await;

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent, [OutboundMessage::text("18000000001", "pong")]);
    }

    #[tokio::test]
    async fn unknown_text_produces_no_reply() {
        let server = mockito::Server::new_async().await;
        let recorder = Arc::new(Recorder::default());
        let ctx = context(&server, "hello there", recorder.clone());
        let replier = ctx.replier.clone();

        CommandHandler::new("!").handle(ctx).await.unwrap();
        replier.wait_idle().await;
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_handler_ignores_commands() {
        let server = mockito::Server::new_async().await;
        let recorder = Arc::new(Recorder::default());
        let ctx = context(&server, "!ping", recorder.clone());
        let handler = CommandHandler::from_config(&CommandsConfig {
            enabled: false,
            prefix: "!".into(),
        });

        handler.handle(ctx).await.unwrap();
        assert!(recorder.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn whoami_resolves_room_and_sender() {
        let mut server = mockito::Server::new_async().await;
        let _probe = server
            .mock("POST", "/query")
            .match_body(mockito::Matcher::Regex("sqlite_master".into()))
            .with_status(200)
            .with_body(json!({"success": true, "data": []}).to_string())
            .create_async()
            .await;
        let _name = server
            .mock("POST", "/query")
            .match_body(mockito::Matcher::Regex("db2.friends WHERE id".into()))
            .with_status(200)
            .with_body(json!({"success": true, "data": [["YWxpY2U=", 31]]}).to_string())
            .create_async()
            .await;
        let _room = server
            .mock("POST", "/query")
            .match_body(mockito::Matcher::Regex("open_link".into()))
            .with_status(200)
            .with_body(json!({"success": true, "data": [["Team Room"]]}).to_string())
            .create_async()
            .await;
        let _decrypt = server
            .mock("POST", "/decrypt")
            .with_status(200)
            .with_body(json!({"plain_text": "Alice"}).to_string())
            .create_async()
            .await;

        let recorder = Arc::new(Recorder::default());
        let ctx = context(&server, "!whoami", recorder.clone());
        let replier = ctx.replier.clone();
        CommandHandler::new("!").handle(ctx).await.unwrap();
        replier.wait_idle().await;

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].payload, "room: Team Room\nsender: Alice");
    }
}
