use std::time::Duration;

use {async_trait::async_trait, chatrelay_protocol::paths, tracing::debug};

use crate::{
    error::{Error, Result},
    message::OutboundMessage,
};

/// Delivers one reply to the bot-hosting process.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()>;
}

/// Receives replies whose delivery failed. Called from the drain task after
/// the failure is logged; the message is not retried.
pub trait DeadLetterSink: Send + Sync {
    fn dead_letter(&self, message: OutboundMessage, error: &Error);
}

/// `POST {endpoint}/reply` over HTTP. Only the status code is interpreted.
#[derive(Clone)]
pub struct HttpReplyTransport {
    http: reqwest::Client,
    url: String,
}

impl HttpReplyTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            url: format!("{}{}", base_url.trim_end_matches('/'), paths::REPLY),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReplyTransport for HttpReplyTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(&message.as_request())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        debug!(room = %message.room, kind = %message.kind, %status, "reply delivered");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, mockito::Matcher};

    #[tokio::test]
    async fn posts_reply_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/reply")
            .match_body(Matcher::Json(serde_json::json!({
                "type": "text",
                "room": "18000000001",
                "data": "hello",
            })))
            .with_status(200)
            .create_async()
            .await;

        let transport =
            HttpReplyTransport::new(&format!("{}/", server.url()), Duration::from_secs(5)).unwrap();
        transport
            .deliver(&OutboundMessage::text("18000000001", "hello"))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/reply")
            .with_status(502)
            .with_body("bot offline")
            .create_async()
            .await;

        let transport = HttpReplyTransport::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = transport
            .deliver(&OutboundMessage::text("r", "x"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Status { status: 502, ref body } if body == "bot offline")
        );
    }
}
