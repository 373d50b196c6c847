//! Wire types shared between the inbound gateway, the reply dispatcher and the
//! data proxy.
//!
//! - `InboundEvent`: bot host → gateway (`POST /db`)
//! - `ReplyRequest`: dispatcher → bot host (`POST /reply`)
//! - `QueryRequest` / `QueryResponse`: proxy ↔ bot host (`POST /query`)
//! - `DecryptRequest` / `DecryptResponse`: proxy ↔ bot host (`POST /decrypt`)

pub mod chat_log;
pub mod nested;

use serde::{Deserialize, Serialize};

pub use {
    chat_log::{ChatLog, VFields},
    nested::{Nested, decode_nested},
};

// ── Endpoints ────────────────────────────────────────────────────────────────

pub mod paths {
    pub const INBOUND: &str = "/db";
    pub const REPLY: &str = "/reply";
    pub const QUERY: &str = "/query";
    pub const DECRYPT: &str = "/decrypt";
}

// ── Inbound ──────────────────────────────────────────────────────────────────

/// Top-level keys every inbound event must carry, in reporting order.
pub const REQUIRED_KEYS: [&str; 4] = ["room", "msg", "sender", "json"];

/// Required keys absent from `body`, in [`REQUIRED_KEYS`] order.
pub fn missing_keys(body: &serde_json::Value) -> Vec<&'static str> {
    REQUIRED_KEYS
        .into_iter()
        .filter(|key| body.get(key).is_none())
        .collect()
}

/// A chat event pushed by the bot-hosting process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub room: String,
    pub msg: String,
    pub sender: String,
    #[serde(default)]
    pub json: Nested<ChatLog>,
}

impl InboundEvent {
    pub fn chat_log(&self) -> Option<&ChatLog> {
        self.json.parsed()
    }

    pub fn chat_id(&self) -> Option<&str> {
        self.chat_log().and_then(ChatLog::chat_id)
    }
}

// ── Outbound ─────────────────────────────────────────────────────────────────

/// Reply payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyKind {
    Text,
    Image,
}

impl ReplyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for ReplyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /reply`. `data` is the text, or base64 PNG bytes for images.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyRequest<'a> {
    #[serde(rename = "type")]
    pub kind: ReplyKind,
    pub room: &'a str,
    pub data: &'a str,
}

// ── Data proxy ───────────────────────────────────────────────────────────────

/// Body of `POST /query`.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<&'a [serde_json::Value]>,
}

/// Response of `POST /query`. `data` may be an array of rows, the string
/// `"[]"`, or JSON text of an array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// Body of `POST /decrypt`.
#[derive(Debug, Clone, Serialize)]
pub struct DecryptRequest<'a> {
    pub enc: i64,
    pub b64_ciphertext: &'a str,
    pub user_id: &'a str,
}

/// Response of `POST /decrypt`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DecryptResponse {
    pub plain_text: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    #[rstest]
    #[case(json!({"room": "r", "msg": "m", "sender": "s", "json": {}}), vec![])]
    #[case(json!({"room": "r", "sender": "s"}), vec!["msg", "json"])]
    #[case(json!({}), vec!["room", "msg", "sender", "json"])]
    #[case(json!([]), vec!["room", "msg", "sender", "json"])]
    fn reports_missing_keys_in_order(
        #[case] body: serde_json::Value,
        #[case] expected: Vec<&'static str>,
    ) {
        assert_eq!(missing_keys(&body), expected);
    }

    #[test]
    fn inbound_event_decodes_string_encoded_chat_log() {
        let log = json!({
            "id": 1,
            "chat_id": 18_000_000_123_i64,
            "user_id": 555,
            "message": "!ping",
            "attachment": "{\"url\":\"x\"}",
            "v": "{\"enc\":31}",
        });
        let event: InboundEvent = serde_json::from_value(json!({
            "room": "room",
            "msg": "!ping",
            "sender": "alice",
            "json": log.to_string(),
        }))
        .unwrap();

        assert_eq!(event.chat_id(), Some("18000000123"));
        let log = event.chat_log().unwrap();
        assert_eq!(log.attachment.parsed().unwrap()["url"], "x");
        assert_eq!(log.v.parsed().unwrap().enc, Some(31));
    }

    #[test]
    fn undecodable_chat_log_has_no_chat_id() {
        let event: InboundEvent = serde_json::from_value(json!({
            "room": "room", "msg": "m", "sender": "s", "json": "{broken",
        }))
        .unwrap();
        assert_eq!(event.json.raw(), Some("{broken"));
        assert_eq!(event.chat_id(), None);
    }

    #[test]
    fn reply_request_wire_shape() {
        let body = ReplyRequest {
            kind: ReplyKind::Image,
            room: "42",
            data: "aGk=",
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"type": "image", "room": "42", "data": "aGk="})
        );
    }

    #[test]
    fn query_request_omits_empty_bind() {
        let body = QueryRequest {
            query: "SELECT 1",
            bind: None,
        };
        assert_eq!(serde_json::to_value(&body).unwrap(), json!({"query": "SELECT 1"}));
    }
}
