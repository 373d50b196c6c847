//! Typed view of a `chat_logs` row as forwarded by the bot-hosting process.

use {
    serde::{Deserialize, Deserializer, Serialize},
    serde_json::{Map, Value},
};

use crate::nested::Nested;

/// One chat-log record. Ids and timestamps are accepted as numbers or strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatLog {
    #[serde(deserialize_with = "opt_string")]
    pub id: Option<String>,
    #[serde(rename = "_id", deserialize_with = "opt_string")]
    pub row_id: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub deleted_at: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub referer: Option<String>,
    #[serde(rename = "type", deserialize_with = "opt_string")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub chat_id: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub user_id: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub message: Option<String>,
    #[serde(deserialize_with = "opt_i64")]
    pub created_at: Option<i64>,
    #[serde(deserialize_with = "opt_string")]
    pub prev_id: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub supplement: Option<String>,
    pub attachment: Nested<Map<String, Value>>,
    pub v: Nested<VFields>,
}

impl ChatLog {
    /// Chat id with surrounding whitespace removed, if non-empty.
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Whether the bot-hosting process flagged this message as sent by the bot.
    pub fn is_mine(&self) -> bool {
        self.v
            .parsed()
            .and_then(|v| v.is_mine)
            .unwrap_or(false)
    }
}

/// Metadata carried in the `v` column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VFields {
    pub not_decoded: Option<bool>,
    pub origin: Option<String>,
    #[serde(deserialize_with = "opt_string")]
    pub c: Option<String>,
    pub modify_revision: Option<i64>,
    pub is_single_default_emoticon: Option<bool>,
    pub default_emoticons_count: Option<i64>,
    pub is_mine: Option<bool>,
    pub enc: Option<i64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn opt_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(
        Option::<Scalar>::deserialize(deserializer)?.map(|scalar| match scalar {
            Scalar::Str(s) => s,
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }),
    )
}

fn opt_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(n)) => Some(n),
        #[allow(clippy::cast_possible_truncation)]
        Some(Scalar::Float(f)) if f.is_finite() => Some(f as i64),
        Some(Scalar::Str(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
