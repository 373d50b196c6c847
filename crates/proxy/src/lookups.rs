//! Name, room and chat-log lookups built on top of raw queries.

use {
    serde_json::{Map, Value},
    tracing::{debug, warn},
};

use crate::{
    capabilities::Capability,
    client::RemoteDataProxy,
    error::{Error, Result},
    outcome::Row,
};

pub(crate) const DISPLAY_NAME_QUERY: &str = "
WITH info AS (
    SELECT ? AS user_id
)
SELECT
    COALESCE(open_chat_member.nickname, friends.name) AS name,
    COALESCE(open_chat_member.enc, friends.enc) AS enc
FROM info
LEFT JOIN db2.open_chat_member
    ON open_chat_member.user_id = info.user_id
LEFT JOIN db2.friends
    ON friends.id = info.user_id;";

pub(crate) const LEGACY_DISPLAY_NAME_QUERY: &str = "SELECT name, enc FROM db2.friends WHERE id = ?";

pub(crate) const ROOM_NAME_QUERY: &str =
    "SELECT name FROM db2.open_link WHERE id = (SELECT link_id FROM chat_rooms WHERE id = ?)";

pub(crate) const TABLE_NAMES_QUERY: &str = "SELECT name FROM sqlite_schema WHERE type='table';";

pub(crate) const CHAT_LOG_QUERY: &str = "SELECT * FROM chat_logs WHERE id = ?";

/// Bind an id as a number when it looks like one, matching how the bot host
/// stores them.
pub(crate) fn bind_id(id: &str) -> Value {
    id.trim()
        .parse::<i64>()
        .map_or_else(|_| Value::String(id.to_string()), Value::from)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

impl RemoteDataProxy {
    /// Decrypted display name of `user_id`: the open-chat nickname when the
    /// schema has one, else the friend-list name.
    pub async fn resolve_display_name(&self, user_id: &str) -> Option<String> {
        let query = if self.schema_has_capability(Capability::OpenChatMember).await {
            DISPLAY_NAME_QUERY
        } else {
            LEGACY_DISPLAY_NAME_QUERY
        };
        let rows = self.execute_query(query, Some(&[bind_id(user_id)])).await?;
        let row = rows.first()?;

        let (Some(name), Some(enc)) = (
            row.first().and_then(text_of),
            row.get(1).and_then(int_of),
        ) else {
            warn!(user_id, "display name row has no usable name/enc pair");
            return None;
        };
        self.decrypt(enc, &name, None).await
    }

    /// `(room, sender)` display strings for an event.
    ///
    /// The bot's own id resolves to the configured bot name without a lookup;
    /// an unresolved sender falls back to the raw id. The room is the open
    /// chat's name, or the sender when the room has none (direct chats).
    pub async fn resolve_room_and_sender(&self, room_id: &str, user_id: &str) -> (String, String) {
        let sender = if user_id == self.identity().id {
            self.identity().name.clone()
        } else {
            self.resolve_display_name(user_id)
                .await
                .unwrap_or_else(|| user_id.to_string())
        };

        let room = self
            .execute_query(ROOM_NAME_QUERY, Some(&[bind_id(room_id)]))
            .await
            .and_then(|rows| rows.first().and_then(|row| row.first()).and_then(text_of))
            .unwrap_or_else(|| {
                debug!(room_id, "room has no open-link name, using sender");
                sender.clone()
            });

        (room, sender)
    }

    /// Names of all tables in the main database.
    pub async fn table_names(&self) -> Vec<String> {
        self.execute_query(TABLE_NAMES_QUERY, None)
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row.first().and_then(text_of))
            .collect()
    }

    /// Column names of `table` in declaration order.
    ///
    /// `table` is spliced into the query text, so it must be a plain
    /// identifier (`[A-Za-z0-9_.]`). Lookup failures yield an empty list.
    pub async fn column_names(&self, table: &str) -> Result<Vec<String>> {
        if !is_identifier(table) {
            return Err(Error::validation(format!(
                "\"{table}\" is not a plain table name"
            )));
        }
        let query = format!("PRAGMA table_info({table})");
        Ok(self
            .execute_query(&query, None)
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|row| row.get(1).and_then(text_of))
            .collect())
    }

    /// The `chat_logs` row with the given id.
    pub async fn chat_log_row(&self, log_id: &str) -> Option<Row> {
        self.execute_query(CHAT_LOG_QUERY, Some(&[bind_id(log_id)]))
            .await?
            .into_iter()
            .next()
    }

    /// The `chat_logs` row with the given id, keyed by column name.
    pub async fn chat_log_map(&self, log_id: &str) -> Option<Map<String, Value>> {
        let row = self.chat_log_row(log_id).await?;
        let columns = self.column_names("chat_logs").await.ok()?;
        if columns.is_empty() {
            return None;
        }
        Some(columns.into_iter().zip(row).collect())
    }
}
