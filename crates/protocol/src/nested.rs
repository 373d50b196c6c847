//! Fields that arrive either inline or as JSON text embedded in a string.
//!
//! The bot-hosting process forwards database rows verbatim, so a column such
//! as `attachment` may hold `{"url": "..."}`, the string `"{\"url\": \"...\"}"`,
//! an arbitrary non-JSON string, or nothing at all.

use {
    serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned},
    serde_json::Value,
    tracing::warn,
};

/// A possibly string-encoded JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Nested<T> {
    /// Decoded into the target type.
    Parsed(T),
    /// Kept verbatim because it did not decode.
    Raw(String),
    /// Missing or `null`.
    #[default]
    Absent,
}

impl<T> Nested<T> {
    pub fn parsed(&self) -> Option<&T> {
        match self {
            Self::Parsed(value) => Some(value),
            _ => None,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Raw(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn into_parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            _ => None,
        }
    }
}

/// Decode JSON text into `T`, keeping the text as [`Nested::Raw`] on failure.
pub fn decode_nested<T: DeserializeOwned>(text: &str) -> Nested<T> {
    match serde_json::from_str::<T>(text) {
        Ok(value) => Nested::Parsed(value),
        Err(e) => {
            warn!(error = %e, len = text.len(), "nested field is not valid JSON, keeping raw text");
            record_fallback();
            Nested::Raw(text.to_string())
        },
    }
}

fn decode_value<T: DeserializeOwned>(value: Value) -> Nested<T> {
    match value {
        Value::Null => Nested::Absent,
        Value::String(text) => decode_nested(&text),
        other => {
            let text = other.to_string();
            match serde_json::from_value::<T>(other) {
                Ok(value) => Nested::Parsed(value),
                Err(e) => {
                    warn!(error = %e, "nested field has unexpected shape, keeping raw text");
                    record_fallback();
                    Nested::Raw(text)
                },
            }
        },
    }
}

fn record_fallback() {
    #[cfg(feature = "metrics")]
    chatrelay_metrics::counter!(chatrelay_metrics::inbound::NESTED_DECODE_FALLBACKS_TOTAL)
        .increment(1);
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Nested<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.map_or(Nested::Absent, decode_value))
    }
}

impl<T: Serialize> Serialize for Nested<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Parsed(value) => value.serialize(serializer),
            Self::Raw(text) => serializer.serialize_str(text),
            Self::Absent => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        serde_json::Map,
        std::{
            io,
            sync::{Arc, Mutex},
        },
    };

    type Attachment = Nested<Map<String, Value>>;

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Run `f` with a subscriber that records WARN and above into a buffer.
    fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, String) {
        let buffer = LogBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        (result, buffer.contents())
    }

    #[test]
    fn string_encoded_object_is_parsed() {
        let nested: Attachment = decode_nested(r#"{"url":"x"}"#);
        assert_eq!(nested.parsed().unwrap()["url"], "x");
    }

    #[test]
    fn invalid_text_stays_raw() {
        let nested: Attachment = decode_nested("not json");
        assert_eq!(nested.raw(), Some("not json"));
    }

    #[test]
    fn raw_fallback_logs_a_warning() {
        let (nested, logs) = capture_warnings(|| decode_nested::<Map<String, Value>>("not json"));
        assert_eq!(nested.raw(), Some("not json"));
        assert!(logs.contains("WARN"), "{logs}");
        assert!(logs.contains("keeping raw text"), "{logs}");

        let (nested, logs) =
            capture_warnings(|| serde_json::from_value::<Attachment>(Value::from(5)).unwrap());
        assert_eq!(nested.raw(), Some("5"));
        assert!(logs.contains("unexpected shape"), "{logs}");
    }

    #[test]
    fn successful_decode_logs_nothing() {
        let (nested, logs) = capture_warnings(|| decode_nested::<Map<String, Value>>(r#"{"a":1}"#));
        assert!(nested.parsed().is_some());
        assert!(logs.is_empty(), "{logs}");
    }

    #[test]
    fn inline_object_is_parsed() {
        let nested: Attachment = serde_json::from_value(serde_json::json!({"url": "x"})).unwrap();
        assert_eq!(nested.parsed().unwrap()["url"], "x");
    }

    #[test]
    fn null_is_absent() {
        let nested: Attachment = serde_json::from_value(Value::Null).unwrap();
        assert!(nested.is_absent());
    }

    #[test]
    fn inline_value_of_wrong_shape_keeps_json_text() {
        let nested: Attachment = serde_json::from_value(serde_json::json!([1, 2])).unwrap();
        assert_eq!(nested.raw(), Some("[1,2]"));
    }

    #[test]
    fn serializes_back_to_its_source_shape() {
        let raw: Attachment = Nested::Raw("plain".into());
        assert_eq!(serde_json::to_value(&raw).unwrap(), "plain");
        let absent: Attachment = Nested::Absent;
        assert_eq!(serde_json::to_value(&absent).unwrap(), Value::Null);
    }
}
