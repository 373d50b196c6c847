use {chatrelay_protocol::QueryResponse, serde_json::Value};

use crate::error::Error;

/// One result row, columns in select order.
pub type Row = Vec<Value>;

/// Result of a proxied query, keeping "nothing matched" apart from "the call
/// failed".
#[derive(Debug)]
pub enum QueryOutcome {
    Rows(Vec<Row>),
    Empty,
    Failed(Error),
}

impl QueryOutcome {
    /// Collapse to the optional form: only non-empty row sets survive.
    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            Self::Rows(rows) => Some(rows),
            Self::Empty | Self::Failed(_) => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rows(_) => "rows",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }

    /// Normalise the bot host's `{success, data, error}` envelope.
    ///
    /// `data` may be absent, `null`, an array of row arrays, or the same
    /// array serialised as text (including the literal `"[]"`).
    pub fn from_response(response: QueryResponse) -> Self {
        if !response.success {
            return Self::Failed(Error::Rejected {
                message: response
                    .error
                    .unwrap_or_else(|| "unspecified error".to_string()),
            });
        }
        match response.data {
            None | Some(Value::Null) => Self::Empty,
            Some(Value::String(text)) => {
                let text = text.trim();
                if text.is_empty() || text == "[]" {
                    return Self::Empty;
                }
                match serde_json::from_str::<Value>(text) {
                    Ok(value) => Self::from_data(value),
                    Err(e) => Self::Failed(Error::decode(format!("data is not JSON: {e}"))),
                }
            },
            Some(value) => Self::from_data(value),
        }
    }

    fn from_data(value: Value) -> Self {
        let Value::Array(items) = value else {
            return Self::Failed(Error::decode("data is not an array of rows"));
        };
        if items.is_empty() {
            return Self::Empty;
        }
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::Array(row) => rows.push(row),
                other => {
                    return Self::Failed(Error::decode(format!(
                        "expected row array, got {}",
                        json_kind(&other)
                    )));
                },
            }
        }
        Self::Rows(rows)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn outcome(body: Value) -> QueryOutcome {
        QueryOutcome::from_response(serde_json::from_value(body).unwrap())
    }

    #[rstest]
    #[case(json!({"success": true}))]
    #[case(json!({"success": true, "data": null}))]
    #[case(json!({"success": true, "data": []}))]
    #[case(json!({"success": true, "data": "[]"}))]
    #[case(json!({"success": true, "data": ""}))]
    fn empty_shapes(#[case] body: Value) {
        assert!(matches!(outcome(body), QueryOutcome::Empty));
    }

    #[rstest]
    #[case(json!({"success": false, "error": "no such table"}), "no such table")]
    #[case(json!({"success": false}), "unspecified")]
    #[case(json!({}), "unspecified")]
    fn rejected_shapes(#[case] body: Value, #[case] needle: &str) {
        match outcome(body) {
            QueryOutcome::Failed(Error::Rejected { message }) => assert!(message.contains(needle)),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[rstest]
    #[case(json!({"success": true, "data": "not json"}))]
    #[case(json!({"success": true, "data": {"name": "x"}}))]
    #[case(json!({"success": true, "data": [{"name": "x"}]}))]
    #[case(json!({"success": true, "data": 3}))]
    fn malformed_shapes(#[case] body: Value) {
        assert!(matches!(
            outcome(body),
            QueryOutcome::Failed(Error::Decode { .. })
        ));
    }

    #[test]
    fn inline_rows() {
        let rows = outcome(json!({"success": true, "data": [["alice", 31], ["bob", null]]}))
            .into_rows()
            .unwrap();
        assert_eq!(rows, vec![vec![json!("alice"), json!(31)], vec![json!("bob"), Value::Null]]);
    }

    #[test]
    fn string_encoded_rows() {
        let rows = outcome(json!({"success": true, "data": "[[\"room\"]]"}))
            .into_rows()
            .unwrap();
        assert_eq!(rows, vec![vec![json!("room")]]);
    }

    #[test]
    fn failure_collapses_to_none() {
        assert!(outcome(json!({"success": false})).into_rows().is_none());
    }
}
