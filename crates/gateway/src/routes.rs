//! Route handlers.

use std::time::Instant;

use {
    axum::{
        Json,
        body::Bytes,
        extract::State,
        http::{StatusCode, header},
        response::{IntoResponse, Response},
    },
    chatrelay_protocol::{InboundEvent, missing_keys},
    serde_json::{Value, json},
    tracing::{debug, warn},
};

#[cfg(feature = "metrics")]
use chatrelay_metrics::{counter, histogram, inbound as inbound_metrics, labels};

use crate::{handler::InboundContext, state::AppState};

const ACCEPTED_BODY: &str = "200";
const ACCEPTED_CONTENT_TYPE: &str = "text/plain; charset=\"utf-8\"";

fn reject(reason: &'static str, body: Value) -> Response {
    #[cfg(feature = "metrics")]
    counter!(inbound_metrics::EVENTS_REJECTED_TOTAL, labels::REASON => reason).increment(1);
    debug!(reason, "inbound event rejected");
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn processing_error(details: impl std::fmt::Display) -> Response {
    warn!(error = %details, "failed to process inbound event");
    reject(
        "decode",
        json!({"error": "Failed to process JSON data", "details": details.to_string()}),
    )
}

/// Render key names the way the bot host's logs show lists: `['msg', 'json']`.
fn key_list(keys: &[&str]) -> String {
    let quoted: Vec<String> = keys.iter().map(|k| format!("'{k}'")).collect();
    format!("[{}]", quoted.join(", "))
}

/// `POST /db`: validate and accept one chat event, then run the handler on a
/// background task once the response is on its way.
pub async fn inbound_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(value) => value,
            Err(e) => return processing_error(e),
        }
    };
    if !value.is_object() {
        return reject("no_json", json!({"error": "No JSON data received"}));
    }

    let missing = missing_keys(&value);
    if !missing.is_empty() {
        return reject(
            "missing_keys",
            json!({"error": format!("Missing required keys: {}", key_list(&missing))}),
        );
    }

    let event: InboundEvent = match serde_json::from_value(value) {
        Ok(event) => event,
        Err(e) => return processing_error(e),
    };
    let Some(chat_id) = event.chat_id().map(str::to_string) else {
        return processing_error("chat log has no chat_id");
    };

    #[cfg(feature = "metrics")]
    counter!(inbound_metrics::EVENTS_TOTAL).increment(1);
    debug!(chat_id = %chat_id, sender = %event.sender, "inbound event accepted");

    let ctx = InboundContext {
        replier: state.dispatcher_for(&chat_id),
        proxy: state.proxy.clone(),
        event,
    };
    let handler = state.handler.clone();
    tokio::spawn(async move {
        let started = Instant::now();
        if let Err(e) = handler.handle(ctx).await {
            warn!(chat_id = %chat_id, error = %e, "inbound handler failed");
        }
        #[cfg(feature = "metrics")]
        histogram!(inbound_metrics::HANDLER_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        debug!(chat_id = %chat_id, elapsed_ms = started.elapsed().as_millis(), "inbound handler finished");
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, ACCEPTED_CONTENT_TYPE)],
        ACCEPTED_BODY,
    )
        .into_response()
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": state.version,
    }))
}

/// Prometheus text exposition for scrapers.
#[cfg(feature = "prometheus")]
pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics_handle.as_ref() {
        Some(handle) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not enabled",
        )
            .into_response(),
    }
}
