//! Per-request HTTP metrics.

use std::time::Instant;

use {
    axum::{
        body::Body,
        extract::MatchedPath,
        http::Request,
        middleware::Next,
        response::Response,
    },
    chatrelay_metrics::{counter, histogram, http as http_metrics, labels},
};

/// Records `chatrelay_http_requests_total` and
/// `chatrelay_http_request_duration_seconds`, labelled by route template,
/// method and status. Unrouted paths share the `unmatched` label.
pub async fn http_metrics_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = endpoint_label(request.extensions().get::<MatchedPath>());

    let response = next.run(request).await;
    let status = response.status().as_u16().to_string();

    counter!(
        http_metrics::REQUESTS_TOTAL,
        labels::ENDPOINT => endpoint.clone(),
        labels::METHOD => method.clone(),
        labels::STATUS => status.clone()
    )
    .increment(1);

    histogram!(
        http_metrics::REQUEST_DURATION_SECONDS,
        labels::ENDPOINT => endpoint,
        labels::METHOD => method,
        labels::STATUS => status
    )
    .record(start.elapsed().as_secs_f64());

    response
}

fn endpoint_label(matched: Option<&MatchedPath>) -> String {
    matched.map_or_else(|| "unmatched".to_string(), |path| path.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrouted_requests_share_one_label() {
        assert_eq!(endpoint_label(None), "unmatched");
    }
}
