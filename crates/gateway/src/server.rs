//! Router assembly and server lifecycle.

use std::{future::Future, net::SocketAddr};

use {
    axum::{
        Router,
        routing::{get, post},
    },
    chatrelay_config::RelayConfig,
    chatrelay_protocol::paths,
    tokio::net::TcpListener,
    tower_http::trace::TraceLayer,
    tracing::info,
};

#[cfg(feature = "metrics")]
use chatrelay_metrics::{MetricsRecorderConfig, init_metrics};

use crate::{routes, state::AppState};

/// Build the gateway router.
pub fn build_app(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(routes::health_handler))
        .route(paths::INBOUND, post(routes::inbound_handler));

    #[cfg(feature = "prometheus")]
    let router = router.route("/metrics", get(routes::prometheus_metrics_handler));

    #[cfg(feature = "metrics")]
    let router = router.route_layer(axum::middleware::from_fn(
        crate::metrics_middleware::http_metrics_middleware,
    ));

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = build_app(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Start the gateway from config and run until Ctrl-C.
pub async fn start_gateway(
    config: RelayConfig,
    bind_override: Option<&str>,
    port_override: Option<u16>,
) -> anyhow::Result<()> {
    let bind = bind_override.unwrap_or(&config.server.bind).to_string();
    let port = port_override.unwrap_or(config.server.port);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;

    #[cfg(feature = "metrics")]
    let metrics_handle = init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: vec![("service".to_string(), "chatrelay".to_string())],
    })?;

    #[allow(unused_mut)]
    let mut state = AppState::from_config(config)?;
    #[cfg(feature = "metrics")]
    {
        state.metrics_handle = Some(metrics_handle);
    }

    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        bot_endpoint = %state.config.bot.base_url(),
        version = state.version,
        "chatrelay gateway listening"
    );
    serve(listener, state, shutdown_signal()).await?;
    info!("chatrelay gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
    }
}
