//! Metrics recorder initialization and configuration.

use {anyhow::Result, tracing::info};

/// Handle to the metrics system, providing access to exported metrics.
#[derive(Clone)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    /// Render metrics in Prometheus text format.
    ///
    /// Returns an empty string when metrics are disabled or the exporter was
    /// not compiled in.
    #[must_use]
    pub fn render(&self) -> String {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle
                .as_ref()
                .map(|h| h.render())
                .unwrap_or_default()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            String::new()
        }
    }
}

/// Configuration for the metrics system.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorderConfig {
    /// Whether metrics collection is enabled
    pub enabled: bool,
    /// Global labels to add to all metrics
    pub global_labels: Vec<(String, String)>,
}

/// Initialize the metrics system.
///
/// Call once at startup. With the `prometheus` feature this installs the
/// Prometheus recorder globally; otherwise the `metrics` facade stays a no-op.
///
/// # Errors
///
/// Returns an error if the recorder fails to install.
pub fn init_metrics(config: MetricsRecorderConfig) -> Result<MetricsHandle> {
    if !config.enabled {
        info!("metrics collection is disabled");
        return Ok(MetricsHandle {
            #[cfg(feature = "prometheus")]
            prometheus_handle: None,
        });
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = init_prometheus(config)?;
        info!("prometheus metrics exporter initialized");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        let _ = config;
        info!("metrics feature not enabled at compile time");
        Ok(MetricsHandle {})
    }
}

#[cfg(feature = "prometheus")]
fn init_prometheus(
    config: MetricsRecorderConfig,
) -> Result<metrics_exporter_prometheus::PrometheusHandle> {
    use {
        crate::buckets,
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let mut builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(crate::replier::DELIVERY_DURATION_SECONDS.to_string()),
            &buckets::DELIVERY_DURATION,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("_duration_seconds".to_string()),
            &buckets::HTTP_DURATION,
        )?;

    for (key, value) in config.global_labels {
        builder = builder.add_global_label(key, value);
    }

    // install_recorder() registers globally and hands back a render handle
    // without spawning the exporter's own HTTP listener.
    let handle = builder.install_recorder()?;

    Ok(handle)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn disabled_metrics_render_nothing() {
        let config = MetricsRecorderConfig {
            enabled: false,
            ..Default::default()
        };
        let handle = init_metrics(config).unwrap();
        assert!(handle.render().is_empty());
    }
}
