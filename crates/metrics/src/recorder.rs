//! Metrics recorder installation.

use tracing::info;

use crate::error::Result;

/// Handle to the installed recorder, used to render the current metrics.
#[derive(Clone, Default)]
pub struct MetricsHandle {
    #[cfg(feature = "prometheus")]
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl MetricsHandle {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        #[cfg(feature = "prometheus")]
        {
            self.prometheus_handle.is_some()
        }
        #[cfg(not(feature = "prometheus"))]
        {
            false
        }
    }

    /// Render metrics in Prometheus text format. Empty when export is off.
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

/// Install the global recorder. Call once at startup.
///
/// With `enabled == false`, or without the `prometheus` feature, nothing is
/// installed and every `counter!`/`histogram!` call stays a no-op.
pub fn init_metrics(enabled: bool) -> Result<MetricsHandle> {
    if !enabled {
        info!("metrics export disabled");
        return Ok(MetricsHandle::default());
    }

    #[cfg(feature = "prometheus")]
    {
        let handle = prometheus_builder()?.install_recorder()?;
        info!("prometheus metrics recorder installed");
        Ok(MetricsHandle {
            prometheus_handle: Some(handle),
        })
    }

    #[cfg(not(feature = "prometheus"))]
    {
        tracing::warn!("metrics export requested but the prometheus feature is not compiled in");
        Ok(MetricsHandle::default())
    }
}

#[cfg(feature = "prometheus")]
fn prometheus_builder() -> Result<metrics_exporter_prometheus::PrometheusBuilder> {
    use {
        crate::{buckets, telegram},
        metrics_exporter_prometheus::{Matcher, PrometheusBuilder},
    };

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(telegram::RELAY_DURATION_SECONDS.to_string()),
        buckets::RELAY_DURATION,
    )?;
    Ok(builder)
}
