use std::sync::{Mutex, OnceLock};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static INSTALL: Mutex<()> = Mutex::new(());

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
///
/// The global recorder can only be installed once per process; later calls
/// (every test that builds an app) get the same handle back.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let _installing = INSTALL.lock().unwrap_or_else(|p| p.into_inner());
    if let Some(handle) = HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

    // Pre-register counters so they appear even before the first increment.
    counter!("offers_cached_total").absolute(0);
    counter!("price_points_recorded_total").absolute(0);
    counter!("provider_errors_total").absolute(0);
    counter!("alerts_checked_total").absolute(0);
    counter!("alerts_fired_total").absolute(0);
    counter!("wheel_spins_total").absolute(0);
    counter!("history_entries_pruned_total").absolute(0);

    // Histogram is lazily created on first record; force creation.
    histogram!("alert_sweep_seconds").record(0.0);

    Ok(HANDLE.get_or_init(|| handle).clone())
}
