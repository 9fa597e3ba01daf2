use std::sync::OnceLock;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

pub(crate) fn record_import_outcome(outcome: &'static str, rows: usize) {
    metrics::counter!("student_import_total", "outcome" => outcome).increment(1);
    metrics::histogram!("student_import_rows", "outcome" => outcome).record(rows as f64);
}

pub(crate) fn record_class_created() {
    metrics::counter!("classes_created_total").increment(1);
}
