//! Prometheus metrics (C12 ambient observability, HTTP surface for C13).

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the global metrics recorder and returns the handle the
/// `/metrics` route renders from. Panics only at startup, never at request
/// time — a second call in the same process would panic too, so this must
/// be called exactly once.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

pub async fn render(handle: PrometheusHandle) -> String {
    handle.render()
}
