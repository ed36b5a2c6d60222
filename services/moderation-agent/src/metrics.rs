//! Prometheus metrics exposition
//!
//! Registers and exposes the metrics named in the ambient stack:
//!
//! - `embed_checker_queue_depth` (gauge)
//! - `action_router_queue_depth` (gauge)
//! - `link_redirect_hops` (histogram)
//! - `moderation_events_emitted_total` (counter): label `kind`
//! - `counter_alerts_total` (counter): label `category`
//! - `session_refresh_total` (counter): label `outcome`

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering
/// `/metrics`. `link_redirect_hops` gets explicit bucket boundaries so it
/// renders as a histogram (`_bucket` lines) rather than a summary.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full("link_redirect_hops".to_string()),
            &[1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full("link_redirect_hops".to_string()),
                &[1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0],
            )
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn engine_and_session_metrics_render_with_labels() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        metrics::gauge!("embed_checker_queue_depth").increment(1.0);
        metrics::gauge!("action_router_queue_depth").increment(1.0);
        metrics::histogram!("link_redirect_hops").record(6.0);
        metrics::counter!("moderation_events_emitted_total", "kind" => "label").increment(1);
        metrics::counter!("counter_alerts_total", "category" => "image").increment(1);
        metrics::counter!("session_refresh_total", "outcome" => "connect").increment(1);

        let output = handle.render();
        assert!(output.contains("embed_checker_queue_depth"));
        assert!(output.contains("action_router_queue_depth"));
        assert!(output.contains("link_redirect_hops_bucket"));
        assert!(output.contains("kind=\"label\""));
        assert!(output.contains("category=\"image\""));
        assert!(output.contains("outcome=\"connect\""));
    }
}
