//! Embed Checker: bounded-queue worker pool dispatching per-post embeds.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::action::{ActionRouterHandle, Decision};
use crate::config::EngineConfig;
use crate::counters::FrequencyCounters;
use crate::matcher::RuleMatcher;
use crate::redirect::RedirectFollower;

#[derive(Debug, Clone)]
pub enum EmbedVariant {
    Image { cid: String },
    Video { cid: String },
    Record { uri: String },
    External { uri: String },
}

/// One post's embed list, as produced by ingestion.
#[derive(Debug, Clone)]
pub struct EmbedInfo {
    pub repo: String,
    pub path: String,
    pub embeds: Vec<EmbedVariant>,
}

/// Horizontal ellipsis (U+2026), used by some clients to mark a
/// truncated external-link display string.
const ELLIPSIS: char = '\u{2026}';

/// Admission check for an external URI: strips a trailing ellipsis, parses
/// the URL, trims the configured host prefix, and rejects whitelisted or
/// malformed URIs. Returns the normalized URI to process, or `None` if the
/// URI should be skipped.
pub fn should_process_uri(uri: &str, config: &EngineConfig) -> Option<String> {
    let trimmed = uri.trim_end_matches(ELLIPSIS);
    let parsed = url::Url::parse(trimmed).ok()?;
    let host = parsed.host_str()?;
    let stripped = host.strip_prefix(config.uri_host_prefix.as_str()).unwrap_or(host);
    if config.whitelist_uris.contains(stripped) {
        return None;
    }
    Some(trimmed.to_string())
}

pub struct EmbedChecker {
    tx: mpsc::Sender<EmbedInfo>,
}

impl EmbedChecker {
    /// Spawn the worker pool. Workers share one receiver behind an async
    /// mutex so the pool size is configurable independent of channel
    /// mechanics.
    pub fn spawn(
        config: Arc<EngineConfig>,
        counters: Arc<FrequencyCounters>,
        matcher: Arc<dyn RuleMatcher>,
        action: ActionRouterHandle,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (tx, rx) = mpsc::channel(config.queue_limit);
        let rx = Arc::new(AsyncMutex::new(rx));

        let follower = Arc::new(RedirectFollower::new(
            counters.clone(),
            matcher.clone(),
            action.clone(),
            config.clone(),
        ));

        let mut workers = Vec::with_capacity(config.number_of_threads);
        for worker_id in 0..config.number_of_threads {
            let rx = rx.clone();
            let config = config.clone();
            let counters = counters.clone();
            let matcher = matcher.clone();
            let action = action.clone();
            let follower = follower.clone();

            workers.push(tokio::spawn(async move {
                loop {
                    let info = {
                        let mut rx = rx.lock().await;
                        rx.recv().await
                    };
                    let Some(info) = info else { break };
                    metrics::gauge!("embed_checker_queue_depth").decrement(1.0);
                    debug!(worker_id, repo = %info.repo, path = %info.path, "processing embed list");
                    process_embed_info(&info, &config, &counters, matcher.as_ref(), &action, &follower).await;
                }
            }));
        }

        (Self { tx }, workers)
    }

    /// Enqueue one post's embed list, blocking on a full queue.
    pub async fn enqueue(&self, info: EmbedInfo) -> Result<(), EmbedInfo> {
        metrics::gauge!("embed_checker_queue_depth").increment(1.0);
        self.tx.send(info).await.map_err(|e| e.0)
    }
}

async fn process_embed_info(
    info: &EmbedInfo,
    config: &EngineConfig,
    counters: &FrequencyCounters,
    matcher: &dyn RuleMatcher,
    action: &ActionRouterHandle,
    follower: &RedirectFollower,
) {
    for embed in &info.embeds {
        match embed {
            EmbedVariant::Image { cid } => {
                let obs = counters.image_seen(cid, config.image_factor);
                if obs.alert {
                    metrics::counter!("counter_alerts_total", "category" => "image").increment(1);
                }
            }
            EmbedVariant::Video { cid } => {
                let obs = counters.video_seen(cid, config.video_factor);
                if obs.alert {
                    metrics::counter!("counter_alerts_total", "category" => "video").increment(1);
                }
            }
            EmbedVariant::Record { uri } => {
                let obs = counters.record_seen(uri, config.record_factor);
                if obs.alert {
                    metrics::counter!("counter_alerts_total", "category" => "record").increment(1);
                }
                let matches = matcher.all_matches_for_candidates(&[uri.clone()]);
                if !matches.is_empty() {
                    let mut path_matches = std::collections::HashMap::new();
                    path_matches.insert(info.path.clone(), matches);
                    let _ = action
                        .submit(Decision::Matches {
                            repo: info.repo.clone(),
                            path_matches,
                        })
                        .await;
                }
            }
            EmbedVariant::External { uri } => {
                let Some(normalized) = should_process_uri(uri, config) else {
                    debug!(uri, "external uri skipped (whitelisted or malformed)");
                    continue;
                };
                if counters.external_already_seen(&normalized) {
                    debug!(uri = %normalized, "external uri already seen, skipping redirect chase");
                    continue;
                }
                let obs = counters.external_seen(&normalized, config.link_factor);
                if obs.alert {
                    metrics::counter!("counter_alerts_total", "category" => "link").increment(1);
                }
                match follower.follow(&info.repo, &info.path, &normalized).await {
                    crate::redirect::Outcome::Completed { hops } => {
                        debug!(uri = %normalized, hops, "redirect chain completed");
                    }
                    crate::redirect::Outcome::Overflow { hops, chain } => {
                        warn!(uri = %normalized, hops, "redirect chain exceeded hop limit");
                        metrics::counter!("link_redirect_limit_exceeded_total").increment(1);
                        let _ = action
                            .submit(Decision::AccountReport {
                                repo: info.repo.clone(),
                                reason: format!(
                                    "link redirection chain exceeded limit ({hops} hops): {}",
                                    chain.join(" -> ")
                                ),
                            })
                            .await;
                    }
                    crate::redirect::Outcome::Error(e) => {
                        warn!(uri = %normalized, error = %e, "redirect chase failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig {
            whitelist_uris: std::collections::HashSet::from(["example.com".to_string()]),
            uri_host_prefix: "www.".to_string(),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn whitelisted_host_is_skipped() {
        let cfg = config();
        assert_eq!(should_process_uri("https://www.example.com/x", &cfg), None);
    }

    #[test]
    fn non_whitelisted_host_is_processed() {
        let cfg = config();
        assert_eq!(
            should_process_uri("https://evil.example/x", &cfg),
            Some("https://evil.example/x".to_string())
        );
    }

    #[test]
    fn trailing_ellipsis_is_stripped_before_parsing() {
        let cfg = config();
        let uri = format!("https://evil.example/very/long/path{ELLIPSIS}");
        assert_eq!(
            should_process_uri(&uri, &cfg),
            Some("https://evil.example/very/long/path".to_string())
        );
    }

    #[test]
    fn malformed_uri_is_skipped() {
        let cfg = config();
        assert_eq!(should_process_uri("not a url", &cfg), None);
    }
}
