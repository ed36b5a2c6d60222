//! Action Router / Report Agent
//!
//! A single bounded-queue worker serializes moderation decisions into
//! calls against the [`moderation_client::Client`]. Decisions are
//! produced by the Embed Checker and the Redirect Follower from whichever
//! worker thread observed a match; this task is where they're linearized
//! into outbound HTTP calls.

use std::collections::HashMap;
use std::sync::Arc;

use moderation_client::Client;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::matcher::MatchResult;

/// One unit of work for the Action Router.
#[derive(Debug, Clone)]
pub enum Decision {
    /// Rule matches found while checking embeds or following redirects for
    /// one repo; each path's matches become a label event.
    Matches {
        repo: String,
        path_matches: HashMap<String, Vec<MatchResult>>,
    },
    /// A redirect chain exceeded its hop limit — reported, not labeled.
    AccountReport { repo: String, reason: String },
}

/// Handle for submitting decisions; cloned into every producer.
#[derive(Clone)]
pub struct ActionRouterHandle {
    tx: mpsc::Sender<Decision>,
}

impl ActionRouterHandle {
    /// Enqueue a decision, awaiting queue capacity if full (backpressure).
    pub async fn submit(&self, decision: Decision) -> Result<(), Decision> {
        metrics::gauge!("action_router_queue_depth").increment(1.0);
        self.tx.send(decision).await.map_err(|e| e.0)
    }
}

pub struct ActionRouter;

impl ActionRouter {
    /// Spawn the single Action Router worker. Returns a cloneable handle
    /// for producers and the worker's join handle for shutdown.
    pub fn spawn(client: Arc<Client>, queue_limit: usize, dry_run: bool) -> (ActionRouterHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(queue_limit);

        let handle = tokio::spawn(async move {
            while let Some(decision) = rx.recv().await {
                metrics::gauge!("action_router_queue_depth").decrement(1.0);
                if dry_run {
                    info!(decision = ?decision, "dry-run: emission short-circuited");
                    metrics::counter!("moderation_events_emitted_total", "kind" => "dry_run").increment(1);
                    continue;
                }
                Self::emit(&client, decision).await;
            }
        });

        (ActionRouterHandle { tx }, handle)
    }

    async fn emit(client: &Client, decision: Decision) {
        match decision {
            Decision::Matches { repo, path_matches } => {
                let labels: Vec<String> = path_matches
                    .values()
                    .flatten()
                    .map(|m| m.rule_id.clone())
                    .collect();
                if labels.is_empty() {
                    return;
                }
                let comment = format!("{} path(s) matched", path_matches.len());
                match client.label_account(&repo, labels, Some(comment)).await {
                    Ok(_) => {
                        metrics::counter!("moderation_events_emitted_total", "kind" => "label").increment(1);
                    }
                    Err(e) => {
                        warn!(repo, error = %e, "failed to emit label event");
                        metrics::counter!("moderation_events_emitted_total", "kind" => "label_failed").increment(1);
                    }
                }
            }
            Decision::AccountReport { repo, reason } => {
                match client
                    .send_report(&repo, "com.atproto.moderation.defs#reasonOther", Some(reason))
                    .await
                {
                    Ok(_) => {
                        metrics::counter!("moderation_events_emitted_total", "kind" => "report").increment(1);
                    }
                    Err(e) => {
                        warn!(repo, error = %e, "failed to submit report");
                        metrics::counter!("moderation_events_emitted_total", "kind" => "report_failed").increment(1);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_does_not_require_a_reachable_client() {
        // In dry-run mode the worker never calls into the client, so a
        // client pointed at an unreachable URL is fine for this test.
        let client = Arc::new(moderation_client::Client::new(
            reqwest::Client::new(),
            moderation_client::ClientConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                service_did: "did:plc:labeler".into(),
                operator_did: "did:plc:operator".into(),
                credentials: session::Credentials {
                    identifier: "x".into(),
                    password: common::Secret::new("y".into()),
                },
                refresh_buffer: std::time::Duration::from_secs(60),
                use_token: true,
            },
        ));

        let (handle, join) = ActionRouter::spawn(client, 4, true);
        handle
            .submit(Decision::AccountReport {
                repo: "did:plc:target".into(),
                reason: "link redirection chain exceeded limit".into(),
            })
            .await
            .unwrap();
        drop(handle);
        join.await.unwrap();
    }
}
