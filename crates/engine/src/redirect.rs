//! Redirect Follower: chases one external URL's redirect chain.
//!
//! Redirects are followed manually (the client is built with
//! `redirect::Policy::none()`) rather than via reqwest's built-in
//! follower, so that each hop can be evaluated against the matcher and
//! routed through the (async) Action Router before the next request is
//! issued — reqwest's redirect callback is synchronous and cannot await
//! a bounded channel send.

use std::sync::Arc;

use reqwest::header::LOCATION;
use tracing::debug;
use url::Url;

use crate::action::{ActionRouterHandle, Decision};
use crate::config::EngineConfig;
use crate::counters::FrequencyCounters;
use crate::embed::should_process_uri;
use crate::matcher::RuleMatcher;

#[derive(Debug, Clone)]
pub enum Outcome {
    /// The chain terminated (non-redirect response) within the hop limit.
    Completed { hops: u32 },
    /// The hop limit was exceeded before the chain terminated.
    Overflow { hops: u32, chain: Vec<String> },
    /// The chase failed for a reason other than hop overflow.
    Error(String),
}

pub struct RedirectFollower {
    client: reqwest::Client,
    counters: Arc<FrequencyCounters>,
    matcher: Arc<dyn RuleMatcher>,
    action: ActionRouterHandle,
    config: Arc<EngineConfig>,
}

impl RedirectFollower {
    /// Builds its own client with automatic redirect-following disabled —
    /// each hop is read and evaluated here, one request at a time, so the
    /// matcher check and the (async, backpressured) Action Router submit
    /// can run between hops.
    pub fn new(
        counters: Arc<FrequencyCounters>,
        matcher: Arc<dyn RuleMatcher>,
        action: ActionRouterHandle,
        config: Arc<EngineConfig>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("redirect follower client must build");
        Self {
            client,
            counters,
            matcher,
            action,
            config,
        }
    }

    pub async fn follow(&self, repo: &str, path: &str, root_url: &str) -> Outcome {
        let outcome = self.follow_inner(repo, path, root_url).await;
        let hops = match &outcome {
            Outcome::Completed { hops } => Some(*hops),
            Outcome::Overflow { hops, .. } => Some(*hops),
            Outcome::Error(_) => None,
        };
        if let Some(hops) = hops {
            metrics::histogram!("link_redirect_hops").record(hops as f64);
        }
        outcome
    }

    async fn follow_inner(&self, repo: &str, path: &str, root_url: &str) -> Outcome {
        let mut chain = vec![root_url.to_string()];
        let mut current = root_url.to_string();
        let mut hops: u32 = 0;

        loop {
            let response = match self
                .client
                .get(&current)
                .header("User-Agent", BROWSER_USER_AGENT)
                .header("Accept-Language", "en-US,en;q=0.9")
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => return Outcome::Error(format!("request to {current} failed: {e}")),
            };

            if !response.status().is_redirection() {
                return Outcome::Completed { hops };
            }

            let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            else {
                return Outcome::Completed { hops };
            };

            let next = match Url::parse(&current).and_then(|base| base.join(location)) {
                Ok(url) => url.to_string(),
                Err(e) => return Outcome::Error(format!("could not resolve redirect target: {e}")),
            };

            hops += 1;
            chain.push(next.clone());

            if hops > self.config.url_redirect_limit {
                return Outcome::Overflow { hops, chain };
            }

            if self.counters.external_already_seen(&next) {
                debug!(url = %next, "redirect hop already seen, stopping chain");
                return Outcome::Completed { hops };
            }

            let Some(normalized) = should_process_uri(&next, &self.config) else {
                debug!(url = %next, "redirect hop whitelisted or malformed, stopping chain");
                return Outcome::Completed { hops };
            };

            self.counters.external_seen(&normalized, self.config.link_factor);

            let candidates = vec![root_url.to_string(), "redirected_url".to_string(), normalized.clone()];
            let matches = self.matcher.all_matches_for_candidates(&candidates);
            if !matches.is_empty() {
                let mut path_matches = std::collections::HashMap::new();
                path_matches.insert(path.to_string(), matches);
                let _ = self
                    .action
                    .submit(Decision::Matches {
                        repo: repo.to_string(),
                        path_matches,
                    })
                    .await;
            }

            current = normalized;
        }
    }
}

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionRouter;
    use crate::matcher::KeywordHostMatcher;

    fn test_config(limit: u32) -> Arc<EngineConfig> {
        Arc::new(EngineConfig {
            url_redirect_limit: limit,
            ..EngineConfig::default()
        })
    }

    fn test_matcher() -> Arc<dyn RuleMatcher> {
        Arc::new(KeywordHostMatcher::new(Default::default(), Vec::new()))
    }

    async fn test_client_for(base_did: &str) -> (Arc<moderation_client::Client>, mockito::ServerGuard) {
        let server = mockito::Server::new_async().await;
        let client = Arc::new(moderation_client::Client::new(
            reqwest::Client::new(),
            moderation_client::ClientConfig {
                base_url: server.url(),
                service_did: "did:plc:labeler".into(),
                operator_did: base_did.to_string(),
                credentials: session::Credentials {
                    identifier: "x".into(),
                    password: common::Secret::new("y".into()),
                },
                refresh_buffer: std::time::Duration::from_secs(60),
                use_token: true,
            },
        ));
        (client, server)
    }

    #[tokio::test]
    async fn chain_within_limit_completes() {
        let mut server = mockito::Server::new_async().await;
        let hop1 = format!("{}/hop1", server.url());
        let _root = server
            .mock("GET", "/root")
            .with_status(302)
            .with_header("Location", &hop1)
            .create_async()
            .await;
        let _hop1 = server
            .mock("GET", "/hop1")
            .with_status(200)
            .create_async()
            .await;

        let counters = Arc::new(FrequencyCounters::new());
        let (client, _guard) = test_client_for("did:plc:operator").await;
        let (action, _join) = ActionRouter::spawn(client, 4, true);
        let follower = RedirectFollower::new(
            counters,
            test_matcher(),
            action,
            test_config(5),
        );

        let outcome = follower
            .follow("did:plc:repo", "path", &format!("{}/root", server.url()))
            .await;
        assert!(matches!(outcome, Outcome::Completed { hops: 1 }));
    }

    #[tokio::test]
    async fn chain_exceeding_limit_overflows() {
        let mut server = mockito::Server::new_async().await;
        // Every hop redirects to the next, forever — limit is what stops it.
        for i in 0..12 {
            let next = format!("{}/hop{}", server.url(), i + 1);
            server
                .mock("GET", format!("/hop{i}").as_str())
                .with_status(302)
                .with_header("Location", &next)
                .create_async()
                .await;
        }

        let counters = Arc::new(FrequencyCounters::new());
        let (client, _guard) = test_client_for("did:plc:operator").await;
        let (action, _join) = ActionRouter::spawn(client, 4, true);
        let follower = RedirectFollower::new(
            counters,
            test_matcher(),
            action,
            test_config(5),
        );

        let outcome = follower
            .follow("did:plc:repo", "path", &format!("{}/hop0", server.url()))
            .await;
        match outcome {
            Outcome::Overflow { hops, .. } => assert!(hops > 5),
            other => panic!("expected Overflow, got {other:?}"),
        }
    }
}
