//! The moderation decision/emission pipeline: frequency counters, the
//! account event cache, the redirect follower, the embed checker worker
//! pool, and the action router, wired together behind one [`Engine`]
//! handle.

mod action;
mod cache;
mod config;
mod counters;
mod embed;
mod error;
mod matcher;
mod redirect;

pub use action::{ActionRouter, ActionRouterHandle, Decision};
pub use cache::{AccountActivity, AccountEvent, AccountEventCache, AccountRecord};
pub use config::EngineConfig;
pub use counters::{alert_needed, FrequencyCounters, Observation};
pub use embed::{should_process_uri, EmbedChecker, EmbedInfo, EmbedVariant};
pub use error::{Error, Result};
pub use matcher::{KeywordHostMatcher, MatchResult, RuleMatcher, Severity};
pub use redirect::{Outcome, RedirectFollower};

use std::sync::Arc;

use moderation_client::Client;
use tokio::task::JoinHandle;

/// Everything the engine needs at startup, owned by the service binary
/// and handed down once at construction.
pub struct Engine {
    pub counters: Arc<FrequencyCounters>,
    pub accounts: Arc<AccountEventCache>,
    embed_checker: EmbedChecker,
    action_router: ActionRouterHandle,
    worker_handles: Vec<JoinHandle<()>>,
    action_handle: JoinHandle<()>,
}

impl Engine {
    pub fn start(config: Arc<EngineConfig>, client: Arc<Client>) -> Self {
        let matcher: Arc<dyn RuleMatcher> = Arc::new(KeywordHostMatcher::new(
            config.denylisted_hosts.clone(),
            config.denylisted_keywords.clone(),
        ));
        let counters = Arc::new(FrequencyCounters::new());
        let accounts = Arc::new(AccountEventCache::new(config.account_cache_capacity));

        let (action_router, action_handle) =
            ActionRouter::spawn(client, config.queue_limit, config.dry_run);
        let (embed_checker, worker_handles) = EmbedChecker::spawn(
            config,
            counters.clone(),
            matcher,
            action_router.clone(),
        );

        Self {
            counters,
            accounts,
            embed_checker,
            action_router,
            worker_handles,
            action_handle,
        }
    }

    /// Submit one post's embed list for processing; blocks on a full
    /// embed checker queue (backpressure).
    pub async fn submit_embeds(&self, info: EmbedInfo) -> Result<()> {
        self.embed_checker
            .enqueue(info)
            .await
            .map_err(|_| Error::QueueClosed)
    }

    /// Submit a decision directly to the Action Router, bypassing the
    /// embed checker (used by ingestion-side logic that has already
    /// decided on an account-level report).
    pub async fn submit_decision(&self, decision: Decision) -> Result<()> {
        self.action_router
            .submit(decision)
            .await
            .map_err(|_| Error::QueueClosed)
    }

    /// Drop the embed-checker sender (closing the queue) and await every
    /// worker and the action router task, letting in-flight work drain.
    pub async fn shutdown(self) {
        drop(self.embed_checker);
        for handle in self.worker_handles {
            let _ = handle.await;
        }
        drop(self.action_router);
        let _ = self.action_handle.await;
    }
}
