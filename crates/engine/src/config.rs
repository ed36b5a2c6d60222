//! Tunables for every engine component, mirroring the runtime
//! configuration surface. Owned by the service binary's `Config` and
//! passed down at construction; nothing in this crate re-reads it.

use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Embed Checker worker pool size.
    pub number_of_threads: usize,
    /// Capacity of the Embed Checker and Action Router bounded queues.
    pub queue_limit: usize,
    /// Maximum redirect hops followed per external URL.
    pub url_redirect_limit: u32,
    /// Host prefix stripped before a whitelist check (e.g. "www.").
    pub uri_host_prefix: String,
    /// Hosts never counted, followed, or reported.
    pub whitelist_uris: HashSet<String>,
    /// Geometric alert factor per category.
    pub image_factor: u64,
    pub video_factor: u64,
    pub record_factor: u64,
    pub link_factor: u64,
    /// Hosts the shipped rule-matcher stub treats as an automatic match.
    pub denylisted_hosts: HashSet<String>,
    /// Keyword substrings the shipped rule-matcher stub treats as an
    /// automatic match (case-insensitive).
    pub denylisted_keywords: Vec<String>,
    /// Account Event Cache capacity before LFU eviction begins.
    pub account_cache_capacity: usize,
    /// When true, the Action Router logs emissions instead of calling out.
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            number_of_threads: 4,
            queue_limit: 256,
            url_redirect_limit: 10,
            uri_host_prefix: "www.".into(),
            whitelist_uris: HashSet::new(),
            image_factor: 4,
            video_factor: 4,
            record_factor: 4,
            link_factor: 4,
            denylisted_hosts: HashSet::new(),
            denylisted_keywords: Vec::new(),
            account_cache_capacity: 500_000,
            dry_run: false,
        }
    }
}
