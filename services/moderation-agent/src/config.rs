//! Configuration types and loading

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use common::Secret;
use serde::Deserialize;

/// Root configuration, deserialized from a YAML file.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub pds: PdsConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Connection and authentication settings for the target PDS/labeler.
#[derive(Debug, Deserialize)]
pub struct PdsConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub handle: String,
    pub password: Secret<String>,
    pub service_did: String,
    pub operator_did: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub use_token: bool,
    #[serde(default = "default_refresh_buffer_secs")]
    pub refresh_buffer_secs: u64,
}

impl PdsConfig {
    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.refresh_buffer_secs)
    }
}

/// Tunables for the Embed Checker / Action Router / Counters / Account
/// Cache, translated 1:1 into [`engine::EngineConfig`].
#[derive(Debug, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_threads")]
    pub number_of_threads: usize,
    #[serde(default = "default_queue_limit")]
    pub queue_limit: usize,
    #[serde(default = "default_redirect_limit")]
    pub url_redirect_limit: u32,
    #[serde(default = "default_host_prefix")]
    pub uri_host_prefix: String,
    #[serde(default)]
    pub whitelist_uris: HashSet<String>,
    #[serde(default = "default_factor")]
    pub image_factor: u64,
    #[serde(default = "default_factor")]
    pub video_factor: u64,
    #[serde(default = "default_factor")]
    pub record_factor: u64,
    #[serde(default = "default_factor")]
    pub link_factor: u64,
    #[serde(default)]
    pub denylisted_hosts: HashSet<String>,
    #[serde(default)]
    pub denylisted_keywords: Vec<String>,
    #[serde(default = "default_cache_capacity")]
    pub account_cache_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            number_of_threads: default_threads(),
            queue_limit: default_queue_limit(),
            url_redirect_limit: default_redirect_limit(),
            uri_host_prefix: default_host_prefix(),
            whitelist_uris: HashSet::new(),
            image_factor: default_factor(),
            video_factor: default_factor(),
            record_factor: default_factor(),
            link_factor: default_factor(),
            denylisted_hosts: HashSet::new(),
            denylisted_keywords: Vec::new(),
            account_cache_capacity: default_cache_capacity(),
        }
    }
}

impl EngineSettings {
    pub fn into_engine_config(self, dry_run: bool) -> engine::EngineConfig {
        engine::EngineConfig {
            number_of_threads: self.number_of_threads,
            queue_limit: self.queue_limit,
            url_redirect_limit: self.url_redirect_limit,
            uri_host_prefix: self.uri_host_prefix,
            whitelist_uris: self.whitelist_uris,
            image_factor: self.image_factor,
            video_factor: self.video_factor,
            record_factor: self.record_factor,
            link_factor: self.link_factor,
            denylisted_hosts: self.denylisted_hosts,
            denylisted_keywords: self.denylisted_keywords,
            account_cache_capacity: self.account_cache_capacity,
            dry_run,
        }
    }
}

/// Logging level override and the bind address for `/health` + `/metrics`.
#[derive(Debug, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_metrics_addr")]
    pub metrics_addr: SocketAddr,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            metrics_addr: default_metrics_addr(),
        }
    }
}

fn default_port() -> u16 {
    443
}
fn default_true() -> bool {
    true
}
fn default_refresh_buffer_secs() -> u64 {
    60
}
fn default_threads() -> usize {
    4
}
fn default_queue_limit() -> usize {
    256
}
fn default_redirect_limit() -> u32 {
    10
}
fn default_host_prefix() -> String {
    "www.".to_string()
}
fn default_factor() -> u64 {
    4
}
fn default_cache_capacity() -> usize {
    500_000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_addr() -> SocketAddr {
    "0.0.0.0:9090".parse().expect("valid default metrics addr")
}

impl Config {
    /// Load and validate configuration from a YAML file. Missing required
    /// fields or unparseable YAML are fatal at startup.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config path from an optional `--config` flag, falling
    /// back to `MODERATION_AGENT_CONFIG` then `config.yaml`.
    pub fn resolve_path(cli_path: Option<&str>) -> std::path::PathBuf {
        if let Some(p) = cli_path {
            return std::path::PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("MODERATION_AGENT_CONFIG") {
            return std::path::PathBuf::from(p);
        }
        std::path::PathBuf::from("config.yaml")
    }

    fn validate(&self) -> Result<()> {
        if self.pds.host.is_empty() {
            anyhow::bail!("pds.host must not be empty");
        }
        if self.pds.handle.is_empty() {
            anyhow::bail!("pds.handle must not be empty");
        }
        if self.pds.service_did.is_empty() {
            anyhow::bail!("pds.service_did must not be empty");
        }
        if self.pds.operator_did.is_empty() {
            anyhow::bail!("pds.operator_did must not be empty");
        }
        for (name, factor) in [
            ("image_factor", self.engine.image_factor),
            ("video_factor", self.engine.video_factor),
            ("record_factor", self.engine.record_factor),
            ("link_factor", self.engine.link_factor),
        ] {
            if factor < 2 {
                anyhow::bail!("engine.{name} must be >= 2, got {factor}");
            }
        }
        Ok(())
    }
}
