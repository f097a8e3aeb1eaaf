//! Configuration structures (spec.md §6.4). Two kinds of YAML document:
//! the shared pool config (`brotr.yaml`) and one per-service document, each
//! deserialized independently with `serde_yaml` the way the teacher loads
//! its single `Config` document, then checked for the invariants spec.md
//! calls out explicitly (`store ⊆ compute`, `interval >= 60`, etc) — a
//! violation is a configuration error (spec.md §7), fatal at startup.

use crate::common::consts::{network, DB_PASSWORD_ENV, PRIVATE_KEY_ENV};
use crate::common::error::{self, Error};
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn read_yaml_file<T: for<'de> Deserialize<'de>>(path: &Path) -> error::Result<T> {
    let raw = std::fs::read_to_string(path).map_err(|err| match err {
        e if e.kind() == std::io::ErrorKind::NotFound => {
            Error::ConfigMissing(path.to_path_buf())
        }
        e => e.into(),
    })?;
    let value: T = serde_yaml::from_str(&raw)?;
    Ok(value)
}

fn required_env(key: &'static str) -> error::Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnv(key))
}

// ---------------------------------------------------------------------
// Pool configuration (brotr.yaml)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_query_timeout")]
    pub query: u64,
    #[serde(default = "default_batch_timeout")]
    pub batch: u64,
    #[serde(default = "default_cleanup_timeout")]
    pub cleanup: u64,
}

fn default_query_timeout() -> u64 {
    10
}
fn default_batch_timeout() -> u64 {
    30
}
fn default_cleanup_timeout() -> u64 {
    60
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            query: default_query_timeout(),
            batch: default_batch_timeout(),
            cleanup: default_cleanup_timeout(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_exponential_backoff")]
    pub exponential_backoff: bool,
}

fn default_max_attempts() -> u32 {
    5
}
fn default_initial_delay_ms() -> u64 {
    200
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_exponential_backoff() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            exponential_backoff: default_exponential_backoff(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
}

fn default_batch_max_size() -> usize {
    500
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PoolConfigFile {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub min_pool_size: u32,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

fn default_max_pool_size() -> u32 {
    10
}

/// Fully resolved pool config: YAML fields plus the password pulled from
/// `DB_PASSWORD` (never stored in YAML, per spec.md §6.4).
#[derive(Clone, Debug)]
pub struct PoolConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub min_pool_size: u32,
    pub max_pool_size: u32,
    pub timeouts: TimeoutsConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
}

impl PoolConfig {
    pub fn load(path: impl AsRef<Path>) -> error::Result<Self> {
        let file: PoolConfigFile = read_yaml_file(path.as_ref())?;
        let password = required_env(DB_PASSWORD_ENV)?;
        let config = Self {
            host: file.host,
            port: file.port,
            database: file.database,
            user: file.user,
            password,
            min_pool_size: file.min_pool_size,
            max_pool_size: file.max_pool_size,
            timeouts: file.timeouts,
            retry: file.retry,
            batch: file.batch,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> error::Result<()> {
        if self.max_pool_size < self.min_pool_size.max(1) {
            return Err(Error::ConfigInvariant(
                "max_pool_size must be >= min_pool_size".into(),
            ));
        }
        Ok(())
    }

    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

// ---------------------------------------------------------------------
// Per-network fan-out configuration, shared by Validator/Monitor/Synchronizer
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default = "default_max_tasks")]
    pub max_tasks: usize,
    #[serde(default = "default_network_timeout")]
    pub timeout: u64,
}

fn default_max_tasks() -> usize {
    10
}
fn default_network_timeout() -> u64 {
    15
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            proxy_url: None,
            max_tasks: default_max_tasks(),
            timeout: default_network_timeout(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct NetworksConfig {
    #[serde(default = "default_clearnet")]
    pub clearnet: NetworkConfig,
    #[serde(default)]
    pub tor: NetworkConfig,
    #[serde(default)]
    pub i2p: NetworkConfig,
    #[serde(default)]
    pub loki: NetworkConfig,
}

fn default_clearnet() -> NetworkConfig {
    NetworkConfig {
        enabled: true,
        ..Default::default()
    }
}

impl NetworksConfig {
    /// Looks up the config for a network name (spec.md §3 `network` enum).
    /// Returns `None` for an unrecognized network rather than panicking —
    /// callers treat that as "skip, don't touch".
    pub fn get(&self, net: &str) -> Option<&NetworkConfig> {
        match net {
            network::CLEARNET => Some(&self.clearnet),
            network::TOR => Some(&self.tor),
            network::I2P => Some(&self.i2p),
            network::LOKI => Some(&self.loki),
            _ => None,
        }
    }

    /// An overlay network is usable only if it's enabled *and* has a proxy
    /// configured (spec.md §4.6: "each must be enabled or the network's
    /// candidates are skipped").
    pub fn is_usable(&self, net: &str) -> bool {
        match self.get(net) {
            None => false,
            Some(cfg) if !cfg.enabled => false,
            Some(cfg) if network::is_overlay(net) => cfg.proxy_url.is_some(),
            Some(_) => true,
        }
    }
}

// ---------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
    #[serde(default = "default_metrics_host")]
    pub host: String,
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_metrics_enabled() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9100
}
fn default_metrics_host() -> String {
    "0.0.0.0".to_string()
}
fn default_metrics_path() -> String {
    crate::common::consts::DEFAULT_METRICS_PATH.to_string()
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
            host: default_metrics_host(),
            path: default_metrics_path(),
        }
    }
}

// ---------------------------------------------------------------------
// Service-common fields (spec.md §6.4)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct ServiceCommonConfig {
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default)]
    pub max_consecutive_failures: u32,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_interval() -> u64 {
    3600
}

impl ServiceCommonConfig {
    pub fn validate(&self) -> error::Result<()> {
        if self.interval < 60 {
            return Err(Error::ConfigInvariant(
                "interval must be >= 60 seconds".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------
// Seeder (spec.md §4.4)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct SeederConfig {
    #[serde(flatten)]
    pub common: ServiceCommonConfig,
    pub seed_file: PathBuf,
    #[serde(default = "default_true")]
    pub to_validate: bool,
}

fn default_true() -> bool {
    true
}

impl SeederConfig {
    pub fn load(path: impl AsRef<Path>) -> error::Result<Self> {
        let config: Self = read_yaml_file(path.as_ref())?;
        config.common.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------
// Finder (spec.md §4.5)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct FinderEventsConfig {
    #[serde(default = "default_finder_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_finder_kinds")]
    pub kinds: Vec<u16>,
}

fn default_finder_batch_size() -> u32 {
    200
}

fn default_finder_kinds() -> Vec<u16> {
    crate::common::consts::FINDER_DEFAULT_KINDS.to_vec()
}

impl Default for FinderEventsConfig {
    fn default() -> Self {
        Self {
            batch_size: default_finder_batch_size(),
            kinds: default_finder_kinds(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiSourceConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_timeout")]
    pub timeout: u64,
    #[serde(default = "default_api_delay")]
    pub delay_between_requests: u64,
}

fn default_api_timeout() -> u64 {
    10
}
fn default_api_delay() -> u64 {
    1
}

#[derive(Clone, Debug, Deserialize)]
pub struct FinderConfig {
    #[serde(flatten)]
    pub common: ServiceCommonConfig,
    #[serde(default)]
    pub events: FinderEventsConfig,
    #[serde(default)]
    pub api_sources: Vec<ApiSourceConfig>,
}

impl FinderConfig {
    pub fn load(path: impl AsRef<Path>) -> error::Result<Self> {
        let config: Self = read_yaml_file(path.as_ref())?;
        config.common.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------
// Validator (spec.md §4.6)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ValidatorConfig {
    #[serde(flatten)]
    pub common: ServiceCommonConfig,
    #[serde(default)]
    pub networks: NetworksConfig,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default)]
    pub max_candidates: Option<u32>,
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

fn default_chunk_size() -> u32 {
    100
}
fn default_max_failures() -> u32 {
    5
}

impl ValidatorConfig {
    pub fn load(path: impl AsRef<Path>) -> error::Result<Self> {
        let config: Self = read_yaml_file(path.as_ref())?;
        config.common.validate()?;
        Ok(config)
    }
}

// ---------------------------------------------------------------------
// Monitor (spec.md §4.7)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProbeFlags {
    #[serde(default)]
    pub nip11: bool,
    #[serde(default)]
    pub rtt: bool,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default)]
    pub geo: bool,
    #[serde(default)]
    pub net: bool,
    #[serde(default)]
    pub dns: bool,
    #[serde(default)]
    pub http: bool,
}

impl ProbeFlags {
    /// Iterates the metadata-type name of every enabled probe.
    pub fn enabled_types(&self) -> Vec<&'static str> {
        use crate::common::consts::metadata_type::*;
        let mut out = Vec::new();
        if self.nip11 {
            out.push(NIP11_INFO);
        }
        if self.rtt {
            out.push(NIP66_RTT);
        }
        if self.ssl {
            out.push(NIP66_SSL);
        }
        if self.geo {
            out.push(NIP66_GEO);
        }
        if self.net {
            out.push(NIP66_NET);
        }
        if self.dns {
            out.push(NIP66_DNS);
        }
        if self.http {
            out.push(NIP66_HTTP);
        }
        out
    }

    /// `true` iff every flag set in `self` is also set in `other` — the
    /// `store ⊆ compute` check of spec.md §4.7.
    pub fn is_subset_of(&self, other: &ProbeFlags) -> bool {
        (!self.nip11 || other.nip11)
            && (!self.rtt || other.rtt)
            && (!self.ssl || other.ssl)
            && (!self.geo || other.geo)
            && (!self.net || other.net)
            && (!self.dns || other.dns)
            && (!self.http || other.http)
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ProcessingConfig {
    #[serde(default)]
    pub compute: ProbeFlags,
    #[serde(default)]
    pub store: ProbeFlags,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnnouncementConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_announcement_interval")]
    pub interval: u64,
}

fn default_announcement_interval() -> u64 {
    21_600
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_announcement_interval(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct MonitorConfig {
    #[serde(flatten)]
    pub common: ServiceCommonConfig,
    #[serde(default)]
    pub networks: NetworksConfig,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default)]
    pub max_relays: Option<u32>,
    #[serde(default)]
    pub announcement: AnnouncementConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default = "default_geohash_precision")]
    pub geohash_precision: u8,
    #[serde(default)]
    pub publish_discovery: bool,
}

fn default_geohash_precision() -> u8 {
    6
}

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> error::Result<Self> {
        let config: Self = read_yaml_file(path.as_ref())?;
        config.common.validate()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> error::Result<()> {
        if !self.processing.store.is_subset_of(&self.processing.compute) {
            return Err(Error::ConfigInvariant(
                "processing.store must be a subset of processing.compute".into(),
            ));
        }
        if self.geohash_precision == 0 || self.geohash_precision > 12 {
            return Err(Error::ConfigInvariant(
                "geohash_precision must be in 1..=12".into(),
            ));
        }
        Ok(())
    }

    /// Monitor requires a signing key for publishing and the write-RTT
    /// probe (spec.md §4.7 "Required keys").
    pub fn signing_key(&self) -> error::Result<String> {
        required_env(PRIVATE_KEY_ENV)
    }
}

// ---------------------------------------------------------------------
// Synchronizer (spec.md §4.8)
// ---------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize)]
pub struct SyncFilterConfig {
    #[serde(default)]
    pub kinds: Option<Vec<u16>>,
    #[serde(default)]
    pub authors: Option<Vec<String>>,
    #[serde(default = "default_sync_limit")]
    pub limit: usize,
}

fn default_sync_limit() -> usize {
    500
}

impl Default for SyncFilterConfig {
    fn default() -> Self {
        Self {
            kinds: None,
            authors: None,
            limit: default_sync_limit(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SyncTimeoutsConfig {
    #[serde(default = "default_relay_clearnet_timeout")]
    pub relay_clearnet: u64,
    #[serde(default = "default_relay_overlay_timeout")]
    pub relay_tor: u64,
    #[serde(default = "default_relay_overlay_timeout")]
    pub relay_i2p: u64,
    #[serde(default = "default_relay_overlay_timeout")]
    pub relay_loki: u64,
}

fn default_relay_clearnet_timeout() -> u64 {
    1800
}
fn default_relay_overlay_timeout() -> u64 {
    3600
}

impl Default for SyncTimeoutsConfig {
    fn default() -> Self {
        Self {
            relay_clearnet: default_relay_clearnet_timeout(),
            relay_tor: default_relay_overlay_timeout(),
            relay_i2p: default_relay_overlay_timeout(),
            relay_loki: default_relay_overlay_timeout(),
        }
    }
}

impl SyncTimeoutsConfig {
    pub fn for_network(&self, net: &str) -> u64 {
        match net {
            network::TOR => self.relay_tor,
            network::I2P => self.relay_i2p,
            network::LOKI => self.relay_loki,
            _ => self.relay_clearnet,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct SynchronizerConfig {
    #[serde(flatten)]
    pub common: ServiceCommonConfig,
    #[serde(default)]
    pub networks: NetworksConfig,
    #[serde(default = "default_true")]
    pub use_relay_state: bool,
    #[serde(default = "default_lookback_seconds")]
    pub lookback_seconds: i64,
    #[serde(default)]
    pub default_start: i64,
    #[serde(default)]
    pub filter: SyncFilterConfig,
    #[serde(default = "default_stagger_delay")]
    pub stagger_delay: f64,
    #[serde(default = "default_cursor_flush_interval")]
    pub cursor_flush_interval: u32,
    #[serde(default)]
    pub sync_timeouts: SyncTimeoutsConfig,
    #[serde(default)]
    pub require_known_readable: bool,
}

fn default_lookback_seconds() -> i64 {
    3600
}
fn default_stagger_delay() -> f64 {
    5.0
}
fn default_cursor_flush_interval() -> u32 {
    10
}

impl SynchronizerConfig {
    pub fn load(path: impl AsRef<Path>) -> error::Result<Self> {
        let config: Self = read_yaml_file(path.as_ref())?;
        config.common.validate()?;
        Ok(config)
    }

    /// Signing key is optional for Synchronizer — only needed if the relay
    /// challenges for NIP-42 auth (spec.md §4.8 step 5).
    pub fn signing_key(&self) -> Option<String> {
        std::env::var(PRIVATE_KEY_ENV).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_flags_subset_check() {
        let compute = ProbeFlags {
            nip11: true,
            rtt: true,
            ..Default::default()
        };
        let store_ok = ProbeFlags {
            nip11: true,
            ..Default::default()
        };
        let store_bad = ProbeFlags {
            geo: true,
            ..Default::default()
        };
        assert!(store_ok.is_subset_of(&compute));
        assert!(!store_bad.is_subset_of(&compute));
    }

    #[test]
    fn networks_config_overlay_requires_proxy() {
        let mut networks = NetworksConfig::default();
        networks.tor.enabled = true;
        assert!(!networks.is_usable(network::TOR));
        networks.tor.proxy_url = Some("socks5://127.0.0.1:9050".into());
        assert!(networks.is_usable(network::TOR));
    }

    #[test]
    fn service_common_rejects_short_interval() {
        let cfg = ServiceCommonConfig {
            interval: 30,
            max_consecutive_failures: 0,
            metrics: MetricsConfig::default(),
        };
        assert!(cfg.validate().is_err());
    }
}
