//! # Constants Module
//!
//! Centralized constants used throughout the pipeline, to avoid magic numbers
//! and hardcoded strings scattered across the codebase.

/// Format string for timestamp used in log file names.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Directory for rolling log files.
pub const LOG_PATH: &str = "logs";

/// Base name for log files.
pub const LOG_BASE_NAME: &str = "observatory";

/// Environment variable key to override the default logging level.
pub const LOG_KEY_ENV: &str = "RUST_LOG";

/// Default logging level if `RUST_LOG` is not set.
pub const LOG_DEFAULT_LEVEL: &str = "info";

/// CLI version string.
pub const CLI_VERSION: &str = "1.0";

/// Env var carrying the database password (never stored in YAML).
pub const DB_PASSWORD_ENV: &str = "DB_PASSWORD";

/// Env var carrying the relay/monitor signing key (hex-64 or `nsec1...`).
pub const PRIVATE_KEY_ENV: &str = "PRIVATE_KEY";

/// Default metrics exposition path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// `service_state.state_type` discriminants (spec.md §3).
pub mod state_type {
    pub const CANDIDATE: &str = "candidate";
    pub const CURSOR: &str = "cursor";
    pub const CHECKPOINT: &str = "checkpoint";
}

/// `service_state.service_name` discriminants, used as the cross-service
/// contract key (spec.md §3, §9 "Shared state via a single KV table").
pub mod service_name {
    pub const SEEDER: &str = "seeder";
    pub const FINDER: &str = "finder";
    pub const VALIDATOR: &str = "validator";
    pub const MONITOR: &str = "monitor";
    pub const SYNCHRONIZER: &str = "synchronizer";
}

/// `metadata.type` discriminants (spec.md §3).
pub mod metadata_type {
    pub const NIP11_INFO: &str = "nip11_info";
    pub const NIP66_RTT: &str = "nip66_rtt";
    pub const NIP66_SSL: &str = "nip66_ssl";
    pub const NIP66_GEO: &str = "nip66_geo";
    pub const NIP66_NET: &str = "nip66_net";
    pub const NIP66_DNS: &str = "nip66_dns";
    pub const NIP66_HTTP: &str = "nip66_http";
}

/// Known network classes a relay or candidate may belong to (spec.md §3).
pub mod network {
    pub const CLEARNET: &str = "clearnet";
    pub const TOR: &str = "tor";
    pub const I2P: &str = "i2p";
    pub const LOKI: &str = "loki";

    pub const ALL: [&str; 4] = [CLEARNET, TOR, I2P, LOKI];

    pub fn is_overlay(net: &str) -> bool {
        matches!(net, TOR | I2P | LOKI)
    }
}

/// Nostr event kinds the Finder scans by default (spec.md §4.5).
pub const FINDER_DEFAULT_KINDS: [u16; 3] = [2, 3, 10002];

/// Monitor announcement / discovery event kinds (spec.md §4.7).
pub const KIND_MONITOR_ANNOUNCEMENT: u16 = 10166;
pub const KIND_RELAY_DISCOVERY: u16 = 30166;

/// Histogram buckets for `cycle_duration_seconds` (spec.md §4.3).
pub const CYCLE_DURATION_BUCKETS: [f64; 10] =
    [1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0];
