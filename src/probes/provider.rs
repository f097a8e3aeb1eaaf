//! `ProbeProvider` — the seam spec.md §1 calls out as external/opaque:
//! "The NIP-11/NIP-66 probe implementations (HTTP fetch, TLS introspection,
//! DNS timing, GeoIP lookup) — spec treats these as opaque probe functions
//! returning a typed result." Monitor depends on this trait, not on any
//! concrete probe; [`DefaultProbeProvider`] implements the probes this crate
//! can reasonably perform itself (NIP-11, RTT, DNS, HTTP) and returns `None`
//! for the ones that need a real external service (TLS cert introspection,
//! GeoIP, ASN lookup) — a relay simply won't carry that metadata type.

use crate::common::error;
use async_trait::async_trait;
use nostr_sdk::Keys;
use std::net::SocketAddr;
use std::time::Duration;

#[async_trait]
pub trait ProbeProvider: Send + Sync {
    /// NIP-11 relay information document (spec.md §4.7).
    async fn nip11(&self, url: &str, timeout: Duration) -> Option<serde_json::Value>;

    /// RTT in milliseconds for open/read/(write if `write_key` is given)
    /// (spec.md §4.7's `rtt-open`, `rtt-read`, `rtt-write`).
    async fn rtt(
        &self,
        url: &str,
        proxy: Option<SocketAddr>,
        write_key: Option<&Keys>,
        timeout: Duration,
    ) -> Option<serde_json::Value>;

    /// TLS certificate introspection (validity, expiry, issuer). External.
    async fn ssl(&self, url: &str, timeout: Duration) -> Option<serde_json::Value>;

    /// GeoIP lookup (country, city, lat/lon, timezone, geohash). External.
    async fn geo(&self, url: &str, geohash_precision: u8) -> Option<serde_json::Value>;

    /// IP/ASN lookup. External.
    async fn net(&self, url: &str) -> Option<serde_json::Value>;

    /// DNS resolution timing.
    async fn dns(&self, url: &str, timeout: Duration) -> Option<serde_json::Value>;

    /// Plain HTTP(S) response headers/status at the relay's origin.
    async fn http(&self, url: &str, timeout: Duration) -> Option<serde_json::Value>;
}

/// Bundles the outcome of all seven probes for one relay in one cycle
/// (spec.md §4.7 step 3's `CheckResult`).
#[derive(Debug, Default, Clone)]
pub struct CheckResult {
    pub nip11: Option<serde_json::Value>,
    pub rtt: Option<serde_json::Value>,
    pub ssl: Option<serde_json::Value>,
    pub geo: Option<serde_json::Value>,
    pub net: Option<serde_json::Value>,
    pub dns: Option<serde_json::Value>,
    pub http: Option<serde_json::Value>,
}

impl CheckResult {
    /// Pairs each populated field with its `metadata.type` discriminant, for
    /// callers building `RelayMetadata` rows (spec.md §4.7 step 4).
    pub fn documents(&self) -> Vec<(&'static str, &serde_json::Value)> {
        use crate::common::consts::metadata_type::*;
        let mut out = Vec::new();
        if let Some(v) = &self.nip11 {
            out.push((NIP11_INFO, v));
        }
        if let Some(v) = &self.rtt {
            out.push((NIP66_RTT, v));
        }
        if let Some(v) = &self.ssl {
            out.push((NIP66_SSL, v));
        }
        if let Some(v) = &self.geo {
            out.push((NIP66_GEO, v));
        }
        if let Some(v) = &self.net {
            out.push((NIP66_NET, v));
        }
        if let Some(v) = &self.dns {
            out.push((NIP66_DNS, v));
        }
        if let Some(v) = &self.http {
            out.push((NIP66_HTTP, v));
        }
        out
    }
}

pub struct DefaultProbeProvider {
    http_client: reqwest::Client,
}

impl DefaultProbeProvider {
    pub fn new() -> error::Result<Self> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(crate::common::error::Error::ReqwestError)?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl ProbeProvider for DefaultProbeProvider {
    async fn nip11(&self, url: &str, timeout: Duration) -> Option<serde_json::Value> {
        super::nip11::fetch(&self.http_client, url, timeout).await
    }

    async fn rtt(
        &self,
        url: &str,
        proxy: Option<SocketAddr>,
        write_key: Option<&Keys>,
        timeout: Duration,
    ) -> Option<serde_json::Value> {
        super::rtt::measure(url, proxy, write_key, timeout).await
    }

    async fn ssl(&self, _url: &str, _timeout: Duration) -> Option<serde_json::Value> {
        None
    }

    async fn geo(&self, _url: &str, _geohash_precision: u8) -> Option<serde_json::Value> {
        None
    }

    async fn net(&self, _url: &str) -> Option<serde_json::Value> {
        None
    }

    async fn dns(&self, url: &str, timeout: Duration) -> Option<serde_json::Value> {
        super::dns::resolve_timed(url, timeout).await
    }

    async fn http(&self, url: &str, timeout: Duration) -> Option<serde_json::Value> {
        super::http::fetch_headers(&self.http_client, url, timeout).await
    }
}
