//! `Relay` — a validated Nostr endpoint (spec.md §3).
//!
//! Modeled as an immutable record with a smart constructor, the way spec.md
//! §9 asks ("frozen dataclasses with post-init validation" maps to a
//! constructor returning `Result`): there is no public way to build a
//! `Relay` with an unnormalized URL or an invalid network.

use crate::common::consts::network;
use crate::common::error::{self, Error};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    pub url: String,
    pub network: String,
    pub discovered_at: i64,
}

impl Relay {
    /// Builds a `Relay` from a raw URL string, normalizing it first
    /// (lowercased host, default port stripped — spec.md §8's round-trip
    /// law) and inferring the network from the host's TLD if not given.
    pub fn new(raw_url: &str, network_hint: Option<&str>, discovered_at: i64) -> error::Result<Self> {
        let url = normalize_relay_url(raw_url)?;
        let net = network_hint
            .map(str::to_string)
            .unwrap_or_else(|| infer_network(&url));
        validate_network(&net)?;
        validate_host(&url, &net)?;
        Ok(Self {
            url,
            network: net,
            discovered_at,
        })
    }
}

/// Parses and normalizes a relay URL: scheme must be `ws`/`wss`, host is
/// lowercased, and the default port for the scheme is stripped so two URLs
/// that differ only by an explicit default port compare equal.
pub fn normalize_relay_url(raw: &str) -> error::Result<String> {
    let mut parsed = Url::parse(raw.trim()).map_err(Error::UrlParseError)?;

    match parsed.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(Error::Validation(format!(
                "relay URL scheme must be ws or wss, got {other}"
            )))
        }
    }

    if parsed.host_str().is_none() {
        return Err(Error::Validation("relay URL has no host".into()));
    }

    let default_port = match parsed.scheme() {
        "ws" => 80,
        "wss" => 443,
        _ => unreachable!(),
    };
    if parsed.port() == Some(default_port) {
        let _ = parsed.set_port(None);
    }

    // `Url` already lowercases the host during parsing for non-opaque hosts.
    let mut normalized = parsed.to_string();
    // `Url::to_string` appends a trailing slash for an empty path regardless
    // of port; strip it unconditionally so `wss://relay.example.com`,
    // `wss://relay.example.com/` and `wss://relay.example.com:8443/` all
    // compare equal to their slash-less form.
    if parsed.path() == "/" {
        normalized.pop();
    }
    Ok(normalized)
}

/// Infers network class from the host TLD when the caller (Seeder/Finder)
/// doesn't already know it.
pub fn infer_network(url: &str) -> String {
    let parsed = match Url::parse(url) {
        Ok(u) => u,
        Err(_) => return network::CLEARNET.to_string(),
    };
    match parsed.host_str() {
        Some(host) if host.ends_with(".onion") => network::TOR.to_string(),
        Some(host) if host.ends_with(".i2p") => network::I2P.to_string(),
        Some(host) if host.ends_with(".loki") => network::LOKI.to_string(),
        _ => network::CLEARNET.to_string(),
    }
}

fn validate_network(net: &str) -> error::Result<()> {
    if network::ALL.contains(&net) {
        Ok(())
    } else {
        Err(Error::Validation(format!("unknown network: {net}")))
    }
}

/// Checks the loopback/private-address invariant for IP-literal hosts.
/// Hostnames are deferred to the caller's async DNS resolution (the
/// Validator's probe step) since resolving here would make this
/// constructor a suspension point, which spec.md §5 reserves for explicit
/// I/O boundaries.
fn validate_host(url: &str, net: &str) -> error::Result<()> {
    if network::is_overlay(net) {
        return Ok(());
    }
    let parsed = Url::parse(url).map_err(Error::UrlParseError)?;
    if let Some(host) = parsed.host_str() {
        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            if ip.is_loopback() || is_private(&ip) {
                return Err(Error::Validation(format!(
                    "relay host {host} resolves to a loopback/private address"
                )));
            }
        }
    }
    Ok(())
}

fn is_private(ip: &std::net::IpAddr) -> bool {
    match ip {
        std::net::IpAddr::V4(v4) => v4.is_private() || v4.is_link_local(),
        std::net::IpAddr::V6(v6) => v6.is_unique_local() || v6.is_unicast_link_local(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_default_wss_port() {
        let url = normalize_relay_url("wss://Relay.Example.com:443/").unwrap();
        assert_eq!(url, "wss://relay.example.com");
    }

    #[test]
    fn keeps_non_default_port() {
        let url = normalize_relay_url("wss://relay.example.com:8443").unwrap();
        assert_eq!(url, "wss://relay.example.com:8443");
    }

    #[test]
    fn rejects_non_ws_scheme() {
        assert!(normalize_relay_url("https://relay.example.com").is_err());
    }

    #[test]
    fn infers_tor_from_onion_tld() {
        assert_eq!(
            infer_network("wss://abcdefgh.onion"),
            network::TOR
        );
    }

    #[test]
    fn rejects_loopback_clearnet_host() {
        let err = Relay::new("wss://127.0.0.1:4848", Some(network::CLEARNET), 0);
        assert!(err.is_err());
    }

    #[test]
    fn overlay_hosts_skip_loopback_check() {
        let relay = Relay::new("wss://127.0.0.1:4848", Some(network::TOR), 0);
        assert!(relay.is_ok());
    }

    #[test]
    fn round_trip_preserves_url_modulo_normalization() {
        let relay = Relay::new("WSS://Relay.Example.com:443", None, 100).unwrap();
        assert_eq!(relay.url, "wss://relay.example.com");
    }
}
