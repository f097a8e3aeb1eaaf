//! DNS resolution timing (spec.md §4.7's `nip66_dns` probe).

use serde_json::json;
use std::time::{Duration, Instant};
use tokio::net::lookup_host;

pub async fn resolve_timed(relay_url: &str, timeout: Duration) -> Option<serde_json::Value> {
    let url = url::Url::parse(relay_url).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default().unwrap_or(443);

    let t0 = Instant::now();
    let addrs = tokio::time::timeout(timeout, lookup_host((host.as_str(), port)))
        .await
        .ok()?
        .ok()?;
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    let ips: Vec<String> = addrs.map(|a| a.ip().to_string()).collect();
    if ips.is_empty() {
        return None;
    }
    Some(json!({
        "resolve_ms": elapsed_ms,
        "addresses": ips,
    }))
}
