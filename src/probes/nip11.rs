//! NIP-11 relay information document fetch (spec.md §4.7).

use serde_json::json;
use std::time::{Duration, Instant};

pub async fn fetch(client: &reqwest::Client, relay_url: &str, timeout: Duration) -> Option<serde_json::Value> {
    let http_url = super::to_http_url(relay_url)?;
    let t0 = Instant::now();

    let response = tokio::time::timeout(
        timeout,
        client
            .get(&http_url)
            .header("Accept", "application/nostr+json")
            .send(),
    )
    .await
    .ok()?
    .ok()?;

    if !response.status().is_success() {
        return None;
    }
    let info: serde_json::Value = response.json().await.ok()?;
    Some(json!({
        "info": info,
        "fetch_ms": t0.elapsed().as_millis() as u64,
    }))
}
