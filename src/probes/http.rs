//! Plain HTTP(S) response headers probe (spec.md §4.7's `nip66_http`).

use serde_json::json;
use std::time::{Duration, Instant};

pub async fn fetch_headers(
    client: &reqwest::Client,
    relay_url: &str,
    timeout: Duration,
) -> Option<serde_json::Value> {
    let http_url = super::to_http_url(relay_url)?;
    let t0 = Instant::now();

    let response = tokio::time::timeout(timeout, client.get(&http_url).send())
        .await
        .ok()?
        .ok()?;

    let status = response.status().as_u16();
    let server = response
        .headers()
        .get("server")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    Some(json!({
        "status": status,
        "server": server,
        "fetch_ms": elapsed_ms,
    }))
}
