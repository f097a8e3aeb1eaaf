//! NIP-66 round-trip-time measurements: open, read, and (if a signing key
//! is available) write (spec.md §4.7 tag composition: `rtt-open`,
//! `rtt-read`, `rtt-write`).

use crate::nostr_client::RelayClient;
use nostr_sdk::prelude::*;
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub async fn measure(
    relay_url: &str,
    proxy: Option<SocketAddr>,
    write_key: Option<&Keys>,
    timeout: Duration,
) -> Option<serde_json::Value> {
    let t0 = Instant::now();
    let relay = RelayClient::connect(relay_url, proxy, write_key.cloned(), timeout)
        .await
        .ok()?;
    let open_ms = t0.elapsed().as_millis() as u64;

    let t1 = Instant::now();
    let read_filter = Filter::new().limit(1);
    let read_ms = match relay.fetch_events(read_filter, timeout).await {
        Ok(_) => Some(t1.elapsed().as_millis() as u64),
        Err(_) => None,
    };

    let write_ms = if let Some(keys) = write_key {
        let t2 = Instant::now();
        let builder = EventBuilder::text_note(format!("nip66 rtt probe {}", t0.elapsed().as_nanos()));
        match builder.sign(keys).await {
            Ok(event) => match relay.publish(event).await {
                Ok(_) => Some(t2.elapsed().as_millis() as u64),
                Err(_) => None,
            },
            Err(_) => None,
        }
    } else {
        None
    };

    relay.disconnect().await;

    Some(json!({
        "rtt_open_ms": open_ms,
        "rtt_read_ms": read_ms,
        "rtt_write_ms": write_ms,
    }))
}
