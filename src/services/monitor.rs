//! Monitor (spec.md §4.7). For every relay, every cycle, runs up to 7
//! NIP-11/NIP-66 probes, persists content-addressed results, and optionally
//! publishes NIP-66 announcement/discovery events.

use crate::common::config::MonitorConfig;
use crate::common::consts::{metadata_type, service_name, state_type, KIND_MONITOR_ANNOUNCEMENT, KIND_RELAY_DISCOVERY};
use crate::common::error;
use crate::db::facade::RelayMetadataSnapshot;
use crate::db::models::{Metadata, Relay, ServiceStateRow};
use crate::db::Brotr;
use crate::network::{parse_proxy_addr, NetworkGate};
use crate::nostr_client::RelayClient;
use crate::probes::{CheckResult, DefaultProbeProvider, ProbeProvider};
use crate::service::{now_unix, Service};
use async_trait::async_trait;
use nostr_sdk::{EventBuilder, Keys, Kind, Tag};
use std::sync::Arc;
use std::time::Duration;

const ANNOUNCEMENT_CHECKPOINT_KEY: &str = "announcement";

pub struct Monitor {
    config: MonitorConfig,
    brotr: Brotr,
    gate: NetworkGate,
    probes: Arc<dyn ProbeProvider>,
    signer: Option<Keys>,
}

impl Monitor {
    pub fn new(config: MonitorConfig, brotr: Brotr) -> error::Result<Self> {
        let gate = NetworkGate::new(&config.networks);
        let probes = Arc::new(DefaultProbeProvider::new()?);
        let signer = config
            .signing_key()
            .ok()
            .and_then(|raw| crate::nostr_client::load_keys(&raw).ok());
        if signer.is_none() {
            tracing::warn!("no signing key configured: publishing disabled, write-RTT probes skipped");
        }
        Ok(Self {
            config,
            brotr,
            gate,
            probes,
            signer,
        })
    }

    async fn announcement_due(&self, now: i64) -> error::Result<bool> {
        if !self.config.announcement.enabled || self.signer.is_none() {
            return Ok(false);
        }
        let rows = self
            .brotr
            .get_service_state(
                service_name::MONITOR,
                state_type::CHECKPOINT,
                Some(ANNOUNCEMENT_CHECKPOINT_KEY),
            )
            .await?;
        let last = rows
            .first()
            .and_then(|r| r.state_value.get("last_announced_at"))
            .and_then(|v| v.as_i64())
            .unwrap_or(0);
        Ok(now - last >= self.config.announcement.interval as i64)
    }

    async fn record_announcement(&self, now: i64) -> error::Result<()> {
        let row = ServiceStateRow::new(
            service_name::MONITOR,
            state_type::CHECKPOINT,
            ANNOUNCEMENT_CHECKPOINT_KEY,
            serde_json::json!({ "last_announced_at": now }),
            now,
        );
        self.brotr.upsert_service_state(&[row]).await?;
        Ok(())
    }

    /// Runs every probe enabled in `processing.compute` concurrently
    /// (spec.md §4.7 step 3).
    async fn check_relay(&self, relay: &Relay) -> CheckResult {
        let net_cfg = self.config.networks.get(&relay.network);
        let timeout = Duration::from_secs(net_cfg.map(|c| c.timeout).unwrap_or(15));
        let proxy = net_cfg.and_then(|c| c.proxy_url.as_deref()).and_then(parse_proxy_addr);
        let compute = &self.config.processing.compute;

        let write_key = compute.rtt.then_some(self.signer.as_ref()).flatten();

        let (nip11, rtt, ssl, geo, net, dns, http) = tokio::join!(
            maybe(compute.nip11, self.probes.nip11(&relay.url, timeout)),
            maybe(compute.rtt, self.probes.rtt(&relay.url, proxy, write_key, timeout)),
            maybe(compute.ssl, self.probes.ssl(&relay.url, timeout)),
            maybe(compute.geo, self.probes.geo(&relay.url, self.config.geohash_precision)),
            maybe(compute.net, self.probes.net(&relay.url)),
            maybe(compute.dns, self.probes.dns(&relay.url, timeout)),
            maybe(compute.http, self.probes.http(&relay.url, timeout)),
        );

        CheckResult {
            nip11,
            rtt,
            ssl,
            geo,
            net,
            dns,
            http,
        }
    }

    /// Builds `RelayMetadata` rows for every probe whose type is enabled in
    /// both `compute` and `store`, and batch-inserts them (spec.md §4.7
    /// step 4). Content-identical documents collapse to one `metadata` row.
    fn snapshots_for(&self, relay: &Relay, result: &CheckResult, generated_at: i64) -> Vec<RelayMetadataSnapshot> {
        let store = &self.config.processing.store;
        result
            .documents()
            .into_iter()
            .filter(|(kind, _)| store_allows(store, kind))
            .map(|(kind, value)| RelayMetadataSnapshot {
                relay_url: relay.url.clone(),
                generated_at,
                metadata: Metadata::new(kind, value.clone()),
            })
            .collect()
    }

    /// Publishes a kind-30166 relay discovery event summarizing `result` in
    /// NIP-66 tag form, to the relay it describes.
    async fn publish_discovery(&self, relay: &Relay, result: &CheckResult, net_cfg_timeout: Duration, proxy: Option<std::net::SocketAddr>) {
        let Some(keys) = &self.signer else { return };
        let tags = discovery_tags(relay, result, self.config.geohash_precision);
        let event = match EventBuilder::new(Kind::Custom(KIND_RELAY_DISCOVERY), "")
            .tags(tags)
            .sign_with_keys(keys)
        {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(url = %relay.url, error = %e, "failed to sign discovery event");
                return;
            }
        };
        self.publish_to(&relay.url, proxy, event, net_cfg_timeout).await;
    }

    async fn publish_announcement(&self, relay: &Relay, net_cfg_timeout: Duration, proxy: Option<std::net::SocketAddr>) {
        let Some(keys) = &self.signer else { return };
        let event = match EventBuilder::new(Kind::Custom(KIND_MONITOR_ANNOUNCEMENT), "")
            .sign_with_keys(keys)
        {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "failed to sign monitor announcement");
                return;
            }
        };
        self.publish_to(&relay.url, proxy, event, net_cfg_timeout).await;
    }

    async fn publish_to(
        &self,
        url: &str,
        proxy: Option<std::net::SocketAddr>,
        event: nostr_sdk::Event,
        timeout: Duration,
    ) {
        let signer = self.signer.clone();
        match RelayClient::connect(url, proxy, signer, timeout).await {
            Ok(client) => {
                if let Err(e) = client.publish(event).await {
                    tracing::debug!(url, error = %e, "failed to publish NIP-66 event");
                }
                client.disconnect().await;
            }
            Err(e) => tracing::debug!(url, error = %e, "could not connect to publish"),
        }
    }
}

async fn maybe<F: std::future::Future<Output = Option<serde_json::Value>>>(
    enabled: bool,
    fut: F,
) -> Option<serde_json::Value> {
    if enabled {
        fut.await
    } else {
        None
    }
}

fn store_allows(store: &crate::common::config::ProbeFlags, kind: &str) -> bool {
    match kind {
        metadata_type::NIP11_INFO => store.nip11,
        metadata_type::NIP66_RTT => store.rtt,
        metadata_type::NIP66_SSL => store.ssl,
        metadata_type::NIP66_GEO => store.geo,
        metadata_type::NIP66_NET => store.net,
        metadata_type::NIP66_DNS => store.dns,
        metadata_type::NIP66_HTTP => store.http,
        _ => false,
    }
}

/// Tag composition for kind-30166 (spec.md §4.7 "Tag composition").
fn discovery_tags(relay: &Relay, result: &CheckResult, geohash_precision: u8) -> Vec<Tag> {
    let mut tags = vec![Tag::identifier(relay.url.clone())];

    if let Some(rtt) = &result.rtt {
        for (key, field) in [
            ("rtt-open", "rtt_open_ms"),
            ("rtt-read", "rtt_read_ms"),
            ("rtt-write", "rtt_write_ms"),
        ] {
            if let Some(v) = rtt.get(field).and_then(|v| v.as_u64()) {
                tags.push(Tag::custom(nostr_sdk::TagKind::Custom(key.into()), vec![v.to_string()]));
            }
        }
    }
    if let Some(ssl) = &result.ssl {
        for (key, field) in [
            ("ssl", "status"),
            ("ssl-expires", "expires"),
            ("ssl-issuer", "issuer"),
        ] {
            if let Some(v) = ssl.get(field) {
                if let Some(s) = value_as_tag_string(v) {
                    tags.push(Tag::custom(nostr_sdk::TagKind::Custom(key.into()), vec![s]));
                }
            }
        }
    }
    if let Some(net) = &result.net {
        for (key, field) in [
            ("net-ip", "ip"),
            ("net-ipv6", "ipv6"),
            ("net-asn", "asn"),
            ("net-asn-org", "asn_org"),
        ] {
            if let Some(v) = net.get(field) {
                if let Some(s) = value_as_tag_string(v) {
                    tags.push(Tag::custom(nostr_sdk::TagKind::Custom(key.into()), vec![s]));
                }
            }
        }
    }
    if let Some(geo) = &result.geo {
        if let (Some(lat), Some(lon)) = (
            geo.get("lat").and_then(|v| v.as_f64()),
            geo.get("lon").and_then(|v| v.as_f64()),
        ) {
            let hash = crate::probes::geohash::encode(lat, lon, geohash_precision);
            tags.push(Tag::custom(nostr_sdk::TagKind::Custom("g".into()), vec![hash]));
            tags.push(Tag::custom(nostr_sdk::TagKind::Custom("geo-lat".into()), vec![lat.to_string()]));
            tags.push(Tag::custom(nostr_sdk::TagKind::Custom("geo-lon".into()), vec![lon.to_string()]));
        }
        for (key, field) in [
            ("geo-country", "country"),
            ("geo-city", "city"),
            ("geo-tz", "tz"),
        ] {
            if let Some(v) = geo.get(field) {
                if let Some(s) = value_as_tag_string(v) {
                    tags.push(Tag::custom(nostr_sdk::TagKind::Custom(key.into()), vec![s]));
                }
            }
        }
    }
    if let Some(info) = result.nip11.as_ref().and_then(|v| v.get("info")) {
        if let Some(nips) = info.get("supported_nips").and_then(|v| v.as_array()) {
            let values: Vec<String> = nips.iter().filter_map(value_as_tag_string).collect();
            if !values.is_empty() {
                tags.push(Tag::custom(nostr_sdk::TagKind::Custom("N".into()), values));
            }
        }
        for (key, field) in [("t", "topics"), ("l", "language"), ("R", "requirements"), ("T", "types")] {
            if let Some(arr) = info.get(field).and_then(|v| v.as_array()) {
                let values: Vec<String> = arr.iter().filter_map(value_as_tag_string).collect();
                if !values.is_empty() {
                    tags.push(Tag::custom(nostr_sdk::TagKind::Custom(key.into()), values));
                }
            }
        }
    }
    tags
}

fn value_as_tag_string(v: &serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Service for Monitor {
    fn name(&self) -> &'static str {
        "monitor"
    }

    async fn run(&self) -> error::Result<()> {
        let now = now_unix();
        let announce = self.announcement_due(now).await?;
        if announce {
            tracing::info!("monitor announcement due this cycle");
        }

        let relays = self.brotr.list_relays(self.config.max_relays).await?;
        let mut checked = 0u32;

        for chunk in relays.chunks(self.config.chunk_size.max(1) as usize) {
            let mut futures = Vec::with_capacity(chunk.len());
            for relay in chunk {
                if !self.config.networks.is_usable(&relay.network) {
                    continue;
                }
                futures.push(async move {
                    let _permit = self.gate.acquire(&relay.network).await;
                    let result = self.check_relay(relay).await;
                    (relay, result)
                });
            }
            let results = futures::future::join_all(futures).await;

            let mut snapshots = Vec::new();
            for (relay, result) in &results {
                snapshots.extend(self.snapshots_for(relay, result, now));

                let net_cfg = self.config.networks.get(&relay.network);
                let timeout = Duration::from_secs(net_cfg.map(|c| c.timeout).unwrap_or(15));
                let proxy = net_cfg.and_then(|c| c.proxy_url.as_deref()).and_then(parse_proxy_addr);

                if self.config.publish_discovery {
                    self.publish_discovery(relay, result, timeout, proxy).await;
                }
                if announce {
                    self.publish_announcement(relay, timeout, proxy).await;
                }
                checked += 1;
            }

            if !snapshots.is_empty() {
                self.brotr.insert_relay_metadata(&snapshots, true).await?;
            }
        }

        if announce {
            self.record_announcement(now).await?;
        }

        tracing::info!(checked, "monitor cycle complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_allows_matches_known_metadata_types() {
        let store = crate::common::config::ProbeFlags {
            rtt: true,
            ..Default::default()
        };
        assert!(store_allows(&store, metadata_type::NIP66_RTT));
        assert!(!store_allows(&store, metadata_type::NIP66_SSL));
        assert!(!store_allows(&store, "unknown"));
    }

    #[test]
    fn discovery_tags_always_carries_the_d_identifier() {
        let relay = Relay {
            url: "wss://relay.example.com".to_string(),
            network: "clearnet".to_string(),
            discovered_at: 0,
        };
        let tags = discovery_tags(&relay, &CheckResult::default(), 6);
        assert_eq!(tags.len(), 1);
    }
}
