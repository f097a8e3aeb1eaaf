//! Synchronizer (spec.md §4.8). Per relay, pulls events in time-bounded
//! windows using a persistent cursor and bulk-inserts them with their
//! event-relay junction rows.

use crate::common::config::{SyncFilterConfig, SynchronizerConfig};
use crate::common::error::{self, Error};
use crate::db::facade::EventSeenAt;
use crate::db::models::{Event, Relay, RelayCursor};
use crate::db::Brotr;
use crate::network::{parse_proxy_addr, NetworkGate};
use crate::nostr_client::RelayClient;
use crate::service::{now_unix, Service};
use async_trait::async_trait;
use nostr_sdk::{Filter, Keys, PublicKey, Timestamp};
use rand::Rng;
use std::time::Duration;

/// Bounded accumulator for one relay's in-flight page (spec.md §4.8's
/// `EventBatch`). `push` on a full batch is a programming error — the
/// caller must flush first.
struct EventBatch {
    items: Vec<EventSeenAt>,
    limit: usize,
}

impl EventBatch {
    fn new(limit: usize) -> Self {
        Self {
            items: Vec::with_capacity(limit.min(1024)),
            limit: limit.max(1),
        }
    }

    fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    fn push(&mut self, item: EventSeenAt) -> error::Result<()> {
        if self.is_full() {
            return Err(Error::Validation("append to a full EventBatch".into()));
        }
        self.items.push(item);
        Ok(())
    }

    fn take(&mut self) -> Vec<EventSeenAt> {
        std::mem::take(&mut self.items)
    }
}

pub struct Synchronizer {
    config: SynchronizerConfig,
    brotr: Brotr,
    gate: NetworkGate,
    signer: Option<Keys>,
}

impl Synchronizer {
    pub fn new(config: SynchronizerConfig, brotr: Brotr) -> Self {
        let gate = NetworkGate::new(&config.networks);
        let signer = config
            .signing_key()
            .and_then(|raw| crate::nostr_client::load_keys(&raw).ok());
        Self {
            config,
            brotr,
            gate,
            signer,
        }
    }

    async fn load_cursor(&self, relay_url: &str) -> error::Result<Option<RelayCursor>> {
        let rows = self
            .brotr
            .get_service_state(
                crate::common::consts::service_name::SYNCHRONIZER,
                crate::common::consts::state_type::CURSOR,
                Some(relay_url),
            )
            .await?;
        match rows.first() {
            Some(row) => Ok(Some(RelayCursor::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Computes the `(since, until)` window for this cycle (spec.md §4.8
    /// step 4).
    fn window_for(&self, cursor: Option<RelayCursor>, now: i64) -> (i64, i64) {
        compute_window(
            self.config.use_relay_state,
            self.config.lookback_seconds,
            self.config.default_start,
            cursor,
            now,
        )
    }

    /// Fetches and flushes one relay's window, returning the cursor to
    /// persist (spec.md §4.8 steps 5–6).
    async fn sync_relay(&self, relay: &Relay, since: i64, until: i64) -> error::Result<RelayCursor> {
        let net_cfg = self.config.networks.get(&relay.network);
        let proxy = net_cfg.and_then(|c| c.proxy_url.as_deref()).and_then(parse_proxy_addr);
        let timeout = Duration::from_secs(self.config.sync_timeouts.for_network(&relay.network));

        let client = RelayClient::connect(&relay.url, proxy, self.signer.clone(), timeout).await?;
        let filter = build_filter(&self.config.filter, since, until)?;
        let raw_events = client.fetch_events(filter, timeout).await?;
        client.disconnect().await;

        let now = now_unix();
        let mut batch = EventBatch::new(self.config.filter.limit);
        let mut max_created_at = since;
        let mut inserted = 0u64;

        for raw in raw_events {
            let event = Event::from_nostr(&raw)?;
            max_created_at = max_created_at.max(event.created_at);
            if batch.is_full() {
                inserted += self.flush_batch(relay, &mut batch).await?;
            }
            batch.push(EventSeenAt {
                event,
                relay_url: relay.url.clone(),
                seen_at: now,
            })?;
        }
        inserted += self.flush_batch(relay, &mut batch).await?;

        tracing::debug!(url = %relay.url, since, until, inserted, "relay sync window complete");
        Ok(RelayCursor {
            since: max_created_at,
            until,
        })
    }

    async fn flush_batch(&self, relay: &Relay, batch: &mut EventBatch) -> error::Result<u64> {
        let items = batch.take();
        if items.is_empty() {
            return Ok(0);
        }
        let count = items.len();
        let inserted = self.brotr.insert_event_relay(&items, true).await?;
        tracing::debug!(url = %relay.url, count, inserted, "flushed synchronizer batch");
        Ok(inserted)
    }
}

#[async_trait]
impl Service for Synchronizer {
    fn name(&self) -> &'static str {
        "synchronizer"
    }

    async fn run(&self) -> error::Result<()> {
        let relays = self
            .brotr
            .list_sync_relays(self.config.require_known_readable, None)
            .await?;
        let now = now_unix();

        let mut flush_interval_counter = 0u32;
        let mut pending_cursors = Vec::new();
        let mut synced = 0u32;
        let mut failed = 0u32;

        // One fan-out batch at a time, staggered to avoid a thundering herd
        // of simultaneous connects (spec.md §4.8 step 3).
        for relay in &relays {
            if !self.config.networks.is_usable(&relay.network) {
                continue;
            }

            let jitter_ms = rand::thread_rng().gen_range(0..=(self.config.stagger_delay * 1000.0) as u64);
            tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

            let _permit = self.gate.acquire(&relay.network).await;
            let cursor = self.load_cursor(&relay.url).await?;
            let (since, until) = self.window_for(cursor, now);

            match self.sync_relay(relay, since, until).await {
                Ok(next_cursor) => {
                    pending_cursors.push(next_cursor.to_row(relay.url.clone(), now)?);
                    synced += 1;
                }
                Err(e) => {
                    failed += 1;
                    tracing::warn!(url = %relay.url, error = %e, "relay sync failed");
                }
            }

            flush_interval_counter += 1;
            if flush_interval_counter >= self.config.cursor_flush_interval {
                self.flush_cursors(&mut pending_cursors).await?;
                flush_interval_counter = 0;
            }
        }
        self.flush_cursors(&mut pending_cursors).await?;

        tracing::info!(synced, failed, total = relays.len(), "synchronizer cycle complete");
        Ok(())
    }
}

impl Synchronizer {
    async fn flush_cursors(&self, pending: &mut Vec<crate::db::models::ServiceStateRow>) -> error::Result<()> {
        if pending.is_empty() {
            return Ok(());
        }
        self.brotr.upsert_service_state(pending).await?;
        pending.clear();
        Ok(())
    }
}

/// A stale or corrupted cursor (`cursor.until` ahead of `now`, e.g. from a
/// clock rollback) can yield `since >= until` here; that's not rejected,
/// it's passed straight through to `build_filter`, whose `since`/`until`
/// bracket then matches no event on the relay (spec.md §8: "cursor with
/// since > until yields 0 events and advances nothing"). The next cycle's
/// cursor still carries the real `until` (`now` of this cycle), so the
/// window self-corrects rather than needing a load-time check.
fn compute_window(
    use_relay_state: bool,
    lookback_seconds: i64,
    default_start: i64,
    cursor: Option<RelayCursor>,
    now: i64,
) -> (i64, i64) {
    let since = if use_relay_state {
        match cursor {
            Some(c) => (c.until - lookback_seconds).max(default_start),
            None => default_start,
        }
    } else {
        default_start
    };
    (since, now)
}

fn build_filter(config: &SyncFilterConfig, since: i64, until: i64) -> error::Result<Filter> {
    let mut filter = Filter::new()
        .since(Timestamp::from(since.max(0) as u64))
        .until(Timestamp::from(until.max(0) as u64))
        .limit(config.limit);

    if let Some(kinds) = &config.kinds {
        filter = filter.kinds(kinds.iter().map(|k| nostr_sdk::Kind::from(*k)));
    }
    if let Some(authors) = &config.authors {
        let mut keys = Vec::with_capacity(authors.len());
        for a in authors {
            keys.push(
                PublicKey::parse(a)
                    .map_err(|e| Error::Validation(format!("bad author pubkey {a}: {e}")))?,
            );
        }
        filter = filter.authors(keys);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_rejects_push_past_limit() {
        let mut batch = EventBatch::new(1);
        let item = EventSeenAt {
            event: Event {
                id: [0; 32],
                pubkey: [0; 32],
                created_at: 0,
                kind: 1,
                tags: vec![],
                content: String::new(),
                sig: [0; 64],
            },
            relay_url: "wss://relay.example.com".to_string(),
            seen_at: 0,
        };
        batch.push(item.clone()).unwrap();
        assert!(batch.is_full());
        assert!(batch.push(item).is_err());
    }

    #[test]
    fn window_defaults_to_default_start_without_a_cursor() {
        let (since, until) = compute_window(true, 3600, 1000, None, 5000);
        assert_eq!(since, 1000);
        assert_eq!(until, 5000);
    }

    #[test]
    fn window_rewinds_by_lookback_from_an_existing_cursor() {
        let cursor = RelayCursor {
            since: 900,
            until: 4000,
        };
        let (since, _) = compute_window(true, 500, 1000, Some(cursor), 5000);
        assert_eq!(since, 3500);
    }

    #[test]
    fn window_ignores_cursor_when_use_relay_state_is_false() {
        let cursor = RelayCursor {
            since: 900,
            until: 4000,
        };
        let (since, _) = compute_window(false, 500, 1000, Some(cursor), 5000);
        assert_eq!(since, 1000);
    }

    #[test]
    fn stale_cursor_past_now_yields_since_past_until() {
        // `cursor.until` ahead of `now` (clock rollback, or a cursor written
        // by a relay whose clock skewed forward) with a lookback too small
        // to pull `since` back below `now` produces since > until. Nothing
        // here rejects it; `build_filter` passes the degenerate bracket
        // straight to the relay, which matches zero events.
        let cursor = RelayCursor {
            since: 900,
            until: 9000,
        };
        let (since, until) = compute_window(true, 10, 1000, Some(cursor), 5000);
        assert_eq!(since, 8990);
        assert_eq!(until, 5000);
        assert!(since > until);
    }

    #[test]
    fn degenerate_window_still_builds_a_filter() {
        // `build_filter` doesn't special-case since > until; the relay's
        // own filter matching is what makes the bracket yield 0 events.
        let config = SyncFilterConfig {
            kinds: None,
            authors: None,
            limit: 100,
        };
        assert!(build_filter(&config, 8990, 5000).is_ok());
    }
}
