//! Finder (spec.md §4.5). Discovers new relay URLs from stored Nostr events
//! and configured HTTP APIs, and upserts them as validator candidates.

use crate::common::config::FinderConfig;
use crate::common::consts::{service_name, state_type};
use crate::common::error::{self, Error};
use crate::db::models::{CandidateState, Event, EventScanCursor, Relay};
use crate::db::Brotr;
use crate::service::{now_unix, Service};
use async_trait::async_trait;
use std::time::Duration;

pub struct Finder {
    config: FinderConfig,
    brotr: Brotr,
    http: reqwest::Client,
}

impl Finder {
    pub fn new(config: FinderConfig, brotr: Brotr) -> error::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(Error::ReqwestError)?;
        Ok(Self {
            config,
            brotr,
            http,
        })
    }

    async fn load_cursor(&self) -> error::Result<EventScanCursor> {
        let rows = self
            .brotr
            .get_service_state(service_name::FINDER, state_type::CURSOR, Some(EventScanCursor::KEY))
            .await?;
        match rows.first() {
            Some(row) => EventScanCursor::from_row(row),
            None => Ok(EventScanCursor::zero()),
        }
    }

    /// Pages through new events, extracting and candidating URLs, and
    /// checkpoints the cursor after every page — not only at cycle end
    /// (spec.md §4.5's "checkpoint after each page").
    async fn scan_events(&self) -> error::Result<()> {
        let mut cursor = self.load_cursor().await?;
        loop {
            let page = self
                .brotr
                .scan_events_since(&cursor, &self.config.events.kinds, self.config.events.batch_size)
                .await?;
            if page.is_empty() {
                break;
            }

            let mut discovered = Vec::new();
            for event in &page {
                discovered.extend(extract_urls(event));
            }
            self.candidate_urls(discovered).await?;

            let last = page.last().expect("checked non-empty above");
            let next = EventScanCursor {
                last_timestamp: last.created_at,
                last_id_hex: last.id_hex(),
            };
            debug_assert!(next.is_strictly_after(&cursor) || page.len() == 1);
            cursor = next;
            self.brotr
                .upsert_service_state(&[cursor.to_row(now_unix())?])
                .await?;

            if (page.len() as u32) < self.config.events.batch_size {
                break;
            }
        }
        Ok(())
    }

    /// GETs each enabled source, expecting a JSON array of relay URLs
    /// (spec.md §4.5's API scan). Per-source failures are logged, not fatal.
    async fn scan_apis(&self) -> error::Result<()> {
        for source in &self.config.api_sources {
            if !source.enabled {
                continue;
            }
            match self.fetch_api_source(source).await {
                Ok(urls) => {
                    if let Err(e) = self.candidate_urls(urls).await {
                        tracing::warn!(source = %source.name, error = %e, "failed to candidate API-sourced URLs");
                    }
                }
                Err(e) => {
                    tracing::warn!(source = %source.name, error = %e, "API scan failed");
                }
            }
            if source.delay_between_requests > 0 {
                tokio::time::sleep(Duration::from_secs(source.delay_between_requests)).await;
            }
        }
        Ok(())
    }

    async fn fetch_api_source(
        &self,
        source: &crate::common::config::ApiSourceConfig,
    ) -> error::Result<Vec<String>> {
        let response = tokio::time::timeout(
            Duration::from_secs(source.timeout),
            self.http.get(&source.url).send(),
        )
        .await
        .map_err(|_| Error::Timeout(format!("fetching {}", source.url)))??;
        let urls: Vec<String> = response.json().await?;
        Ok(urls)
    }

    /// Parses raw URL strings into `Relay`s, deduplicates against the
    /// already-known `relay` table, and upserts the rest as candidates
    /// (spec.md §4.5, §4.4's candidate shape).
    async fn candidate_urls(&self, raw_urls: Vec<String>) -> error::Result<()> {
        if raw_urls.is_empty() {
            return Ok(());
        }
        let now = now_unix();
        let mut parsed = Vec::new();
        for raw in dedup(raw_urls) {
            match Relay::new(&raw, None, now) {
                Ok(relay) => parsed.push(relay),
                Err(e) => tracing::debug!(url = raw, error = %e, "discarding invalid discovered URL"),
            }
        }
        if parsed.is_empty() {
            return Ok(());
        }

        let urls: Vec<String> = parsed.iter().map(|r| r.url.clone()).collect();
        let new_urls = self.brotr.filter_new_relay_urls(&urls).await?;
        if new_urls.is_empty() {
            return Ok(());
        }
        let new_urls: std::collections::HashSet<String> = new_urls.into_iter().collect();

        let rows = parsed
            .iter()
            .filter(|r| new_urls.contains(&r.url))
            .map(|r| CandidateState::fresh(r.network.clone()).to_row(r.url.clone(), now))
            .collect::<error::Result<Vec<_>>>()?;
        self.brotr.upsert_service_state(&rows).await?;
        Ok(())
    }
}

fn dedup(urls: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

/// URL extraction per kind (spec.md §4.5): kind 2's `content` is itself a
/// relay URL, kind 3's `content` is a JSON object keyed by relay URL, and
/// every kind's `r` tags carry one URL each in their second element.
fn extract_urls(event: &Event) -> Vec<String> {
    let mut urls = Vec::new();
    match event.kind {
        2 => urls.push(event.content.clone()),
        3 => {
            if let Ok(serde_json::Value::Object(map)) = serde_json::from_str(&event.content) {
                urls.extend(map.into_keys());
            }
        }
        _ => {}
    }
    urls.extend(event.r_tag_values().into_iter().map(str::to_string));
    urls
}

#[async_trait]
impl Service for Finder {
    fn name(&self) -> &'static str {
        "finder"
    }

    async fn run(&self) -> error::Result<()> {
        self.scan_events().await?;
        self.scan_apis().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: u16, content: &str, tags: Vec<Vec<String>>) -> Event {
        Event {
            id: [1; 32],
            pubkey: [2; 32],
            created_at: 100,
            kind,
            tags,
            content: content.to_string(),
            sig: [3; 64],
        }
    }

    #[test]
    fn extracts_url_from_kind_2_content() {
        let e = event(2, "wss://relay.example.com", vec![]);
        assert_eq!(extract_urls(&e), vec!["wss://relay.example.com"]);
    }

    #[test]
    fn extracts_urls_from_kind_3_content_keys() {
        let e = event(
            3,
            r#"{"wss://a.example.com": {"read": true}, "wss://b.example.com": {}}"#,
            vec![],
        );
        let mut urls = extract_urls(&e);
        urls.sort();
        assert_eq!(urls, vec!["wss://a.example.com", "wss://b.example.com"]);
    }

    #[test]
    fn extracts_urls_from_r_tags_regardless_of_kind() {
        let e = event(
            10002,
            "",
            vec![vec!["r".to_string(), "wss://c.example.com".to_string()]],
        );
        assert_eq!(extract_urls(&e), vec!["wss://c.example.com"]);
    }

    #[test]
    fn dedup_preserves_first_occurrence_order() {
        let urls = vec!["a".to_string(), "b".to_string(), "a".to_string()];
        assert_eq!(dedup(urls), vec!["a".to_string(), "b".to_string()]);
    }
}
