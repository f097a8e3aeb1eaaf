//! Brotr — the database facade (spec.md §4.2). Every mutation is a call to
//! an array-parameter stored function (spec.md §6.2); this module's job is
//! just shaping Rust records into those arrays, auto-chunking by
//! `batch.max_size`, and turning the returned row count back into `u64`.
//!
//! All stored functions use `ON CONFLICT DO NOTHING` (service_state upsert
//! aside), so every call here is idempotent: replaying it yields `0` net
//! inserts (spec.md §8 property 7).

use crate::common::error::{self, Error};
use crate::db::models::{Event, EventRelay, Metadata, Relay, RelayMetadata, ServiceStateRow};
use crate::db::pool::Pool;
use sea_orm::sea_query::ArrayType;
use sea_orm::{DbBackend, QueryResult, Statement, Value};

/// A relay/event pair to be upserted atomically through the
/// `event_relay_insert_cascade` stored function (spec.md §4.2).
#[derive(Debug, Clone)]
pub struct EventSeenAt {
    pub event: Event,
    pub relay_url: String,
    pub seen_at: i64,
}

/// A relay/metadata pair to be upserted atomically through the
/// `relay_metadata_insert_cascade` stored function.
#[derive(Debug, Clone)]
pub struct RelayMetadataSnapshot {
    pub relay_url: String,
    pub generated_at: i64,
    pub metadata: Metadata,
}

#[derive(Clone)]
pub struct Brotr {
    pool: Pool,
}

impl Brotr {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    // -----------------------------------------------------------------
    // relay
    // -----------------------------------------------------------------

    pub async fn insert_relay(&self, relays: &[Relay]) -> error::Result<u64> {
        let mut total = 0;
        for chunk in relays.chunks(self.pool.batch_max_size().max(1)) {
            if chunk.is_empty() {
                continue;
            }
            let urls = arr_string(chunk.iter().map(|r| r.url.clone()).collect());
            let networks = arr_string(chunk.iter().map(|r| r.network.clone()).collect());
            let discovered = arr_bigint(chunk.iter().map(|r| r.discovered_at).collect());
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT relay_insert($1, $2, $3) AS inserted",
                [urls, networks, discovered],
            );
            total += self.fetch_inserted(stmt).await?;
        }
        Ok(total)
    }

    // -----------------------------------------------------------------
    // event
    // -----------------------------------------------------------------

    pub async fn insert_event(&self, events: &[Event]) -> error::Result<u64> {
        let mut total = 0;
        for chunk in events.chunks(self.pool.batch_max_size().max(1)) {
            if chunk.is_empty() {
                continue;
            }
            let ids = arr_bytes(chunk.iter().map(|e| e.id.to_vec()).collect());
            let pubkeys = arr_bytes(chunk.iter().map(|e| e.pubkey.to_vec()).collect());
            let created_ats = arr_bigint(chunk.iter().map(|e| e.created_at).collect());
            let kinds = arr_int(chunk.iter().map(|e| e.kind as i32).collect());
            let tags = arr_json(
                chunk
                    .iter()
                    .map(|e| serde_json::to_value(&e.tags).unwrap_or(serde_json::Value::Null))
                    .collect(),
            );
            let contents = arr_string(chunk.iter().map(|e| e.content.clone()).collect());
            let sigs = arr_bytes(chunk.iter().map(|e| e.sig.to_vec()).collect());

            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT event_insert($1, $2, $3, $4, $5, $6, $7) AS inserted",
                [ids, pubkeys, created_ats, kinds, tags, contents, sigs],
            );
            total += self.fetch_inserted(stmt).await?;
        }
        Ok(total)
    }

    // -----------------------------------------------------------------
    // metadata
    // -----------------------------------------------------------------

    pub async fn insert_metadata(&self, records: &[Metadata]) -> error::Result<u64> {
        let mut total = 0;
        for chunk in records.chunks(self.pool.batch_max_size().max(1)) {
            if chunk.is_empty() {
                continue;
            }
            let ids = arr_bytes(chunk.iter().map(|m| m.id.to_vec()).collect());
            let types = arr_string(chunk.iter().map(|m| m.r#type.clone()).collect());
            let values = arr_json(chunk.iter().map(|m| m.value.clone()).collect());
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT metadata_insert($1, $2, $3) AS inserted",
                [ids, types, values],
            );
            total += self.fetch_inserted(stmt).await?;
        }
        Ok(total)
    }

    // -----------------------------------------------------------------
    // event_relay junction
    // -----------------------------------------------------------------

    /// `cascade = true` atomically upserts relay + event + junction via a
    /// single stored function call (spec.md §4.2); `cascade = false` only
    /// inserts the junction row, assuming the relay and event already
    /// exist.
    pub async fn insert_event_relay(
        &self,
        records: &[EventSeenAt],
        cascade: bool,
    ) -> error::Result<u64> {
        let mut total = 0;
        for chunk in records.chunks(self.pool.batch_max_size().max(1)) {
            if chunk.is_empty() {
                continue;
            }
            total += if cascade {
                self.insert_event_relay_cascade_chunk(chunk).await?
            } else {
                self.insert_event_relay_plain_chunk(chunk).await?
            };
        }
        Ok(total)
    }

    async fn insert_event_relay_cascade_chunk(&self, chunk: &[EventSeenAt]) -> error::Result<u64> {
        let ids = arr_bytes(chunk.iter().map(|r| r.event.id.to_vec()).collect());
        let pubkeys = arr_bytes(chunk.iter().map(|r| r.event.pubkey.to_vec()).collect());
        let created_ats = arr_bigint(chunk.iter().map(|r| r.event.created_at).collect());
        let kinds = arr_int(chunk.iter().map(|r| r.event.kind as i32).collect());
        let tags = arr_json(
            chunk
                .iter()
                .map(|r| serde_json::to_value(&r.event.tags).unwrap_or(serde_json::Value::Null))
                .collect(),
        );
        let contents = arr_string(chunk.iter().map(|r| r.event.content.clone()).collect());
        let sigs = arr_bytes(chunk.iter().map(|r| r.event.sig.to_vec()).collect());
        let relay_urls = arr_string(chunk.iter().map(|r| r.relay_url.clone()).collect());
        let seen_ats = arr_bigint(chunk.iter().map(|r| r.seen_at).collect());
        // The relay's network/discovered_at are not known at this call
        // site (the relay already exists by the time Synchronizer runs),
        // so the cascade function upserts the relay row only if absent,
        // leaving network/discovered_at untouched on conflict.
        let networks = arr_string(chunk.iter().map(|_| String::new()).collect());
        let discovered_ats = arr_bigint(chunk.iter().map(|r| r.seen_at).collect());

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT event_relay_insert_cascade($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) AS inserted",
            [
                ids,
                pubkeys,
                created_ats,
                kinds,
                tags,
                contents,
                sigs,
                relay_urls,
                seen_ats,
                networks,
                discovered_ats,
            ],
        );
        self.fetch_inserted(stmt).await
    }

    async fn insert_event_relay_plain_chunk(&self, chunk: &[EventSeenAt]) -> error::Result<u64> {
        let ids = arr_bytes(chunk.iter().map(|r| r.event.id.to_vec()).collect());
        let relay_urls = arr_string(chunk.iter().map(|r| r.relay_url.clone()).collect());
        let seen_ats = arr_bigint(chunk.iter().map(|r| r.seen_at).collect());
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT event_relay_insert($1, $2, $3) AS inserted",
            [ids, relay_urls, seen_ats],
        );
        self.fetch_inserted(stmt).await
    }

    // -----------------------------------------------------------------
    // relay_metadata junction
    // -----------------------------------------------------------------

    pub async fn insert_relay_metadata(
        &self,
        records: &[RelayMetadataSnapshot],
        cascade: bool,
    ) -> error::Result<u64> {
        let mut total = 0;
        for chunk in records.chunks(self.pool.batch_max_size().max(1)) {
            if chunk.is_empty() {
                continue;
            }
            total += if cascade {
                self.insert_relay_metadata_cascade_chunk(chunk).await?
            } else {
                self.insert_relay_metadata_plain_chunk(chunk).await?
            };
        }
        Ok(total)
    }

    async fn insert_relay_metadata_cascade_chunk(
        &self,
        chunk: &[RelayMetadataSnapshot],
    ) -> error::Result<u64> {
        let relay_urls = arr_string(chunk.iter().map(|r| r.relay_url.clone()).collect());
        let generated_ats = arr_bigint(chunk.iter().map(|r| r.generated_at).collect());
        let metadata_ids = arr_bytes(chunk.iter().map(|r| r.metadata.id.to_vec()).collect());
        let metadata_types = arr_string(chunk.iter().map(|r| r.metadata.r#type.clone()).collect());
        let metadata_values = arr_json(chunk.iter().map(|r| r.metadata.value.clone()).collect());
        let networks = arr_string(chunk.iter().map(|_| String::new()).collect());
        let discovered_ats = arr_bigint(chunk.iter().map(|r| r.generated_at).collect());

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT relay_metadata_insert_cascade($1, $2, $3, $4, $5, $6, $7) AS inserted",
            [
                relay_urls,
                generated_ats,
                metadata_types,
                metadata_ids,
                metadata_values,
                networks,
                discovered_ats,
            ],
        );
        self.fetch_inserted(stmt).await
    }

    async fn insert_relay_metadata_plain_chunk(
        &self,
        chunk: &[RelayMetadataSnapshot],
    ) -> error::Result<u64> {
        let relay_urls = arr_string(chunk.iter().map(|r| r.relay_url.clone()).collect());
        let generated_ats = arr_bigint(chunk.iter().map(|r| r.generated_at).collect());
        let metadata_types = arr_string(chunk.iter().map(|r| r.metadata.r#type.clone()).collect());
        let metadata_ids = arr_bytes(chunk.iter().map(|r| r.metadata.id.to_vec()).collect());
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT relay_metadata_insert($1, $2, $3, $4) AS inserted",
            [relay_urls, generated_ats, metadata_types, metadata_ids],
        );
        self.fetch_inserted(stmt).await
    }

    // -----------------------------------------------------------------
    // service_state
    // -----------------------------------------------------------------

    pub async fn upsert_service_state(&self, records: &[ServiceStateRow]) -> error::Result<u64> {
        let mut total = 0;
        for chunk in records.chunks(self.pool.batch_max_size().max(1)) {
            if chunk.is_empty() {
                continue;
            }
            let services = arr_string(chunk.iter().map(|r| r.service_name.clone()).collect());
            let types = arr_string(chunk.iter().map(|r| r.state_type.clone()).collect());
            let keys = arr_string(chunk.iter().map(|r| r.state_key.clone()).collect());
            let values = arr_json(chunk.iter().map(|r| r.state_value.clone()).collect());
            let updated_ats = arr_bigint(chunk.iter().map(|r| r.updated_at).collect());
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT service_state_upsert($1, $2, $3, $4, $5) AS inserted",
                [services, types, keys, values, updated_ats],
            );
            total += self.fetch_inserted(stmt).await?;
        }
        Ok(total)
    }

    /// `key = None` returns all rows for `(service, type)`, ordered by
    /// `updated_at` ascending (spec.md §4.2) — candidate-chunking and
    /// cursor reads both rely on this ordering.
    pub async fn get_service_state(
        &self,
        service: &str,
        state_type: &str,
        key: Option<&str>,
    ) -> error::Result<Vec<ServiceStateRow>> {
        let stmt = match key {
            Some(k) => Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT service_name, state_type, state_key, state_value, updated_at \
                 FROM service_state_get($1, $2, $3) ORDER BY updated_at ASC",
                [service.into(), state_type.into(), k.into()],
            ),
            None => Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT service_name, state_type, state_key, state_value, updated_at \
                 FROM service_state_get($1, $2, NULL) ORDER BY updated_at ASC",
                [service.into(), state_type.into()],
            ),
        };
        let rows = self.pool.fetch_all(stmt).await?;
        rows.iter().map(row_to_service_state).collect()
    }

    pub async fn delete_service_state(
        &self,
        keys: &[(String, String, String)],
    ) -> error::Result<u64> {
        let mut total = 0;
        for chunk in keys.chunks(self.pool.batch_max_size().max(1)) {
            if chunk.is_empty() {
                continue;
            }
            let services = arr_string(chunk.iter().map(|(s, _, _)| s.clone()).collect());
            let types = arr_string(chunk.iter().map(|(_, t, _)| t.clone()).collect());
            let state_keys = arr_string(chunk.iter().map(|(_, _, k)| k.clone()).collect());
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT service_state_delete($1, $2, $3) AS inserted",
                [services, types, state_keys],
            );
            total += self.fetch_inserted(stmt).await?;
        }
        Ok(total)
    }

    // -----------------------------------------------------------------
    // reads
    // -----------------------------------------------------------------

    /// Finder's event-scan page (spec.md §4.5): events strictly after
    /// `cursor` in `(created_at, id)` lex order, of a configured kind or
    /// carrying a single-letter `r` tag, oldest first.
    pub async fn scan_events_since(
        &self,
        cursor: &crate::db::models::EventScanCursor,
        kinds: &[u16],
        limit: u32,
    ) -> error::Result<Vec<Event>> {
        let last_id = hex::decode(&cursor.last_id_hex)
            .map_err(|e| Error::Validation(format!("malformed cursor id: {e}")))?;
        let kinds_i32: Vec<i32> = kinds.iter().map(|k| *k as i32).collect();
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT id, pubkey, created_at, kind, tags, content, sig FROM event \
             WHERE (created_at > $1 OR (created_at = $1 AND id > $2)) \
               AND (kind = ANY($3) OR EXISTS ( \
                    SELECT 1 FROM jsonb_array_elements(tags) t WHERE t->>0 = 'r' \
               )) \
             ORDER BY created_at ASC, id ASC LIMIT $4",
            [
                Value::from(cursor.last_timestamp),
                Value::from(last_id),
                arr_int(kinds_i32),
                Value::from(limit as i64),
            ],
        );
        let rows = self.pool.fetch_all(stmt).await?;
        rows.iter().map(row_to_event).collect()
    }

    /// Given candidate URLs, returns the subset not already present in
    /// `relay` (spec.md §4.5's `filter_new_relay_urls`).
    pub async fn filter_new_relay_urls(&self, urls: &[String]) -> error::Result<Vec<String>> {
        if urls.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT u AS url FROM unnest($1::TEXT[]) AS u \
             WHERE u NOT IN (SELECT url FROM relay)",
            [arr_string(urls.to_vec())],
        );
        let rows = self.pool.fetch_all(stmt).await?;
        rows.iter()
            .map(|row| {
                row.try_get("", "url")
                    .map_err(|e| Error::CustomError(e.to_string()))
            })
            .collect()
    }

    /// All relay rows, optionally capped (spec.md §4.7 step 2, §4.8 step 1).
    pub async fn list_relays(&self, limit: Option<u32>) -> error::Result<Vec<Relay>> {
        let stmt = match limit {
            Some(n) => Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT url, network, discovered_at FROM relay ORDER BY discovered_at ASC LIMIT $1",
                [Value::from(n as i64)],
            ),
            None => Statement::from_string(
                DbBackend::Postgres,
                "SELECT url, network, discovered_at FROM relay ORDER BY discovered_at ASC",
            ),
        };
        let rows = self.pool.fetch_all(stmt).await?;
        rows.iter().map(row_to_relay).collect()
    }

    /// Synchronizer's relay set (spec.md §4.8 step 1). When
    /// `require_known_readable`, only relays carrying a `nip66_rtt`
    /// snapshot in the latest-metadata materialized view are returned —
    /// i.e. ones the Monitor has already confirmed answer the protocol.
    pub async fn list_sync_relays(
        &self,
        require_known_readable: bool,
        limit: Option<u32>,
    ) -> error::Result<Vec<Relay>> {
        let base = if require_known_readable {
            "SELECT r.url, r.network, r.discovered_at FROM relay r \
             JOIN relay_latest_metadata m ON m.relay_url = r.url AND m.metadata_type = 'nip66_rtt' \
             ORDER BY r.discovered_at ASC"
        } else {
            "SELECT url, network, discovered_at FROM relay ORDER BY discovered_at ASC"
        };
        let stmt = match limit {
            Some(n) => Statement::from_sql_and_values(
                DbBackend::Postgres,
                format!("{base} LIMIT $1"),
                [Value::from(n as i64)],
            ),
            None => Statement::from_string(DbBackend::Postgres, base),
        };
        let rows = self.pool.fetch_all(stmt).await?;
        rows.iter().map(row_to_relay).collect()
    }

    /// Candidate rows for the Validator, cheapest-to-succeed first
    /// (spec.md §4.6 step 2: `ORDER BY failed_attempts ASC, updated_at ASC`).
    pub async fn next_candidates(&self, limit: u32) -> error::Result<Vec<ServiceStateRow>> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "SELECT service_name, state_type, state_key, state_value, updated_at \
             FROM service_state \
             WHERE service_name = $1 AND state_type = $2 \
             ORDER BY (state_value->>'failed_attempts')::INT ASC, updated_at ASC \
             LIMIT $3",
            [
                crate::common::consts::service_name::VALIDATOR.into(),
                crate::common::consts::state_type::CANDIDATE.into(),
                Value::from(limit as i64),
            ],
        );
        let rows = self.pool.fetch_all(stmt).await?;
        rows.iter().map(row_to_service_state).collect()
    }

    /// Deletes candidate rows whose URL already exists in `relay` (stale —
    /// spec.md §4.6 step 1).
    pub async fn delete_stale_candidates(&self) -> error::Result<u64> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!(
                "DELETE FROM service_state \
                 WHERE service_name = '{}' AND state_type = '{}' \
                   AND state_key IN (SELECT url FROM relay)",
                crate::common::consts::service_name::VALIDATOR,
                crate::common::consts::state_type::CANDIDATE,
            ),
        );
        self.pool.execute(stmt).await
    }

    /// Deletes candidate rows that exhausted `max_failures` (spec.md §4.6
    /// step 1).
    pub async fn delete_exhausted_candidates(&self, max_failures: u32) -> error::Result<u64> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!(
                "DELETE FROM service_state \
                 WHERE service_name = '{}' AND state_type = '{}' \
                   AND (state_value->>'failed_attempts')::INT >= {}",
                crate::common::consts::service_name::VALIDATOR,
                crate::common::consts::state_type::CANDIDATE,
                max_failures,
            ),
        );
        self.pool.execute(stmt).await
    }

    // -----------------------------------------------------------------
    // maintenance
    // -----------------------------------------------------------------

    /// Loop-deletes orphaned `event` rows (no `event_relay` link) in
    /// batches until a batch removes fewer than `batch_size` rows
    /// (spec.md §4.2).
    pub async fn delete_orphan_event(&self, batch_size: u32) -> error::Result<u64> {
        self.delete_orphans_loop("orphan_event_delete", batch_size)
            .await
    }

    pub async fn delete_orphan_metadata(&self, batch_size: u32) -> error::Result<u64> {
        self.delete_orphans_loop("orphan_metadata_delete", batch_size)
            .await
    }

    async fn delete_orphans_loop(&self, function: &str, batch_size: u32) -> error::Result<u64> {
        let mut total = 0u64;
        loop {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                &format!("SELECT {function}($1) AS inserted"),
                [Value::from(batch_size as i32)],
            );
            let deleted = self.fetch_inserted(stmt).await?;
            total += deleted;
            if deleted < batch_size as u64 {
                break;
            }
        }
        Ok(total)
    }

    pub async fn refresh_materialized_view(&self, name: &str) -> error::Result<()> {
        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(Error::Validation(format!(
                "unsafe materialized view name: {name}"
            )));
        }
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            format!("REFRESH MATERIALIZED VIEW CONCURRENTLY {name}"),
        );
        self.pool.execute(stmt).await?;
        Ok(())
    }

    // -----------------------------------------------------------------
    // helpers
    // -----------------------------------------------------------------

    async fn fetch_inserted(&self, stmt: Statement) -> error::Result<u64> {
        let row = self
            .pool
            .fetch_one(stmt)
            .await?
            .ok_or_else(|| Error::CustomError("stored function returned no row".into()))?;
        let inserted: i64 = row
            .try_get("", "inserted")
            .map_err(|e| Error::CustomError(format!("reading inserted count: {e}")))?;
        Ok(inserted.max(0) as u64)
    }
}

fn row_to_event(row: &QueryResult) -> error::Result<Event> {
    let id_bytes: Vec<u8> = row
        .try_get("", "id")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let pubkey_bytes: Vec<u8> = row
        .try_get("", "pubkey")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let sig_bytes: Vec<u8> = row
        .try_get("", "sig")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let created_at: i64 = row
        .try_get("", "created_at")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let kind: i32 = row
        .try_get("", "kind")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let tags_json: serde_json::Value = row
        .try_get("", "tags")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let content: String = row
        .try_get("", "content")
        .map_err(|e| Error::CustomError(e.to_string()))?;

    let id: [u8; 32] = id_bytes
        .try_into()
        .map_err(|_| Error::Validation("event id column is not 32 bytes".into()))?;
    let pubkey: [u8; 32] = pubkey_bytes
        .try_into()
        .map_err(|_| Error::Validation("event pubkey column is not 32 bytes".into()))?;
    let sig: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| Error::Validation("event sig column is not 64 bytes".into()))?;
    let tags: Vec<Vec<String>> = serde_json::from_value(tags_json)
        .map_err(|e| Error::Validation(format!("malformed tags column: {e}")))?;

    Ok(Event {
        id,
        pubkey,
        created_at,
        kind: kind as u16,
        tags,
        content,
        sig,
    })
}

fn row_to_relay(row: &QueryResult) -> error::Result<Relay> {
    let url: String = row
        .try_get("", "url")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let network: String = row
        .try_get("", "network")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let discovered_at: i64 = row
        .try_get("", "discovered_at")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    Ok(Relay {
        url,
        network,
        discovered_at,
    })
}

fn row_to_service_state(row: &QueryResult) -> error::Result<ServiceStateRow> {
    let service_name: String = row
        .try_get("", "service_name")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let state_type: String = row
        .try_get("", "state_type")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let state_key: String = row
        .try_get("", "state_key")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let state_value: serde_json::Value = row
        .try_get("", "state_value")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    let updated_at: i64 = row
        .try_get("", "updated_at")
        .map_err(|e| Error::CustomError(e.to_string()))?;
    Ok(ServiceStateRow {
        service_name,
        state_type,
        state_key,
        state_value,
        updated_at,
    })
}

fn arr_string(items: Vec<String>) -> Value {
    Value::Array(
        ArrayType::String,
        Some(Box::new(items.into_iter().map(Value::from).collect())),
    )
}

fn arr_bigint(items: Vec<i64>) -> Value {
    Value::Array(
        ArrayType::BigInt,
        Some(Box::new(items.into_iter().map(Value::from).collect())),
    )
}

fn arr_int(items: Vec<i32>) -> Value {
    Value::Array(
        ArrayType::Int,
        Some(Box::new(items.into_iter().map(Value::from).collect())),
    )
}

fn arr_bytes(items: Vec<Vec<u8>>) -> Value {
    Value::Array(
        ArrayType::Bytes,
        Some(Box::new(items.into_iter().map(Value::from).collect())),
    )
}

fn arr_json(items: Vec<serde_json::Value>) -> Value {
    Value::Array(
        ArrayType::Json,
        Some(Box::new(items.into_iter().map(Value::from).collect())),
    )
}

// Silence "unused" for the type alias import in non-test builds where only
// some helper functions above are exercised by a given feature set.
#[allow(unused_imports)]
use EventRelay as _EventRelayUnused;
#[allow(unused_imports)]
use RelayMetadata as _RelayMetadataUnused;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arr_string_builds_postgres_array_value() {
        let value = arr_string(vec!["a".to_string(), "b".to_string()]);
        match value {
            Value::Array(ArrayType::String, Some(items)) => assert_eq!(items.len(), 2),
            _ => panic!("expected a string array value"),
        }
    }
}
