//! `ServiceState` — the generic per-service KV table (spec.md §3) plus the
//! typed accessors spec.md §9 asks for: every service owns a concrete view
//! over its own rows; nothing outside this module should construct a raw
//! `state_value` by hand.

use crate::common::consts::state_type;
use crate::common::error::{self, Error};
use serde::{Deserialize, Serialize};

/// A raw row, as stored and fetched by the Brotr facade. `state_value` is
/// opaque JSON at this layer — callers parse it with the typed accessors
/// below (`CandidateState`, `EventScanCursor`, `RelayCursor`).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceStateRow {
    pub service_name: String,
    pub state_type: String,
    pub state_key: String,
    pub state_value: serde_json::Value,
    pub updated_at: i64,
}

impl ServiceStateRow {
    pub fn new(
        service_name: impl Into<String>,
        state_type: impl Into<String>,
        state_key: impl Into<String>,
        state_value: serde_json::Value,
        updated_at: i64,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            state_type: state_type.into(),
            state_key: state_key.into(),
            state_value,
            updated_at,
        }
    }
}

/// The Validator-candidate shape written by Seeder and Finder, consumed and
/// deleted by the Validator (spec.md §3's "only cross-service contract").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateState {
    pub network: String,
    pub failed_attempts: u32,
}

impl CandidateState {
    pub fn fresh(network: impl Into<String>) -> Self {
        Self {
            network: network.into(),
            failed_attempts: 0,
        }
    }

    pub fn to_row(&self, relay_url: impl Into<String>, now: i64) -> error::Result<ServiceStateRow> {
        Ok(ServiceStateRow::new(
            crate::common::consts::service_name::VALIDATOR,
            state_type::CANDIDATE,
            relay_url,
            serde_json::to_value(self)?,
            now,
        ))
    }

    pub fn from_row(row: &ServiceStateRow) -> error::Result<Self> {
        serde_json::from_value(row.state_value.clone())
            .map_err(|e| Error::Validation(format!("malformed candidate state: {e}")))
    }
}

/// Finder's `(created_at, id)` event-scan cursor (spec.md §4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventScanCursor {
    pub last_timestamp: i64,
    pub last_id_hex: String,
}

impl EventScanCursor {
    pub const KEY: &'static str = "events";

    pub fn zero() -> Self {
        Self {
            last_timestamp: 0,
            last_id_hex: "0".repeat(64),
        }
    }

    /// Lexicographic ordering on `(created_at, id)` (spec.md §4.5, §8 property 6).
    pub fn is_strictly_after(&self, other: &EventScanCursor) -> bool {
        (self.last_timestamp, &self.last_id_hex) > (other.last_timestamp, &other.last_id_hex)
    }

    pub fn to_row(&self, now: i64) -> error::Result<ServiceStateRow> {
        Ok(ServiceStateRow::new(
            crate::common::consts::service_name::FINDER,
            state_type::CURSOR,
            Self::KEY,
            serde_json::to_value(self)?,
            now,
        ))
    }

    pub fn from_row(row: &ServiceStateRow) -> error::Result<Self> {
        serde_json::from_value(row.state_value.clone())
            .map_err(|e| Error::Validation(format!("malformed event-scan cursor: {e}")))
    }
}

/// Synchronizer's per-relay `(since, until)` window cursor (spec.md §4.8).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayCursor {
    pub since: i64,
    pub until: i64,
}

impl RelayCursor {
    pub fn to_row(&self, relay_url: impl Into<String>, now: i64) -> error::Result<ServiceStateRow> {
        Ok(ServiceStateRow::new(
            crate::common::consts::service_name::SYNCHRONIZER,
            state_type::CURSOR,
            relay_url,
            serde_json::to_value(self)?,
            now,
        ))
    }

    pub fn from_row(row: &ServiceStateRow) -> error::Result<Self> {
        serde_json::from_value(row.state_value.clone())
            .map_err(|e| Error::Validation(format!("malformed relay cursor: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_ordering_handles_timestamp_ties() {
        let a = EventScanCursor {
            last_timestamp: 100,
            last_id_hex: "a".to_string(),
        };
        let b = EventScanCursor {
            last_timestamp: 100,
            last_id_hex: "b".to_string(),
        };
        assert!(b.is_strictly_after(&a));
        assert!(!a.is_strictly_after(&b));
    }

    #[test]
    fn cursor_ordering_respects_timestamp_first() {
        let a = EventScanCursor {
            last_timestamp: 99,
            last_id_hex: "zzzz".to_string(),
        };
        let b = EventScanCursor {
            last_timestamp: 100,
            last_id_hex: "0000".to_string(),
        };
        assert!(b.is_strictly_after(&a));
    }

    #[test]
    fn candidate_round_trips_through_row() {
        let state = CandidateState::fresh("clearnet");
        let row = state.to_row("wss://relay.example.com", 0).unwrap();
        let back = CandidateState::from_row(&row).unwrap();
        assert_eq!(state, back);
    }
}
