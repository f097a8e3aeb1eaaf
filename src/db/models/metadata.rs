//! Content-addressed `Metadata` and its `EventRelay`/`RelayMetadata` junction
//! records (spec.md §3).

use crate::common::canonical_json::content_hash;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub id: [u8; 32],
    pub r#type: String,
    pub value: serde_json::Value,
}

impl Metadata {
    /// Computes `id` as the SHA-256 of the canonical-JSON-encoded `value`
    /// (spec.md §3's content-addressing invariant). Two documents with the
    /// same type and logically-equal value always produce the same `id`,
    /// so `insert_metadata` collapses them to a single row.
    pub fn new(r#type: impl Into<String>, value: serde_json::Value) -> Self {
        let id = content_hash(&value);
        Self {
            id,
            r#type: r#type.into(),
            value,
        }
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRelay {
    pub event_id: [u8; 32],
    pub relay_url: String,
    pub seen_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMetadata {
    pub relay_url: String,
    pub generated_at: i64,
    pub metadata_type: String,
    pub metadata_id: [u8; 32],
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_documents_collapse_to_one_id() {
        let a = Metadata::new("nip11_info", json!({"name": "relay", "version": 1}));
        let b = Metadata::new("nip11_info", json!({"version": 1, "name": "relay"}));
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn different_documents_differ() {
        let a = Metadata::new("nip11_info", json!({"name": "a"}));
        let b = Metadata::new("nip11_info", json!({"name": "b"}));
        assert_ne!(a.id, b.id);
    }
}
