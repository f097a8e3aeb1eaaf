//! `Event` — a Nostr protocol event (spec.md §3).
//!
//! Per spec.md §9 ("duck-typed event objects... model this as a sum type"),
//! the only way into this type is [`Event::from_nostr`], which extracts the
//! canonical fields from a library-verified `nostr_sdk::Event`. Nothing in
//! this crate ever hand-builds an `Event` and skips verification.

use crate::common::error::{self, Error};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: [u8; 32],
    pub pubkey: [u8; 32],
    pub created_at: i64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: [u8; 64],
}

impl Event {
    /// The `nostr_sdk` client verifies `id`/`sig` against `pubkey` before an
    /// event ever reaches application code (spec.md §6.3); this conversion
    /// is therefore infallible on the crypto side and only maps shapes.
    pub fn from_nostr(event: &nostr_sdk::Event) -> error::Result<Self> {
        let id: [u8; 32] = event
            .id
            .as_bytes()
            .try_into()
            .map_err(|_| Error::Validation("event id is not 32 bytes".into()))?;
        let pubkey: [u8; 32] = event.pubkey.to_bytes();
        let sig_bytes = event.sig.as_ref().to_vec();
        let sig: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| Error::Validation("event sig is not 64 bytes".into()))?;

        let tags = event
            .tags
            .iter()
            .map(|t| t.clone().to_vec())
            .collect();

        Ok(Self {
            id,
            pubkey,
            created_at: event.created_at.as_u64() as i64,
            kind: event.kind.as_u16(),
            tags,
            content: event.content.clone(),
            sig,
        })
    }

    pub fn id_hex(&self) -> String {
        hex::encode(self.id)
    }

    /// Mirrors the `tags_to_tagvalues` stored-function used for the
    /// generated `tagvalues` column (spec.md §3, §6.1), so in-process tag
    /// search and tests don't need a live database.
    pub fn tagvalues(&self) -> Vec<String> {
        tags_to_tagvalues(&self.tags)
    }

    /// URLs carried by `r` tags — used by the Finder's URL extraction
    /// (spec.md §4.5: "r tags contain URLs (second element)").
    pub fn r_tag_values(&self) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| t.first().map(String::as_str) == Some("r"))
            .filter_map(|t| t.get(1).map(String::as_str))
            .collect()
    }
}

/// For every tag whose key is a single character, take the second element
/// (spec.md §3's derived `tagvalues` column).
pub fn tags_to_tagvalues(tags: &[Vec<String>]) -> Vec<String> {
    tags.iter()
        .filter(|t| t.first().map(|k| k.chars().count() == 1).unwrap_or(false))
        .filter_map(|t| t.get(1).cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagvalues_only_takes_single_char_keys() {
        let tags = vec![
            vec!["r".to_string(), "wss://relay.example.com".to_string()],
            vec!["foo".to_string(), "bar".to_string()],
            vec!["e".to_string(), "deadbeef".to_string()],
        ];
        let values = tags_to_tagvalues(&tags);
        assert_eq!(values, vec!["wss://relay.example.com", "deadbeef"]);
    }

    #[test]
    fn r_tag_values_extracts_urls() {
        let tags = vec![
            vec!["r".to_string(), "wss://a.example.com".to_string()],
            vec!["r".to_string(), "wss://b.example.com".to_string()],
        ];
        let event = Event {
            id: [0; 32],
            pubkey: [0; 32],
            created_at: 0,
            kind: 10002,
            tags,
            content: String::new(),
            sig: [0; 64],
        };
        assert_eq!(
            event.r_tag_values(),
            vec!["wss://a.example.com", "wss://b.example.com"]
        );
    }

    #[test]
    fn tags_without_second_element_are_skipped() {
        let tags = vec![vec!["r".to_string()]];
        assert!(tags_to_tagvalues(&tags).is_empty());
    }
}
