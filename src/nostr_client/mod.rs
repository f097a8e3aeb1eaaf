//! The Nostr wire-protocol surface this crate consumes (spec.md §6.3),
//! narrowed from the teacher's `NostrClient` (`src/nostr/client.rs`) down to
//! exactly what Validator/Monitor/Synchronizer need: connect with an
//! optional SOCKS5 proxy, fetch, publish, and key loading. NIP-42 challenge
//! response is handled inside `nostr_sdk`'s relay pool once a signer is set.

use crate::common::error::{self, Error};
use nostr_sdk::prelude::*;
use std::net::SocketAddr;
use std::time::Duration;

/// Parses a signing key from either hex-64 or bech32 `nsec1…` (spec.md §6.3,
/// §6.4). `Keys::parse` already accepts both forms.
pub fn load_keys(raw: &str) -> error::Result<Keys> {
    Keys::parse(raw).map_err(Error::NostrSdkKeyError)
}

/// A connection to exactly one relay, used for both the Validator's
/// handshake probe and the Synchronizer's event fetch.
pub struct RelayClient {
    client: Client,
    url: String,
}

impl RelayClient {
    /// Opens a connection, routing through `proxy` when the network is an
    /// overlay (spec.md §4.6 step 3, §4.8 step 5). `signer` is required for
    /// publish and NIP-42 auth; Validator's probe can omit it.
    pub async fn connect(
        url: &str,
        proxy: Option<SocketAddr>,
        signer: Option<Keys>,
        timeout: Duration,
    ) -> error::Result<Self> {
        let keys = signer.unwrap_or_else(Keys::generate);
        let mut opts = Options::new();
        if let Some(addr) = proxy {
            opts = opts.proxy(addr);
        }
        let client = Client::builder().signer(keys).opts(opts).build();
        client.add_relay(url).await?;
        client.connect().await;

        tokio::time::timeout(timeout, Self::wait_connected(&client, url))
            .await
            .map_err(|_| Error::Timeout(format!("connecting to {url}")))??;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    async fn wait_connected(client: &Client, url: &str) -> error::Result<()> {
        loop {
            if let Ok(relay) = client.relay(url).await {
                if relay.is_connected() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// `true` iff the relay completed the WebSocket handshake and is ready
    /// for protocol traffic (spec.md §4.6 step 4's probe success condition).
    pub async fn is_connected(&self) -> bool {
        self.client
            .relay(&self.url)
            .await
            .map(|r| r.is_connected())
            .unwrap_or(false)
    }

    pub async fn fetch_events(
        &self,
        filter: Filter,
        timeout: Duration,
    ) -> error::Result<Vec<nostr_sdk::Event>> {
        let events = self.client.fetch_events(vec![filter], Some(timeout)).await?;
        Ok(events.into_iter().collect())
    }

    pub async fn publish(&self, event: nostr_sdk::Event) -> error::Result<EventId> {
        let output = self.client.send_event(event).await?;
        Ok(output.id().to_owned())
    }

    pub async fn disconnect(self) {
        self.client.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hex_private_key() {
        let keys = Keys::generate();
        let hex = keys.secret_key().to_secret_hex();
        assert!(load_keys(&hex).is_ok());
    }

    #[test]
    fn accepts_bech32_nsec() {
        let keys = Keys::generate();
        let nsec = keys.secret_key().to_bech32().unwrap();
        assert!(load_keys(&nsec).is_ok());
    }

    #[test]
    fn rejects_garbage_key() {
        assert!(load_keys("not-a-key").is_err());
    }
}
