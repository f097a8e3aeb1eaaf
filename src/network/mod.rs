//! Per-network bounded concurrency (spec.md §4.6–§4.8, §5 "Shared resources").
//!
//! One semaphore per `{clearnet, tor, i2p, loki}`, sized by `max_tasks`.
//! Acquiring a permit is the only throttle a fan-out loop needs; everything
//! else (DB health checks, HTTP clients) backs up naturally behind it.

use crate::common::config::NetworksConfig;
use crate::common::consts::network;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

pub struct NetworkGate {
    semaphores: HashMap<&'static str, Arc<Semaphore>>,
}

impl NetworkGate {
    pub fn new(networks: &NetworksConfig) -> Self {
        let mut semaphores = HashMap::new();
        for net in network::ALL {
            let max_tasks = networks.get(net).map(|c| c.max_tasks).unwrap_or(1).max(1);
            semaphores.insert(net, Arc::new(Semaphore::new(max_tasks)));
        }
        Self { semaphores }
    }

    /// Blocks until a slot for `net` is free. Panics only if `net` isn't one
    /// of the four known classes, which would itself be a caller bug (every
    /// relay's network is validated at `Relay::new` time).
    pub async fn acquire(&self, net: &str) -> SemaphorePermit<'_> {
        self.semaphores
            .get(net)
            .expect("unknown network class")
            .acquire()
            .await
            .expect("semaphore never closed")
    }
}

/// Parses a `socks5://host:port` proxy URL into the `SocketAddr` the Nostr
/// client library's proxy option expects (spec.md §6.3 "SOCKS5 option").
pub fn parse_proxy_addr(proxy_url: &str) -> Option<SocketAddr> {
    let stripped = proxy_url
        .strip_prefix("socks5://")
        .or_else(|| proxy_url.strip_prefix("socks5h://"))
        .unwrap_or(proxy_url);
    stripped.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_socks5_scheme() {
        assert_eq!(
            parse_proxy_addr("socks5://127.0.0.1:9050"),
            Some("127.0.0.1:9050".parse().unwrap())
        );
    }

    #[test]
    fn rejects_malformed_proxy() {
        assert_eq!(parse_proxy_addr("socks5://not-an-address"), None);
    }

    #[tokio::test]
    async fn gate_has_one_semaphore_per_known_network() {
        let gate = NetworkGate::new(&NetworksConfig::default());
        for net in network::ALL {
            let _permit = gate.acquire(net).await;
        }
    }
}
