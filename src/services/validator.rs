//! Validator (spec.md §4.6). Streams candidates in chunks, probes each for
//! Nostr protocol compatibility, and promotes or penalizes them.

use crate::common::config::ValidatorConfig;
use crate::common::error;
use crate::db::models::{CandidateState, Relay, ServiceStateRow};
use crate::db::Brotr;
use crate::network::{parse_proxy_addr, NetworkGate};
use crate::nostr_client::RelayClient;
use crate::service::{now_unix, Service};
use async_trait::async_trait;
use nostr_sdk::Filter;
use std::time::Duration;

enum Outcome {
    Success,
    Failure,
    /// The candidate's network is disabled or unconfigured; left untouched
    /// (spec.md §4.6's "candidates for disabled networks are left in place").
    Skipped,
}

pub struct Validator {
    config: ValidatorConfig,
    brotr: Brotr,
    gate: NetworkGate,
}

impl Validator {
    pub fn new(config: ValidatorConfig, brotr: Brotr) -> Self {
        let gate = NetworkGate::new(&config.networks);
        Self {
            config,
            brotr,
            gate,
        }
    }

    async fn probe_one(&self, url: String, state: CandidateState) -> (String, CandidateState, Outcome) {
        if !self.config.networks.is_usable(&state.network) {
            return (url, state, Outcome::Skipped);
        }
        let net_cfg = match self.config.networks.get(&state.network) {
            Some(c) => c,
            None => return (url, state, Outcome::Skipped),
        };
        let timeout = Duration::from_secs(net_cfg.timeout);
        let proxy = net_cfg.proxy_url.as_deref().and_then(parse_proxy_addr);

        let _permit = self.gate.acquire(&state.network).await;
        let outcome = match RelayClient::connect(&url, proxy, None, timeout).await {
            Ok(client) => {
                let responded = client
                    .fetch_events(Filter::new().limit(1), timeout)
                    .await
                    .is_ok();
                client.disconnect().await;
                if responded {
                    Outcome::Success
                } else {
                    Outcome::Failure
                }
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "candidate probe failed");
                Outcome::Failure
            }
        };
        (url, state, outcome)
    }

    /// Applies every probe outcome in a single pass: successes delete the
    /// candidate and insert into `relay`; failures bump `failed_attempts`
    /// (spec.md §4.6 step 5). `insert_relay`, `delete_service_state` and
    /// `upsert_service_state` each commit independently, not inside a shared
    /// transaction, so a crash between the promote and the penalize batch
    /// can leave a promoted relay's candidate row behind (re-validated and
    /// re-promoted harmlessly next cycle) or drop a penalty bump (the
    /// candidate just gets one more free attempt). Neither outcome corrupts
    /// state or duplicates a relay row.
    async fn apply_outcomes(
        &self,
        results: Vec<(String, CandidateState, Outcome)>,
        now: i64,
    ) -> error::Result<usize> {
        let mut promoted = Vec::new();
        let mut penalized = Vec::new();
        let mut demoted_keys = Vec::new();
        let mut processed = 0usize;

        for (url, state, outcome) in results {
            match outcome {
                Outcome::Success => {
                    promoted.push(Relay::new(&url, Some(&state.network), now)?);
                    demoted_keys.push(url);
                    processed += 1;
                }
                Outcome::Failure => {
                    let bumped = CandidateState {
                        network: state.network,
                        failed_attempts: state.failed_attempts + 1,
                    };
                    penalized.push(bumped.to_row(url, now)?);
                    processed += 1;
                }
                Outcome::Skipped => {}
            }
        }

        if !promoted.is_empty() {
            self.brotr.insert_relay(&promoted).await?;
            let keys: Vec<(String, String, String)> = demoted_keys
                .into_iter()
                .map(|k| {
                    (
                        crate::common::consts::service_name::VALIDATOR.to_string(),
                        crate::common::consts::state_type::CANDIDATE.to_string(),
                        k,
                    )
                })
                .collect();
            self.brotr.delete_service_state(&keys).await?;
        }
        if !penalized.is_empty() {
            self.brotr.upsert_service_state(&penalized).await?;
        }
        Ok(processed)
    }
}

#[async_trait]
impl Service for Validator {
    fn name(&self) -> &'static str {
        "validator"
    }

    async fn run(&self) -> error::Result<()> {
        if self.config.cleanup.enabled {
            let stale = self.brotr.delete_stale_candidates().await?;
            let exhausted = self
                .brotr
                .delete_exhausted_candidates(self.config.max_failures)
                .await?;
            tracing::info!(stale, exhausted, "validator cleanup pass complete");
        }

        let mut total_processed: u32 = 0;
        loop {
            let rows = self.brotr.next_candidates(self.config.chunk_size).await?;
            if rows.is_empty() {
                break;
            }

            let mut futures = Vec::with_capacity(rows.len());
            for row in &rows {
                let state = match CandidateState::from_row(row) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::warn!(key = %row.state_key, error = %e, "dropping malformed candidate row");
                        continue;
                    }
                };
                futures.push(self.probe_one(row.state_key.clone(), state));
            }
            let results = futures::future::join_all(futures).await;

            let now = now_unix();
            let processed = self.apply_outcomes(results, now).await?;
            total_processed += processed as u32;

            if processed == 0 {
                // Every candidate in this chunk belonged to a disabled
                // network; nothing changed, so looping again would spin.
                break;
            }
            if let Some(max) = self.config.max_candidates {
                if total_processed >= max {
                    break;
                }
            }
        }

        tracing::info!(total_processed, "validator cycle complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::{NetworkConfig, NetworksConfig, ServiceCommonConfig};

    fn config() -> ValidatorConfig {
        ValidatorConfig {
            common: ServiceCommonConfig {
                interval: 3600,
                max_consecutive_failures: 0,
                metrics: Default::default(),
            },
            networks: NetworksConfig {
                clearnet: NetworkConfig {
                    enabled: true,
                    proxy_url: None,
                    max_tasks: 4,
                    timeout: 5,
                },
                ..Default::default()
            },
            chunk_size: 10,
            max_candidates: None,
            max_failures: 5,
            cleanup: Default::default(),
        }
    }

    #[test]
    fn disabled_overlay_network_has_no_proxy_so_is_unusable() {
        let cfg = config();
        assert!(!cfg.networks.is_usable(crate::common::consts::network::TOR));
        assert!(cfg.networks.is_usable(crate::common::consts::network::CLEARNET));
    }
}
