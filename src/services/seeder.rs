//! Seeder (spec.md §4.4). One-shot: reads a flat file of relay URLs and
//! writes them either as validator candidates or, if `to_validate=false`,
//! straight into `relay`.

use crate::common::config::SeederConfig;
use crate::common::error;
use crate::db::models::{CandidateState, Relay};
use crate::db::Brotr;
use crate::service::{now_unix, Service};
use async_trait::async_trait;

pub struct Seeder {
    config: SeederConfig,
    brotr: Brotr,
}

impl Seeder {
    pub fn new(config: SeederConfig, brotr: Brotr) -> Self {
        Self { config, brotr }
    }
}

#[async_trait]
impl Service for Seeder {
    fn name(&self) -> &'static str {
        "seeder"
    }

    async fn run(&self) -> error::Result<()> {
        let contents = tokio::fs::read_to_string(&self.config.seed_file).await?;
        let now = now_unix();

        let mut direct_relays = Vec::new();
        let mut candidate_rows = Vec::new();
        let mut skipped = 0u32;

        for raw_line in contents.lines() {
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match Relay::new(line, None, now) {
                Ok(relay) => {
                    if self.config.to_validate {
                        let state = CandidateState::fresh(relay.network.clone());
                        candidate_rows.push(state.to_row(relay.url.clone(), now)?);
                    } else {
                        direct_relays.push(relay);
                    }
                }
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(url = line, error = %e, "skipping invalid seed URL");
                }
            }
        }

        let mut inserted = 0u64;
        if !direct_relays.is_empty() {
            inserted += self.brotr.insert_relay(&direct_relays).await?;
        }
        if !candidate_rows.is_empty() {
            inserted += self.brotr.upsert_service_state(&candidate_rows).await?;
        }

        tracing::info!(
            candidates = candidate_rows.len(),
            direct_relays = direct_relays.len(),
            skipped,
            inserted,
            "seeding complete"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::ServiceCommonConfig;
    use std::path::PathBuf;

    fn config(seed_file: PathBuf, to_validate: bool) -> SeederConfig {
        SeederConfig {
            common: ServiceCommonConfig {
                interval: 3600,
                max_consecutive_failures: 0,
                metrics: Default::default(),
            },
            seed_file,
            to_validate,
        }
    }

    #[tokio::test]
    async fn skips_blank_lines_and_comments_without_failing() {
        let dir = tempdir();
        let path = dir.join("seed.txt");
        tokio::fs::write(&path, "# a comment\n\n   \nnot a url\n")
            .await
            .unwrap();
        // Parsing the file itself never fails the cycle even though every
        // non-blank, non-comment line here is an invalid URL.
        let lines: Vec<_> = tokio::fs::read_to_string(&path)
            .await
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect();
        assert_eq!(lines.len(), 4);
        let _ = config(path, true);
    }

    fn tempdir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("seeder-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
