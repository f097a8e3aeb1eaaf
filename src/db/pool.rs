//! Connection pool (spec.md §4.1): health-checked acquisition and
//! backoff-retried connect over a `sea_orm::DatabaseConnection`, which in
//! turn wraps an `sqlx::PgPool` — the same stack the teacher's
//! `Storage::new` builds, generalized with retry and a health check.

use crate::common::config::{PoolConfig, RetryConfig};
use crate::common::error::{self, Error};
use futures::future::BoxFuture;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, Statement,
    TransactionTrait,
};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct PoolMetricsSnapshot {
    pub size: u32,
    pub idle: u32,
    /// `(size - idle) / size`, zero when the pool hasn't opened any connections yet.
    pub utilization: f64,
}

#[derive(Clone)]
pub struct Pool {
    conn: DatabaseConnection,
    config: PoolConfig,
}

impl Pool {
    /// Establishes the pool, retrying with configured backoff. Exhausting
    /// `retry.max_attempts` is fatal (spec.md §4.1) — the caller's cycle
    /// must abort, which is why this returns `Error::ConnectionPool` rather
    /// than panicking.
    pub async fn connect(config: PoolConfig) -> error::Result<Self> {
        let mut opt = ConnectOptions::new(config.connection_url());
        opt.max_connections(config.max_pool_size)
            .min_connections(config.min_pool_size)
            .connect_timeout(Duration::from_secs(config.timeouts.query))
            .acquire_timeout(Duration::from_secs(config.timeouts.query))
            .sqlx_logging(false);

        let mut attempt: u32 = 0;
        let mut delay = Duration::from_millis(config.retry.initial_delay_ms);
        loop {
            attempt += 1;
            match Database::connect(opt.clone()).await {
                Ok(conn) => return Ok(Self { conn, config }),
                Err(e) if attempt >= config.retry.max_attempts => {
                    return Err(Error::ConnectionPool(format!(
                        "failed to connect after {attempt} attempts: {e}"
                    )));
                }
                Err(e) => {
                    tracing::warn!(attempt, %e, "db connect failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &config.retry);
                }
            }
        }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.query)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.batch)
    }

    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeouts.cleanup)
    }

    pub fn batch_max_size(&self) -> usize {
        self.config.batch.max_size
    }

    /// Issues `SELECT 1` to rule out a stale connection hazard, retrying
    /// with backoff up to `max_attempts` (spec.md §4.1).
    pub async fn acquire_healthy(&self) -> error::Result<()> {
        let mut attempt: u32 = 0;
        let mut delay = Duration::from_millis(self.config.retry.initial_delay_ms);
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                self.query_timeout(),
                self.conn.execute_unprepared("SELECT 1"),
            )
            .await;
            match outcome {
                Ok(Ok(_)) => return Ok(()),
                _ if attempt >= self.config.retry.max_attempts => {
                    return Err(Error::ConnectionPool(format!(
                        "health check failed after {attempt} attempts"
                    )));
                }
                _ => {
                    tokio::time::sleep(delay).await;
                    delay = next_delay(delay, &self.config.retry);
                }
            }
        }
    }

    /// Runs `f` inside a transaction: commits on `Ok`, rolls back on `Err`
    /// (spec.md §4.1). `f` takes the transaction by reference so it can
    /// also return owned results computed from queries issued against it.
    pub async fn transaction<F, T>(&self, f: F) -> error::Result<T>
    where
        F: for<'c> FnOnce(&'c DatabaseTransaction) -> BoxFuture<'c, error::Result<T>>,
    {
        let txn = self.conn.begin().await?;
        match f(&txn).await {
            Ok(value) => {
                txn.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback().await {
                    tracing::warn!(%rollback_err, "rollback after failed transaction also failed");
                }
                Err(e)
            }
        }
    }

    pub async fn execute(&self, stmt: Statement) -> error::Result<u64> {
        let res = tokio::time::timeout(self.query_timeout(), self.conn.execute(stmt))
            .await
            .map_err(|_| Error::Timeout("execute".into()))??;
        Ok(res.rows_affected())
    }

    pub async fn fetch_all(&self, stmt: Statement) -> error::Result<Vec<sea_orm::QueryResult>> {
        let rows = tokio::time::timeout(self.query_timeout(), self.conn.query_all(stmt))
            .await
            .map_err(|_| Error::Timeout("query_all".into()))??;
        Ok(rows)
    }

    pub async fn fetch_one(&self, stmt: Statement) -> error::Result<Option<sea_orm::QueryResult>> {
        let row = tokio::time::timeout(self.query_timeout(), self.conn.query_one(stmt))
            .await
            .map_err(|_| Error::Timeout("query_one".into()))??;
        Ok(row)
    }

    /// Snapshot of pool size, idle count and utilization (spec.md §4.1).
    pub fn metrics(&self) -> PoolMetricsSnapshot {
        let pg_pool = self.conn.get_postgres_connection_pool();
        let size = pg_pool.size();
        let idle = pg_pool.num_idle() as u32;
        let utilization = if size == 0 {
            0.0
        } else {
            (size - idle) as f64 / size as f64
        };
        PoolMetricsSnapshot {
            size,
            idle,
            utilization,
        }
    }
}

fn next_delay(current: Duration, retry: &RetryConfig) -> Duration {
    let max = Duration::from_millis(retry.max_delay_ms);
    let next = if retry.exponential_backoff {
        current.saturating_mul(2)
    } else {
        current.saturating_add(Duration::from_millis(retry.initial_delay_ms))
    };
    std::cmp::min(next, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry(exponential: bool) -> RetryConfig {
        RetryConfig {
            max_attempts: 5,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            exponential_backoff: exponential,
        }
    }

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let r = retry(true);
        let d1 = Duration::from_millis(100);
        let d2 = next_delay(d1, &r);
        let d3 = next_delay(d2, &r);
        let d4 = next_delay(d3, &r);
        assert_eq!(d2, Duration::from_millis(200));
        assert_eq!(d3, Duration::from_millis(400));
        assert_eq!(d4, Duration::from_millis(800));
        let d5 = next_delay(d4, &r);
        assert_eq!(d5, Duration::from_millis(1_000));
    }

    #[test]
    fn linear_backoff_adds_initial_delay() {
        let r = retry(false);
        let d1 = Duration::from_millis(100);
        let d2 = next_delay(d1, &r);
        assert_eq!(d2, Duration::from_millis(200));
    }
}
