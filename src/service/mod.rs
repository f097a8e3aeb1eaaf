//! Service base (spec.md §4.3): every service implements `run()` for a
//! single cycle; `run_forever` is the shared driver loop, generalized from
//! the teacher's plain `loop { ... sleep ... }` bodies (`src/services/app.rs`)
//! into one reusable function with metrics and cooperative shutdown.

pub mod metrics;

use crate::common::error;
use crate::common::shutdown::Shutdown;
use metrics::ServiceMetrics;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Externally configured grace period for in-flight cycles (spec.md §4.3's
/// "a grace period (configurable, default 60s) applies externally").
pub const DEFAULT_GRACE_SECS: u64 = 60;

#[async_trait::async_trait]
pub trait Service: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self) -> error::Result<()>;
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Runs `service.run()` exactly once. Used by the `--once` CLI flag
/// (spec.md §6.5): exit code is derived directly from the `Result`.
pub async fn run_once(service: &dyn Service, metrics: &ServiceMetrics) -> error::Result<()> {
    let t0 = Instant::now();
    let result = service.run().await;
    metrics
        .cycle_duration_seconds
        .observe(t0.elapsed().as_secs_f64());
    match &result {
        Ok(()) => {
            metrics.cycles_success.inc();
            metrics.consecutive_failures.set(0);
        }
        Err(e) => {
            metrics.cycles_failed.inc();
            metrics.consecutive_failures.set(1);
            tracing::error!(service = service.name(), error = %e, "cycle failed");
        }
    }
    metrics.last_cycle_timestamp.set(now_unix());
    result
}

/// The driver loop (spec.md §4.3):
/// ```text
/// while is_running:
///     t0 = now()
///     try: run()
///     except E: failures++; record; if failures >= limit: stop
///     else: failures = 0
///     record cycle duration and outcome counters
///     if wait(interval) returns shutdown-requested: break
/// ```
/// `max_consecutive_failures == 0` means never auto-stop (spec.md §8).
pub async fn run_forever(
    service: &dyn Service,
    interval: u64,
    max_consecutive_failures: u32,
    shutdown: &Shutdown,
    metrics: &ServiceMetrics,
) {
    let mut consecutive_failures: u32 = 0;

    loop {
        if shutdown.is_shutting_down() {
            tracing::info!(service = service.name(), "shutdown requested before cycle start");
            break;
        }

        let t0 = Instant::now();
        let outcome = shutdown.grace(service.run(), DEFAULT_GRACE_SECS).await;

        match outcome {
            Some(Ok(())) => {
                consecutive_failures = 0;
                metrics.cycles_success.inc();
            }
            Some(Err(e)) => {
                consecutive_failures += 1;
                metrics.cycles_failed.inc();
                tracing::error!(
                    service = service.name(),
                    error = %e,
                    consecutive_failures,
                    "cycle failed"
                );
            }
            None => {
                // Grace period elapsed with the cycle still in flight; the
                // future was dropped at its next suspension point. Count it
                // as a failure so a wedged service still trips the limit.
                consecutive_failures += 1;
                metrics.cycles_failed.inc();
            }
        }

        metrics
            .cycle_duration_seconds
            .observe(t0.elapsed().as_secs_f64());
        metrics.consecutive_failures.set(consecutive_failures as i64);
        metrics.last_cycle_timestamp.set(now_unix());

        if max_consecutive_failures != 0 && consecutive_failures >= max_consecutive_failures {
            tracing::error!(
                service = service.name(),
                consecutive_failures,
                "max_consecutive_failures reached, stopping"
            );
            break;
        }

        if shutdown.wait(interval).await {
            tracing::info!(service = service.name(), "shutdown requested, exiting loop");
            break;
        }
    }

    metrics.up.set(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyService {
        calls: AtomicU32,
        fail_until: u32,
    }

    #[async_trait::async_trait]
    impl Service for FlakyService {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn run(&self) -> error::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_until {
                Err(error::Error::CustomError("boom".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn run_forever_stops_after_failure_limit() {
        let service = FlakyService {
            calls: AtomicU32::new(0),
            fail_until: 100,
        };
        let shutdown = Shutdown::new();
        let metrics = ServiceMetrics::new("flaky_test_a").unwrap();
        run_forever(&service, 60, 3, &shutdown, &metrics).await;
        assert_eq!(metrics.consecutive_failures.get(), 3);
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn run_forever_resets_failure_count_on_success() {
        let service = FlakyService {
            calls: AtomicU32::new(0),
            fail_until: 1,
        };
        let shutdown = Shutdown::new();
        let metrics = ServiceMetrics::new("flaky_test_b").unwrap();
        // Shut down immediately after the first successful cycle.
        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            shutdown_clone.wait(0).await;
        });
        // Directly exercise one failing + one successful cycle without
        // waiting a full interval: run_once for each.
        let _ = run_once(&service, &metrics).await;
        let _ = run_once(&service, &metrics).await;
        assert_eq!(metrics.consecutive_failures.get(), 0);
    }
}
