//! `<program> <service> [--once] [--config PATH] [--log-level LEVEL]`
//! (spec.md §6.5). Each service subcommand shares this argument shape and
//! the same drive loop; only the config type and service constructor
//! differ per arm.

use crate::common::config::{
    FinderConfig, MonitorConfig, PoolConfig, SeederConfig, ServiceCommonConfig, SynchronizerConfig,
    ValidatorConfig,
};
use crate::common::error::{self, ErrorCode};
use crate::common::logging;
use crate::common::shutdown::Shutdown;
use crate::db::migration::Migrator;
use crate::db::{Brotr, Pool};
use crate::service::metrics::{self, ServiceMetrics};
use crate::service::{run_forever, run_once, Service};
use crate::services::{Finder, Monitor, Seeder, Synchronizer, Validator};
use clap::Parser;
use sea_orm_migration::MigratorTrait;
use std::path::PathBuf;
use std::sync::Arc;

/// Enumerates the five pipeline services (spec.md §2); each gets its own
/// top-level subcommand sharing this argument shape.
#[derive(Debug, Clone, Copy)]
pub enum ServiceName {
    Seeder,
    Finder,
    Validator,
    Monitor,
    Synchronizer,
}

impl ServiceName {
    fn as_str(self) -> &'static str {
        match self {
            ServiceName::Seeder => "seeder",
            ServiceName::Finder => "finder",
            ServiceName::Validator => "validator",
            ServiceName::Monitor => "monitor",
            ServiceName::Synchronizer => "synchronizer",
        }
    }
}

#[derive(Debug, Clone, Parser)]
pub struct ServiceArgs {
    /// Run exactly one cycle and exit; skips the metrics server and the
    /// interval loop (spec.md §6.5).
    #[arg(long)]
    pub once: bool,

    /// Path to the service-specific YAML document (spec.md §6.4).
    #[arg(short, long, value_name = "FILE")]
    pub config: PathBuf,

    /// Path to the shared connection-pool YAML document.
    #[arg(long, value_name = "FILE", default_value = "brotr.yaml")]
    pub pool_config: PathBuf,

    /// Overrides `RUST_LOG` for this process.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

/// Connects the pool, applies pending migrations, loads the named
/// service's config, and drives its cycle loop (spec.md §6.5).
pub async fn run_service(name: ServiceName, args: &ServiceArgs) -> i32 {
    if let Err(e) = logging::logging_init(crate::common::consts::LOG_PATH, args.log_level.as_deref()) {
        eprintln!("failed to initialize logging: {e}");
        return ErrorCode::Config as i32;
    }
    let _span = logging::service_span(name.as_str()).entered();

    let pool_config = match PoolConfig::load(&args.pool_config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load pool config");
            return ErrorCode::Config as i32;
        }
    };
    let pool = match Pool::connect(pool_config).await {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to connect to database");
            return ErrorCode::Unavailable as i32;
        }
    };
    if let Err(e) = Migrator::up(pool.connection(), None).await {
        tracing::error!(error = %e, "failed to apply pending migrations");
        return ErrorCode::Unavailable as i32;
    }
    let brotr = Brotr::new(pool);

    match name {
        ServiceName::Seeder => match SeederConfig::load(&args.config) {
            Ok(cfg) => {
                let common = cfg.common.clone();
                drive(Seeder::new(cfg, brotr), common, args.once).await
            }
            Err(e) => config_error(e),
        },
        ServiceName::Finder => match FinderConfig::load(&args.config) {
            Ok(cfg) => {
                let common = cfg.common.clone();
                match Finder::new(cfg, brotr) {
                    Ok(service) => drive(service, common, args.once).await,
                    Err(e) => config_error(e),
                }
            }
            Err(e) => config_error(e),
        },
        ServiceName::Validator => match ValidatorConfig::load(&args.config) {
            Ok(cfg) => {
                let common = cfg.common.clone();
                drive(Validator::new(cfg, brotr), common, args.once).await
            }
            Err(e) => config_error(e),
        },
        ServiceName::Monitor => match MonitorConfig::load(&args.config) {
            Ok(cfg) => {
                let common = cfg.common.clone();
                match Monitor::new(cfg, brotr) {
                    Ok(service) => drive(service, common, args.once).await,
                    Err(e) => config_error(e),
                }
            }
            Err(e) => config_error(e),
        },
        ServiceName::Synchronizer => match SynchronizerConfig::load(&args.config) {
            Ok(cfg) => {
                let common = cfg.common.clone();
                drive(Synchronizer::new(cfg, brotr), common, args.once).await
            }
            Err(e) => config_error(e),
        },
    }
}

fn config_error(e: error::Error) -> i32 {
    tracing::error!(error = %e, "failed to load service config");
    ErrorCode::Config as i32
}

/// Shared drive loop (spec.md §4.3, §6.5): once mode runs a single cycle
/// and returns its exit code directly; otherwise installs the shutdown
/// handler, starts the metrics server, and loops until shutdown or the
/// failure limit trips.
async fn drive(service: impl Service, common: ServiceCommonConfig, once: bool) -> i32 {
    let metrics = match ServiceMetrics::new(service.name()) {
        Ok(m) => Arc::new(m),
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize metrics");
            return ErrorCode::Generic as i32;
        }
    };

    if once {
        return match run_once(&service, &metrics).await {
            Ok(()) => ErrorCode::Success as i32,
            Err(e) => {
                tracing::error!(service = service.name(), error = %e, "cycle failed");
                ErrorCode::Unavailable as i32
            }
        };
    }

    let shutdown = Shutdown::new();
    shutdown.install();

    if common.metrics.enabled {
        let metrics_clone = metrics.clone();
        let metrics_cfg = common.metrics.clone();
        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::serve(
                metrics_clone,
                &metrics_cfg.host,
                metrics_cfg.port,
                &metrics_cfg.path,
                shutdown_clone,
            )
            .await
            {
                tracing::error!(error = %e, "metrics server exited");
            }
        });
    }

    run_forever(
        &service,
        common.interval,
        common.max_consecutive_failures,
        &shutdown,
        &metrics,
    )
    .await;
    ErrorCode::Success as i32
}
