//! `<program> migrate [--pool-config PATH]` — applies pending schema
//! migrations (spec.md §3) ahead of running any service.

use crate::common::config::PoolConfig;
use crate::common::error::ErrorCode;
use crate::common::logging;
use crate::db::migration::Migrator;
use crate::db::Pool;
use clap::Parser;
use sea_orm_migration::MigratorTrait;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
pub struct MigrateCmd {
    /// Path to the shared connection-pool YAML document.
    #[arg(long, value_name = "FILE", default_value = "brotr.yaml")]
    pub pool_config: PathBuf,

    /// Overrides `RUST_LOG` for this process.
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl MigrateCmd {
    pub async fn run(&self) -> i32 {
        if let Err(e) = logging::logging_init(crate::common::consts::LOG_PATH, self.log_level.as_deref()) {
            eprintln!("failed to initialize logging: {e}");
            return ErrorCode::Config as i32;
        }

        let pool_config = match PoolConfig::load(&self.pool_config) {
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
        match Migrator::up(pool.connection(), None).await {
            Ok(()) => {
                tracing::info!("migrations applied");
                ErrorCode::Success as i32
            }
            Err(e) => {
                tracing::error!(error = %e, "migration failed");
                ErrorCode::Unavailable as i32
            }
        }
    }
}
