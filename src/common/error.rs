//! Common error types shared by every service in the pipeline.
//!
//! Uses `thiserror` the way the rest of the crate does: one flat `Error` enum,
//! `#[from]` conversions at the boundaries we actually cross, and a `Result`
//! alias so call sites don't repeat `std::result::Result<T, Error>`.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse exit-code classification, following the `sysexits.h` convention
/// (`EX_CONFIG` = 78, `EX_UNAVAILABLE` = 69) so the CLI layer (spec.md §6.5,
/// §7) can distinguish a bad config from a transient outage without string
/// matching on the error.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    Config = 78,
    Unavailable = 69,
    Generic = 1,
}

#[derive(Error, Debug)]
pub enum Error {
    /// Missing config file at the specified path.
    #[error("no config file found at this path: {0}")]
    ConfigMissing(PathBuf),

    /// Config loaded but failed an invariant (spec.md §6.4, §4.7 `store ⊆ compute`).
    #[error("config invariant violated: {0}")]
    ConfigInvariant(String),

    /// Required environment variable is unset.
    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("config deserialization error: {0}")]
    SerializationError(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("tracing error: {0}")]
    TracingError(#[from] tracing::dispatcher::SetGlobalDefaultError),

    /// Connection pool exhausted its retry budget (spec.md §4.1, fatal for the cycle).
    #[error("connection pool error: {0}")]
    ConnectionPool(String),

    /// A single query or probe exceeded its configured timeout.
    #[error("operation timed out: {0}")]
    Timeout(String),

    /// A record failed a data-model invariant (malformed URL, bad hash, etc).
    #[error("validation error: {0}")]
    Validation(String),

    /// A network probe failed; carried so callers can log and continue
    /// rather than abort the cycle (spec.md §7, "per-relay errors").
    #[error("probe error: {0}")]
    Probe(String),

    #[error(transparent)]
    NostrSdkKeyError(#[from] nostr_sdk::key::Error),

    #[error(transparent)]
    NostrSdkClientError(#[from] nostr_sdk::client::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),

    #[error(transparent)]
    SeaOrmDBError(#[from] sea_orm::DbErr),

    #[error("{0}")]
    CustomError(String),
}

impl Error {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::ConfigMissing(_) | Error::ConfigInvariant(_) | Error::MissingEnv(_) => {
                ErrorCode::Config
            }
            Error::ConnectionPool(_) => ErrorCode::Unavailable,
            _ => ErrorCode::Generic,
        }
    }

    pub fn error_message(&self) -> String {
        self.to_string()
    }

    /// True for the error categories spec.md §7 calls "fatal cycle errors" —
    /// ones `run_forever` should count toward `consecutive_failures`, as
    /// opposed to per-item errors a service already contained internally.
    pub fn is_fatal_for_cycle(&self) -> bool {
        !matches!(self, Error::Validation(_) | Error::Probe(_))
    }
}
