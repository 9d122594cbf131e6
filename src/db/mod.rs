//! Database layer for batch-fetch
//!
//! SQLite persistence for jobs, their per-URL items, and downloaded artifacts.
//! [`Database`] implements both [`crate::store::JobStore`] and
//! [`crate::store::BlobStore`], so one file can back the whole orchestrator.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`]: database lifecycle, schema migrations
//! - [`jobs`]: job records and their ordered items
//! - [`artifacts`]: binary payloads and their metadata
//!
//! Timestamps are stored as unix milliseconds.

use sqlx::sqlite::SqlitePool;

use crate::error::RepositoryError;

mod artifacts;
mod jobs;
mod migrations;

/// Database handle for batch-fetch
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Map a sqlx failure onto the store error surface
fn query_error(context: &str, e: sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            RepositoryError::Unavailable(format!("{}: {}", context, e))
        }
        other => RepositoryError::QueryFailed(format!("{}: {}", context, other)),
    }
}
