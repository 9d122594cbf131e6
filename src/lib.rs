//! # batch-fetch
//!
//! Deadline-bounded batch URL downloader.
//!
//! A caller submits a list of URLs together with a timeout. The job is recorded
//! immediately as `in_progress` and executes in the background: every URL is fetched
//! under a shared concurrency ceiling, each body is stored as an immutable artifact,
//! and each URL ends up with exactly one outcome, a stored file id or a classified
//! error. When every URL has an outcome the job is `done`; when the deadline fires
//! first it is `failed`, keeping whatever outcomes were recorded.
//!
//! ## Quick Start
//!
//! ```no_run
//! use batch_fetch::{Config, Orchestrator};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::in_memory(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let job = orchestrator
//!         .start_job(
//!             Duration::from_secs(10),
//!             vec!["https://example.com/a.pdf".to_string()],
//!         )
//!         .await?;
//!     println!("submitted {}", job.id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Fetch failure classification
pub mod classify;
/// Per-job outcome accumulation
pub mod collector;
/// Configuration types
pub mod config;
/// SQLite persistence layer
pub mod db;
/// Error types
pub mod error;
/// Job orchestration (decomposed into focused submodules)
pub mod orchestrator;
/// Job and blob store abstractions
pub mod store;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use classify::{FetchFailure, classify};
pub use collector::ResultCollector;
pub use config::{Config, FetchConfig, PersistenceConfig, StorageBackend};
pub use db::Database;
pub use error::{
    ApiError, DatabaseError, Error, ErrorDetail, RepositoryError, Result, ToHttpStatus,
};
pub use orchestrator::Orchestrator;
pub use store::{BlobStore, JobStore, MemoryBlobStore, MemoryJobStore};
pub use types::{
    Artifact, ArtifactMetadata, DownloadItem, Event, FetchErrorCode, FileId, ItemOutcome, Job,
    JobId, JobStatus, NewArtifact, NewJob,
};

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use batch_fetch::{Config, Orchestrator, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Orchestrator::from_config(Config::default()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(&orchestrator).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: &Orchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

/// Resolve once SIGINT or SIGTERM (Ctrl+C elsewhere) is received
#[cfg(unix)]
pub async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

/// Resolve once Ctrl+C is received
#[cfg(not(unix))]
pub async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
