//! Job creation, detached execution and finalization.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::classify::FetchFailure;
use crate::collector::ResultCollector;
use crate::error::Result;
use crate::types::{Event, FetchErrorCode, Job, JobStatus, NewJob};

use super::Orchestrator;
use super::fetch_task::FetchTask;

/// How a job execution ended
#[derive(Debug)]
pub(crate) enum ExecutionOutcome {
    /// Every task reached an outcome
    Completed,
    /// The job scope fired first; carries the fatal condition
    Aborted(FetchFailure),
}

/// Upper bound for deadlines derived from absurd timeouts
const MAX_JOB_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24 * 365);

impl Orchestrator {
    /// Create a job and start fetching `urls` in the background
    ///
    /// Returns as soon as the job record exists; the returned job is `InProgress`
    /// with no items. Poll [`Orchestrator::get_job`] (or [`Orchestrator::subscribe`])
    /// to observe progress. Execution is bounded by `timeout` and is not tied to the
    /// caller: dropping the returned future after it resolves does not stop the job.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::ShuttingDown`] once [`Orchestrator::shutdown`] has begun
    /// - [`crate::Error::Repository`] if the job record cannot be created
    pub async fn start_job(&self, timeout: Duration, urls: Vec<String>) -> Result<Job> {
        // Shutdown waits on this token until the job is spawned or rejected
        let _pending = self.state.tracker.token();
        self.ensure_accepting()?;

        let job = self.job_store.create(NewJob::in_progress(timeout)).await?;

        let scope = self.state.shutdown.child_token();
        let deadline = Instant::now() + timeout.min(MAX_JOB_TIMEOUT);

        tracing::info!(
            job_id = %job.id,
            urls = urls.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Job started"
        );
        self.emit_event(Event::JobStarted {
            id: job.id.clone(),
            urls: urls.len(),
        });

        let orchestrator = self.clone();
        let execution_job = job.clone();
        self.state.tracker.spawn(async move {
            orchestrator
                .execute(execution_job, urls, scope, deadline)
                .await;
        });

        Ok(job)
    }

    /// Run every fetch task for `job` and persist the terminal state
    async fn execute(
        self,
        mut job: Job,
        urls: Vec<String>,
        scope: CancellationToken,
        deadline: Instant,
    ) {
        let collector = ResultCollector::with_capacity(urls.len());
        let outcome = self
            .run_tasks(&job, urls, &collector, &scope, deadline)
            .await;

        job.status = match &outcome {
            ExecutionOutcome::Completed => JobStatus::Done,
            ExecutionOutcome::Aborted(reason) => {
                tracing::warn!(job_id = %job.id, reason = %reason, "Job aborted");
                JobStatus::Failed
            }
        };
        job.items = collector.snapshot().await;

        tracing::info!(
            job_id = %job.id,
            status = %job.status,
            items = job.items.len(),
            "Job finished"
        );
        self.emit_event(Event::JobFinished {
            id: job.id.clone(),
            status: job.status,
            items: job.items.len(),
        });

        // The job scope may already be done; persist outside it
        if let Err(e) = self.job_store.update(&job).await {
            tracing::error!(job_id = %job.id, error = %e, "Failed to persist finished job");
        }
    }

    /// Fan out one task per URL and wait for all of them or the scope
    async fn run_tasks(
        &self,
        job: &Job,
        urls: Vec<String>,
        collector: &ResultCollector,
        scope: &CancellationToken,
        deadline: Instant,
    ) -> ExecutionOutcome {
        if urls.is_empty() {
            return ExecutionOutcome::Completed;
        }

        let limiter = Arc::new(Semaphore::new(self.config.fetch.max_concurrent_fetches));
        let mut tasks = JoinSet::new();

        for url in urls {
            let task = FetchTask {
                job_id: job.id.clone(),
                url,
                http: self.http.clone(),
                blob_store: self.blob_store.clone(),
                max_body_bytes: self.config.fetch.max_body_bytes,
                scope: scope.clone(),
                deadline,
            };
            let limiter = limiter.clone();
            let collector = collector.clone();
            let orchestrator = self.clone();
            tasks.spawn(async move {
                let recorded = match AssertUnwindSafe(task.run(&limiter, &collector))
                    .catch_unwind()
                    .await
                {
                    Ok(recorded) => recorded,
                    Err(_) => {
                        // The URL still needs its single outcome
                        tracing::error!(
                            job_id = %task.job_id,
                            url = %task.url,
                            "Fetch task panicked"
                        );
                        Some(
                            collector
                                .record_failure(task.url.clone(), FetchErrorCode::Unknown)
                                .await,
                        )
                    }
                };
                if let Some(item) = recorded {
                    orchestrator.emit_event(Event::ItemRecorded {
                        id: task.job_id,
                        item,
                    });
                }
            });
        }

        // Scope and deadline win ties: a task that only finished because the
        // deadline fired must not turn the job into Done
        let outcome = tokio::select! {
            biased;
            _ = scope.cancelled() => ExecutionOutcome::Aborted(FetchFailure::Cancelled),
            _ = tokio::time::sleep_until(deadline) => {
                ExecutionOutcome::Aborted(FetchFailure::DeadlineExceeded)
            }
            _ = drain(&mut tasks) => ExecutionOutcome::Completed,
        };

        if let ExecutionOutcome::Aborted(_) = &outcome {
            scope.cancel();
            tracing::debug!(job_id = %job.id, pending = tasks.len(), "Cancelling in-flight tasks");
            tasks.shutdown().await;
        }

        outcome
    }
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            if e.is_panic() {
                tracing::error!(error = %e, "Fetch task panicked");
            }
        }
    }
}
