//! Shared test helpers for building orchestrators and upstream servers in tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::routing::get;

use crate::config::Config;
use crate::error::RepositoryError;
use crate::orchestrator::Orchestrator;
use crate::store::{BlobStore, JobStore, MemoryBlobStore, MemoryJobStore};
use crate::types::{Artifact, ArtifactMetadata, FileId, Job, JobId, NewArtifact, NewJob};
use tokio::sync::Notify;

/// Orchestrator over in-memory stores, with handles to both stores
pub(crate) struct TestOrchestrator {
    pub(crate) orchestrator: Orchestrator,
    pub(crate) jobs: Arc<MemoryJobStore>,
    pub(crate) blobs: Arc<MemoryBlobStore>,
}

/// Build a test orchestrator; `configure` may adjust the default config
pub(crate) fn create_test_orchestrator(configure: impl FnOnce(&mut Config)) -> TestOrchestrator {
    let mut config = Config::default();
    configure(&mut config);

    let jobs = Arc::new(MemoryJobStore::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let orchestrator = Orchestrator::new(config, jobs.clone(), blobs.clone()).unwrap();

    TestOrchestrator {
        orchestrator,
        jobs,
        blobs,
    }
}

/// Poll until the job reaches a terminal status in the store
pub(crate) async fn wait_for_terminal(orchestrator: &Orchestrator, id: &JobId) -> Job {
    let poll = async {
        loop {
            let job = orchestrator.get_job(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .expect("job did not finish within 10s")
}

/// Wait until no job execution is running
pub(crate) async fn wait_idle(orchestrator: &Orchestrator) {
    let poll = async {
        while orchestrator.active_jobs() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), poll)
        .await
        .expect("executions did not settle within 10s");
}

/// Job store whose `update` always fails
#[derive(Default)]
pub(crate) struct FailingUpdateStore {
    pub(crate) inner: MemoryJobStore,
}

#[async_trait::async_trait]
impl JobStore for FailingUpdateStore {
    async fn create(&self, job: NewJob) -> Result<Job, RepositoryError> {
        self.inner.create(job).await
    }

    async fn get(&self, id: &JobId) -> Result<Job, RepositoryError> {
        self.inner.get(id).await
    }

    async fn update(&self, _job: &Job) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("store offline".to_string()))
    }

    async fn delete(&self, id: &JobId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }
}

/// Job store whose `create` always fails
pub(crate) struct FailingCreateStore;

#[async_trait::async_trait]
impl JobStore for FailingCreateStore {
    async fn create(&self, _job: NewJob) -> Result<Job, RepositoryError> {
        Err(RepositoryError::QueryFailed("disk I/O error".to_string()))
    }

    async fn get(&self, id: &JobId) -> Result<Job, RepositoryError> {
        Err(RepositoryError::job_not_found(id))
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        Err(RepositoryError::job_not_found(&job.id))
    }

    async fn delete(&self, id: &JobId) -> Result<(), RepositoryError> {
        Err(RepositoryError::job_not_found(id))
    }
}

/// Job store whose `create` parks until released by the test
#[derive(Default)]
pub(crate) struct GatedCreateStore {
    pub(crate) inner: MemoryJobStore,
    /// Notified once `create` has been entered
    pub(crate) entered: Notify,
    /// Notify to let the parked `create` finish
    pub(crate) release: Notify,
}

#[async_trait::async_trait]
impl JobStore for GatedCreateStore {
    async fn create(&self, job: NewJob) -> Result<Job, RepositoryError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.create(job).await
    }

    async fn get(&self, id: &JobId) -> Result<Job, RepositoryError> {
        self.inner.get(id).await
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        self.inner.update(job).await
    }

    async fn delete(&self, id: &JobId) -> Result<(), RepositoryError> {
        self.inner.delete(id).await
    }
}

/// Blob store that panics on every write
pub(crate) struct PanickingBlobStore;

#[async_trait::async_trait]
impl BlobStore for PanickingBlobStore {
    async fn create(&self, _artifact: NewArtifact) -> Result<FileId, RepositoryError> {
        panic!("blob store exploded");
    }

    async fn get(&self, id: &FileId) -> Result<Artifact, RepositoryError> {
        Err(RepositoryError::file_not_found(id))
    }

    async fn metadata(&self, id: &FileId) -> Result<ArtifactMetadata, RepositoryError> {
        Err(RepositoryError::file_not_found(id))
    }
}

/// Upstream that records how many requests it is serving at once
#[derive(Clone, Default)]
pub(crate) struct ConcurrencyGauge {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
    served: Arc<AtomicUsize>,
}

impl ConcurrencyGauge {
    /// Highest number of simultaneous requests observed
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total requests answered
    pub(crate) fn served(&self) -> usize {
        self.served.load(Ordering::SeqCst)
    }
}

async fn slow_handler(State(gauge): State<ConcurrencyGauge>) -> &'static str {
    let now = gauge.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    gauge.peak.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    gauge.in_flight.fetch_sub(1, Ordering::SeqCst);
    gauge.served.fetch_add(1, Ordering::SeqCst);
    "payload"
}

/// Serve `GET /slow/*` on an ephemeral port; returns the base URL and the gauge
pub(crate) async fn spawn_gauged_upstream() -> (String, ConcurrencyGauge) {
    let gauge = ConcurrencyGauge::default();
    let app = Router::new()
        .route("/slow/*rest", get(slow_handler))
        .with_state(gauge.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), gauge)
}
