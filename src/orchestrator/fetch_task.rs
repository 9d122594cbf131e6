//! Single-URL fetch under the job deadline.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::classify::{FetchFailure, classify};
use crate::collector::ResultCollector;
use crate::store::{self, BlobStore};
use crate::types::{DownloadItem, FileId, JobId, NewArtifact};

/// Content type recorded when the upstream sends none
pub(crate) const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One URL of one job
pub(crate) struct FetchTask {
    pub(crate) job_id: JobId,
    pub(crate) url: String,
    pub(crate) http: reqwest::Client,
    pub(crate) blob_store: Arc<dyn BlobStore>,
    pub(crate) max_body_bytes: u64,
    pub(crate) scope: CancellationToken,
    pub(crate) deadline: Instant,
}

impl FetchTask {
    /// Wait for a slot, fetch, and record exactly one outcome
    ///
    /// Returns `None` without recording when the job scope fires while the task is
    /// still queued for a slot.
    pub(crate) async fn run(
        &self,
        limiter: &Semaphore,
        collector: &ResultCollector,
    ) -> Option<DownloadItem> {
        let _permit = tokio::select! {
            biased;
            _ = self.scope.cancelled() => return None,
            permit = limiter.acquire() => permit.ok()?,
        };

        let item = match self.fetch().await {
            Ok(file_id) => {
                tracing::debug!(job_id = %self.job_id, url = %self.url, file_id = %file_id, "Fetched");
                collector.record_success(self.url.clone(), file_id).await
            }
            Err(failure) => {
                let code = classify(&failure);
                tracing::debug!(
                    job_id = %self.job_id,
                    url = %self.url,
                    error = %failure,
                    code = %code,
                    "Fetch failed"
                );
                collector.record_failure(self.url.clone(), code).await
            }
        };
        Some(item)
    }

    async fn fetch(&self) -> Result<FileId, FetchFailure> {
        self.check_scope()?;

        let (mime_type, data) = tokio::select! {
            biased;
            _ = self.scope.cancelled() => return Err(self.scope_failure()),
            _ = tokio::time::sleep_until(self.deadline) => {
                return Err(FetchFailure::DeadlineExceeded);
            }
            body = self.download() => body?,
        };

        self.check_scope()?;
        let artifact = NewArtifact::new(mime_type, data);
        let file_id = store::scoped(&self.scope, self.blob_store.create(artifact)).await?;
        Ok(file_id)
    }

    /// GET the URL and read the body up to the configured ceiling
    async fn download(&self) -> Result<(String, Bytes), FetchFailure> {
        let url = Url::parse(&self.url).map_err(|e| FetchFailure::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchFailure::InvalidUrl(format!(
                "unsupported scheme {:?}",
                url.scheme()
            )));
        }

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(FetchFailure::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }

        let limit = self.max_body_bytes;
        let declared = response.content_length();
        if declared.is_some_and(|len| len > limit) {
            return Err(FetchFailure::TooLarge { limit });
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let capacity = declared.unwrap_or(0).min(limit);
        let mut body = BytesMut::with_capacity(usize::try_from(capacity).unwrap_or(0));
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(FetchFailure::from_reqwest)?;
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(FetchFailure::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }

        Ok((mime_type, body.freeze()))
    }

    fn check_scope(&self) -> Result<(), FetchFailure> {
        if self.scope.is_cancelled() {
            Err(self.scope_failure())
        } else if Instant::now() >= self.deadline {
            Err(FetchFailure::DeadlineExceeded)
        } else {
            Ok(())
        }
    }

    fn scope_failure(&self) -> FetchFailure {
        if Instant::now() >= self.deadline {
            FetchFailure::DeadlineExceeded
        } else {
            FetchFailure::Cancelled
        }
    }
}
