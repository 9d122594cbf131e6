//! Per-job result collector
//!
//! Fetch tasks report into a shared [`ResultCollector`]; each report appends exactly
//! one [`DownloadItem`] under a mutex, so items land in completion order.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::types::{DownloadItem, FetchErrorCode, FileId};

/// Concurrency-safe accumulator of item outcomes (cheap to clone)
#[derive(Clone, Debug, Default)]
pub struct ResultCollector {
    items: Arc<Mutex<Vec<DownloadItem>>>,
}

impl ResultCollector {
    /// Create an empty collector sized for `expected` items
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::with_capacity(expected))),
        }
    }

    /// Append a successful item, returning it
    pub async fn record_success(&self, url: impl Into<String>, file_id: FileId) -> DownloadItem {
        self.push(DownloadItem::success(url, file_id)).await
    }

    /// Append a failed item, returning it
    pub async fn record_failure(
        &self,
        url: impl Into<String>,
        error: FetchErrorCode,
    ) -> DownloadItem {
        self.push(DownloadItem::failure(url, error)).await
    }

    /// Owned copy of the items recorded so far
    pub async fn snapshot(&self) -> Vec<DownloadItem> {
        self.items.lock().await.clone()
    }

    /// Number of items recorded so far
    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    /// Whether nothing has been recorded yet
    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    async fn push(&self, item: DownloadItem) -> DownloadItem {
        self.items.lock().await.push(item.clone());
        item
    }
}
