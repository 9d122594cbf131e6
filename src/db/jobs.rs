//! Job records and their ordered items.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::time::Duration;

use crate::error::RepositoryError;
use crate::store::JobStore;
use crate::types::{DownloadItem, FetchErrorCode, FileId, Job, JobId, JobStatus, NewJob};

use super::{Database, query_error};

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    status: String,
    timeout_ms: i64,
    created_at: i64,
    updated_at: i64,
}

#[derive(Debug, FromRow)]
struct ItemRow {
    url: String,
    file_id: Option<String>,
    error_code: Option<String>,
    error_status: Option<i64>,
}

fn timestamp(millis: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| RepositoryError::QueryFailed(format!("invalid timestamp: {}", millis)))
}

impl ItemRow {
    fn into_item(self) -> Result<DownloadItem, RepositoryError> {
        match (self.file_id, self.error_code) {
            (Some(file_id), None) => Ok(DownloadItem::success(self.url, FileId::from(file_id))),
            (None, Some(code)) => {
                let status = self.error_status.and_then(|s| u16::try_from(s).ok());
                let error = FetchErrorCode::from_parts(&code, status).ok_or_else(|| {
                    RepositoryError::QueryFailed(format!("unknown error code: {}", code))
                })?;
                Ok(DownloadItem::failure(self.url, error))
            }
            _ => Err(RepositoryError::QueryFailed(format!(
                "item for {} must carry exactly one of file_id or error",
                self.url
            ))),
        }
    }
}

impl JobRow {
    fn into_job(self, items: Vec<DownloadItem>) -> Result<Job, RepositoryError> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::QueryFailed(format!("unknown job status: {}", self.status))
        })?;
        Ok(Job {
            id: JobId::from(self.id),
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
            timeout: Duration::from_millis(u64::try_from(self.timeout_ms).unwrap_or(0)),
            status,
            items,
        })
    }
}

#[async_trait::async_trait]
impl JobStore for Database {
    async fn create(&self, job: NewJob) -> Result<Job, RepositoryError> {
        let id = JobId::new_v4();
        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let timeout_ms = i64::try_from(job.timeout.as_millis()).unwrap_or(i64::MAX);

        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, status, timeout_ms, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(job.status.as_str())
        .bind(timeout_ms)
        .bind(now_ms)
        .bind(now_ms)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(RepositoryError::AlreadyExists {
                    kind: "job",
                    id: id.to_string(),
                });
            }
            Err(e) => return Err(query_error("Failed to insert job", e)),
        }

        Ok(Job {
            id,
            created_at: timestamp(now_ms)?,
            updated_at: timestamp(now_ms)?,
            timeout: job.timeout,
            status: job.status,
            items: Vec::new(),
        })
    }

    async fn get(&self, id: &JobId) -> Result<Job, RepositoryError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, status, timeout_ms, created_at, updated_at
            FROM jobs
            WHERE id = ?
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get job", e))?
        .ok_or_else(|| RepositoryError::job_not_found(id))?;

        let items = sqlx::query_as::<_, ItemRow>(
            r#"
            SELECT url, file_id, error_code, error_status
            FROM job_items
            WHERE job_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get job items", e))?
        .into_iter()
        .map(ItemRow::into_item)
        .collect::<Result<Vec<_>, _>>()?;

        row.into_job(items)
    }

    async fn update(&self, job: &Job) -> Result<(), RepositoryError> {
        if job.id.as_str().is_empty() {
            return Err(RepositoryError::Invalid("job id cannot be empty".to_string()));
        }

        let timeout_ms = i64::try_from(job.timeout.as_millis()).unwrap_or(i64::MAX);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_error("Failed to begin transaction", e))?;

        let updated = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, timeout_ms = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status.as_str())
        .bind(timeout_ms)
        .bind(Utc::now().timestamp_millis())
        .bind(job.id.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| query_error("Failed to update job", e))?;

        if updated.rows_affected() == 0 {
            return Err(RepositoryError::job_not_found(&job.id));
        }

        sqlx::query("DELETE FROM job_items WHERE job_id = ?")
            .bind(job.id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to clear job items", e))?;

        for (position, item) in job.items.iter().enumerate() {
            let error = item.error();
            sqlx::query(
                r#"
                INSERT INTO job_items (job_id, position, url, file_id, error_code, error_status)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(job.id.as_str())
            .bind(position as i64)
            .bind(&item.url)
            .bind(item.file_id().map(FileId::as_str))
            .bind(error.map(|e| e.code()))
            .bind(error.and_then(|e| e.status()).map(i64::from))
            .execute(&mut *tx)
            .await
            .map_err(|e| query_error("Failed to insert job item", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| query_error("Failed to commit job update", e))?;

        Ok(())
    }

    async fn delete(&self, id: &JobId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to delete job", e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::job_not_found(id));
        }
        Ok(())
    }
}
