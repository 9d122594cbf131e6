//! Binary payloads and their metadata.

use bytes::Bytes;
use sqlx::FromRow;

use crate::error::RepositoryError;
use crate::store::BlobStore;
use crate::types::{Artifact, ArtifactMetadata, FileId, NewArtifact};

use super::{Database, query_error};

#[derive(Debug, FromRow)]
struct MetadataRow {
    id: String,
    mime_type: String,
    size: i64,
}

impl From<MetadataRow> for ArtifactMetadata {
    fn from(row: MetadataRow) -> Self {
        Self {
            id: FileId::from(row.id),
            mime_type: row.mime_type,
            size: u64::try_from(row.size).unwrap_or(0),
        }
    }
}

#[derive(Debug, FromRow)]
struct ArtifactRow {
    id: String,
    mime_type: String,
    size: i64,
    data: Vec<u8>,
}

#[async_trait::async_trait]
impl BlobStore for Database {
    async fn create(&self, artifact: NewArtifact) -> Result<FileId, RepositoryError> {
        let id = FileId::new_v4();

        let result = sqlx::query(
            r#"
            INSERT INTO artifacts (id, mime_type, size, data, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.as_str())
        .bind(&artifact.mime_type)
        .bind(i64::try_from(artifact.size).unwrap_or(i64::MAX))
        .bind(artifact.data.as_ref())
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(id),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(RepositoryError::AlreadyExists {
                    kind: "file",
                    id: id.to_string(),
                })
            }
            Err(e) => Err(query_error("Failed to insert artifact", e)),
        }
    }

    async fn get(&self, id: &FileId) -> Result<Artifact, RepositoryError> {
        let row = sqlx::query_as::<_, ArtifactRow>(
            "SELECT id, mime_type, size, data FROM artifacts WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("Failed to get artifact", e))?
        .ok_or_else(|| RepositoryError::file_not_found(id))?;

        Ok(Artifact {
            metadata: ArtifactMetadata {
                id: FileId::from(row.id),
                mime_type: row.mime_type,
                size: u64::try_from(row.size).unwrap_or(0),
            },
            data: Bytes::from(row.data),
        })
    }

    async fn metadata(&self, id: &FileId) -> Result<ArtifactMetadata, RepositoryError> {
        sqlx::query_as::<_, MetadataRow>("SELECT id, mime_type, size FROM artifacts WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to get artifact metadata", e))?
            .map(ArtifactMetadata::from)
            .ok_or_else(|| RepositoryError::file_not_found(id))
    }
}
