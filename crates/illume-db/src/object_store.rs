//! Object storage: Postgres metadata rows plus a pluggable byte backend.
//!
//! Generated images are stored as opaque blobs. Each blob gets a metadata
//! row (content type, size, storage path) and its bytes live in a
//! `StorageBackend`. Durable URLs are served by the HTTP API from the
//! configured public base URL.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use illume_core::{Error, ObjectStore, Result};

/// Storage backend trait for different byte-storage implementations.
///
/// Allows abstracting over filesystem, S3, or other storage providers.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path.
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Read data from the specified path.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;
}

/// Filesystem storage backend.
///
/// Stores blobs in a directory hierarchy fanned out by UUIDv7 prefix.
/// Path format: `blobs/{first-2-hex}/{next-2-hex}/{uuid}.bin`
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend with the given base directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.base_path.join(path)
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.full_path(path);
        debug!(storage_path = %path, size = data.len(), "object_store: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "object_store: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(from = %temp_path.display(), to = %full_path.display(), error = %e,
                  "object_store: rename failed");
            e
        })?;

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.full_path(path)).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path);
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.full_path(path)).await?)
    }
}

/// Generate a storage path from an object id.
///
/// Example: `blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f.bin`
pub fn generate_storage_path(id: &Uuid) -> String {
    let hex = id.as_hyphenated().to_string().replace('-', "");
    format!(
        "blobs/{}/{}/{}.bin",
        &hex[0..2],
        &hex[2..4],
        id.as_hyphenated()
    )
}

/// Postgres-backed object store with pluggable byte storage.
#[derive(Clone)]
pub struct PgObjectStore {
    pool: PgPool,
    backend: Arc<dyn StorageBackend>,
    /// Public base URL the API serves objects from (no trailing slash).
    public_base_url: String,
}

impl PgObjectStore {
    /// Create a new object store.
    pub fn new(
        pool: PgPool,
        backend: impl StorageBackend + 'static,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            backend: Arc::new(backend),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn object_url(&self, id: Uuid) -> String {
        format!("{}/api/v1/objects/{}", self.public_base_url, id)
    }
}

#[async_trait]
impl ObjectStore for PgObjectStore {
    async fn store(&self, data: &[u8], content_type: &str) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let path = generate_storage_path(&id);

        self.backend
            .write(&path, data)
            .await
            .map_err(|e| Error::Storage(format!("blob write failed: {}", e)))?;

        sqlx::query(
            r#"INSERT INTO object_blob (id, content_type, size_bytes, storage_path)
               VALUES ($1, $2, $3, $4)"#,
        )
        .bind(id)
        .bind(content_type)
        .bind(data.len() as i64)
        .bind(&path)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Storage(format!("blob metadata insert failed: {}", e)))?;

        debug!(
            subsystem = "db",
            component = "object_store",
            op = "store",
            object_id = %id,
            size = data.len(),
            content_type = %content_type,
            "Object stored"
        );
        Ok(id)
    }

    async fn url(&self, id: Uuid) -> Result<Option<String>> {
        let exists = sqlx::query("SELECT 1 FROM object_blob WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("blob lookup failed: {}", e)))?;
        Ok(exists.map(|_| self.object_url(id)))
    }

    async fn fetch(&self, id: Uuid) -> Result<(Vec<u8>, String)> {
        let row = sqlx::query("SELECT content_type, storage_path FROM object_blob WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound(format!("object {}", id)))?;

        let path: String = row.get("storage_path");
        let content_type: String = row.get("content_type");
        let data = self.backend.read(&path).await?;
        Ok((data, content_type))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let row = sqlx::query("DELETE FROM object_blob WHERE id = $1 RETURNING storage_path")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = row {
            let path: String = row.get("storage_path");
            if let Err(e) = self.backend.delete(&path).await {
                // Metadata row is already gone; an orphaned blob file is
                // harmless and cleaned up out of band.
                warn!(object_id = %id, error = %e, "object_store: blob delete failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_storage_path_fanout() {
        let id = Uuid::parse_str("01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f").unwrap();
        assert_eq!(
            generate_storage_path(&id),
            "blobs/01/94/01948f7e-8b2a-7c3d-9e4f-5a6b7c8d9e0f.bin"
        );
    }

    #[tokio::test]
    async fn test_filesystem_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());

        let path = "blobs/aa/bb/test.bin";
        assert!(!backend.exists(path).await.unwrap());

        backend.write(path, b"image bytes").await.unwrap();
        assert!(backend.exists(path).await.unwrap());
        assert_eq!(backend.read(path).await.unwrap(), b"image bytes");

        backend.delete(path).await.unwrap();
        assert!(!backend.exists(path).await.unwrap());
    }

    #[tokio::test]
    async fn test_filesystem_backend_delete_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        backend.delete("blobs/no/pe/missing.bin").await.unwrap();
    }
}
