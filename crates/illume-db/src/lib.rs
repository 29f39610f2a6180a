//! # illume-db
//!
//! PostgreSQL database layer for illume.
//!
//! This crate provides:
//! - Connection pool management
//! - Note repository with append-only image sub-records
//! - Generation audit log for daily quota counting
//! - Object storage (Postgres metadata + pluggable byte backend)
//! - In-memory repositories for tests
//!
//! ## Example
//!
//! ```rust,ignore
//! use illume_db::Database;
//! use illume_core::CreateNoteRequest;
//!
//! let db = Database::connect("postgres://localhost/illume").await?;
//! let note_id = db.notes.insert(owner_id, CreateNoteRequest {
//!     title: Some("Trip planning".into()),
//!     content: Some("Sunset over the mountains".into()),
//!     tags: vec!["travel".into()],
//! }).await?;
//! ```

pub mod generations;
pub mod memory;
pub mod notes;
pub mod object_store;
pub mod pool;

// Re-export core types
pub use illume_core::*;

pub use generations::PgGenerationLogRepository;
pub use memory::{MemoryGenerationLog, MemoryNoteRepository, MemoryObjectStore};
pub use notes::PgNoteRepository;
pub use object_store::{generate_storage_path, FilesystemBackend, PgObjectStore, StorageBackend};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Note repository for CRUD operations.
    pub notes: PgNoteRepository,
    /// Generation audit log repository.
    pub generations: PgGenerationLogRepository,
    /// Object storage. Use `with_filesystem_storage` to configure.
    pub objects: Option<PgObjectStore>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            generations: PgGenerationLogRepository::new(pool.clone()),
            objects: None,
            pool,
        }
    }

    /// Configure object storage with a filesystem backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Base directory for blob files
    /// * `public_base_url` - Base URL the API serves objects from
    pub fn with_filesystem_storage(mut self, path: &str, public_base_url: &str) -> Self {
        self.objects = Some(PgObjectStore::new(
            self.pool.clone(),
            FilesystemBackend::new(path),
            public_base_url,
        ));
        self
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_done\\x"), "50\\%\\_done\\\\x");
        assert_eq!(escape_like("plain"), "plain");
    }
}
