//! Generation audit log repository.
//!
//! One append-only row per generation attempt. Rows are never mutated; the
//! only consumers are the daily quota count and the history listing.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use illume_core::{GenerationLogRepository, GenerationRecord, NewGenerationRecord, Result};

/// PostgreSQL implementation of GenerationLogRepository.
#[derive(Clone)]
pub struct PgGenerationLogRepository {
    pool: Pool<Postgres>,
}

impl PgGenerationLogRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &sqlx::postgres::PgRow) -> GenerationRecord {
        GenerationRecord {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            note_id: row.get("note_id"),
            date: row.get("date"),
            prompt: row.get("prompt"),
            image_url: row.get("image_url"),
            success: row.get("success"),
            created_at: row.get("created_at"),
        }
    }
}

#[async_trait]
impl GenerationLogRepository for PgGenerationLogRepository {
    async fn record(&self, rec: NewGenerationRecord) -> Result<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            r#"INSERT INTO generation_log
               (id, owner_id, note_id, date, prompt, image_url, success)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(id)
        .bind(rec.owner_id)
        .bind(rec.note_id)
        .bind(rec.date)
        .bind(&rec.prompt)
        .bind(&rec.image_url)
        .bind(rec.success)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn count_for_day(&self, owner_id: Uuid, date: NaiveDate) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count FROM generation_log WHERE owner_id = $1 AND date = $2",
        )
        .bind(owner_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("count"))
    }

    async fn recent(&self, owner_id: Uuid, limit: i64) -> Result<Vec<GenerationRecord>> {
        let rows = sqlx::query(
            r#"SELECT id, owner_id, note_id, date, prompt, image_url, success, created_at
               FROM generation_log
               WHERE owner_id = $1
               ORDER BY created_at DESC
               LIMIT $2"#,
        )
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::record_from_row).collect())
    }
}
