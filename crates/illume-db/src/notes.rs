//! Note repository implementation.
//!
//! Images live in an append-only `note_image` sub-table rather than an array
//! column on the note row. Concurrent generations therefore append
//! independent rows instead of racing on a shared list, and the displayed
//! image list (and the has-images flag) is derived by query.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use illume_core::{
    defaults, CreateNoteRequest, Error, ListNotesRequest, Note, NoteImage, NoteRepository, Result,
    UpdateNoteRequest,
};

use crate::escape_like;

/// PostgreSQL implementation of NoteRepository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Lowercase, trim, and deduplicate tags, preserving first-occurrence order.
    fn normalize_tags(tags: Vec<String>) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();
        for tag in tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && seen.insert(tag.clone()) {
                result.push(tag);
            }
        }
        result
    }

    /// Substitute the default prompt when content is empty or whitespace.
    ///
    /// Returns `(content, default_prompt)` as stored on the row.
    fn resolve_content(content: Option<String>) -> (Option<String>, Option<String>) {
        match content {
            Some(c) if !c.trim().is_empty() => (Some(c), None),
            _ => (
                Some(defaults::DEFAULT_NOTE_PROMPT.to_string()),
                Some(defaults::DEFAULT_NOTE_PROMPT.to_string()),
            ),
        }
    }

    /// Load image sub-records for a set of notes, grouped by note id.
    async fn load_images(&self, note_ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<NoteImage>>> {
        if note_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            r#"SELECT id, note_id, object_id, url, created_at
               FROM note_image
               WHERE note_id = ANY($1)
               ORDER BY created_at ASC, id ASC"#,
        )
        .bind(note_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<NoteImage>> = HashMap::new();
        for row in rows {
            let note_id: Uuid = row.get("note_id");
            grouped.entry(note_id).or_default().push(NoteImage {
                id: row.get("id"),
                object_id: row.get("object_id"),
                url: row.get("url"),
                created_at: row.get("created_at"),
            });
        }
        Ok(grouped)
    }

    fn note_from_row(row: &sqlx::postgres::PgRow, images: Vec<NoteImage>) -> Note {
        Note {
            id: row.get("id"),
            owner_id: row.get("owner_id"),
            title: row.get("title"),
            content: row.get("content"),
            tags: row.get("tags"),
            has_images: !images.is_empty(),
            images,
            default_prompt: row.get("default_prompt"),
            generated_prompt: row.get("generated_prompt"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let (content, default_prompt) = Self::resolve_content(req.content);
        let title = req
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| defaults::UNTITLED_NOTE_TITLE.to_string());
        let tags = Self::normalize_tags(req.tags);

        sqlx::query(
            r#"INSERT INTO note (id, owner_id, title, content, tags, default_prompt)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&title)
        .bind(&content)
        .bind(&tags)
        .bind(&default_prompt)
        .execute(&self.pool)
        .await?;

        debug!(subsystem = "db", op = "insert_note", note_id = %id, "Note created");
        Ok(id)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Note> {
        let row = sqlx::query(
            r#"SELECT id, owner_id, title, content, tags, default_prompt,
                      generated_prompt, created_at, updated_at
               FROM note WHERE id = $1 AND owner_id = $2"#,
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NoteNotFound(id))?;

        let mut images = self.load_images(&[id]).await?;
        Ok(Self::note_from_row(
            &row,
            images.remove(&id).unwrap_or_default(),
        ))
    }

    async fn list(&self, owner_id: Uuid, req: ListNotesRequest) -> Result<Vec<Note>> {
        let mut query = String::from(
            "SELECT id, owner_id, title, content, tags, default_prompt, \
             generated_prompt, created_at, updated_at \
             FROM note WHERE owner_id = $1 ",
        );
        let mut param_idx = 2;

        let pattern = req
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));
        if pattern.is_some() {
            query.push_str(&format!(
                "AND (title ILIKE ${idx} ESCAPE '\\' OR content ILIKE ${idx} ESCAPE '\\') ",
                idx = param_idx
            ));
            param_idx += 1;
        }

        let tag = req
            .tag
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        if tag.is_some() {
            query.push_str(&format!("AND ${} = ANY(tags) ", param_idx));
        }

        if req.with_images {
            query.push_str("AND EXISTS (SELECT 1 FROM note_image ni WHERE ni.note_id = note.id) ");
        }

        query.push_str("ORDER BY created_at DESC");

        let mut q = sqlx::query(&query).bind(owner_id);
        if let Some(ref p) = pattern {
            q = q.bind(p);
        }
        if let Some(ref t) = tag {
            q = q.bind(t);
        }

        let rows = q.fetch_all(&self.pool).await?;
        let note_ids: Vec<Uuid> = rows.iter().map(|r| r.get("id")).collect();
        let mut images = self.load_images(&note_ids).await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                Self::note_from_row(row, images.remove(&id).unwrap_or_default())
            })
            .collect())
    }

    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateNoteRequest) -> Result<()> {
        let (content, default_prompt) = Self::resolve_content(req.content);
        let title = req
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| defaults::UNTITLED_NOTE_TITLE.to_string());
        let tags = Self::normalize_tags(req.tags);

        let result = sqlx::query(
            r#"UPDATE note
               SET title = $3, content = $4, tags = $5, default_prompt = $6,
                   updated_at = now()
               WHERE id = $1 AND owner_id = $2"#,
        )
        .bind(id)
        .bind(owner_id)
        .bind(&title)
        .bind(&content)
        .bind(&tags)
        .bind(&default_prompt)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<Vec<Uuid>> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query("SELECT 1 FROM note WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(Error::NoteNotFound(id));
        }

        let object_ids: Vec<Uuid> =
            sqlx::query("SELECT object_id FROM note_image WHERE note_id = $1")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?
                .iter()
                .map(|r| r.get("object_id"))
                .collect();

        // note_image rows go with the note via ON DELETE CASCADE
        sqlx::query("DELETE FROM note WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(
            subsystem = "db",
            op = "delete_note",
            note_id = %id,
            released_objects = object_ids.len(),
            "Note deleted"
        );
        Ok(object_ids)
    }

    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"SELECT DISTINCT unnest(tags) AS tag
               FROM note WHERE owner_id = $1
               ORDER BY tag"#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| r.get("tag")).collect())
    }

    async fn attach_image(
        &self,
        note_id: Uuid,
        owner_id: Uuid,
        object_id: Uuid,
        url: &str,
        prompt: Option<&str>,
    ) -> Result<(NoteImage, Vec<Uuid>)> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent appends to the same note so the
        // cap-eviction below sees a consistent count.
        let locked = sqlx::query("SELECT 1 FROM note WHERE id = $1 AND owner_id = $2 FOR UPDATE")
            .bind(note_id)
            .bind(owner_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(Error::NoteNotFound(note_id));
        }

        let image_id = Uuid::now_v7();
        let row = sqlx::query(
            r#"INSERT INTO note_image (id, note_id, object_id, url)
               VALUES ($1, $2, $3, $4)
               RETURNING id, object_id, url, created_at"#,
        )
        .bind(image_id)
        .bind(note_id)
        .bind(object_id)
        .bind(url)
        .fetch_one(&mut *tx)
        .await?;

        let image = NoteImage {
            id: row.get("id"),
            object_id: row.get("object_id"),
            url: row.get("url"),
            created_at: row.get("created_at"),
        };

        // FIFO eviction: keep the newest MAX_NOTE_IMAGES rows.
        let evicted: Vec<Uuid> = sqlx::query(
            r#"DELETE FROM note_image
               WHERE id IN (
                   SELECT id FROM note_image
                   WHERE note_id = $1
                   ORDER BY created_at DESC, id DESC
                   OFFSET $2
               )
               RETURNING object_id"#,
        )
        .bind(note_id)
        .bind(defaults::MAX_NOTE_IMAGES as i64)
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(|r| r.get("object_id"))
        .collect();

        if let Some(prompt) = prompt {
            sqlx::query(
                r#"UPDATE note SET generated_prompt = $2, updated_at = now() WHERE id = $1"#,
            )
            .bind(note_id)
            .bind(prompt)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(r#"UPDATE note SET updated_at = now() WHERE id = $1"#)
                .bind(note_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            subsystem = "db",
            op = "attach_image",
            note_id = %note_id,
            image_id = %image.id,
            evicted = evicted.len(),
            "Image attached"
        );
        Ok((image, evicted))
    }

    async fn set_generated_prompt(
        &self,
        note_id: Uuid,
        owner_id: Uuid,
        prompt: Option<&str>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE note SET generated_prompt = $3, updated_at = now()
               WHERE id = $1 AND owner_id = $2"#,
        )
        .bind(note_id)
        .bind(owner_id)
        .bind(prompt)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(note_id));
        }
        Ok(())
    }
}
