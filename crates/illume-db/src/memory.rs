//! In-memory repository implementations for tests.
//!
//! Always compiled (not `#[cfg(test)]`) so integration tests in dependent
//! crates can drive the generation pipeline without a live PostgreSQL
//! instance. Behavior mirrors the Pg implementations: tag normalization,
//! default-prompt substitution, FIFO image eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use illume_core::{
    defaults, CreateNoteRequest, Error, GenerationLogRepository, GenerationRecord,
    ListNotesRequest, NewGenerationRecord, Note, NoteImage, NoteRepository, ObjectStore, Result,
    UpdateNoteRequest,
};

/// In-memory NoteRepository.
#[derive(Default)]
pub struct MemoryNoteRepository {
    notes: Mutex<HashMap<Uuid, Note>>,
}

impl MemoryNoteRepository {
    pub fn new() -> Self {
        Self::default()
    }

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

    fn resolve_content(content: Option<String>) -> (Option<String>, Option<String>) {
        match content {
            Some(c) if !c.trim().is_empty() => (Some(c), None),
            _ => (
                Some(defaults::DEFAULT_NOTE_PROMPT.to_string()),
                Some(defaults::DEFAULT_NOTE_PROMPT.to_string()),
            ),
        }
    }
}

#[async_trait]
impl NoteRepository for MemoryNoteRepository {
    async fn insert(&self, owner_id: Uuid, req: CreateNoteRequest) -> Result<Uuid> {
        let id = Uuid::now_v7();
        let (content, default_prompt) = Self::resolve_content(req.content);
        let now = Utc::now();
        let note = Note {
            id,
            owner_id,
            title: Some(
                req.title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| defaults::UNTITLED_NOTE_TITLE.to_string()),
            ),
            content,
            tags: Self::normalize_tags(req.tags),
            images: Vec::new(),
            has_images: false,
            default_prompt,
            generated_prompt: None,
            created_at: now,
            updated_at: now,
        };
        self.notes.lock().unwrap().insert(id, note);
        Ok(id)
    }

    async fn fetch(&self, id: Uuid, owner_id: Uuid) -> Result<Note> {
        self.notes
            .lock()
            .unwrap()
            .get(&id)
            .filter(|n| n.owner_id == owner_id)
            .cloned()
            .ok_or(Error::NoteNotFound(id))
    }

    async fn list(&self, owner_id: Uuid, req: ListNotesRequest) -> Result<Vec<Note>> {
        let notes = self.notes.lock().unwrap();
        let query = req
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase);
        let tag = req
            .tag
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());

        let mut result: Vec<Note> = notes
            .values()
            .filter(|n| n.owner_id == owner_id)
            .filter(|n| {
                query.as_deref().map_or(true, |q| {
                    n.title
                        .as_deref()
                        .is_some_and(|t| t.to_lowercase().contains(q))
                        || n.content
                            .as_deref()
                            .is_some_and(|c| c.to_lowercase().contains(q))
                })
            })
            .filter(|n| {
                tag.as_deref()
                    .map_or(true, |t| n.tags.iter().any(|x| x == t))
            })
            .filter(|n| !req.with_images || n.has_images)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn update(&self, id: Uuid, owner_id: Uuid, req: UpdateNoteRequest) -> Result<()> {
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .get_mut(&id)
            .filter(|n| n.owner_id == owner_id)
            .ok_or(Error::NoteNotFound(id))?;
        let (content, default_prompt) = Self::resolve_content(req.content);
        note.title = Some(
            req.title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| defaults::UNTITLED_NOTE_TITLE.to_string()),
        );
        note.content = content;
        note.default_prompt = default_prompt;
        note.tags = Self::normalize_tags(req.tags);
        note.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid, owner_id: Uuid) -> Result<Vec<Uuid>> {
        let mut notes = self.notes.lock().unwrap();
        match notes.get(&id) {
            Some(n) if n.owner_id == owner_id => {
                let released = n.images.iter().map(|i| i.object_id).collect();
                notes.remove(&id);
                Ok(released)
            }
            _ => Err(Error::NoteNotFound(id)),
        }
    }

    async fn list_tags(&self, owner_id: Uuid) -> Result<Vec<String>> {
        let notes = self.notes.lock().unwrap();
        let mut tags: Vec<String> = notes
            .values()
            .filter(|n| n.owner_id == owner_id)
            .flat_map(|n| n.tags.iter().cloned())
            .collect::<std::collections::HashSet<_>>()
            .into_iter()
            .collect();
        tags.sort();
        Ok(tags)
    }

    async fn attach_image(
        &self,
        note_id: Uuid,
        owner_id: Uuid,
        object_id: Uuid,
        url: &str,
        prompt: Option<&str>,
    ) -> Result<(NoteImage, Vec<Uuid>)> {
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .get_mut(&note_id)
            .filter(|n| n.owner_id == owner_id)
            .ok_or(Error::NoteNotFound(note_id))?;

        let image = NoteImage {
            id: Uuid::now_v7(),
            object_id,
            url: url.to_string(),
            created_at: Utc::now(),
        };
        note.images.push(image.clone());

        let mut evicted = Vec::new();
        while note.images.len() > defaults::MAX_NOTE_IMAGES {
            evicted.push(note.images.remove(0).object_id);
        }

        note.has_images = true;
        if let Some(prompt) = prompt {
            note.generated_prompt = Some(prompt.to_string());
        }
        note.updated_at = Utc::now();
        Ok((image, evicted))
    }

    async fn set_generated_prompt(
        &self,
        note_id: Uuid,
        owner_id: Uuid,
        prompt: Option<&str>,
    ) -> Result<()> {
        let mut notes = self.notes.lock().unwrap();
        let note = notes
            .get_mut(&note_id)
            .filter(|n| n.owner_id == owner_id)
            .ok_or(Error::NoteNotFound(note_id))?;
        note.generated_prompt = prompt.map(String::from);
        note.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory GenerationLogRepository.
#[derive(Default)]
pub struct MemoryGenerationLog {
    records: Mutex<Vec<GenerationRecord>>,
}

impl MemoryGenerationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded rows, for assertions.
    pub fn all(&self) -> Vec<GenerationRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationLogRepository for MemoryGenerationLog {
    async fn record(&self, rec: NewGenerationRecord) -> Result<Uuid> {
        let id = Uuid::now_v7();
        self.records.lock().unwrap().push(GenerationRecord {
            id,
            owner_id: rec.owner_id,
            note_id: rec.note_id,
            date: rec.date,
            prompt: rec.prompt,
            image_url: rec.image_url,
            success: rec.success,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn count_for_day(&self, owner_id: Uuid, date: NaiveDate) -> Result<i64> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.owner_id == owner_id && r.date == date)
            .count() as i64)
    }

    async fn recent(&self, owner_id: Uuid, limit: i64) -> Result<Vec<GenerationRecord>> {
        let records = self.records.lock().unwrap();
        let mut result: Vec<GenerationRecord> = records
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result.truncate(limit.max(0) as usize);
        Ok(result)
    }
}

/// In-memory ObjectStore with optional injected write failure.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<Uuid, (Vec<u8>, String)>>,
    fail_stores: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `store` calls fail, to exercise the fatal storage
    /// path of the pipeline.
    pub fn set_fail_stores(&self, fail: bool) {
        self.fail_stores.store(fail, Ordering::SeqCst);
    }

    /// Number of stored objects, for assertions.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn store(&self, data: &[u8], content_type: &str) -> Result<Uuid> {
        if self.fail_stores.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected store failure".to_string()));
        }
        let id = Uuid::now_v7();
        self.objects
            .lock()
            .unwrap()
            .insert(id, (data.to_vec(), content_type.to_string()));
        Ok(id)
    }

    async fn url(&self, id: Uuid) -> Result<Option<String>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .contains_key(&id)
            .then(|| format!("https://storage.test/objects/{}", id)))
    }

    async fn fetch(&self, id: Uuid) -> Result<(Vec<u8>, String)> {
        self.objects
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("object {}", id)))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.objects.lock().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attach_image_without_prompt_keeps_generated_prompt() {
        let repo = MemoryNoteRepository::new();
        let owner_id = Uuid::new_v4();
        let note_id = repo
            .insert(
                owner_id,
                CreateNoteRequest {
                    title: Some("Photos".into()),
                    content: Some("holiday".into()),
                    tags: vec![],
                },
            )
            .await
            .unwrap();

        repo.set_generated_prompt(note_id, owner_id, Some("existing prompt"))
            .await
            .unwrap();
        repo.attach_image(note_id, owner_id, Uuid::new_v4(), "https://x/1", None)
            .await
            .unwrap();

        let note = repo.fetch(note_id, owner_id).await.unwrap();
        assert!(note.has_images);
        assert_eq!(note.generated_prompt.as_deref(), Some("existing prompt"));
    }

    #[tokio::test]
    async fn test_attach_image_evicts_oldest_beyond_cap() {
        let repo = MemoryNoteRepository::new();
        let owner_id = Uuid::new_v4();
        let note_id = repo
            .insert(
                owner_id,
                CreateNoteRequest {
                    title: Some("Cap".into()),
                    content: Some("x".into()),
                    tags: vec![],
                },
            )
            .await
            .unwrap();

        let mut object_ids = Vec::new();
        for i in 0..4 {
            let object_id = Uuid::new_v4();
            object_ids.push(object_id);
            repo.attach_image(
                note_id,
                owner_id,
                object_id,
                &format!("https://x/{}", i),
                Some("p"),
            )
            .await
            .unwrap();
        }

        let note = repo.fetch(note_id, owner_id).await.unwrap();
        assert_eq!(note.images.len(), defaults::MAX_NOTE_IMAGES);
        // Oldest evicted, order preserved for the rest.
        let kept: Vec<Uuid> = note.images.iter().map(|i| i.object_id).collect();
        assert_eq!(kept, object_ids[1..].to_vec());
    }

    #[tokio::test]
    async fn test_delete_reports_released_objects() {
        let repo = MemoryNoteRepository::new();
        let owner_id = Uuid::new_v4();
        let note_id = repo
            .insert(
                owner_id,
                CreateNoteRequest {
                    title: None,
                    content: Some("x".into()),
                    tags: vec![],
                },
            )
            .await
            .unwrap();

        let object_id = Uuid::new_v4();
        repo.attach_image(note_id, owner_id, object_id, "https://x/0", None)
            .await
            .unwrap();

        let released = repo.delete(note_id, owner_id).await.unwrap();
        assert_eq!(released, vec![object_id]);
        assert!(repo.fetch(note_id, owner_id).await.is_err());
    }
}
