//! End-to-end pipeline tests over in-memory stores and mock provider
//! backends. No network, no database.

use std::sync::Arc;

use illume_core::{
    AspectRatio, CreateNoteRequest, Error, GenerationRequest, ImageGenerationBackend, ImageStyle,
    NoteRepository, TextCompletionBackend,
};
use illume_db::{MemoryGenerationLog, MemoryNoteRepository, MemoryObjectStore};
use illume_inference::mock::{MockCompletionBackend, MockImageBackend};
use illume_jobs::{GenerationDispatcher, GenerationEvent, GenerationPipeline, PipelineConfig};
use uuid::Uuid;

struct Harness {
    notes: Arc<MemoryNoteRepository>,
    log: Arc<MemoryGenerationLog>,
    objects: Arc<MemoryObjectStore>,
    pipeline: Arc<GenerationPipeline>,
}

fn harness(
    completion: Option<Arc<MockCompletionBackend>>,
    images: Option<Arc<MockImageBackend>>,
    config: PipelineConfig,
) -> Harness {
    let notes = Arc::new(MemoryNoteRepository::new());
    let log = Arc::new(MemoryGenerationLog::new());
    let objects = Arc::new(MemoryObjectStore::new());

    let pipeline = Arc::new(GenerationPipeline::new(
        notes.clone(),
        log.clone(),
        objects.clone(),
        completion.map(|c| c as Arc<dyn TextCompletionBackend>),
        images.map(|i| i as Arc<dyn ImageGenerationBackend>),
        config,
    ));

    Harness {
        notes,
        log,
        objects,
        pipeline,
    }
}

async fn create_note(h: &Harness, owner_id: Uuid, title: Option<&str>, content: &str) -> Uuid {
    h.notes
        .insert(
            owner_id,
            CreateNoteRequest {
                title: title.map(String::from),
                content: Some(content.to_string()),
                tags: vec![],
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_successful_generation_attaches_image_and_records() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images.clone()), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Trip"), "wide mountain landscape panorama").await;

    let outcome = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap();

    assert!(!outcome.image_url.is_empty());
    assert!(!outcome.prompt.starts_with("[Fallback:"));
    assert_eq!(outcome.generations_remaining, 49);

    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert!(note.has_images);
    assert_eq!(note.images.len(), 1);
    assert_eq!(note.images[0].id, outcome.image_id);
    assert_eq!(note.images[0].url, outcome.image_url);
    assert_eq!(note.generated_prompt.as_deref(), Some(outcome.prompt.as_str()));

    let records = h.log.all();
    assert_eq!(records.len(), 1);
    assert!(records[0].success);
    assert_eq!(records[0].note_id, note_id);
    assert_eq!(h.objects.len(), 1);
}

#[tokio::test]
async fn test_provider_failure_still_returns_image() {
    let images = Arc::new(MockImageBackend::new().failing());
    let h = harness(None, Some(images), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Idea"), "a brilliant concept").await;

    let outcome = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap();

    assert!(!outcome.image_url.is_empty());
    assert!(outcome.prompt.starts_with("[Fallback:"));

    let records = h.log.all();
    assert_eq!(records.len(), 1);
    assert!(!records[0].success);
}

#[tokio::test]
async fn test_insufficient_credits_labels_fallback() {
    let images = Arc::new(MockImageBackend::new().failing_with_insufficient_credits());
    let h = harness(None, Some(images), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, None, "anything at all").await;

    let outcome = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap();

    assert!(outcome
        .prompt
        .starts_with("[Fallback: insufficient_credits]"));
}

#[tokio::test]
async fn test_no_backends_configured_bottoms_out_in_placeholder() {
    let h = harness(None, None, PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Offline"), "no credentials anywhere").await;

    let outcome = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap();

    assert!(outcome.prompt.starts_with("[Fallback:"));
    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert!(note.has_images);
}

#[tokio::test]
async fn test_end_to_end_artistic_sunset_scenario() {
    // Note content "Sunset over the mountains", no title, artistic style,
    // aspect ratio unset, provider forced to fail: the selector must choose
    // 1:1 (style override) and the note must end with a fallback image.
    let images = Arc::new(MockImageBackend::new().failing());
    let h = harness(None, Some(images.clone()), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, None, "Sunset over the mountains").await;

    let mut request = GenerationRequest::new(owner_id, note_id);
    request.style = ImageStyle::Artistic;

    let outcome = h.pipeline.run(request).await.unwrap();

    let calls = images.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, AspectRatio::Square1x1);

    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert!(note.has_images);
    assert!(note
        .generated_prompt
        .as_deref()
        .unwrap()
        .starts_with("[Fallback:"));
    assert!(!outcome.image_url.is_empty());
}

#[tokio::test]
async fn test_image_cap_is_fifo() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Gallery"), "some scene").await;

    let mut first_image_id = None;
    for i in 0..4 {
        let outcome = h
            .pipeline
            .run(GenerationRequest::new(owner_id, note_id))
            .await
            .unwrap();
        if i == 0 {
            first_image_id = Some(outcome.image_id);
        }
    }

    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert_eq!(note.images.len(), 3);
    assert!(note
        .images
        .iter()
        .all(|img| Some(img.id) != first_image_id));

    // The evicted blob was released from storage: 4 stored, 1 deleted.
    assert_eq!(h.objects.len(), 3);
    // Every attempt still has its own audit record.
    assert_eq!(h.log.all().len(), 4);
}

#[tokio::test]
async fn test_image_count_invariant_below_cap() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Two"), "a scene").await;

    for _ in 0..2 {
        h.pipeline
            .run(GenerationRequest::new(owner_id, note_id))
            .await
            .unwrap();
    }

    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert_eq!(note.images.len(), 2);
    // ids and urls always travel together in one sub-record
    assert!(note.images.iter().all(|img| !img.url.is_empty()));
}

#[tokio::test]
async fn test_quota_gate_rejects_at_limit() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(
        None,
        Some(images.clone()),
        PipelineConfig::default().with_daily_limit(2),
    );

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Quota"), "a scene").await;

    for _ in 0..2 {
        h.pipeline
            .run(GenerationRequest::new(owner_id, note_id))
            .await
            .unwrap();
    }

    let err = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RateLimited { used: 2, limit: 2 }));

    // The gate fired before any provider call.
    assert_eq!(images.call_count(), 2);
}

#[tokio::test]
async fn test_quota_is_per_owner() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(
        None,
        Some(images),
        PipelineConfig::default().with_daily_limit(1),
    );

    let owner_a = Uuid::new_v4();
    let owner_b = Uuid::new_v4();
    let note_a = create_note(&h, owner_a, Some("A"), "scene a").await;
    let note_b = create_note(&h, owner_b, Some("B"), "scene b").await;

    h.pipeline
        .run(GenerationRequest::new(owner_a, note_a))
        .await
        .unwrap();

    // Owner A is exhausted, owner B is not.
    assert!(h
        .pipeline
        .run(GenerationRequest::new(owner_a, note_a))
        .await
        .is_err());
    h.pipeline
        .run(GenerationRequest::new(owner_b, note_b))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_note_not_found_for_wrong_owner() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images.clone()), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Mine"), "a scene").await;

    let err = h
        .pipeline
        .run(GenerationRequest::new(Uuid::new_v4(), note_id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoteNotFound(id) if id == note_id));
    assert_eq!(images.call_count(), 0);
}

#[tokio::test]
async fn test_storage_failure_is_fatal_and_leaves_note_unmodified() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images), PipelineConfig::default());
    h.objects.set_fail_stores(true);

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Doomed"), "a scene").await;

    let err = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert!(!note.has_images);
    assert!(note.images.is_empty());
    // Progress marker was rolled back.
    assert!(note.generated_prompt.is_none());
    assert!(h.log.all().is_empty());
}

#[tokio::test]
async fn test_unpersistable_provider_image_degrades_to_placeholder() {
    // A data URL with no comma separator cannot be decoded; the pipeline
    // must degrade to the placeholder instead of failing.
    let images = Arc::new(MockImageBackend::new().with_url("data:image/png;base64"));
    let h = harness(None, Some(images), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Broken"), "a scene").await;

    let outcome = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap();

    assert!(outcome
        .prompt
        .starts_with("[Fallback: undefined_properties]"));
    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert!(note.has_images);
}

#[tokio::test]
async fn test_enhanced_prompt_flows_to_image_backend() {
    let completion =
        Arc::new(MockCompletionBackend::new().with_response("portrait of a person, soft light"));
    let images = Arc::new(MockImageBackend::new());
    let h = harness(
        Some(completion.clone()),
        Some(images.clone()),
        PipelineConfig::default(),
    );

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Profile"), "notes about my headshot").await;

    let outcome = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap();

    assert_eq!(outcome.prompt, "portrait of a person, soft light");
    assert_eq!(completion.call_count(), 1);

    let calls = images.calls();
    assert_eq!(calls[0].0, "portrait of a person, soft light");
    // Portrait keywords in the optimized prompt drive the selector.
    assert_eq!(calls[0].1, AspectRatio::Portrait3x4);
}

#[tokio::test]
async fn test_failed_prompt_optimization_falls_back_to_basic() {
    let completion = Arc::new(MockCompletionBackend::new().failing());
    let images = Arc::new(MockImageBackend::new());
    let h = harness(
        Some(completion),
        Some(images.clone()),
        PipelineConfig::default(),
    );

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Plain"), "ordinary content").await;

    let outcome = h
        .pipeline
        .run(GenerationRequest::new(owner_id, note_id))
        .await
        .unwrap();

    // Basic strategy output, not a fallback image.
    assert!(outcome.prompt.starts_with("photorealistic, high quality, detailed"));
    assert!(!outcome.prompt.starts_with("[Fallback:"));
    assert_eq!(images.call_count(), 1);
}

#[tokio::test]
async fn test_pinned_aspect_ratio_bypasses_selector() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images.clone()), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Pinned"), "portrait of a person").await;

    let mut request = GenerationRequest::new(owner_id, note_id);
    request.aspect_ratio = Some(AspectRatio::Wide16x9);
    h.pipeline.run(request).await.unwrap();

    assert_eq!(images.calls()[0].1, AspectRatio::Wide16x9);
}

#[tokio::test]
async fn test_repeated_requests_append_independent_records() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Repeat"), "same request").await;

    for _ in 0..3 {
        h.pipeline
            .run(GenerationRequest::new(owner_id, note_id))
            .await
            .unwrap();
    }

    let records = h.log.all();
    assert_eq!(records.len(), 3);
    let distinct_ids: std::collections::HashSet<_> = records.iter().map(|r| r.id).collect();
    assert_eq!(distinct_ids.len(), 3);

    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert_eq!(note.images.len(), 3);
}

#[tokio::test]
async fn test_dispatcher_runs_task_and_emits_events() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images), PipelineConfig::default());

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Async"), "a dispatched scene").await;

    let dispatcher = GenerationDispatcher::new(h.pipeline.clone());
    let mut events = dispatcher.events();

    let task_id = dispatcher.dispatch(GenerationRequest::new(owner_id, note_id));

    let started = events.recv().await.unwrap();
    assert!(matches!(
        started,
        GenerationEvent::Started { task_id: t, note_id: n } if t == task_id && n == note_id
    ));

    let completed = events.recv().await.unwrap();
    match completed {
        GenerationEvent::Completed {
            task_id: t,
            note_id: n,
            ..
        } => {
            assert_eq!(t, task_id);
            assert_eq!(n, note_id);
        }
        other => panic!("expected Completed, got {other:?}"),
    }

    let note = h.notes.fetch(note_id, owner_id).await.unwrap();
    assert!(note.has_images);
}

#[tokio::test]
async fn test_dispatcher_reports_fatal_errors_as_events() {
    let images = Arc::new(MockImageBackend::new());
    let h = harness(None, Some(images), PipelineConfig::default());
    h.objects.set_fail_stores(true);

    let owner_id = Uuid::new_v4();
    let note_id = create_note(&h, owner_id, Some("Fatal"), "a doomed scene").await;

    let dispatcher = GenerationDispatcher::new(h.pipeline.clone());
    let mut events = dispatcher.events();
    dispatcher.dispatch(GenerationRequest::new(owner_id, note_id));

    let _started = events.recv().await.unwrap();
    let failed = events.recv().await.unwrap();
    assert!(matches!(failed, GenerationEvent::Failed { .. }));
}
