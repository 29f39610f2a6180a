//! Fire-and-forget scheduling of generation tasks.
//!
//! Each dispatched request runs as its own tokio task: one task never
//! blocks another, there is no retry at this layer (fallbacks live inside
//! the pipeline), and there is no cancel API — once scheduled, a task runs
//! to completion or fatal error. Progress is observable on a broadcast
//! channel and through the note's `generated_prompt` marker.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use illume_core::{defaults, GenerationRequest, Result};

use crate::pipeline::{GenerationPipeline, QuotaStatus};

/// Event emitted by the dispatcher for a generation task.
#[derive(Debug, Clone)]
pub enum GenerationEvent {
    /// A task was scheduled and started.
    Started { task_id: Uuid, note_id: Uuid },
    /// A task finished successfully (real or fallback image).
    Completed {
        task_id: Uuid,
        note_id: Uuid,
        image_id: Uuid,
    },
    /// A task hit a fatal error (storage, missing note).
    Failed {
        task_id: Uuid,
        note_id: Uuid,
        error: String,
    },
}

/// Dispatcher owning the pipeline and an event bus.
pub struct GenerationDispatcher {
    pipeline: Arc<GenerationPipeline>,
    event_tx: broadcast::Sender<GenerationEvent>,
}

impl GenerationDispatcher {
    /// Create a new dispatcher around a pipeline.
    pub fn new(pipeline: Arc<GenerationPipeline>) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self { pipeline, event_tx }
    }

    /// Access the underlying pipeline (for synchronous callers).
    pub fn pipeline(&self) -> &Arc<GenerationPipeline> {
        &self.pipeline
    }

    /// Get a receiver for task events.
    pub fn events(&self) -> broadcast::Receiver<GenerationEvent> {
        self.event_tx.subscribe()
    }

    /// Check the caller's quota without scheduling anything.
    ///
    /// Runs synchronously before dispatch so `RateLimited` reaches the
    /// caller instead of dying inside a detached task.
    pub async fn check_quota(&self, owner_id: Uuid) -> Result<QuotaStatus> {
        self.pipeline.check_quota(owner_id).await
    }

    /// Schedule a generation task to run asynchronously, once, as soon as
    /// possible. Returns the task id immediately.
    pub fn dispatch(&self, request: GenerationRequest) -> Uuid {
        let task_id = Uuid::now_v7();
        let note_id = request.note_id;
        let pipeline = self.pipeline.clone();
        let event_tx = self.event_tx.clone();

        info!(
            subsystem = "pipeline",
            component = "dispatcher",
            task_id = %task_id,
            note_id = %note_id,
            "Generation task scheduled"
        );
        let _ = event_tx.send(GenerationEvent::Started { task_id, note_id });

        tokio::spawn(async move {
            match pipeline.run(request).await {
                Ok(outcome) => {
                    let _ = event_tx.send(GenerationEvent::Completed {
                        task_id,
                        note_id,
                        image_id: outcome.image_id,
                    });
                }
                Err(e) => {
                    let _ = event_tx.send(GenerationEvent::Failed {
                        task_id,
                        note_id,
                        error: e.to_string(),
                    });
                }
            }
        });

        task_id
    }
}
