//! Structured logging field name constants for illume.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "prompt_builder", "fallback", "openrouter", "pool", "dispatcher"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "generate", "complete", "store", "attach_image"
pub const OPERATION: &str = "op";

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Owner UUID of the note or record.
pub const OWNER_ID: &str = "owner_id";

/// Generation task UUID.
pub const TASK_ID: &str = "task_id";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Character length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Model name used for a provider call.
pub const MODEL: &str = "model";

/// Fallback reason category when the provider chain degraded.
pub const FALLBACK_REASON: &str = "fallback_reason";

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
