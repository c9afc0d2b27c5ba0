//! Guided Triage Core
//!
//! Foundational data model, progress aggregation, samplers and error types for
//! the Guided Triage workspace. This crate has no dependency on the async
//! runtime or on application-level code.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `model` - Stages, steps, tasks, messages and hospitals
//! - `progress` - Pure aggregation helpers (`step_progress`, `is_step_complete`)
//! - `sampler` - Injectable progress increment sources

pub mod error;
pub mod model;
pub mod progress;
pub mod sampler;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Data Model ─────────────────────────────────────────────────────────
pub use model::{Hospital, Message, MessageOrigin, Stage, Step, StepStatus, Task, TaskStatus};

// ── Progress Aggregation ───────────────────────────────────────────────
pub use progress::{boosted_confidence, is_step_complete, step_progress, MAX_CONFIDENCE};

// ── Samplers ───────────────────────────────────────────────────────────
pub use sampler::{FixedSampler, ProgressSampler, RandomSampler};
