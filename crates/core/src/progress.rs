//! Progress aggregation
//!
//! Pure functions shared by the orchestrator and its tests.

use crate::model::Task;

/// Upper bound for any confidence value
pub const MAX_CONFIDENCE: u8 = 100;

/// Step-level progress: the rounded mean of task contributions, as a percentage.
///
/// A completed task contributes 1.0, an in-progress task `progress / 100`,
/// anything else 0. An empty task list counts as fully done.
pub fn step_progress(tasks: &[Task]) -> u8 {
    if tasks.is_empty() {
        return 100;
    }
    let total: f64 = tasks.iter().map(Task::contribution).sum();
    let percent = (total / tasks.len() as f64 * 100.0).round();
    percent.clamp(0.0, 100.0) as u8
}

/// Every task has reached `completed`.
pub fn is_step_complete(tasks: &[Task]) -> bool {
    tasks.iter().all(Task::is_completed)
}

/// Apply a confidence bonus, starting from `base` when nothing is set yet.
pub fn boosted_confidence(current: Option<u8>, base: u8, bonus: u8) -> u8 {
    current
        .unwrap_or(base)
        .saturating_add(bonus)
        .min(MAX_CONFIDENCE)
}
