//! Flow Data Model
//!
//! Value types for the consultation flow: stages, analysis steps and their
//! tasks, conversation messages and hospitals. All types are plain data with
//! value semantics so that a fresh step sequence never shares structure with
//! a previous one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Top-level phase of a consultation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Conversational intake
    Intake,
    /// Staged analysis simulation
    Analysis,
    /// Recommendations may be shown
    Result,
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Intake
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "intake",
            Stage::Analysis => "analysis",
            Stage::Result => "result",
        }
    }

    /// The only stage this one may advance to, if any
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Intake => Some(Stage::Analysis),
            Stage::Analysis => Some(Stage::Result),
            Stage::Result => None,
        }
    }
}

/// Status of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    /// Needs user attention, recoverable via a user action
    Warning,
    /// Needs user attention, recoverable via a user action
    Failed,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Warning => "warning",
            TaskStatus::Failed => "failed",
        }
    }

    /// Parse status from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(TaskStatus::Pending),
            "in_progress" | "in-progress" | "progress" => Some(TaskStatus::InProgress),
            "completed" => Some(TaskStatus::Completed),
            "warning" => Some(TaskStatus::Warning),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    /// Degraded states surfaced to the user
    pub fn needs_attention(&self) -> bool {
        matches!(self, TaskStatus::Warning | TaskStatus::Failed)
    }
}

/// Aggregated status of a step. Steps only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::InProgress => write!(f, "in_progress"),
            StepStatus::Completed => write!(f, "completed"),
        }
    }
}

/// A unit of simulated work inside a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within its step
    pub id: String,
    /// Display label
    pub name: String,
    pub status: TaskStatus,
    /// 0-100
    pub progress: u8,
    /// Explanation for warning/failed
    pub message: Option<String>,
    /// Whether the user can supply input to finish this task
    pub allows_user_action: bool,
    /// Label of the user action button, e.g. "Upload"
    pub action_label: Option<String>,
}

impl Task {
    /// Create a pending task
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            progress: 0,
            message: None,
            allows_user_action: false,
            action_label: None,
        }
    }

    /// Allow a user action with the given label
    pub fn with_action(mut self, label: impl Into<String>) -> Self {
        self.allows_user_action = true;
        self.action_label = Some(label.into());
        self
    }

    /// pending -> in_progress at 0%. Returns false if the task was not pending.
    pub fn start(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::InProgress;
        self.progress = 0;
        true
    }

    /// Add `increment` percentage points. Reaching 100 completes the task.
    ///
    /// Returns true when this call completed the task. Has no effect unless
    /// the task is in progress.
    pub fn advance(&mut self, increment: u8) -> bool {
        if self.status != TaskStatus::InProgress {
            return false;
        }
        let next = self.progress as u16 + increment as u16;
        if next >= 100 {
            self.complete();
            true
        } else {
            self.progress = next as u8;
            false
        }
    }

    /// Force to completed/100 from any state
    pub fn complete(&mut self) {
        self.status = TaskStatus::Completed;
        self.progress = 100;
        self.message = None;
    }

    /// Flag a degraded state with an explanation
    pub fn flag(&mut self, status: TaskStatus, message: Option<String>) {
        self.status = status;
        self.message = message;
    }

    /// Share of the step this task has contributed, in [0, 1]
    pub fn contribution(&self) -> f64 {
        match self.status {
            TaskStatus::Completed => 1.0,
            TaskStatus::InProgress => self.progress as f64 / 100.0,
            _ => 0.0,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// An ordered group of tasks forming one analysis phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub title: String,
    pub icon: String,
    pub description: String,
    /// Execution order
    pub tasks: Vec<Task>,
    pub overall_status: StepStatus,
    /// 0-100, derived from tasks
    pub overall_progress: u8,
    /// Only populated for the confidence-bearing step
    pub confidence: Option<u8>,
    pub expanded: bool,
    pub can_proceed: bool,
}

impl Step {
    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == task_id)
    }

    pub fn is_completed(&self) -> bool {
        self.overall_status == StepStatus::Completed
    }

    pub fn is_in_progress(&self) -> bool {
        self.overall_status == StepStatus::InProgress
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    User,
    Assistant,
    System,
}

/// Entry in the append-only conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub origin: MessageOrigin,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(origin: MessageOrigin, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            origin,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// A hospital the user can consult
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hospital {
    pub id: String,
    pub name: String,
    /// e.g. "General hospital"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl Hospital {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: kind.into(),
            logo: None,
        }
    }
}
