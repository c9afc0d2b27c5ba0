//! Flow Event Definitions
//!
//! Events published on the flow's broadcast channel. They are emitted while
//! the session lock is held, so subscribers observe them in mutation order.

use guided_triage_core::{Message, Stage, TaskStatus};
use serde::{Deserialize, Serialize};

/// State change notification for observers of a flow session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    /// Hospital recorded as the consultation target
    HospitalSelected { hospital_id: String },
    /// Message appended to the conversation log
    MessageAppended { message: Message },
    /// Typing indicator changed
    TypingChanged { is_typing: bool },
    /// The final intake turn was answered
    IntakeComplete,
    /// Stage transition
    StageChanged { from: Stage, to: Stage },
    /// Step marked in progress
    StepStarted { step_index: usize, step_id: String },
    /// Task moved from pending to in progress
    TaskStarted { step_index: usize, task_id: String },
    /// Task progress tick
    TaskProgress {
        step_index: usize,
        task_id: String,
        progress: u8,
    },
    /// Task reached completed
    TaskCompleted {
        step_index: usize,
        task_id: String,
        by_user: bool,
    },
    /// Task flagged as warning or failed
    TaskFlagged {
        step_index: usize,
        task_id: String,
        status: TaskStatus,
        message: Option<String>,
    },
    /// Step-level progress recomputed
    StepProgress { step_index: usize, progress: u8 },
    /// Every task of the step is complete; completion follows after settling
    StepSettling { step_index: usize },
    /// Step recorded as completed
    StepCompleted { step_index: usize, step_id: String },
    /// Confidence of the confidence-bearing step changed
    ConfidenceUpdated { step_index: usize, confidence: u8 },
    /// Whole session reset
    SessionRestarted { generation: u64 },
}

impl FlowEvent {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            FlowEvent::HospitalSelected { .. } => "hospital_selected",
            FlowEvent::MessageAppended { .. } => "message_appended",
            FlowEvent::TypingChanged { .. } => "typing_changed",
            FlowEvent::IntakeComplete => "intake_complete",
            FlowEvent::StageChanged { .. } => "stage_changed",
            FlowEvent::StepStarted { .. } => "step_started",
            FlowEvent::TaskStarted { .. } => "task_started",
            FlowEvent::TaskProgress { .. } => "task_progress",
            FlowEvent::TaskCompleted { .. } => "task_completed",
            FlowEvent::TaskFlagged { .. } => "task_flagged",
            FlowEvent::StepProgress { .. } => "step_progress",
            FlowEvent::StepSettling { .. } => "step_settling",
            FlowEvent::StepCompleted { .. } => "step_completed",
            FlowEvent::ConfidenceUpdated { .. } => "confidence_updated",
            FlowEvent::SessionRestarted { .. } => "session_restarted",
        }
    }
}
