//! Flow Session
//!
//! The single state aggregate of a consultation: stage, analysis steps,
//! conversation log and presentation flags. All mutations are synchronous and
//! validate against current state before applying, so a caller holding the
//! session lock can never observe or create a half-applied transition.
//!
//! Mutations queue [`FlowEvent`]s in an outbox which the service drains and
//! publishes while it still holds the lock.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use guided_triage_core::{
    boosted_confidence, is_step_complete, step_progress, CoreError, CoreResult, Hospital, Message,
    MessageOrigin, Stage, Step, StepStatus, TaskStatus, MAX_CONFIDENCE,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::catalog::Catalog;

use super::events::FlowEvent;

/// Index of the step that carries a confidence estimate
pub const CONFIDENCE_STEP_INDEX: usize = 0;

/// Result of one progress tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Progress advanced; the task keeps ticking
    Advanced,
    /// The task completed on this tick. `step_ready` is set when that made
    /// every task of the step complete.
    Completed { step_ready: bool },
    /// Task or step is no longer running; the tick loop ends
    Stopped,
}

/// What follows a recorded step completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAdvance {
    /// The step was already recorded; nothing changed
    AlreadyRecorded,
    /// Run this step next
    Next(usize),
    /// That was the last step
    Finished,
}

/// Read-only copy of the session for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub stage: Stage,
    pub generation: u64,
    pub current_step: Option<usize>,
    pub completed_steps: Vec<usize>,
    pub steps: Vec<Step>,
    pub messages: Vec<Message>,
    pub selected_hospital: Option<Hospital>,
    pub input_text: String,
    pub is_typing: bool,
    pub turns: usize,
    pub intake_complete: bool,
    pub conversation_collapsed: bool,
}

impl FlowSnapshot {
    pub fn step(&self, step_id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == step_id)
    }
}

#[derive(Debug)]
pub struct FlowSession {
    /// New for every reset
    session_id: String,
    started_at: DateTime<Utc>,
    stage: Stage,
    steps: Vec<Step>,
    current_step: Option<usize>,
    /// Insertion ordered, never shrinks within a run
    completed_steps: Vec<usize>,
    /// Steps whose tasks are all complete, waiting for their completion event
    settling: BTreeSet<usize>,
    messages: Vec<Message>,
    selected_hospital: Option<Hospital>,
    input_text: String,
    is_typing: bool,
    pending_replies: usize,
    turns: usize,
    intake_complete: bool,
    conversation_collapsed: bool,
    /// Bumped on every restart; timers from older generations are ignored
    generation: u64,
    cancel: CancellationToken,
    outbox: Vec<FlowEvent>,
}

impl FlowSession {
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            stage: Stage::Intake,
            steps: catalog.fresh_steps(),
            current_step: None,
            completed_steps: Vec::new(),
            settling: BTreeSet::new(),
            messages: Vec::new(),
            selected_hospital: None,
            input_text: String::new(),
            is_typing: false,
            pending_replies: 0,
            turns: 0,
            intake_complete: false,
            conversation_collapsed: false,
            generation: 0,
            cancel: CancellationToken::new(),
            outbox: Vec::new(),
        }
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn current_step(&self) -> Option<usize> {
        self.current_step
    }

    pub fn completed_steps(&self) -> &[usize] {
        &self.completed_steps
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn selected_hospital(&self) -> Option<&Hospital> {
        self.selected_hospital.as_ref()
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn intake_complete(&self) -> bool {
        self.intake_complete
    }

    /// Token cancelled when this session is reset
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn step_index(&self, step_id: &str) -> CoreResult<usize> {
        self.steps
            .iter()
            .position(|s| s.id == step_id)
            .ok_or_else(|| CoreError::not_found(format!("step '{}'", step_id)))
    }

    pub fn drain_events(&mut self) -> Vec<FlowEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn snapshot(&self) -> FlowSnapshot {
        FlowSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            stage: self.stage,
            generation: self.generation,
            current_step: self.current_step,
            completed_steps: self.completed_steps.clone(),
            steps: self.steps.clone(),
            messages: self.messages.clone(),
            selected_hospital: self.selected_hospital.clone(),
            input_text: self.input_text.clone(),
            is_typing: self.is_typing,
            turns: self.turns,
            intake_complete: self.intake_complete,
            conversation_collapsed: self.conversation_collapsed,
        }
    }

    // ── Conversation ───────────────────────────────────────────────────

    pub fn record_hospital(&mut self, hospital: Hospital) {
        self.outbox.push(FlowEvent::HospitalSelected {
            hospital_id: hospital.id.clone(),
        });
        self.selected_hospital = Some(hospital);
    }

    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.input_text = text.into();
    }

    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    /// Append a turn to the log and mark a reply as pending.
    ///
    /// Returns the 0-based turn number, or `None` when `text` is blank.
    pub fn accept_turn(&mut self, origin: MessageOrigin, text: &str) -> Option<usize> {
        let content = text.trim();
        if content.is_empty() {
            return None;
        }

        let message = Message::new(origin, content);
        self.messages.push(message.clone());
        self.outbox.push(FlowEvent::MessageAppended { message });
        if origin == MessageOrigin::User {
            self.input_text.clear();
        }

        let turn = self.turns;
        self.turns += 1;
        self.pending_replies += 1;
        self.set_typing(true);
        Some(turn)
    }

    /// Append the assistant reply for `turn`.
    ///
    /// Returns true when this reply completed intake; that happens at most
    /// once per session.
    pub fn deliver_reply(&mut self, turn: usize, content: &str, intake_turns: usize) -> bool {
        let message = Message::new(MessageOrigin::Assistant, content);
        self.messages.push(message.clone());
        self.outbox.push(FlowEvent::MessageAppended { message });

        self.pending_replies = self.pending_replies.saturating_sub(1);
        if self.pending_replies == 0 {
            self.set_typing(false);
        }

        if !self.intake_complete && turn + 1 >= intake_turns {
            self.intake_complete = true;
            self.outbox.push(FlowEvent::IntakeComplete);
            return true;
        }
        false
    }

    fn set_typing(&mut self, is_typing: bool) {
        if self.is_typing != is_typing {
            self.is_typing = is_typing;
            self.outbox.push(FlowEvent::TypingChanged { is_typing });
        }
    }

    // ── Stage control ──────────────────────────────────────────────────

    fn change_stage(&mut self, to: Stage) {
        let from = self.stage;
        self.stage = to;
        self.outbox.push(FlowEvent::StageChanged { from, to });
    }

    /// intake -> analysis with a fresh step sequence
    pub fn begin_analysis(&mut self, catalog: &Catalog) -> CoreResult<()> {
        if self.stage != Stage::Intake {
            return Err(CoreError::invalid_transition(format!(
                "cannot start analysis from stage '{}'",
                self.stage
            )));
        }
        if !self.intake_complete {
            return Err(CoreError::invalid_transition("intake has not completed"));
        }

        self.steps = catalog.fresh_steps();
        self.current_step = Some(0);
        self.completed_steps.clear();
        self.settling.clear();
        self.conversation_collapsed = true;
        self.change_stage(Stage::Analysis);
        Ok(())
    }

    /// Record a step as completed and collapse it.
    ///
    /// Calling this again for the same index changes nothing.
    pub fn complete_step(&mut self, step_index: usize) -> CoreResult<StepAdvance> {
        if step_index >= self.steps.len() {
            return Err(CoreError::out_of_range(format!(
                "step index {} (have {} steps)",
                step_index,
                self.steps.len()
            )));
        }
        if self.completed_steps.contains(&step_index) {
            return Ok(StepAdvance::AlreadyRecorded);
        }
        if self.stage != Stage::Analysis {
            return Err(CoreError::invalid_transition(format!(
                "cannot complete a step in stage '{}'",
                self.stage
            )));
        }
        let step = &self.steps[step_index];
        if !step.is_in_progress() || !is_step_complete(&step.tasks) {
            return Err(CoreError::invalid_transition(format!(
                "step '{}' has not finished its tasks",
                step.id
            )));
        }

        self.completed_steps.push(step_index);
        self.settling.remove(&step_index);
        for (index, step) in self.steps.iter_mut().enumerate() {
            if index == step_index {
                step.overall_status = StepStatus::Completed;
                step.overall_progress = 100;
                step.can_proceed = true;
                step.expanded = false;
            } else if index < step_index {
                step.expanded = false;
            }
        }
        self.current_step = Some(step_index + 1);
        self.outbox.push(FlowEvent::StepCompleted {
            step_index,
            step_id: self.steps[step_index].id.clone(),
        });

        if step_index + 1 < self.steps.len() {
            Ok(StepAdvance::Next(step_index + 1))
        } else {
            Ok(StepAdvance::Finished)
        }
    }

    /// analysis -> result, once every step has completed
    pub fn finish_analysis(&mut self) -> CoreResult<()> {
        if self.stage != Stage::Analysis {
            return Err(CoreError::invalid_transition(format!(
                "cannot show results from stage '{}'",
                self.stage
            )));
        }
        if self.completed_steps.len() < self.steps.len() {
            return Err(CoreError::invalid_transition(format!(
                "{} of {} steps completed",
                self.completed_steps.len(),
                self.steps.len()
            )));
        }
        self.change_stage(Stage::Result);
        Ok(())
    }

    /// Flip the expanded flag of a completed step. Returns the new value.
    pub fn toggle_step_expansion(&mut self, step_id: &str) -> CoreResult<bool> {
        let index = self.step_index(step_id)?;
        let step = &mut self.steps[index];
        if !step.is_completed() {
            return Err(CoreError::invalid_transition(format!(
                "step '{}' is {} and cannot be toggled",
                step.id, step.overall_status
            )));
        }
        step.expanded = !step.expanded;
        Ok(step.expanded)
    }

    /// Returns the new collapsed value
    pub fn toggle_conversation_collapsed(&mut self) -> bool {
        self.conversation_collapsed = !self.conversation_collapsed;
        self.conversation_collapsed
    }

    /// Full session reset. Cancels every timer of the current generation.
    pub fn reset(&mut self, catalog: &Catalog) {
        self.cancel.cancel();
        let generation = self.generation + 1;
        *self = Self {
            generation,
            ..Self::new(catalog)
        };
        self.outbox.push(FlowEvent::SessionRestarted { generation });
    }

    // ── Progress orchestration ─────────────────────────────────────────

    /// True while the step accepts task progress
    fn is_step_running(&self, step_index: usize) -> bool {
        self.stage == Stage::Analysis
            && !self.completed_steps.contains(&step_index)
            && !self.settling.contains(&step_index)
            && self
                .steps
                .get(step_index)
                .map_or(false, Step::is_in_progress)
    }

    /// Mark a step in progress and expand it, collapsing every other step.
    ///
    /// Returns `Ok(false)` without changing anything when the step is already
    /// completed or already running.
    pub fn start_step(&mut self, step_index: usize) -> CoreResult<bool> {
        if self.stage != Stage::Analysis {
            return Err(CoreError::invalid_transition(format!(
                "cannot run a step in stage '{}'",
                self.stage
            )));
        }
        if step_index >= self.steps.len() {
            return Err(CoreError::out_of_range(format!(
                "step index {} (have {} steps)",
                step_index,
                self.steps.len()
            )));
        }
        if self.completed_steps.contains(&step_index) || self.steps[step_index].is_in_progress() {
            return Ok(false);
        }
        if let Some(previous) = step_index.checked_sub(1) {
            if !self.completed_steps.contains(&previous) {
                return Err(CoreError::invalid_transition(format!(
                    "step {} cannot start before step {} completes",
                    step_index, previous
                )));
            }
        }

        self.current_step = Some(step_index);
        for (index, step) in self.steps.iter_mut().enumerate() {
            if index == step_index {
                step.overall_status = StepStatus::InProgress;
                step.overall_progress = 0;
                step.expanded = true;
            } else {
                step.expanded = false;
            }
        }
        self.outbox.push(FlowEvent::StepStarted {
            step_index,
            step_id: self.steps[step_index].id.clone(),
        });
        Ok(true)
    }

    /// pending -> in_progress for one task of a running step
    pub fn start_task(&mut self, step_index: usize, task_index: usize) -> bool {
        if !self.is_step_running(step_index) {
            return false;
        }
        let Some(task) = self.steps[step_index].tasks.get_mut(task_index) else {
            return false;
        };
        if !task.start() {
            return false;
        }
        self.outbox.push(FlowEvent::TaskStarted {
            step_index,
            task_id: task.id.clone(),
        });
        true
    }

    /// Advance a running task by `increment` and recompute step progress
    pub fn advance_task(&mut self, step_index: usize, task_index: usize, increment: u8) -> TickOutcome {
        if !self.is_step_running(step_index) {
            return TickOutcome::Stopped;
        }
        let step = &mut self.steps[step_index];
        let Some(task) = step.tasks.get_mut(task_index) else {
            return TickOutcome::Stopped;
        };
        if task.status != TaskStatus::InProgress {
            return TickOutcome::Stopped;
        }

        let finished = task.advance(increment);
        let task_id = task.id.clone();
        let progress = task.progress;
        step.overall_progress = step_progress(&step.tasks);
        let overall = step.overall_progress;

        if finished {
            self.outbox.push(FlowEvent::TaskCompleted {
                step_index,
                task_id,
                by_user: false,
            });
        } else {
            self.outbox.push(FlowEvent::TaskProgress {
                step_index,
                task_id,
                progress,
            });
        }
        self.outbox.push(FlowEvent::StepProgress {
            step_index,
            progress: overall,
        });

        if finished {
            TickOutcome::Completed {
                step_ready: self.check_step_complete(step_index),
            }
        } else {
            TickOutcome::Advanced
        }
    }

    /// Re-scan every task of a running step. When all are complete the step
    /// is pinned at 100% and marked as settling; returns true only on that
    /// first detection.
    pub fn check_step_complete(&mut self, step_index: usize) -> bool {
        if !self.is_step_running(step_index) {
            return false;
        }
        let step = &mut self.steps[step_index];
        if !is_step_complete(&step.tasks) {
            return false;
        }
        step.overall_progress = 100;
        self.settling.insert(step_index);
        self.outbox.push(FlowEvent::StepSettling { step_index });
        true
    }

    /// Force a task to completed on behalf of the user.
    ///
    /// On the confidence-bearing step the confidence is raised by `bonus`,
    /// starting from `base` when it has not been set yet. Returns true when
    /// this made the step ready to complete.
    pub fn apply_user_action(
        &mut self,
        step_id: &str,
        task_id: &str,
        base: u8,
        bonus: u8,
    ) -> CoreResult<bool> {
        if self.stage != Stage::Analysis {
            return Err(CoreError::invalid_transition(format!(
                "task actions are not accepted in stage '{}'",
                self.stage
            )));
        }
        let step_index = self.step_index(step_id)?;
        if self.completed_steps.contains(&step_index) {
            return Err(CoreError::already_completed(format!("step '{}'", step_id)));
        }

        let step = &mut self.steps[step_index];
        let task = step.task_mut(task_id).ok_or_else(|| {
            CoreError::not_found(format!("task '{}' in step '{}'", task_id, step_id))
        })?;
        if !task.allows_user_action && !task.status.needs_attention() {
            return Err(CoreError::validation(format!(
                "task '{}' does not accept user input",
                task_id
            )));
        }
        task.complete();

        let running = step.is_in_progress();
        if running {
            step.overall_progress = step_progress(&step.tasks);
        }
        let overall = step.overall_progress;
        self.outbox.push(FlowEvent::TaskCompleted {
            step_index,
            task_id: task_id.to_string(),
            by_user: true,
        });
        if running {
            self.outbox.push(FlowEvent::StepProgress {
                step_index,
                progress: overall,
            });
        }

        if step_index == CONFIDENCE_STEP_INDEX {
            let step = &mut self.steps[step_index];
            let confidence = boosted_confidence(step.confidence, base, bonus);
            step.confidence = Some(confidence);
            self.outbox.push(FlowEvent::ConfidenceUpdated {
                step_index,
                confidence,
            });
        }

        Ok(self.check_step_complete(step_index))
    }

    /// Flag a running task as warning or failed
    pub fn report_task_status(
        &mut self,
        step_id: &str,
        task_id: &str,
        status: TaskStatus,
        message: Option<String>,
    ) -> CoreResult<()> {
        if !status.needs_attention() {
            return Err(CoreError::validation(format!(
                "only warning or failed can be reported, got '{}'",
                status
            )));
        }
        let step_index = self.step_index(step_id)?;
        if self.completed_steps.contains(&step_index) {
            return Err(CoreError::already_completed(format!("step '{}'", step_id)));
        }

        let step = &mut self.steps[step_index];
        let task = step.task_mut(task_id).ok_or_else(|| {
            CoreError::not_found(format!("task '{}' in step '{}'", task_id, step_id))
        })?;
        if task.status != TaskStatus::InProgress {
            return Err(CoreError::invalid_transition(format!(
                "task '{}' is {}, only in-progress tasks can be flagged",
                task_id, task.status
            )));
        }
        task.flag(status, message.clone());
        step.overall_progress = step_progress(&step.tasks);
        let overall = step.overall_progress;

        self.outbox.push(FlowEvent::TaskFlagged {
            step_index,
            task_id: task_id.to_string(),
            status,
            message,
        });
        self.outbox.push(FlowEvent::StepProgress {
            step_index,
            progress: overall,
        });
        Ok(())
    }

    /// Early confidence estimate; only written when none is set yet
    pub fn seed_confidence(&mut self, seed: u8) -> bool {
        if self.stage != Stage::Analysis {
            return false;
        }
        let Some(step) = self.steps.get_mut(CONFIDENCE_STEP_INDEX) else {
            return false;
        };
        if step.confidence.is_some() {
            return false;
        }
        let confidence = seed.min(MAX_CONFIDENCE);
        step.confidence = Some(confidence);
        self.outbox.push(FlowEvent::ConfidenceUpdated {
            step_index: CONFIDENCE_STEP_INDEX,
            confidence,
        });
        true
    }
}
