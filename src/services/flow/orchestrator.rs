//! Step Orchestrator
//!
//! Runs analysis steps: staggered task starts, randomized progress ticks,
//! completion detection and the user/external paths that finish or flag a
//! task early.

use guided_triage_core::{CoreResult, TaskStatus};
use tracing::{debug, info, warn};

use super::runtime::{FlowService, TimerKind};
use super::session::{FlowSession, TickOutcome, CONFIDENCE_STEP_INDEX};

impl FlowService {
    /// Start the step at `step_index`.
    ///
    /// A step that is already running or completed is left untouched.
    pub async fn run_step(&self, step_index: usize) -> CoreResult<()> {
        let mut session = self.lock().await;
        let result = self.run_step_locked(&mut session, step_index);
        self.publish(&mut session);
        result
    }

    /// Complete a task on behalf of the user
    pub async fn handle_task_action(&self, step_id: &str, task_id: &str) -> CoreResult<()> {
        let mut session = self.lock().await;
        let config = self.config();
        let result = session.apply_user_action(
            step_id,
            task_id,
            config.confidence_base,
            config.action_bonus,
        );
        if let Ok(step_ready) = result {
            info!(step = step_id, task = task_id, "flow: task completed by user");
            if step_ready {
                self.schedule_settle(&session, step_id);
            }
        }
        self.publish(&mut session);
        result.map(|_| ())
    }

    /// Flag a running task as warning or failed. The task stops ticking and
    /// only a user action completes it.
    pub async fn report_task_status(
        &self,
        step_id: &str,
        task_id: &str,
        status: TaskStatus,
        message: Option<String>,
    ) -> CoreResult<()> {
        let mut session = self.lock().await;
        let result = session.report_task_status(step_id, task_id, status, message);
        if result.is_ok() {
            warn!(step = step_id, task = task_id, %status, "flow: task needs attention");
        }
        self.publish(&mut session);
        result
    }

    pub(crate) fn run_step_locked(
        &self,
        session: &mut FlowSession,
        step_index: usize,
    ) -> CoreResult<()> {
        if !session.start_step(step_index)? {
            debug!(step_index, "flow: step already running or completed");
            return Ok(());
        }

        let task_count = session.steps()[step_index].tasks.len();
        info!(step_index, task_count, "flow: running step");
        for task_index in 0..task_count {
            self.schedule(
                session,
                self.config().task_start_offset(task_index),
                TimerKind::TaskStart {
                    step_index,
                    task_index,
                },
            );
        }
        if step_index == CONFIDENCE_STEP_INDEX {
            self.schedule(
                session,
                self.config().confidence_seed_delay(),
                TimerKind::SeedConfidence,
            );
        }
        // A step without tasks is complete as soon as it starts
        if session.check_step_complete(step_index) {
            self.schedule(session, self.config().settle_delay(), TimerKind::SettleStep { step_index });
        }
        Ok(())
    }

    pub(crate) fn start_task_locked(
        &self,
        session: &mut FlowSession,
        step_index: usize,
        task_index: usize,
    ) {
        if session.start_task(step_index, task_index) {
            self.schedule(
                session,
                self.config().tick_interval(),
                TimerKind::TaskTick {
                    step_index,
                    task_index,
                },
            );
        }
    }

    pub(crate) fn tick_task_locked(
        &self,
        session: &mut FlowSession,
        step_index: usize,
        task_index: usize,
    ) {
        let increment = self.sampler().next_increment();
        match session.advance_task(step_index, task_index, increment) {
            TickOutcome::Advanced => self.schedule(
                session,
                self.config().tick_interval(),
                TimerKind::TaskTick {
                    step_index,
                    task_index,
                },
            ),
            TickOutcome::Completed { step_ready: true } => {
                debug!(step_index, "flow: all tasks complete");
                self.schedule(
                    session,
                    self.config().settle_delay(),
                    TimerKind::SettleStep { step_index },
                );
            }
            TickOutcome::Completed { step_ready: false } | TickOutcome::Stopped => {}
        }
    }

    pub(crate) fn seed_confidence_locked(&self, session: &mut FlowSession) {
        if session.seed_confidence(self.config().confidence_seed) {
            debug!(confidence = self.config().confidence_seed, "flow: confidence seeded");
        }
    }

    fn schedule_settle(&self, session: &FlowSession, step_id: &str) {
        if let Ok(step_index) = session.step_index(step_id) {
            self.schedule(
                session,
                self.config().settle_delay(),
                TimerKind::SettleStep { step_index },
            );
        }
    }
}
