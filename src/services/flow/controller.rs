//! Stage Controller
//!
//! Owns the intake -> analysis -> result progression, step completion
//! bookkeeping, presentation toggles and session restart.

use guided_triage_core::{CoreResult, Hospital, Stage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::catalog::DepartmentRecommendation;

use super::runtime::{FlowService, TimerKind};
use super::session::{FlowSession, StepAdvance};

/// Everything the result view needs once analysis has finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultHandoff {
    pub hospital: Hospital,
    pub recommendations: Vec<DepartmentRecommendation>,
}

impl FlowService {
    /// Move from intake to analysis and schedule the first step
    pub async fn start_analysis(&self) -> CoreResult<()> {
        let mut session = self.lock().await;
        let result = self.start_analysis_locked(&mut session);
        self.publish(&mut session);
        result
    }

    /// Record the step at `step_index` as completed and schedule what comes
    /// next. Repeated calls for the same step have no further effect.
    pub async fn on_step_completed(&self, step_index: usize) -> CoreResult<()> {
        let mut session = self.lock().await;
        let result = self.on_step_completed_locked(&mut session, step_index);
        self.publish(&mut session);
        result
    }

    /// Expand or collapse a completed step. Returns the new expanded value.
    pub async fn toggle_step_expansion(&self, step_id: &str) -> CoreResult<bool> {
        self.lock().await.toggle_step_expansion(step_id)
    }

    /// Returns the new collapsed value
    pub async fn toggle_conversation_collapsed(&self) -> bool {
        self.lock().await.toggle_conversation_collapsed()
    }

    /// Discard the whole session and start over at intake. Pending timers of
    /// the old session never fire.
    pub async fn restart(&self) {
        let mut session = self.lock().await;
        session.reset(self.catalog());
        info!(generation = session.generation(), "flow: session restarted");
        self.publish(&mut session);
    }

    /// Result hand-off, available once the result stage is reached with a
    /// hospital selected
    pub async fn recommendations(&self) -> Option<ResultHandoff> {
        let session = self.read().await;
        if session.stage() != Stage::Result {
            return None;
        }
        let hospital = session.selected_hospital()?.clone();
        Some(ResultHandoff {
            hospital,
            recommendations: self.catalog().recommendations.clone(),
        })
    }

    pub(crate) fn start_analysis_locked(&self, session: &mut FlowSession) -> CoreResult<()> {
        session.begin_analysis(self.catalog())?;
        info!(steps = session.steps().len(), "flow: analysis started");
        self.schedule(
            session,
            self.config().analysis_start_delay(),
            TimerKind::RunStep { step_index: 0 },
        );
        Ok(())
    }

    pub(crate) fn on_step_completed_locked(
        &self,
        session: &mut FlowSession,
        step_index: usize,
    ) -> CoreResult<()> {
        match session.complete_step(step_index)? {
            StepAdvance::AlreadyRecorded => {
                debug!(step_index, "flow: step completion already recorded");
            }
            StepAdvance::Next(next) => {
                info!(step_index, next, "flow: step completed");
                self.schedule(
                    session,
                    self.config().next_step_delay(),
                    TimerKind::RunStep { step_index: next },
                );
            }
            StepAdvance::Finished => {
                info!(step_index, "flow: final step completed");
                self.schedule(session, self.config().result_delay(), TimerKind::ShowResult);
            }
        }
        Ok(())
    }

    pub(crate) fn show_result_locked(&self, session: &mut FlowSession) -> CoreResult<()> {
        session.finish_analysis()?;
        info!("flow: analysis finished");
        Ok(())
    }
}
