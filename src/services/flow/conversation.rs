//! Conversation
//!
//! Intake dialogue: hospital selection, user turns, symptom shortcuts and the
//! scripted assistant replies that follow each turn.

use guided_triage_core::{CoreError, CoreResult, MessageOrigin};
use tracing::{debug, info};

use super::runtime::{FlowService, TimerKind};
use super::session::FlowSession;

impl FlowService {
    /// Record the target hospital. A system acknowledgement joins the
    /// conversation shortly after and counts as a turn.
    pub async fn select_hospital(&self, hospital_id: &str) -> CoreResult<()> {
        let hospital = self
            .catalog()
            .hospital(hospital_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(format!("hospital '{}'", hospital_id)))?;

        let mut session = self.lock().await;
        info!(hospital = %hospital.id, "flow: hospital selected");
        let content = format!("Selected {}, please describe your symptoms", hospital.name);
        session.record_hospital(hospital);
        self.schedule(
            &session,
            self.config().hospital_ack_delay(),
            TimerKind::HospitalAck { content },
        );
        self.publish(&mut session);
        Ok(())
    }

    /// Replace the draft input buffer
    pub async fn set_input_text(&self, text: impl Into<String>) {
        self.lock().await.set_input_text(text);
    }

    /// Submit a user turn. Blank text is ignored.
    pub async fn send_message(&self, text: &str) -> CoreResult<()> {
        let mut session = self.lock().await;
        self.submit_turn_locked(&mut session, MessageOrigin::User, text);
        self.publish(&mut session);
        Ok(())
    }

    /// Submit the current draft input buffer as a user turn
    pub async fn send_input(&self) -> CoreResult<()> {
        let mut session = self.lock().await;
        let text = session.input_text().to_string();
        self.submit_turn_locked(&mut session, MessageOrigin::User, &text);
        self.publish(&mut session);
        Ok(())
    }

    /// Submit one of the catalog's symptom shortcuts as a user turn
    pub async fn select_symptom_tag(&self, tag: &str) -> CoreResult<()> {
        if !self.catalog().has_symptom_tag(tag) {
            return Err(CoreError::not_found(format!("symptom tag '{}'", tag)));
        }
        self.send_message(tag).await
    }

    pub(crate) fn submit_turn_locked(
        &self,
        session: &mut FlowSession,
        origin: MessageOrigin,
        text: &str,
    ) {
        let Some(turn) = session.accept_turn(origin, text) else {
            debug!("flow: ignoring blank message");
            return;
        };
        debug!(turn, ?origin, "flow: turn accepted");
        self.schedule(session, self.config().reply_delay(), TimerKind::Reply { turn });
    }

    pub(crate) fn deliver_reply_locked(&self, session: &mut FlowSession, turn: usize) {
        let reply = self.catalog().reply_for_turn(turn).to_string();
        if session.deliver_reply(turn, &reply, self.config().intake_turns) {
            info!(turns = turn + 1, "flow: intake complete");
            self.schedule(
                session,
                self.config().intake_to_analysis_delay(),
                TimerKind::StartAnalysis,
            );
        }
    }
}
