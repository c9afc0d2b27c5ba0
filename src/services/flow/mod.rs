//! Consultation Flow
//!
//! Guided triage session: intake conversation, staged analysis simulation
//! and result hand-off, driven by a single timer loop per session.

mod controller;
mod conversation;
mod events;
mod orchestrator;
mod runtime;
mod session;

pub use controller::ResultHandoff;
pub use events::FlowEvent;
pub use runtime::FlowService;
pub use session::{
    FlowSession, FlowSnapshot, StepAdvance, TickOutcome, CONFIDENCE_STEP_INDEX,
};
