//! Shared helpers for flow tests.
//!
//! Tests run on a paused tokio clock with the default pacing and a constant
//! progress increment of 25, which gives this timeline (ms from start):
//!
//! - 0: hospital selected, acknowledgement at 500 (turn 0)
//! - 600, 700: user turns 1 and 2
//! - 2200: reply to turn 2 completes intake
//! - 3200: analysis starts, 3500: step 0 runs
//! - task `i` of a step starts 800 * i after the step and completes 800 later
//! - 5500: confidence seed for step 0
//! - 8800: step 0 completes, 9600: step 1 runs
//! - 14100 / 20200 / 26300: steps 1, 2 and 3 complete
//! - 27800: result stage
//!
//! Checkpoints are placed between these instants so no assertion races a
//! timer firing at the same virtual time.

use std::sync::Arc;
use std::time::Duration;

use guided_triage::{Catalog, FixedSampler, FlowConfig, FlowEvent, FlowService};
use tokio::sync::broadcast;
use tokio::time::Instant;

pub const ANALYSIS_RUNNING: u64 = 3550;
pub const STEP_ZERO_DONE: u64 = 9000;
pub const RESULT_SHOWN: u64 = 28500;

pub fn service() -> FlowService {
    let sampler = FixedSampler::constant(25).unwrap();
    FlowService::with_sampler(Catalog::builtin(), FlowConfig::default(), Arc::new(sampler)).unwrap()
}

/// Virtual clock anchored at test start
pub struct Clock {
    start: Instant,
}

impl Clock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub async fn advance_to(&self, ms: u64) {
        tokio::time::sleep_until(self.start + Duration::from_millis(ms)).await;
    }
}

/// Select a hospital and send two symptom turns; intake completes at 2200
pub async fn complete_intake(service: &FlowService, clock: &Clock) {
    service.select_hospital("zrfy").await.unwrap();
    clock.advance_to(600).await;
    service.send_message("Chest pain").await.unwrap();
    clock.advance_to(700).await;
    service.send_message("It hurts when I breathe in").await.unwrap();
}

/// Everything currently buffered on the receiver
pub fn drain(events: &mut broadcast::Receiver<FlowEvent>) -> Vec<FlowEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}
