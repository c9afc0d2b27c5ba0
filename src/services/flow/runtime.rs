//! Flow Runtime
//!
//! [`FlowService`] owns one [`FlowSession`] behind an async lock and drives
//! its delayed transitions. Delays are modelled as [`Timer`]s: each one is a
//! spawned sleep that posts back to a single driver task, which applies the
//! timer under the session lock. A timer carries the session generation it
//! was scheduled in and is dropped when that generation has been reset.

use std::sync::{Arc, Weak};
use std::time::Duration;

use guided_triage_core::{CoreError, CoreResult, MessageOrigin, ProgressSampler};
use tokio::sync::{broadcast, mpsc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, warn};

use crate::models::catalog::Catalog;
use crate::models::config::FlowConfig;

use super::events::FlowEvent;
use super::session::{FlowSession, FlowSnapshot};

/// Delayed work for the driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimerKind {
    /// System acknowledgement of a hospital selection
    HospitalAck { content: String },
    /// Assistant reply to a turn
    Reply { turn: usize },
    StartAnalysis,
    RunStep { step_index: usize },
    TaskStart { step_index: usize, task_index: usize },
    TaskTick { step_index: usize, task_index: usize },
    /// Completion event for a step whose tasks are all complete
    SettleStep { step_index: usize },
    SeedConfidence,
    ShowResult,
}

#[derive(Debug)]
pub(crate) struct Timer {
    generation: u64,
    kind: TimerKind,
}

pub(crate) struct FlowInner {
    session: RwLock<FlowSession>,
    catalog: Arc<Catalog>,
    config: FlowConfig,
    sampler: Arc<dyn ProgressSampler>,
    events: broadcast::Sender<FlowEvent>,
    timers: mpsc::UnboundedSender<Timer>,
}

impl Drop for FlowInner {
    fn drop(&mut self) {
        self.session.get_mut().cancel_token().cancel();
    }
}

/// Handle to a running consultation flow. Clones share the same session.
#[derive(Clone)]
pub struct FlowService {
    pub(crate) inner: Arc<FlowInner>,
}

impl std::fmt::Debug for FlowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowService")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl FlowService {
    /// Create a service with an entropy-seeded progress sampler.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(catalog: Catalog, config: FlowConfig) -> CoreResult<Self> {
        let sampler = config.sampler()?;
        Self::with_sampler(catalog, config, Arc::new(sampler))
    }

    /// Create a service with an explicit progress sampler
    pub fn with_sampler(
        catalog: Catalog,
        config: FlowConfig,
        sampler: Arc<dyn ProgressSampler>,
    ) -> CoreResult<Self> {
        config.validate().map_err(CoreError::config)?;
        catalog.validate()?;

        let (events, _) = broadcast::channel(config.event_capacity);
        let (timers, timer_rx) = mpsc::unbounded_channel();
        let session = FlowSession::new(&catalog);

        let inner = Arc::new(FlowInner {
            session: RwLock::new(session),
            catalog: Arc::new(catalog),
            config,
            sampler,
            events,
            timers,
        });
        spawn_driver(Arc::downgrade(&inner), timer_rx);

        Ok(Self { inner })
    }

    /// Built-in catalog and default pacing
    pub fn builtin() -> CoreResult<Self> {
        Self::new(Catalog::builtin(), FlowConfig::default())
    }

    /// Receive every event published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.inner.events.subscribe()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn config(&self) -> &FlowConfig {
        &self.inner.config
    }

    pub async fn snapshot(&self) -> FlowSnapshot {
        self.read().await.snapshot()
    }

    pub(crate) async fn read(&self) -> RwLockReadGuard<'_, FlowSession> {
        self.inner.session.read().await
    }

    pub(crate) async fn lock(&self) -> RwLockWriteGuard<'_, FlowSession> {
        self.inner.session.write().await
    }

    pub(crate) fn sampler(&self) -> &dyn ProgressSampler {
        self.inner.sampler.as_ref()
    }

    /// Send queued events to subscribers. Called with the lock still held.
    pub(crate) fn publish(&self, session: &mut FlowSession) {
        for event in session.drain_events() {
            debug!(kind = event.kind(), "flow event");
            // No subscribers is not an error
            let _ = self.inner.events.send(event);
        }
    }

    /// Schedule `kind` to fire after `delay` within the session's current
    /// generation
    pub(crate) fn schedule(&self, session: &FlowSession, delay: Duration, kind: TimerKind) {
        let timer = Timer {
            generation: session.generation(),
            kind,
        };
        let token = session.cancel_token();
        let timers = self.inner.timers.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    let _ = timers.send(timer);
                }
            }
        });
    }

    async fn fire(&self, timer: Timer) {
        let mut session = self.lock().await;
        if session.generation() != timer.generation {
            debug!(
                timer_generation = timer.generation,
                generation = session.generation(),
                "flow: dropping stale timer"
            );
            return;
        }

        let result = match timer.kind.clone() {
            TimerKind::HospitalAck { content } => {
                self.submit_turn_locked(&mut session, MessageOrigin::System, &content);
                Ok(())
            }
            TimerKind::Reply { turn } => {
                self.deliver_reply_locked(&mut session, turn);
                Ok(())
            }
            TimerKind::StartAnalysis => self.start_analysis_locked(&mut session),
            TimerKind::RunStep { step_index } => self.run_step_locked(&mut session, step_index),
            TimerKind::TaskStart {
                step_index,
                task_index,
            } => {
                self.start_task_locked(&mut session, step_index, task_index);
                Ok(())
            }
            TimerKind::TaskTick {
                step_index,
                task_index,
            } => {
                self.tick_task_locked(&mut session, step_index, task_index);
                Ok(())
            }
            TimerKind::SettleStep { step_index } => {
                self.on_step_completed_locked(&mut session, step_index)
            }
            TimerKind::SeedConfidence => {
                self.seed_confidence_locked(&mut session);
                Ok(())
            }
            TimerKind::ShowResult => self.show_result_locked(&mut session),
        };

        if let Err(e) = result {
            warn!(timer = ?timer.kind, error = %e, "flow: timer rejected");
        }
        self.publish(&mut session);
    }
}

/// Apply timers one at a time until the service is dropped
fn spawn_driver(inner: Weak<FlowInner>, mut timer_rx: mpsc::UnboundedReceiver<Timer>) {
    tokio::spawn(async move {
        while let Some(timer) = timer_rx.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            FlowService { inner }.fire(timer).await;
        }
        debug!("flow: driver stopped");
    });
}
