//! Guided Triage
//!
//! Backend of a guided medical-consultation flow. A patient picks a hospital
//! and describes symptoms in a short scripted conversation; the flow then
//! runs a staged analysis simulation and hands off department
//! recommendations.
//!
//! - Command handlers for the presentation layer
//! - The flow service (session state, timers, events)
//! - Catalog, configuration and response models

pub mod commands;
pub mod models;
pub mod services;

pub use guided_triage_core::{
    CoreError, CoreResult, FixedSampler, Hospital, Message, MessageOrigin, ProgressSampler,
    RandomSampler, Stage, Step, StepStatus, Task, TaskStatus,
};
pub use models::{Catalog, CommandResponse, FlowConfig};
pub use services::flow::{FlowEvent, FlowService, FlowSnapshot, ResultHandoff};
