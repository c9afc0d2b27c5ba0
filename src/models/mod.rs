//! Data Models
//!
//! Reference catalog, flow configuration and the command response envelope.

pub mod catalog;
pub mod config;
pub mod response;

pub use catalog::{Catalog, DepartmentRecommendation, Doctor, StepTemplate, TaskTemplate};
pub use config::FlowConfig;
pub use response::CommandResponse;
