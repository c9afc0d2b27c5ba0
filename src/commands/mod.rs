//! Commands
//!
//! Entry points for the presentation layer. Each command takes the shared
//! [`FlowService`](crate::services::flow::FlowService) as its state.

pub mod flow;

pub use flow::*;
