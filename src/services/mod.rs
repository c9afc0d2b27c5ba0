//! Services
//!
//! Business logic behind the command layer.

pub mod flow;
