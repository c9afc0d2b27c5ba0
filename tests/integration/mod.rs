//! Integration Tests Module
//!
//! End-to-end tests of the consultation flow on a paused clock: intake
//! conversation, staged analysis, stage control and the command layer.

// Shared service and clock helpers
mod support;

// Intake conversation tests
mod conversation_test;

// Step and task progress tests
mod orchestrator_test;
