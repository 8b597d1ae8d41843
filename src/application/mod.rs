//! Application layer containing the session orchestration logic.
//!
//! This module defines the `SessionOrchestrator`, which owns one session and
//! drives it through fetch, presentation and outcome, and the `ResultHandler`
//! that applies a flow's outcome exactly once.

pub mod orchestrator;
pub mod result_handler;
