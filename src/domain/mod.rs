//! Domain layer: session state, outcomes and the ports the orchestrator talks through.

pub mod outcome;
pub mod ports;
pub mod presentation;
pub mod session;
