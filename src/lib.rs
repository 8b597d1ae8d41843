//! Client-side orchestration of payment-provider flows.
//!
//! A [`SessionOrchestrator`](application::orchestrator::SessionOrchestrator)
//! fetches a short-lived client secret, presents the provider's opaque flow
//! (bank linking, card setup or payment) on a host surface, and records the
//! single outcome that flow reports.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod telemetry;
