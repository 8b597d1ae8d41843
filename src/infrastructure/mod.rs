//! Adapters for the domain ports.

pub mod headless;
pub mod http;
pub mod in_memory;
