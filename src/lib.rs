pub mod config;
pub mod constants;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;

// Application use cases and the ports they depend on
pub mod app;
// Filesystem and HTTP adapters for those ports
pub mod infra;
