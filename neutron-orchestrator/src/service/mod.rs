//! Service Module
//!
//! Business logic layer for the orchestrator.
//! Services orchestrate between repositories, the cluster and source control.

pub mod harvester;
pub mod launcher;
pub mod log;
pub mod resolver;
pub mod status;
pub mod webhook;

// Re-export for convenience
pub use log as log_service;
pub use status as status_service;
pub use webhook as webhook_service;
