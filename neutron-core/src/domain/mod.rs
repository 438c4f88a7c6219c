//! Core domain types
//!
//! These types represent the entities of the orchestration lifecycle and are
//! shared between the orchestrator (resolve, launch, harvest) and the runner
//! (execute, report).

pub mod harvest;
pub mod job;
pub mod pipeline;
pub mod project;
pub mod step;
pub mod trigger;
