//! Data Transfer Objects for the orchestrator's HTTP surface
//!
//! Response bodies returned to webhook senders, status readers and the
//! harvest trigger. Kept separate from the domain types so that wire shapes
//! can evolve without touching the engine.

pub mod harvest;
pub mod status;
pub mod webhook;
