//! Neutron Core
//!
//! Core types shared by the Neutron orchestrator and the in-job runner.
//!
//! This crate contains:
//! - Domain types: triggers, pipeline manifests, step results, launch specs, harvest records
//! - DTOs: request/response bodies of the orchestrator API
//! - The environment contract the job launcher writes and the runner reads

pub mod domain;
pub mod dto;
pub mod env;
