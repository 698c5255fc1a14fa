//! Core logic: types, errors, configuration, request orchestration.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod types;
