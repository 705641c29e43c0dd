//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate sessions, resolution and repository calls into batch-level
//!   operations.
//! - Keep the command-line layer decoupled from storage details.

pub mod batch_service;
pub mod maintenance_service;
