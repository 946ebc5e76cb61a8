//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into the consolidation use-case.
//! - Keep CLI and request layers decoupled from storage details.

pub mod consolidation;
pub mod partition;
