//! Domain model for terms, words and synonym groups.
//!
//! # Responsibility
//! - Define the canonical records shared by repository and service layers.
//! - Own term normalization so every layer agrees on term identity.
//!
//! # Invariants
//! - Every `Term` is non-empty after normalization.
//! - Term identity is the lowercase key, never the display spelling.
//! - Every persisted `Word` references exactly one `SynonymGroup`.

pub mod term;
pub mod word;
