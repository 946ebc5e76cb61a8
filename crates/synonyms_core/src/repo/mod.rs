//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the narrow word/group data access contract used by the
//!   consolidation engine.
//! - Isolate SQLite query details from service orchestration.
//! - Provide an in-memory store with the same contract for tests and
//!   embedding.
//!
//! # Invariants
//! - Mutation helpers reject empty term lists and empty id sets.
//! - Repository APIs return semantic errors (`GroupNotFound`, `GroupInUse`,
//!   `DuplicateTerm`) in addition to transport errors.
//! - `in_write_transaction` is all-or-nothing.

pub mod memory_repo;
pub mod synonym_repo;
