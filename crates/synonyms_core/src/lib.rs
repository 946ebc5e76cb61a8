//! Core domain logic for the synonym store.
//! This crate is the single source of truth for the word partition invariants.

pub mod api;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::{AddWordData, ApiResponse, ErrorBody};
pub use logging::{
    default_log_level, init_logging, logging_status, LogConfig, LogLevel, LoggingError,
};
pub use model::term::{Term, TermSet, ValidationError};
pub use model::word::{GroupId, ResolvedWord, SynonymGroup, Word};
pub use repo::memory_repo::{InMemorySynonymRepository, RepoOperation};
pub use repo::synonym_repo::{
    NameMatch, RepoError, RepoResult, SqliteSynonymRepository, SynonymRepository,
};
pub use service::consolidation::{
    AddWordOutcome, AddWordRequest, ConsolidationEngine, ConsolidationError,
    ConsolidationOptions, InsertKind,
};
pub use service::partition::{classify_terms, rank_groups_by_size, MergePlan, TermClassification};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
