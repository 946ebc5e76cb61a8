//! Transport-agnostic response envelopes for request layers.
//!
//! # Responsibility
//! - Wrap service results in `{ success, data }` envelopes.
//! - Map `ConsolidationError` to the `{ type, message, details }` error body.
//!
//! # Invariants
//! - `ErrorBody::error_type` is always one of `validation_error`,
//!   `not_found` or `storage_error`.
//! - Storage error messages never leak SQL text; details carry the cause.

use crate::model::term::ValidationError;
use crate::repo::synonym_repo::RepoError;
use crate::service::consolidation::{AddWordOutcome, ConsolidationError};
use serde::Serialize;

/// Success envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Payload returned for `add_word`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddWordData {
    pub msg: &'static str,
    #[serde(flatten)]
    pub outcome: AddWordOutcome,
}

impl From<AddWordOutcome> for ApiResponse<AddWordData> {
    fn from(outcome: AddWordOutcome) -> Self {
        Self::ok(AddWordData {
            msg: outcome.message(),
            outcome,
        })
    }
}

/// Structured failure body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub error_type: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub success: bool,
}

impl ErrorBody {
    /// Suggested HTTP-style status for request layers.
    pub fn status_hint(&self) -> u16 {
        match self.error_type {
            "validation_error" => 400,
            "not_found" => 404,
            _ => 500,
        }
    }
}

impl From<&ConsolidationError> for ErrorBody {
    fn from(err: &ConsolidationError) -> Self {
        let (message, details) = match err {
            ConsolidationError::Validation(validation) => {
                (validation.to_string(), validation_details(validation))
            }
            ConsolidationError::NotFound(term) => {
                ("Word not found".to_string(), Some(format!("term={term}")))
            }
            ConsolidationError::Storage(repo) => (
                "Unexpected storage error.".to_string(),
                Some(repo_details(repo)),
            ),
            ConsolidationError::RetriesExhausted { attempts, last } => (
                "Storage is busy; please retry.".to_string(),
                Some(format!("attempts={attempts} cause={last}")),
            ),
        };

        Self {
            error_type: err.kind(),
            message,
            details,
            success: false,
        }
    }
}

impl ConsolidationError {
    /// Builds the structured failure body for this error.
    pub fn to_error_body(&self) -> ErrorBody {
        ErrorBody::from(self)
    }
}

fn validation_details(err: &ValidationError) -> Option<String> {
    match err {
        ValidationError::EmptySynonymTerm { position } => Some(format!("position={position}")),
        ValidationError::EmptyArgument(name) => Some(format!("argument={name}")),
        _ => None,
    }
}

fn repo_details(err: &RepoError) -> String {
    match err {
        RepoError::GroupNotFound(id) => format!("group_id={id}"),
        RepoError::GroupInUse {
            group_id,
            word_count,
        } => format!("group_id={group_id} word_count={word_count}"),
        RepoError::DuplicateTerm(term) => format!("term={term}"),
        other => other.to_string(),
    }
}
