//! Synonym consolidation use-case service.
//!
//! # Responsibility
//! - Validate `add_word` submissions at the boundary.
//! - Create, extend or merge synonym groups so the word partition stays
//!   disjoint and transitively closed.
//! - Expose list/search read paths over the same repository.
//!
//! # Invariants
//! - Lookup and every mutation of one submission run in a single repository
//!   write transaction.
//! - Merges keep the largest touched group (ties: lowest id) and write in the
//!   order extend survivor, reassign words, insert words, delete absorbed.
//! - Only write conflicts are retried; every other failure is returned as is.

use crate::model::term::{Term, TermSet, ValidationError};
use crate::model::word::{GroupId, ResolvedWord, SynonymGroup, Word};
use crate::repo::synonym_repo::{NameMatch, RepoError, RepoResult, SynonymRepository};
use crate::service::partition::{classify_terms, rank_groups_by_size, MergePlan};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Service error for consolidation use-cases.
#[derive(Debug)]
pub enum ConsolidationError {
    /// Input rejected before touching storage.
    Validation(ValidationError),
    /// Search term has no word row.
    NotFound(String),
    /// Persistence-layer failure.
    Storage(RepoError),
    /// Every attempt hit a write conflict.
    RetriesExhausted { attempts: u32, last: RepoError },
}

impl ConsolidationError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::Storage(_) | Self::RetriesExhausted { .. } => "storage_error",
        }
    }
}

impl Display for ConsolidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(term) => write!(f, "word not found: `{term}`"),
            Self::Storage(err) => write!(f, "{err}"),
            Self::RetriesExhausted { attempts, last } => {
                write!(f, "gave up after {attempts} conflicting attempt(s): {last}")
            }
        }
    }
}

impl Error for ConsolidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) | Self::RetriesExhausted { last: err, .. } => Some(err),
            Self::NotFound(_) => None,
        }
    }
}

impl From<ValidationError> for ConsolidationError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for ConsolidationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Storage(other),
        }
    }
}

/// Request model for one word/synonyms submission.
///
/// Field names follow the JSON body accepted by request layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddWordRequest {
    /// Primary term.
    pub word: String,
    /// Terms synonymous with `word`.
    pub synonyms: Vec<String>,
}

impl AddWordRequest {
    pub fn new<I, S>(word: impl Into<String>, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            word: word.into(),
            synonyms: synonyms.into_iter().map(Into::into).collect(),
        }
    }

    /// Normalizes the submission into its term set.
    ///
    /// The primary term comes first, followed by synonyms in submitted order;
    /// repeated keys keep their first spelling.
    pub fn validate(&self) -> Result<TermSet, ValidationError> {
        let primary = Term::parse(&self.word).ok_or(ValidationError::EmptyPrimaryTerm)?;
        if self.synonyms.is_empty() {
            return Err(ValidationError::EmptySynonymList);
        }

        let mut terms = TermSet::new();
        terms.insert(primary);
        for (position, raw) in self.synonyms.iter().enumerate() {
            let synonym =
                Term::parse(raw).ok_or(ValidationError::EmptySynonymTerm { position })?;
            terms.insert(synonym);
        }
        Ok(terms)
    }
}

/// Which partition change an insert caused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertKind {
    /// No submitted term existed; a fresh group was created.
    NewGroup,
    /// New terms joined the single group already holding the others.
    Extended,
    /// The submission bridged several groups into one survivor.
    Merged,
}

/// Result of one `add_word` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AddWordOutcome {
    Inserted {
        kind: InsertKind,
        /// Words that received a new word row.
        words: Vec<Term>,
        /// Group now holding every submitted term.
        group_id: GroupId,
        /// Groups deleted by a merge.
        absorbed: Vec<GroupId>,
    },
    AlreadyExists,
}

impl AddWordOutcome {
    /// Newly inserted words; empty for `AlreadyExists`.
    pub fn inserted_words(&self) -> &[Term] {
        match self {
            Self::Inserted { words, .. } => words,
            Self::AlreadyExists => &[],
        }
    }

    /// Human-readable summary for response envelopes.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Inserted { .. } => "Words inserted",
            Self::AlreadyExists => "Words already exist",
        }
    }

    fn log_label(&self) -> &'static str {
        match self {
            Self::Inserted { kind, .. } => match kind {
                InsertKind::NewGroup => "new_group",
                InsertKind::Extended => "extended",
                InsertKind::Merged => "merged",
            },
            Self::AlreadyExists => "already_exists",
        }
    }
}

/// Tuning knobs for the consolidation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsolidationOptions {
    /// Total attempts per `add_word` when the store reports write conflicts.
    /// Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Merge distinct groups even when every submitted term already exists.
    /// When `false`, a fully known submission is a no-op.
    pub bridge_known_terms: bool,
}

impl Default for ConsolidationOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            bridge_known_terms: false,
        }
    }
}

/// Consolidation engine over a synonym repository.
pub struct ConsolidationEngine<R: SynonymRepository> {
    repo: R,
    options: ConsolidationOptions,
}

impl<R: SynonymRepository> ConsolidationEngine<R> {
    /// Creates an engine with default options.
    pub fn new(repo: R) -> Self {
        Self::with_options(repo, ConsolidationOptions::default())
    }

    pub fn with_options(repo: R, options: ConsolidationOptions) -> Self {
        Self { repo, options }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn options(&self) -> ConsolidationOptions {
        self.options
    }

    /// Adds one word with its synonyms and consolidates affected groups.
    ///
    /// # Contract
    /// - All submitted terms end up in one group.
    /// - Returns `AlreadyExists` without writing when every term is known
    ///   (unless `bridge_known_terms` requires a merge).
    /// - Write conflicts are retried up to `max_attempts` times, each attempt
    ///   re-reading the current partition.
    pub fn add_word(&self, request: &AddWordRequest) -> Result<AddWordOutcome, ConsolidationError> {
        let started_at = Instant::now();
        let terms = match request.validate() {
            Ok(terms) => terms,
            Err(err) => {
                warn!(
                    "event=add_word module=consolidation status=rejected error_code=validation error={}",
                    err
                );
                return Err(err.into());
            }
        };

        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = self.repo.in_write_transaction(|repo| {
                consolidate(repo, &terms, self.options.bridge_known_terms)
            });

            match result {
                Ok(outcome) => {
                    info!(
                        "event=add_word module=consolidation status=ok outcome={} terms={} inserted={} attempt={} duration_ms={}",
                        outcome.log_label(),
                        terms.len(),
                        outcome.inserted_words().len(),
                        attempt,
                        started_at.elapsed().as_millis()
                    );
                    return Ok(outcome);
                }
                Err(err) if err.is_conflict() && attempt < max_attempts => {
                    warn!(
                        "event=add_word module=consolidation status=retry attempt={} error={}",
                        attempt, err
                    );
                    attempt += 1;
                }
                Err(err) if err.is_conflict() => {
                    error!(
                        "event=add_word module=consolidation status=error error_code=retries_exhausted attempts={} duration_ms={} error={}",
                        attempt,
                        started_at.elapsed().as_millis(),
                        err
                    );
                    return Err(ConsolidationError::RetriesExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    error!(
                        "event=add_word module=consolidation status=error error_code=storage duration_ms={} error={}",
                        started_at.elapsed().as_millis(),
                        err
                    );
                    return Err(err.into());
                }
            }
        }
    }

    /// Lists every word with its resolved group, ordered by term key.
    pub fn list_words(&self) -> Result<Vec<ResolvedWord>, ConsolidationError> {
        Ok(self.repo.list_words()?)
    }

    /// Lists every group, largest first.
    pub fn list_groups(&self) -> Result<Vec<SynonymGroup>, ConsolidationError> {
        Ok(rank_groups_by_size(self.repo.list_groups()?))
    }

    /// Finds one word and its group.
    ///
    /// Tries the exact spelling first, then the case-insensitive key.
    pub fn find_word(&self, term: &str) -> Result<ResolvedWord, ConsolidationError> {
        let term = Term::parse(term).ok_or(ValidationError::EmptySearchTerm)?;
        if let Some(found) = self.repo.find_word(&term, NameMatch::Exact)? {
            return Ok(found);
        }
        self.repo
            .find_word(&term, NameMatch::CaseInsensitive)?
            .ok_or_else(|| ConsolidationError::NotFound(term.to_string()))
    }
}

fn consolidate<R: SynonymRepository>(
    repo: &R,
    terms: &TermSet,
    bridge_known_terms: bool,
) -> RepoResult<AddWordOutcome> {
    let existing = repo.find_words_by_names(terms.as_slice(), NameMatch::CaseInsensitive)?;

    if existing.is_empty() {
        let group_id = repo.create_group(terms.as_slice())?;
        repo.insert_words(&words_in_group(terms, group_id))?;
        return Ok(AddWordOutcome::Inserted {
            kind: InsertKind::NewGroup,
            words: terms.as_slice().to_vec(),
            group_id,
            absorbed: Vec::new(),
        });
    }

    let classification = classify_terms(terms, &existing);
    let bridges_groups = classification.touched_groups.len() > 1;
    if classification.new_terms.is_empty() && !(bridge_known_terms && bridges_groups) {
        return Ok(AddWordOutcome::AlreadyExists);
    }

    if !bridges_groups {
        let Some(&group_id) = classification.touched_groups.iter().next() else {
            return Err(RepoError::InvalidData(
                "existing words reference no group".to_string(),
            ));
        };
        repo.extend_group(group_id, classification.new_terms.as_slice())?;
        repo.insert_words(&words_in_group(&classification.new_terms, group_id))?;
        return Ok(AddWordOutcome::Inserted {
            kind: InsertKind::Extended,
            words: classification.new_terms.into_vec(),
            group_id,
            absorbed: Vec::new(),
        });
    }

    let ranked = rank_groups_by_size(repo.find_groups_by_ids(&classification.touched_groups)?);
    if let Some(missing) = classification
        .touched_groups
        .iter()
        .find(|id| !ranked.iter().any(|group| group.id == **id))
    {
        return Err(RepoError::GroupNotFound(*missing));
    }
    let Some(plan) = MergePlan::from_ranked(&ranked, &classification.new_terms) else {
        return Err(RepoError::InvalidData(
            "merge requested without touched groups".to_string(),
        ));
    };

    // Absorbed groups are deleted last: an interrupted merge leaves
    // unreferenced groups behind, never lost words.
    repo.extend_group(plan.survivor, plan.merged_incoming.as_slice())?;
    repo.reassign_words_group(&plan.absorbed, plan.survivor)?;
    if !classification.new_terms.is_empty() {
        repo.insert_words(&words_in_group(&classification.new_terms, plan.survivor))?;
    }
    repo.delete_groups(&plan.absorbed)?;

    Ok(AddWordOutcome::Inserted {
        kind: InsertKind::Merged,
        words: classification.new_terms.into_vec(),
        group_id: plan.survivor,
        absorbed: plan.absorbed.into_iter().collect(),
    })
}

fn words_in_group(terms: &TermSet, group_id: GroupId) -> Vec<Word> {
    terms
        .iter()
        .map(|term| Word::new(term.clone(), group_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{AddWordOutcome, AddWordRequest, ConsolidationError};
    use crate::model::term::{Term, ValidationError};
    use crate::repo::synonym_repo::RepoError;

    #[test]
    fn validate_orders_primary_first_and_dedupes_by_key() {
        let request = AddWordRequest::new("Wash", ["Clean", "wash", " Wipe ", "CLEAN"]);
        let terms = request.validate().unwrap();
        let spellings: Vec<&str> = terms.iter().map(Term::as_str).collect();
        assert_eq!(spellings, vec!["Wash", "Clean", "Wipe"]);
    }

    #[test]
    fn validate_reports_blank_synonym_position() {
        let request = AddWordRequest::new("Wash", ["Clean", "  "]);
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::EmptySynonymTerm { position: 1 }
        );
    }

    #[test]
    fn validate_checks_word_before_synonyms() {
        let request = AddWordRequest::new("", Vec::<String>::new());
        assert_eq!(
            request.validate().unwrap_err(),
            ValidationError::EmptyPrimaryTerm
        );
    }

    #[test]
    fn repo_validation_errors_surface_as_validation() {
        let err: ConsolidationError =
            RepoError::Validation(ValidationError::EmptyArgument("group ids")).into();
        assert_eq!(err.kind(), "validation_error");
    }

    #[test]
    fn already_exists_has_no_inserted_words() {
        assert!(AddWordOutcome::AlreadyExists.inserted_words().is_empty());
        assert_eq!(AddWordOutcome::AlreadyExists.message(), "Words already exist");
    }
}
