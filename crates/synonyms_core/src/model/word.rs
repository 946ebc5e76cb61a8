//! Word and synonym group records.
//!
//! # Invariants
//! - `SynonymGroup::members` is never empty for a persisted group.
//! - A word's name appears in the members of the group it references.

use crate::model::term::Term;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;

/// Opaque group identifier assigned by the store on creation.
pub type GroupId = Uuid;

/// Persisted word row: one term and the group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub name: Term,
    pub group_id: GroupId,
}

impl Word {
    pub fn new(name: Term, group_id: GroupId) -> Self {
        Self { name, group_id }
    }
}

/// One equivalence class of mutually synonymous terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynonymGroup {
    pub id: GroupId,
    /// Member terms in insertion order.
    pub members: Vec<Term>,
}

impl SynonymGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns whether a member shares the identity key of `term`.
    pub fn contains(&self, term: &Term) -> bool {
        self.members.iter().any(|member| member.same_term(term))
    }

    /// Ranking order: larger groups first, ties by ascending id.
    pub fn cmp_by_size_desc(&self, other: &Self) -> Ordering {
        other
            .members
            .len()
            .cmp(&self.members.len())
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Word joined with its group, used by list/search read paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedWord {
    pub name: Term,
    pub group: SynonymGroup,
}

impl ResolvedWord {
    /// Group members other than the word itself.
    pub fn synonyms(&self) -> impl Iterator<Item = &Term> {
        self.group
            .members
            .iter()
            .filter(move |member| !member.same_term(&self.name))
    }
}
