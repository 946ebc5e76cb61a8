//! In-memory word/group repository.
//!
//! # Responsibility
//! - Implement `SynonymRepository` without SQLite, for tests and embedders
//!   that do not need durability.
//! - Record the order of repository calls and inject one-shot failures, so
//!   callers can verify write ordering and rollback behavior.
//!
//! # Invariants
//! - Clones share one underlying store.
//! - Write transactions are serialized by a writer gate. They mutate a
//!   private copy of the state that replaces the committed state only when
//!   the work succeeds.
//! - Calls outside a transaction see committed state only.
//! - Write transactions must not be nested on the same thread.

use crate::model::term::{Term, ValidationError};
use crate::model::word::{GroupId, ResolvedWord, SynonymGroup, Word};
use crate::repo::synonym_repo::{NameMatch, RepoError, RepoResult, SynonymRepository};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Repository call kinds recorded by `InMemorySynonymRepository`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoOperation {
    FindWords,
    InsertWords,
    CreateGroup,
    ExtendGroup,
    FindGroups,
    ReassignWords,
    DeleteGroups,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    /// Keyed by `Term::key()`.
    words: BTreeMap<String, Word>,
    groups: BTreeMap<GroupId, Vec<Term>>,
}

#[derive(Debug, Default)]
struct Shared {
    write_gate: Mutex<()>,
    committed: Mutex<MemoryState>,
    faults: Mutex<Vec<(RepoOperation, RepoError)>>,
    journal: Mutex<Vec<RepoOperation>>,
}

/// Mutex-guarded in-memory repository.
#[derive(Debug, Clone, Default)]
pub struct InMemorySynonymRepository {
    shared: Arc<Shared>,
    /// Working copy, set only on the handle passed to transaction work.
    staged: Option<Arc<Mutex<MemoryState>>>,
}

impl InMemorySynonymRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: RepoOperation, error: RepoError) {
        if let Ok(mut faults) = self.shared.faults.lock() {
            faults.push((operation, error));
        }
    }

    /// Returns every recorded call since the last `clear_journal`.
    pub fn journal(&self) -> Vec<RepoOperation> {
        self.shared
            .journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }

    pub fn clear_journal(&self) {
        if let Ok(mut journal) = self.shared.journal.lock() {
            journal.clear();
        }
    }

    fn enter(&self, operation: RepoOperation) -> RepoResult<MutexGuard<'_, MemoryState>> {
        if let Ok(mut journal) = self.shared.journal.lock() {
            journal.push(operation);
        }

        let injected = {
            let mut faults = self.shared.faults.lock().map_err(|_| poisoned())?;
            faults
                .iter()
                .position(|(candidate, _)| *candidate == operation)
                .map(|index| faults.remove(index).1)
        };
        if let Some(error) = injected {
            return Err(error);
        }

        self.state()
    }

    fn state(&self) -> RepoResult<MutexGuard<'_, MemoryState>> {
        self.staged
            .as_deref()
            .unwrap_or(&self.shared.committed)
            .lock()
            .map_err(|_| poisoned())
    }
}

impl SynonymRepository for InMemorySynonymRepository {
    fn find_words_by_names(&self, names: &[Term], mode: NameMatch) -> RepoResult<Vec<Word>> {
        if names.is_empty() {
            return Err(ValidationError::EmptyArgument("word names").into());
        }
        let state = self.enter(RepoOperation::FindWords)?;

        let mut found = BTreeMap::new();
        for name in names {
            if let Some(word) = state.words.get(&name.key()) {
                if mode == NameMatch::CaseInsensitive || word.name == *name {
                    found.insert(name.key(), word.clone());
                }
            }
        }
        Ok(found.into_values().collect())
    }

    fn insert_words(&self, entries: &[Word]) -> RepoResult<()> {
        if entries.is_empty() {
            return Err(ValidationError::EmptyArgument("word entries").into());
        }
        let mut state = self.enter(RepoOperation::InsertWords)?;

        for entry in entries {
            if !state.groups.contains_key(&entry.group_id) {
                return Err(RepoError::GroupNotFound(entry.group_id));
            }
        }
        for entry in entries {
            let key = entry.name.key();
            if state.words.contains_key(&key) {
                return Err(RepoError::DuplicateTerm(entry.name.as_str().to_string()));
            }
            state.words.insert(key, entry.clone());
        }
        Ok(())
    }

    fn create_group(&self, initial_members: &[Term]) -> RepoResult<GroupId> {
        if initial_members.is_empty() {
            return Err(ValidationError::EmptyArgument("initial group members").into());
        }
        let mut state = self.enter(RepoOperation::CreateGroup)?;

        let group_id = Uuid::new_v4();
        let mut members: Vec<Term> = Vec::with_capacity(initial_members.len());
        append_members(&mut members, initial_members)?;
        state.groups.insert(group_id, members);
        Ok(group_id)
    }

    fn extend_group(&self, id: GroupId, new_members: &[Term]) -> RepoResult<()> {
        if new_members.is_empty() {
            return Err(ValidationError::EmptyArgument("new group members").into());
        }
        let mut state = self.enter(RepoOperation::ExtendGroup)?;

        let members = state
            .groups
            .get_mut(&id)
            .ok_or(RepoError::GroupNotFound(id))?;
        append_members(members, new_members)
    }

    fn find_groups_by_ids(&self, ids: &BTreeSet<GroupId>) -> RepoResult<Vec<SynonymGroup>> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyArgument("group ids").into());
        }
        let state = self.enter(RepoOperation::FindGroups)?;

        let mut groups: Vec<SynonymGroup> = ids
            .iter()
            .filter_map(|id| {
                state.groups.get(id).map(|members| SynonymGroup {
                    id: *id,
                    members: members.clone(),
                })
            })
            .collect();
        groups.sort_by(SynonymGroup::cmp_by_size_desc);
        Ok(groups)
    }

    fn reassign_words_group(&self, from: &BTreeSet<GroupId>, to: GroupId) -> RepoResult<usize> {
        if from.is_empty() {
            return Err(ValidationError::EmptyArgument("source group ids").into());
        }
        let mut state = self.enter(RepoOperation::ReassignWords)?;
        if !state.groups.contains_key(&to) {
            return Err(RepoError::GroupNotFound(to));
        }

        let mut changed = 0;
        for word in state.words.values_mut() {
            if word.group_id != to && from.contains(&word.group_id) {
                word.group_id = to;
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn delete_groups(&self, ids: &BTreeSet<GroupId>) -> RepoResult<usize> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyArgument("group ids").into());
        }
        let mut state = self.enter(RepoOperation::DeleteGroups)?;

        for id in ids {
            let word_count = state
                .words
                .values()
                .filter(|word| word.group_id == *id)
                .count();
            if word_count > 0 {
                return Err(RepoError::GroupInUse {
                    group_id: *id,
                    word_count,
                });
            }
        }

        Ok(ids
            .iter()
            .filter(|id| state.groups.remove(*id).is_some())
            .count())
    }

    fn list_words(&self) -> RepoResult<Vec<ResolvedWord>> {
        let state = self.state()?;
        state
            .words
            .values()
            .map(|word| resolve(&state, word))
            .collect()
    }

    fn find_word(&self, term: &Term, mode: NameMatch) -> RepoResult<Option<ResolvedWord>> {
        let state = self.state()?;
        match state.words.get(&term.key()) {
            Some(word) if mode == NameMatch::CaseInsensitive || word.name == *term => {
                resolve(&state, word).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn list_groups(&self) -> RepoResult<Vec<SynonymGroup>> {
        let state = self.state()?;
        let mut groups: Vec<SynonymGroup> = state
            .groups
            .iter()
            .map(|(id, members)| SynonymGroup {
                id: *id,
                members: members.clone(),
            })
            .collect();
        groups.sort_by(SynonymGroup::cmp_by_size_desc);
        Ok(groups)
    }

    fn in_write_transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>,
    {
        let _gate = self.shared.write_gate.lock().map_err(|_| poisoned())?;
        let working = Arc::new(Mutex::new(self.state()?.clone()));
        let tx = Self {
            shared: Arc::clone(&self.shared),
            staged: Some(Arc::clone(&working)),
        };

        let value = work(&tx)?;
        drop(tx);

        let next = std::mem::take(&mut *working.lock().map_err(|_| poisoned())?);
        *self.shared.committed.lock().map_err(|_| poisoned())? = next;
        Ok(value)
    }
}

fn append_members(members: &mut Vec<Term>, incoming: &[Term]) -> RepoResult<()> {
    for term in incoming {
        if members.iter().any(|member| member.same_term(term)) {
            return Err(RepoError::DuplicateTerm(term.as_str().to_string()));
        }
        members.push(term.clone());
    }
    Ok(())
}

fn resolve(state: &MemoryState, word: &Word) -> RepoResult<ResolvedWord> {
    let members = state.groups.get(&word.group_id).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "word references missing group `{}`",
            word.group_id
        ))
    })?;
    Ok(ResolvedWord {
        name: word.name.clone(),
        group: SynonymGroup {
            id: word.group_id,
            members: members.clone(),
        },
    })
}

fn poisoned() -> RepoError {
    RepoError::Storage("in-memory store lock poisoned".to_string())
}
