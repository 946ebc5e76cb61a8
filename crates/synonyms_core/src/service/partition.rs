//! Pure partition helpers used by the consolidation engine.
//!
//! # Responsibility
//! - Classify submitted terms into new terms and touched groups.
//! - Rank groups for survivor selection (union-by-size).
//! - Derive the merge plan for a multi-group submission.
//!
//! # Invariants
//! - No function in this module touches storage.
//! - Ranking is total: equal sizes fall back to ascending group id, so the
//!   same input always selects the same survivor.

use crate::model::term::TermSet;
use crate::model::word::{GroupId, SynonymGroup, Word};
use std::collections::BTreeSet;

/// Submitted terms split by whether a word row already exists.
#[derive(Debug, Clone, Default)]
pub struct TermClassification {
    /// Terms without a word row, in submission order.
    pub new_terms: TermSet,
    /// Distinct groups referenced by the terms that already exist.
    pub touched_groups: BTreeSet<GroupId>,
}

/// Splits `terms` into new terms and the groups of existing ones.
///
/// Existence is decided by term key, so `wash` matches a stored `Wash`.
pub fn classify_terms(terms: &TermSet, existing: &[Word]) -> TermClassification {
    let known: TermSet = existing.iter().map(|word| word.name.clone()).collect();
    let new_terms = terms
        .iter()
        .filter(|term| !known.contains(term))
        .cloned()
        .collect();
    let touched_groups = existing.iter().map(|word| word.group_id).collect();

    TermClassification {
        new_terms,
        touched_groups,
    }
}

/// Orders groups by member count descending, ties by ascending id.
pub fn rank_groups_by_size(mut groups: Vec<SynonymGroup>) -> Vec<SynonymGroup> {
    groups.sort_by(SynonymGroup::cmp_by_size_desc);
    groups
}

/// Writes required to fold several groups into one survivor.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub survivor: GroupId,
    pub absorbed: BTreeSet<GroupId>,
    /// Absorbed members followed by the new terms.
    pub merged_incoming: TermSet,
}

impl MergePlan {
    /// Builds the plan from groups already ranked by `rank_groups_by_size`.
    ///
    /// Returns `None` when `ranked` is empty.
    pub fn from_ranked(ranked: &[SynonymGroup], new_terms: &TermSet) -> Option<Self> {
        let (survivor, absorbed_groups) = ranked.split_first()?;

        let mut merged_incoming = TermSet::new();
        for group in absorbed_groups {
            merged_incoming.extend(group.members.iter().cloned());
        }
        merged_incoming.extend(new_terms.iter().cloned());

        Some(Self {
            survivor: survivor.id,
            absorbed: absorbed_groups.iter().map(|group| group.id).collect(),
            merged_incoming,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{classify_terms, rank_groups_by_size, MergePlan};
    use crate::model::term::{Term, TermSet};
    use crate::model::word::{SynonymGroup, Word};
    use uuid::Uuid;

    fn term(value: &str) -> Term {
        Term::parse(value).unwrap()
    }

    fn terms(values: &[&str]) -> TermSet {
        values.iter().map(|value| term(value)).collect()
    }

    fn group(id: &str, members: &[&str]) -> SynonymGroup {
        SynonymGroup {
            id: Uuid::parse_str(id).unwrap(),
            members: members.iter().map(|value| term(value)).collect(),
        }
    }

    #[test]
    fn classify_splits_new_terms_and_distinct_groups() {
        let group_a = Uuid::new_v4();
        let group_b = Uuid::new_v4();
        let existing = vec![
            Word::new(term("Wash"), group_a),
            Word::new(term("Clean"), group_a),
            Word::new(term("Big"), group_b),
        ];

        let result = classify_terms(&terms(&["Wash", "Car", "Big", "Truck", "Clean"]), &existing);

        let new_terms: Vec<&str> = result.new_terms.iter().map(Term::as_str).collect();
        assert_eq!(new_terms, vec!["Car", "Truck"]);
        assert_eq!(result.touched_groups.len(), 2);
        assert!(result.touched_groups.contains(&group_a));
        assert!(result.touched_groups.contains(&group_b));
    }

    #[test]
    fn classify_matches_existing_words_case_insensitively() {
        let existing = vec![Word::new(term("Wash"), Uuid::new_v4())];
        let result = classify_terms(&terms(&["WASH", "wipe"]), &existing);
        let new_terms: Vec<&str> = result.new_terms.iter().map(Term::as_str).collect();
        assert_eq!(new_terms, vec!["wipe"]);
    }

    #[test]
    fn ranking_prefers_larger_groups_then_lower_ids() {
        let small = group("00000000-0000-4000-8000-000000000001", &["a"]);
        let tie_high = group("00000000-0000-4000-8000-000000000003", &["b", "c"]);
        let tie_low = group("00000000-0000-4000-8000-000000000002", &["d", "e"]);

        let ranked = rank_groups_by_size(vec![small.clone(), tie_high.clone(), tie_low.clone()]);

        assert_eq!(ranked[0].id, tie_low.id);
        assert_eq!(ranked[1].id, tie_high.id);
        assert_eq!(ranked[2].id, small.id);
    }

    #[test]
    fn merge_plan_folds_absorbed_members_before_new_terms() {
        let survivor = group("00000000-0000-4000-8000-000000000001", &["Wash", "Clean", "Wipe"]);
        let absorbed = group("00000000-0000-4000-8000-000000000002", &["Big", "Large"]);

        let plan = MergePlan::from_ranked(&[survivor.clone(), absorbed.clone()], &terms(&["Ermin"]))
            .expect("plan for non-empty ranking");

        assert_eq!(plan.survivor, survivor.id);
        assert_eq!(plan.absorbed.len(), 1);
        assert!(plan.absorbed.contains(&absorbed.id));
        let incoming: Vec<&str> = plan.merged_incoming.iter().map(Term::as_str).collect();
        assert_eq!(incoming, vec!["Big", "Large", "Ermin"]);
    }

    #[test]
    fn merge_plan_requires_at_least_one_group() {
        assert!(MergePlan::from_ranked(&[], &TermSet::new()).is_none());
    }
}
