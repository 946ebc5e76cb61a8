#![allow(dead_code)]

use std::collections::HashMap;
use synonyms_core::{
    AddWordOutcome, AddWordRequest, ConsolidationEngine, GroupId, SynonymRepository,
};

/// Asserts the partition invariants and returns term key -> group id.
pub fn assert_partition<R: SynonymRepository>(repo: &R) -> HashMap<String, GroupId> {
    let groups = repo.list_groups().unwrap();
    let words = repo.list_words().unwrap();

    let mut owner: HashMap<String, GroupId> = HashMap::new();
    for group in &groups {
        assert!(!group.members.is_empty(), "orphan group {}", group.id);
        for member in &group.members {
            let previous = owner.insert(member.key(), group.id);
            assert!(
                previous.is_none(),
                "term `{member}` is a member of more than one group"
            );
        }
    }

    assert_eq!(
        owner.len(),
        words.len(),
        "every group member must have exactly one word row"
    );
    for word in &words {
        assert_eq!(
            owner.get(&word.name.key()),
            Some(&word.group.id),
            "word `{}` must reference the group listing it",
            word.name
        );
        assert!(word.group.contains(&word.name));
    }

    owner
}

pub fn add<R: SynonymRepository>(
    engine: &ConsolidationEngine<R>,
    word: &str,
    synonyms: &[&str],
) -> AddWordOutcome {
    engine
        .add_word(&AddWordRequest::new(word, synonyms.iter().copied()))
        .unwrap()
}

pub fn group_of<R: SynonymRepository>(engine: &ConsolidationEngine<R>, term: &str) -> GroupId {
    engine.find_word(term).unwrap().group.id
}
