mod common;

use common::{add, assert_partition, group_of};
use synonyms_core::db::open_db_in_memory;
use synonyms_core::{
    AddWordOutcome, AddWordRequest, ConsolidationEngine, ConsolidationError,
    ConsolidationOptions, InMemorySynonymRepository, InsertKind, SqliteSynonymRepository,
    SynonymRepository, Term, ValidationError,
};

/// Runs one scenario against the SQLite and the in-memory repository.
macro_rules! on_both_stores {
    ($name:ident, $scenario:ident) => {
        on_both_stores!($name, $scenario, ConsolidationOptions::default());
    };
    ($name:ident, $scenario:ident, $options:expr) => {
        mod $name {
            use super::*;

            #[test]
            fn sqlite() {
                let conn = open_db_in_memory().unwrap();
                let repo = SqliteSynonymRepository::try_new(&conn).unwrap();
                $scenario(&ConsolidationEngine::with_options(repo, $options));
            }

            #[test]
            fn memory() {
                let repo = InMemorySynonymRepository::new();
                $scenario(&ConsolidationEngine::with_options(repo, $options));
            }
        }
    };
}

fn spellings(terms: &[Term]) -> Vec<&str> {
    terms.iter().map(Term::as_str).collect()
}

fn all_new_terms_create_one_group<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    let outcome = add(engine, "Wash", &["Clean", "Wipe"]);

    match &outcome {
        AddWordOutcome::Inserted {
            kind,
            words,
            absorbed,
            ..
        } => {
            assert_eq!(*kind, InsertKind::NewGroup);
            assert_eq!(spellings(words), vec!["Wash", "Clean", "Wipe"]);
            assert!(absorbed.is_empty());
        }
        AddWordOutcome::AlreadyExists => panic!("expected insert"),
    }

    let groups = engine.list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(spellings(&groups[0].members), vec!["Wash", "Clean", "Wipe"]);
    assert_partition(engine.repository());
}
on_both_stores!(all_new_terms, all_new_terms_create_one_group);

fn repeated_submission_is_noop<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    add(engine, "Wash", &["Clean", "Wipe"]);
    let second = add(engine, "Wash", &["Clean", "Wipe"]);

    assert_eq!(second, AddWordOutcome::AlreadyExists);
    assert_eq!(engine.list_groups().unwrap().len(), 1);
    assert_eq!(engine.list_words().unwrap().len(), 3);
}
on_both_stores!(idempotent_noop, repeated_submission_is_noop);

fn new_terms_join_single_touched_group<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    let first = add(engine, "Wash", &["Clean", "Wipe"]);
    let outcome = add(engine, "Big", &["Huge", "Wipe"]);

    let AddWordOutcome::Inserted {
        kind,
        words,
        group_id,
        ..
    } = &outcome
    else {
        panic!("expected insert");
    };
    let AddWordOutcome::Inserted {
        group_id: first_group,
        ..
    } = first
    else {
        panic!("expected insert");
    };
    assert_eq!(*kind, InsertKind::Extended);
    assert_eq!(spellings(words), vec!["Big", "Huge"]);
    assert_eq!(*group_id, first_group);

    let groups = engine.list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 5);
    assert_partition(engine.repository());
}
on_both_stores!(single_group_extension, new_terms_join_single_touched_group);

fn bridging_submission_merges_groups<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    add(engine, "Wash", &["Clean", "Wipe"]);
    add(engine, "Big", &["Large", "Huge"]);
    let wash_group = group_of(engine, "Wash");
    let big_group = group_of(engine, "Big");
    assert_ne!(wash_group, big_group);

    let outcome = add(engine, "Ermin", &["Large", "Wash"]);

    let AddWordOutcome::Inserted {
        kind,
        words,
        group_id,
        absorbed,
    } = &outcome
    else {
        panic!("expected insert");
    };
    assert_eq!(*kind, InsertKind::Merged);
    assert_eq!(spellings(words), vec!["Ermin"]);
    // Equal sizes: the lower id survives.
    assert_eq!(*group_id, wash_group.min(big_group));
    assert_eq!(absorbed, &vec![wash_group.max(big_group)]);

    for term in ["Wash", "Clean", "Wipe", "Big", "Large", "Huge", "Ermin"] {
        assert_eq!(group_of(engine, term), *group_id, "term {term}");
    }
    let groups = engine.list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 7);
    assert_partition(engine.repository());
}
on_both_stores!(transitive_merge, bridging_submission_merges_groups);

fn larger_group_survives_merge<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    add(engine, "Wash", &["Clean"]);
    add(engine, "Big", &["Large", "Huge", "Giant"]);
    add(engine, "Fast", &["Quick"]);
    let big_group = group_of(engine, "Big");

    let outcome = add(engine, "Ermin", &["Clean", "Huge", "Quick"]);

    let AddWordOutcome::Inserted {
        group_id, absorbed, ..
    } = &outcome
    else {
        panic!("expected insert");
    };
    assert_eq!(*group_id, big_group);
    assert_eq!(absorbed.len(), 2);

    let groups = engine.list_groups().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(
        spellings(&groups[0].members)[..4],
        ["Big", "Large", "Huge", "Giant"]
    );
    assert_eq!(groups[0].len(), 9);
    assert_partition(engine.repository());
}
on_both_stores!(union_by_size, larger_group_survives_merge);

fn term_identity_ignores_case<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    add(engine, "Wash", &["Clean"]);

    assert_eq!(
        add(engine, "wash", &["CLEAN", " clean "]),
        AddWordOutcome::AlreadyExists
    );
    let outcome = add(engine, "WASH", &["wipe"]);
    assert_eq!(spellings(outcome.inserted_words()), vec!["wipe"]);

    let found = engine.find_word("wAsH").unwrap();
    assert_eq!(found.name.as_str(), "Wash");
    let synonyms: Vec<&str> = found.synonyms().map(Term::as_str).collect();
    assert_eq!(synonyms, vec!["Clean", "wipe"]);
    assert_partition(engine.repository());
}
on_both_stores!(case_insensitive_identity, term_identity_ignores_case);

fn inner_whitespace_runs_are_one_term<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    let outcome = add(engine, "ice  cream", &["gelato"]);
    assert_eq!(spellings(outcome.inserted_words()), vec!["ice cream", "gelato"]);

    assert_eq!(
        add(engine, "Ice \t Cream", &["gelato"]),
        AddWordOutcome::AlreadyExists
    );
    let found = engine.find_word("ice   cream").unwrap();
    assert_eq!(found.name.as_str(), "ice cream");
    assert_eq!(found.group.id, group_of(engine, "ICE CREAM"));

    let owners = assert_partition(engine.repository());
    assert_eq!(owners.len(), 2);
    assert!(owners.contains_key("ice cream"));
}
on_both_stores!(inner_whitespace_normalized, inner_whitespace_runs_are_one_term);

fn invalid_requests_write_nothing<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    let empty_word = engine
        .add_word(&AddWordRequest::new("", ["Clean"]))
        .unwrap_err();
    assert!(matches!(
        empty_word,
        ConsolidationError::Validation(ValidationError::EmptyPrimaryTerm)
    ));

    let no_synonyms = engine
        .add_word(&AddWordRequest::new("Wash", Vec::<String>::new()))
        .unwrap_err();
    assert!(matches!(
        no_synonyms,
        ConsolidationError::Validation(ValidationError::EmptySynonymList)
    ));

    let blank_synonym = engine
        .add_word(&AddWordRequest::new("Wash", ["Clean", "   "]))
        .unwrap_err();
    assert!(matches!(
        blank_synonym,
        ConsolidationError::Validation(ValidationError::EmptySynonymTerm { position: 1 })
    ));

    assert!(engine.list_words().unwrap().is_empty());
    assert!(engine.list_groups().unwrap().is_empty());
}
on_both_stores!(validation_boundaries, invalid_requests_write_nothing);

fn find_word_reports_missing_and_blank_terms<R: SynonymRepository>(
    engine: &ConsolidationEngine<R>,
) {
    add(engine, "Wash", &["Clean"]);

    let missing = engine.find_word("Truck").unwrap_err();
    assert!(matches!(missing, ConsolidationError::NotFound(ref term) if term == "Truck"));
    assert_eq!(missing.kind(), "not_found");

    let blank = engine.find_word("  ").unwrap_err();
    assert!(matches!(
        blank,
        ConsolidationError::Validation(ValidationError::EmptySearchTerm)
    ));

    let found = engine.find_word(" Clean ").unwrap();
    assert_eq!(found.name.as_str(), "Clean");
    assert!(found.group.contains(&Term::parse("Wash").unwrap()));
}
on_both_stores!(find_word, find_word_reports_missing_and_blank_terms);

fn list_words_is_sorted_and_resolved<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    add(engine, "Wash", &["clean"]);
    add(engine, "Big", &["Apple"]);

    let words = engine.list_words().unwrap();
    let names: Vec<&str> = words.iter().map(|word| word.name.as_str()).collect();
    assert_eq!(names, vec!["Apple", "Big", "clean", "Wash"]);
    for word in &words {
        assert!(word.group.contains(&word.name));
        assert_eq!(word.group.len(), 2);
    }
}
on_both_stores!(list_words, list_words_is_sorted_and_resolved);

fn known_terms_across_groups_are_noop<R: SynonymRepository>(engine: &ConsolidationEngine<R>) {
    add(engine, "Wash", &["Clean"]);
    add(engine, "Big", &["Large"]);

    assert_eq!(add(engine, "Wash", &["Big"]), AddWordOutcome::AlreadyExists);
    assert_eq!(engine.list_groups().unwrap().len(), 2);
    assert_partition(engine.repository());
}
on_both_stores!(known_terms_noop, known_terms_across_groups_are_noop);

fn known_terms_across_groups_are_bridged<R: SynonymRepository>(
    engine: &ConsolidationEngine<R>,
) {
    add(engine, "Wash", &["Clean"]);
    add(engine, "Big", &["Large"]);

    let outcome = add(engine, "Wash", &["Big"]);

    let AddWordOutcome::Inserted {
        kind,
        words,
        absorbed,
        ..
    } = &outcome
    else {
        panic!("expected merge");
    };
    assert_eq!(*kind, InsertKind::Merged);
    assert!(words.is_empty());
    assert_eq!(absorbed.len(), 1);
    assert_eq!(engine.list_groups().unwrap().len(), 1);
    assert_eq!(group_of(engine, "Clean"), group_of(engine, "Large"));
    assert_partition(engine.repository());
}
on_both_stores!(
    known_terms_bridged,
    known_terms_across_groups_are_bridged,
    ConsolidationOptions {
        bridge_known_terms: true,
        ..ConsolidationOptions::default()
    }
);
