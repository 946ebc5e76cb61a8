//! Term value type and boundary validation errors.
//!
//! # Responsibility
//! - Normalize raw user strings into `Term` values.
//! - Provide an ordered, key-deduplicated `TermSet` for one submission.
//!
//! # Invariants
//! - Surrounding whitespace is trimmed; inner whitespace runs collapse to one
//!   space.
//! - Two terms are the same term when their `key()` values are equal.
//! - `TermSet` keeps the first spelling seen for each key.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Validation failures raised before any storage access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Primary word is empty or blank.
    EmptyPrimaryTerm,
    /// Synonym list has no entries.
    EmptySynonymList,
    /// One synonym entry is empty or blank.
    EmptySynonymTerm { position: usize },
    /// Search input is empty or blank.
    EmptySearchTerm,
    /// Internal helper received an empty term list or id set.
    EmptyArgument(&'static str),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPrimaryTerm => write!(f, "Word cannot be empty string"),
            Self::EmptySynonymList => write!(f, "Synonyms cannot be empty array"),
            Self::EmptySynonymTerm { position } => {
                write!(f, "synonym at position {position} cannot be empty string")
            }
            Self::EmptySearchTerm => write!(f, "search word cannot be empty string"),
            Self::EmptyArgument(name) => write!(f, "{name} cannot be empty"),
        }
    }
}

impl Error for ValidationError {}

/// One normalized word or phrase.
///
/// Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Term(String);

impl Term {
    /// Normalizes raw input into a term.
    ///
    /// Returns `None` when the input is blank after trimming.
    pub fn parse(raw: &str) -> Option<Self> {
        let collapsed = WHITESPACE_RE.replace_all(raw.trim(), " ");
        if collapsed.is_empty() {
            None
        } else {
            Some(Self(collapsed.into_owned()))
        }
    }

    /// Returns the display spelling.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the identity key used for existence checks and uniqueness.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    /// Returns whether both terms share the same identity key.
    pub fn same_term(&self, other: &Term) -> bool {
        self.0 == other.0 || self.key() == other.key()
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Term {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl TryFrom<String> for Term {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or(ValidationError::EmptyArgument("term"))
    }
}

impl From<Term> for String {
    fn from(value: Term) -> Self {
        value.0
    }
}

/// Insertion-ordered set of terms, unique by `Term::key()`.
#[derive(Debug, Clone, Default)]
pub struct TermSet {
    terms: Vec<Term>,
    keys: HashSet<String>,
}

impl TermSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `term` unless a term with the same key is present.
    ///
    /// Returns `true` when the term was added.
    pub fn insert(&mut self, term: Term) -> bool {
        if self.keys.insert(term.key()) {
            self.terms.push(term);
            true
        } else {
            false
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.contains_key(&term.key())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn as_slice(&self) -> &[Term] {
        &self.terms
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    pub fn into_vec(self) -> Vec<Term> {
        self.terms
    }
}

impl FromIterator<Term> for TermSet {
    fn from_iter<I: IntoIterator<Item = Term>>(iter: I) -> Self {
        let mut set = Self::new();
        for term in iter {
            set.insert(term);
        }
        set
    }
}

impl Extend<Term> for TermSet {
    fn extend<I: IntoIterator<Item = Term>>(&mut self, iter: I) {
        for term in iter {
            self.insert(term);
        }
    }
}

impl<'a> IntoIterator for &'a TermSet {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
