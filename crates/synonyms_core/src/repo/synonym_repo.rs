//! Word/group repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the persistence operations the consolidation engine composes:
//!   word lookup, word insert, group create/extend/rank/delete and batch
//!   word reassignment.
//! - Keep SQL details inside the core persistence boundary.
//! - Provide the write transaction that makes one consolidation atomic.
//!
//! # Invariants
//! - Word identity is `words.name_key`; `NameMatch::Exact` only narrows it.
//! - Group members are returned in insertion order.
//! - Group lists are ordered by member count DESC, uuid ASC.
//! - A group that is still referenced by a word is never deleted.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use crate::model::term::{Term, ValidationError};
use crate::model::word::{GroupId, ResolvedWord, SynonymGroup, Word};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Transaction,
    TransactionBehavior,
};
use std::collections::{BTreeSet, HashMap};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const REQUIRED_TABLES: [&str; 3] = ["synonym_groups", "synonym_group_members", "words"];

const GROUP_RANK_SQL: &str = "SELECT
    g.uuid AS uuid,
    COUNT(m.member_key) AS member_count
FROM synonym_groups g
LEFT JOIN synonym_group_members m ON m.group_uuid = g.uuid";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for word/group persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Helper called with an empty argument.
    Validation(ValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Write lock could not be acquired; the caller may retry.
    Conflict(String),
    /// Referenced group does not exist.
    GroupNotFound(GroupId),
    /// Group cannot be deleted while words still reference it.
    GroupInUse { group_id: GroupId, word_count: usize },
    /// Term already has a word row or is already a member of the group.
    DuplicateTerm(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to valid domain records.
    InvalidData(String),
    /// Backend failure reported by a non-SQLite store.
    Storage(String),
}

impl RepoError {
    /// Returns whether retrying the whole unit of work may succeed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Conflict(message) => write!(f, "write conflict: {message}"),
            Self::GroupNotFound(id) => write!(f, "synonym group not found: {id}"),
            Self::GroupInUse {
                group_id,
                word_count,
            } => write!(
                f,
                "synonym group {group_id} is still referenced by {word_count} word(s)"
            ),
            Self::DuplicateTerm(term) => write!(f, "term already stored: `{term}`"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "synonym repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "synonym repository requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted synonym data: {message}"),
            Self::Storage(message) => write!(f, "storage failure: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        if value.is_lock_contention() {
            Self::Conflict(value.to_string())
        } else {
            Self::Db(value)
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        DbError::Sqlite(value).into()
    }
}

/// Term comparison mode for word lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameMatch {
    /// Stored spelling must match exactly.
    Exact,
    /// Identity key match (lowercase).
    CaseInsensitive,
}

/// Repository interface for the word/group partition.
pub trait SynonymRepository {
    /// Loads word rows whose names match any of `names`.
    fn find_words_by_names(&self, names: &[Term], mode: NameMatch) -> RepoResult<Vec<Word>>;
    /// Inserts new word rows. Every referenced group must exist.
    fn insert_words(&self, entries: &[Word]) -> RepoResult<()>;
    /// Creates one group with the given members and returns its new id.
    fn create_group(&self, initial_members: &[Term]) -> RepoResult<GroupId>;
    /// Appends members to an existing group.
    fn extend_group(&self, id: GroupId, new_members: &[Term]) -> RepoResult<()>;
    /// Loads groups by id, largest first, ties by ascending id.
    fn find_groups_by_ids(&self, ids: &BTreeSet<GroupId>) -> RepoResult<Vec<SynonymGroup>>;
    /// Repoints every word of the `from` groups to `to`. Returns rewritten rows.
    fn reassign_words_group(&self, from: &BTreeSet<GroupId>, to: GroupId) -> RepoResult<usize>;
    /// Deletes unreferenced groups. Returns deleted rows.
    fn delete_groups(&self, ids: &BTreeSet<GroupId>) -> RepoResult<usize>;
    /// Lists every word with its group, ordered by term key.
    fn list_words(&self) -> RepoResult<Vec<ResolvedWord>>;
    /// Resolves one word with its group.
    fn find_word(&self, term: &Term, mode: NameMatch) -> RepoResult<Option<ResolvedWord>>;
    /// Lists every group, largest first, ties by ascending id.
    fn list_groups(&self) -> RepoResult<Vec<SynonymGroup>>;
    /// Runs `work` as one atomic unit that excludes every other writer.
    ///
    /// Any error returned by `work` discards all of its writes.
    fn in_write_transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>;
}

/// SQLite-backed word/group repository.
pub struct SqliteSynonymRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSynonymRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl SynonymRepository for SqliteSynonymRepository<'_> {
    fn find_words_by_names(&self, names: &[Term], mode: NameMatch) -> RepoResult<Vec<Word>> {
        if names.is_empty() {
            return Err(ValidationError::EmptyArgument("word names").into());
        }

        let (column, bind_values) = name_filter(names, mode);
        let sql = format!(
            "SELECT name, group_uuid
             FROM words
             WHERE {column} IN ({})
             ORDER BY name_key ASC;",
            placeholders(bind_values.len())
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut words = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let group_uuid: String = row.get("group_uuid")?;
            words.push(Word::new(
                parse_stored_term(&name, "words.name")?,
                parse_uuid(&group_uuid, "words.group_uuid")?,
            ));
        }

        Ok(words)
    }

    fn insert_words(&self, entries: &[Word]) -> RepoResult<()> {
        if entries.is_empty() {
            return Err(ValidationError::EmptyArgument("word entries").into());
        }

        let group_ids: BTreeSet<GroupId> = entries.iter().map(|entry| entry.group_id).collect();
        for group_id in &group_ids {
            if !group_exists(self.conn, *group_id)? {
                return Err(RepoError::GroupNotFound(*group_id));
            }
        }

        let mut stmt = self.conn.prepare(
            "INSERT INTO words (name_key, name, group_uuid)
             VALUES (?1, ?2, ?3);",
        )?;
        for entry in entries {
            let inserted = stmt.execute(params![
                entry.name.key(),
                entry.name.as_str(),
                entry.group_id.to_string(),
            ]);
            map_unique_violation(inserted, &entry.name)?;
        }

        Ok(())
    }

    fn create_group(&self, initial_members: &[Term]) -> RepoResult<GroupId> {
        if initial_members.is_empty() {
            return Err(ValidationError::EmptyArgument("initial group members").into());
        }

        let group_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO synonym_groups (uuid) VALUES (?1);",
            [group_id.to_string()],
        )?;
        insert_members(self.conn, group_id, initial_members)?;

        Ok(group_id)
    }

    fn extend_group(&self, id: GroupId, new_members: &[Term]) -> RepoResult<()> {
        if new_members.is_empty() {
            return Err(ValidationError::EmptyArgument("new group members").into());
        }

        let changed = self.conn.execute(
            "UPDATE synonym_groups
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::GroupNotFound(id));
        }

        insert_members(self.conn, id, new_members)
    }

    fn find_groups_by_ids(&self, ids: &BTreeSet<GroupId>) -> RepoResult<Vec<SynonymGroup>> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyArgument("group ids").into());
        }

        let bind_values: Vec<Value> = ids.iter().map(|id| Value::Text(id.to_string())).collect();
        let sql = format!(
            "{GROUP_RANK_SQL}
             WHERE g.uuid IN ({})
             GROUP BY g.uuid
             ORDER BY member_count DESC, g.uuid ASC;",
            placeholders(bind_values.len())
        );
        load_ranked_groups(self.conn, &sql, bind_values)
    }

    fn reassign_words_group(&self, from: &BTreeSet<GroupId>, to: GroupId) -> RepoResult<usize> {
        if from.is_empty() {
            return Err(ValidationError::EmptyArgument("source group ids").into());
        }
        if !group_exists(self.conn, to)? {
            return Err(RepoError::GroupNotFound(to));
        }

        let mut bind_values = vec![Value::Text(to.to_string())];
        bind_values.extend(
            from.iter()
                .filter(|id| **id != to)
                .map(|id| Value::Text(id.to_string())),
        );
        if bind_values.len() == 1 {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE words
             SET group_uuid = ?
             WHERE group_uuid IN ({});",
            placeholders(bind_values.len() - 1)
        );
        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(changed)
    }

    fn delete_groups(&self, ids: &BTreeSet<GroupId>) -> RepoResult<usize> {
        if ids.is_empty() {
            return Err(ValidationError::EmptyArgument("group ids").into());
        }

        let mut deleted = 0;
        for id in ids {
            let id_text = id.to_string();
            let word_count: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM words WHERE group_uuid = ?1;",
                [id_text.as_str()],
                |row| row.get(0),
            )?;
            if word_count > 0 {
                return Err(RepoError::GroupInUse {
                    group_id: *id,
                    word_count: usize::try_from(word_count).unwrap_or(usize::MAX),
                });
            }

            deleted += self.conn.execute(
                "DELETE FROM synonym_groups WHERE uuid = ?1;",
                [id_text.as_str()],
            )?;
        }

        Ok(deleted)
    }

    fn list_words(&self) -> RepoResult<Vec<ResolvedWord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, group_uuid
             FROM words
             ORDER BY name_key ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut groups: HashMap<GroupId, SynonymGroup> = HashMap::new();
        let mut words = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get("name")?;
            let group_uuid: String = row.get("group_uuid")?;
            let name = parse_stored_term(&name, "words.name")?;
            let group_id = parse_uuid(&group_uuid, "words.group_uuid")?;

            let group = match groups.get(&group_id) {
                Some(group) => group.clone(),
                None => {
                    let group = load_group(self.conn, group_id)?;
                    groups.insert(group_id, group.clone());
                    group
                }
            };
            words.push(ResolvedWord { name, group });
        }

        Ok(words)
    }

    fn find_word(&self, term: &Term, mode: NameMatch) -> RepoResult<Option<ResolvedWord>> {
        let (column, bind_value) = match mode {
            NameMatch::Exact => ("name", term.as_str().to_string()),
            NameMatch::CaseInsensitive => ("name_key", term.key()),
        };
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT name, group_uuid
                     FROM words
                     WHERE {column} = ?1;"
                ),
                [bind_value],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;

        let Some((name, group_uuid)) = found else {
            return Ok(None);
        };
        let group_id = parse_uuid(&group_uuid, "words.group_uuid")?;
        Ok(Some(ResolvedWord {
            name: parse_stored_term(&name, "words.name")?,
            group: load_group(self.conn, group_id)?,
        }))
    }

    fn list_groups(&self) -> RepoResult<Vec<SynonymGroup>> {
        let sql = format!(
            "{GROUP_RANK_SQL}
             GROUP BY g.uuid
             ORDER BY member_count DESC, g.uuid ASC;"
        );
        load_ranked_groups(self.conn, &sql, Vec::new())
    }

    fn in_write_transaction<T, F>(&self, work: F) -> RepoResult<T>
    where
        F: FnOnce(&Self) -> RepoResult<T>,
    {
        // Immediate: take the write lock before the first read, so the lookup
        // phase of a concurrent writer cannot interleave with ours.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = work(self)?;
        tx.commit()?;
        Ok(value)
    }
}

fn name_filter(names: &[Term], mode: NameMatch) -> (&'static str, Vec<Value>) {
    match mode {
        NameMatch::Exact => (
            "name",
            names
                .iter()
                .map(|name| Value::Text(name.as_str().to_string()))
                .collect(),
        ),
        NameMatch::CaseInsensitive => (
            "name_key",
            names.iter().map(|name| Value::Text(name.key())).collect(),
        ),
    }
}

fn insert_members(conn: &Connection, group_id: GroupId, members: &[Term]) -> RepoResult<()> {
    let group_uuid = group_id.to_string();
    let mut stmt = conn.prepare(
        "INSERT INTO synonym_group_members (group_uuid, member_key, member_name)
         VALUES (?1, ?2, ?3);",
    )?;
    for member in members {
        let inserted = stmt.execute(params![group_uuid.as_str(), member.key(), member.as_str()]);
        map_unique_violation(inserted, member)?;
    }
    Ok(())
}

fn map_unique_violation(result: rusqlite::Result<usize>, term: &Term) -> RepoResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
            Err(RepoError::DuplicateTerm(term.as_str().to_string()))
        }
        Err(err) => Err(err.into()),
    }
}

fn load_ranked_groups(
    conn: &Connection,
    sql: &str,
    bind_values: Vec<Value>,
) -> RepoResult<Vec<SynonymGroup>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut groups = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("uuid")?;
        let group_id = parse_uuid(&uuid_text, "synonym_groups.uuid")?;
        groups.push(SynonymGroup {
            id: group_id,
            members: load_members(conn, group_id)?,
        });
    }
    Ok(groups)
}

fn load_group(conn: &Connection, group_id: GroupId) -> RepoResult<SynonymGroup> {
    if !group_exists(conn, group_id)? {
        return Err(RepoError::InvalidData(format!(
            "word references missing group `{group_id}`"
        )));
    }
    Ok(SynonymGroup {
        id: group_id,
        members: load_members(conn, group_id)?,
    })
}

fn load_members(conn: &Connection, group_id: GroupId) -> RepoResult<Vec<Term>> {
    let mut stmt = conn.prepare(
        "SELECT member_name
         FROM synonym_group_members
         WHERE group_uuid = ?1
         ORDER BY rowid ASC;",
    )?;
    let mut rows = stmt.query([group_id.to_string()])?;
    let mut members = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        members.push(parse_stored_term(
            &value,
            "synonym_group_members.member_name",
        )?);
    }
    Ok(members)
}

fn group_exists(conn: &Connection, group_id: GroupId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM synonym_groups WHERE uuid = ?1);",
        [group_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn parse_uuid(value: &str, column: &str) -> RepoResult<GroupId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_stored_term(value: &str, column: &str) -> RepoResult<Term> {
    Term::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("blank term value in {column}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
