//! Opening and configuring SQLite connections.
//!
//! # Invariants
//! - Returned connections enforce foreign keys, so a word can never point at
//!   a deleted group.
//! - Returned connections wait up to `BUSY_TIMEOUT` for the write lock before
//!   reporting contention.
//! - File databases run in WAL mode: readers never block the single writer.
//! - Returned connections are fully migrated.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// How long a writer waits for another writer's transaction to finish.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone, Copy)]
enum Target<'a> {
    File(&'a Path),
    Memory,
}

impl Target<'_> {
    fn label(self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory => "memory",
        }
    }

    fn connect(self) -> rusqlite::Result<Connection> {
        match self {
            Self::File(path) => Connection::open(path),
            Self::Memory => Connection::open_in_memory(),
        }
    }
}

/// Opens (creating if needed) a database file and migrates it.
///
/// Several connections may open the same file concurrently; writes are
/// serialized by SQLite's write lock.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_target(Target::File(path.as_ref()))
}

/// Opens a private in-memory database. Each call starts empty.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_target(Target::Memory)
}

fn open_target(target: Target<'_>) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.label();

    let result = target
        .connect()
        .map_err(Into::into)
        .and_then(|mut conn| configure(&mut conn, target).map(|version| (conn, version)));

    match result {
        Ok((conn, schema_version)) => {
            info!(
                "event=db_open module=db status=ok mode={mode} schema_version={schema_version} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Applies pragmas and migrations; returns the resulting schema version.
fn configure(conn: &mut Connection, target: Target<'_>) -> DbResult<u32> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if let Target::File(_) = target {
        enable_wal(conn)?;
    }
    Ok(apply_migrations(conn)?.to_version)
}

/// Requests WAL and returns the journal mode SQLite actually chose.
///
/// A refusal is logged and the previous mode is kept.
fn enable_wal(conn: &Connection) -> DbResult<String> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") {
        warn!("event=db_open module=db status=degraded journal_mode={mode} expected=wal");
    }
    Ok(mode)
}

#[cfg(test)]
mod tests {
    use super::enable_wal;
    use rusqlite::Connection;

    #[test]
    fn enable_wal_reports_the_mode_sqlite_chose() {
        let dir = tempfile::tempdir().unwrap();
        let file = Connection::open(dir.path().join("wal.sqlite3")).unwrap();
        assert_eq!(enable_wal(&file).unwrap().to_lowercase(), "wal");

        // In-memory databases cannot use WAL; the refusal is not an error.
        let memory = Connection::open_in_memory().unwrap();
        assert_eq!(enable_wal(&memory).unwrap().to_lowercase(), "memory");
    }
}
