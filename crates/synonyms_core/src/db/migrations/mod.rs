//! Schema migrations for the synonym store.
//!
//! # Invariants
//! - `MIGRATIONS` versions start at 1 and increase by exactly 1.
//! - All pending scripts and the new `user_version` commit together or not
//!   at all.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "synonym_partition",
    sql: include_str!("0001_synonyms.sql"),
}];

/// Schema version change made by one `apply_migrations` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: u32,
    pub to_version: u32,
}

impl MigrationReport {
    pub fn applied(&self) -> u32 {
        self.to_version - self.from_version
    }
}

/// Highest schema version this build can create.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Brings the connection's schema up to `latest_version()`.
///
/// Two processes opening a fresh file race safely: the pending set is
/// recomputed after the write lock is taken.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<MigrationReport> {
    let latest = latest_version();
    let observed = current_user_version(conn)?;
    ensure_supported(observed, latest)?;
    if observed == latest {
        return Ok(MigrationReport {
            from_version: observed,
            to_version: observed,
        });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let from_version = current_user_version(&tx)?;
    ensure_supported(from_version, latest)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > from_version) {
        tx.execute_batch(migration.sql)
            .and_then(|()| {
                tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))
            })
            .map_err(|source| DbError::MigrationFailed {
                version: migration.version,
                name: migration.name,
                source,
            })?;
    }
    tx.commit()?;

    let report = MigrationReport {
        from_version,
        to_version: latest,
    };
    if report.applied() > 0 {
        info!(
            "event=db_migrate module=db status=ok from_version={} to_version={}",
            report.from_version, report.to_version
        );
    }
    Ok(report)
}

/// Reads `PRAGMA user_version`.
pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

fn ensure_supported(db_version: u32, latest_supported: u32) -> DbResult<()> {
    if db_version > latest_supported {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        });
    }
    Ok(())
}
