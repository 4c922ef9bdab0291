//! Version Store: the `jobs` table (current records) and the append-only
//! `job_versions` table (snapshots).
//!
//! The free functions take a plain `&Connection` so controllers can run
//! several of them inside one [`Transaction`] (which derefs to a connection).

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{JobFields, JobId, JobRecord, ParseWarning, VersionSnapshot};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use crate::codec::{self, EncodedFields};
use crate::error::Result;
use crate::migrations::Migrator;

const JOB_COLUMNS: &str = "job_id, description, groups, analysis_config, analysis_limits, \
                           datafeed_config, custom_settings, last_updated";
const VERSION_COLUMNS: &str = "id, job_id, version, description, groups, analysis_config, \
                               analysis_limits, datafeed_config, custom_settings, timestamp";

/// A value read from the store together with the decode warnings it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    pub warnings: Vec<ParseWarning>,
}

impl<T> Decoded<T> {
    pub fn into_inner(self) -> T {
        self.value
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Handle on the local store file. Passed explicitly to every controller.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::prepare(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.busy_timeout(Duration::from_millis(5000))?;

        let mut migrator = Migrator::new(conn);
        migrator.run_migrations()?;
        Ok(Self {
            conn: migrator.into_connection(),
        })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Start a `BEGIN IMMEDIATE` transaction. Dropping it without commit rolls back.
    pub fn begin(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    pub fn current(&self, job_id: &str) -> Result<Option<Decoded<JobRecord>>> {
        get_current(&self.conn, job_id)
    }

    pub fn versions(&self, job_id: &str, order: VersionOrder) -> Result<Vec<VersionSnapshot>> {
        list_versions(&self.conn, job_id, order)
    }

    pub fn version(&self, job_id: &str, version: u32) -> Result<Option<Decoded<VersionSnapshot>>> {
        get_version(&self.conn, job_id, version)
    }
}

fn record_from_row(row: &Row<'_>, warnings: &mut Vec<ParseWarning>) -> rusqlite::Result<JobRecord> {
    Ok(JobRecord {
        job_id: JobId(row.get("job_id")?),
        fields: codec::fields_from_row(row, warnings)?,
        last_updated: codec::timestamp_from_row(row, "last_updated")?,
    })
}

fn snapshot_from_row(row: &Row<'_>, warnings: &mut Vec<ParseWarning>) -> rusqlite::Result<VersionSnapshot> {
    Ok(VersionSnapshot {
        id: row.get("id")?,
        job_id: JobId(row.get("job_id")?),
        version: row.get("version")?,
        fields: codec::fields_from_row(row, warnings)?,
        timestamp: codec::timestamp_from_row(row, "timestamp")?,
    })
}

fn log_warnings(job_id: &str, warnings: &[ParseWarning]) {
    for w in warnings {
        log::warn!("job {}: {}", job_id, w);
    }
}

pub fn get_current(conn: &Connection, job_id: &str) -> Result<Option<Decoded<JobRecord>>> {
    let mut warnings = Vec::new();
    let record = conn
        .query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE job_id = ?1"),
            params![job_id],
            |row| record_from_row(row, &mut warnings),
        )
        .optional()?;
    Ok(record.map(|value| Decoded { value, warnings }))
}

/// All current records, most recently updated first.
pub fn list_current(conn: &Connection) -> Result<Vec<JobRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {JOB_COLUMNS} FROM jobs ORDER BY last_updated DESC, job_id"
    ))?;
    let mut warnings = Vec::new();
    let rows = stmt.query_map([], |row| record_from_row(row, &mut warnings))?;

    let mut records = Vec::new();
    for record in rows {
        records.push(record?);
    }
    log_warnings("*", &warnings);
    Ok(records)
}

/// Insert the record, or overwrite every field of the existing one.
/// Returns the new `last_updated`.
pub fn upsert_current(conn: &Connection, job_id: &str, fields: &JobFields) -> Result<DateTime<Utc>> {
    let enc = EncodedFields::encode(fields);
    let now = codec::now();
    conn.execute(
        "INSERT INTO jobs (job_id, description, groups, analysis_config, analysis_limits,
                           datafeed_config, custom_settings, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(job_id) DO UPDATE SET
             description = excluded.description,
             groups = excluded.groups,
             analysis_config = excluded.analysis_config,
             analysis_limits = excluded.analysis_limits,
             datafeed_config = excluded.datafeed_config,
             custom_settings = excluded.custom_settings,
             last_updated = excluded.last_updated",
        params![
            job_id,
            enc.description,
            enc.groups,
            enc.analysis_config,
            enc.analysis_limits,
            enc.datafeed_config,
            enc.custom_settings,
            codec::format_timestamp(now),
        ],
    )?;
    Ok(now)
}

/// Append a snapshot numbered `max(existing) + 1`. Returns the new version.
pub fn snapshot(conn: &Connection, job_id: &str, fields: &JobFields) -> Result<u32> {
    let next: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM job_versions WHERE job_id = ?1",
        params![job_id],
        |row| row.get(0),
    )?;

    let enc = EncodedFields::encode(fields);
    conn.execute(
        "INSERT INTO job_versions (job_id, version, description, groups, analysis_config,
                                   analysis_limits, datafeed_config, custom_settings, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            job_id,
            next,
            enc.description,
            enc.groups,
            enc.analysis_config,
            enc.analysis_limits,
            enc.datafeed_config,
            enc.custom_settings,
            codec::format_timestamp(codec::now()),
        ],
    )?;
    log::debug!("Snapshot {} created for job {}", next, job_id);
    Ok(next)
}

/// Snapshots ordered by timestamp; ties fall back to version number.
pub fn list_versions(conn: &Connection, job_id: &str, order: VersionOrder) -> Result<Vec<VersionSnapshot>> {
    let order_by = match order {
        VersionOrder::NewestFirst => "timestamp DESC, version DESC",
        VersionOrder::OldestFirst => "timestamp ASC, version ASC",
    };
    let mut stmt = conn.prepare(&format!(
        "SELECT {VERSION_COLUMNS} FROM job_versions WHERE job_id = ?1 ORDER BY {order_by}"
    ))?;
    let mut warnings = Vec::new();
    let rows = stmt.query_map(params![job_id], |row| snapshot_from_row(row, &mut warnings))?;

    let mut versions = Vec::new();
    for snapshot in rows {
        versions.push(snapshot?);
    }
    log_warnings(job_id, &warnings);
    Ok(versions)
}

pub fn get_version(conn: &Connection, job_id: &str, version: u32) -> Result<Option<Decoded<VersionSnapshot>>> {
    let mut warnings = Vec::new();
    let snapshot = conn
        .query_row(
            &format!("SELECT {VERSION_COLUMNS} FROM job_versions WHERE job_id = ?1 AND version = ?2"),
            params![job_id, version],
            |row| snapshot_from_row(row, &mut warnings),
        )
        .optional()?;
    Ok(snapshot.map(|value| Decoded { value, warnings }))
}

/// The snapshot with the highest version number.
pub fn latest_version(conn: &Connection, job_id: &str) -> Result<Option<Decoded<VersionSnapshot>>> {
    let mut warnings = Vec::new();
    let snapshot = conn
        .query_row(
            &format!(
                "SELECT {VERSION_COLUMNS} FROM job_versions WHERE job_id = ?1
                 ORDER BY version DESC LIMIT 1"
            ),
            params![job_id],
            |row| snapshot_from_row(row, &mut warnings),
        )
        .optional()?;
    Ok(snapshot.map(|value| Decoded { value, warnings }))
}

pub fn count_versions(conn: &Connection, job_id: &str) -> Result<u32> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM job_versions WHERE job_id = ?1",
        params![job_id],
        |row| row.get(0),
    )?)
}

/// Returns whether a row was removed.
pub fn delete_version(conn: &Connection, job_id: &str, version: u32) -> Result<bool> {
    let n = conn.execute(
        "DELETE FROM job_versions WHERE job_id = ?1 AND version = ?2",
        params![job_id, version],
    )?;
    Ok(n > 0)
}

/// Remove the highest-numbered snapshot, returning its version.
pub fn delete_latest_version(conn: &Connection, job_id: &str) -> Result<Option<u32>> {
    let latest: Option<u32> = conn.query_row(
        "SELECT MAX(version) FROM job_versions WHERE job_id = ?1",
        params![job_id],
        |row| row.get(0),
    )?;
    match latest {
        Some(version) => {
            delete_version(conn, job_id, version)?;
            Ok(Some(version))
        }
        None => Ok(None),
    }
}

/// Every job with more than one snapshot, with its snapshot count.
pub fn jobs_with_duplicates(conn: &Connection) -> Result<Vec<(JobId, u32)>> {
    let mut stmt = conn.prepare(
        "SELECT job_id, COUNT(*) FROM job_versions
         GROUP BY job_id HAVING COUNT(*) > 1 ORDER BY job_id",
    )?;
    let rows = stmt.query_map([], |row| Ok((JobId(row.get(0)?), row.get(1)?)))?;

    let mut jobs = Vec::new();
    for job in rows {
        jobs.push(job?);
    }
    Ok(jobs)
}
