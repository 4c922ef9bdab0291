use common::{diff_fields, JobDiff, JobFields, JobId, ParseWarning};
use serde::Serialize;

use crate::db::{self, Store};
use crate::error::{Error, Result};

/// One side of a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Version(u32),
    Current,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Version(v) => write!(f, "v{}", v),
            Side::Current => write!(f, "current"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompareRequest {
    /// Defaults to the highest existing version.
    pub from: Option<u32>,
    /// Defaults to the current record.
    pub to: Option<u32>,
    /// Force the right-hand side to the current record.
    pub against_current: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub job_id: JobId,
    pub from: Side,
    pub to: Side,
    pub diff: JobDiff,
    pub warnings: Vec<ParseWarning>,
}

pub fn compare(store: &Store, job_id: &str, req: &CompareRequest) -> Result<Comparison> {
    let conn = store.conn();
    let current = db::get_current(conn, job_id)?
        .ok_or_else(|| Error::NotFound(format!("no current version of job '{}'", job_id)))?;

    let from = match req.from {
        Some(v) => Side::Version(v),
        None => match db::latest_version(conn, job_id)? {
            Some(latest) => Side::Version(latest.value.version),
            None => return Err(Error::NoHistory(job_id.to_string())),
        },
    };
    let to = match (req.against_current, req.to) {
        (false, Some(v)) => Side::Version(v),
        _ => Side::Current,
    };

    let mut warnings = Vec::new();
    let mut resolve = |side: Side| -> Result<JobFields> {
        match side {
            Side::Current => {
                warnings.extend(current.warnings.iter().cloned());
                Ok(current.value.fields.clone())
            }
            Side::Version(v) => {
                let snapshot = db::get_version(conn, job_id, v)?.ok_or_else(|| {
                    Error::NotFound(format!("version {} of job '{}'", v, job_id))
                })?;
                warnings.extend(snapshot.warnings);
                Ok(snapshot.value.fields)
            }
        }
    };
    let old = resolve(from)?;
    let new = resolve(to)?;

    let diff = diff_fields(&old, &new);
    log::debug!("Compared job {} {} -> {}: {} change(s)", job_id, from, to, diff.len());

    Ok(Comparison {
        job_id: JobId(job_id.to_string()),
        from,
        to,
        diff,
        warnings,
    })
}
