use common::JobId;
use serde::Serialize;

use crate::db::{self, Store};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UndoReport {
    pub job_id: JobId,
    /// Version whose content is now the current record.
    pub restored_version: u32,
    /// Snapshots still behind the current record.
    pub remaining: u32,
}

/// Restore the current record from its highest-numbered snapshot and drop
/// that snapshot. The record is updated in place inside one transaction.
pub fn undo(store: &mut Store, job_id: &str) -> Result<UndoReport> {
    let tx = store.begin()?;

    let Some(latest) = db::latest_version(&tx, job_id)? else {
        return Err(match db::get_current(&tx, job_id)? {
            Some(_) => Error::NoHistory(job_id.to_string()),
            None => Error::NotFound(format!("job '{}'", job_id)),
        });
    };
    for w in &latest.warnings {
        log::warn!("job {} version {}: {}", job_id, latest.value.version, w);
    }

    let snapshot = latest.into_inner();
    db::upsert_current(&tx, job_id, &snapshot.fields)?;
    db::delete_version(&tx, job_id, snapshot.version)?;
    let remaining = db::count_versions(&tx, job_id)?;

    tx.commit()?;
    log::info!("Rolled back job {} to version {}", job_id, snapshot.version);

    Ok(UndoReport {
        job_id: JobId(job_id.to_string()),
        restored_version: snapshot.version,
        remaining,
    })
}
