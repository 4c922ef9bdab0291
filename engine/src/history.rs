use common::VersionSnapshot;

use crate::db::{self, Store, VersionOrder};
use crate::error::{Error, Result};

/// Snapshots of a known job. An empty list means the job exists with no
/// history; an unknown job is `NotFound`.
pub fn history(store: &Store, job_id: &str, order: VersionOrder) -> Result<Vec<VersionSnapshot>> {
    let conn = store.conn();
    if db::get_current(conn, job_id)?.is_none() {
        return Err(Error::NotFound(format!("job '{}'", job_id)));
    }
    let versions = db::list_versions(conn, job_id, order)?;
    log::debug!("Job {} has {} snapshot(s)", job_id, versions.len());
    Ok(versions)
}
