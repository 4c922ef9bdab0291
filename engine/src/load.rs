//! Reconciliation: bring an incoming document into the store, snapshotting
//! the record it replaces.

use common::{diff_fields, normalize, JobId, Normalized, ParseWarning};
use serde::Serialize;
use serde_json::Value;

use crate::db::{self, Decoded, Store};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    /// First time this job was seen.
    Created,
    /// Previous content was preserved as `snapshot_version`. `changes` is
    /// zero for an identical reload, which is still recorded.
    Updated { snapshot_version: u32, changes: usize },
    /// Document lacked a required field.
    Skipped { reason: String },
    /// The store rejected the write; this document's transaction was rolled back.
    Failed { reason: String },
}

impl LoadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            LoadOutcome::Created | LoadOutcome::Updated { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    /// Position of the document within the batch.
    pub index: usize,
    pub job_id: Option<JobId>,
    pub outcome: LoadOutcome,
    pub warnings: Vec<ParseWarning>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub documents: Vec<DocumentReport>,
}

impl LoadReport {
    /// Documents that ended up reflected in the store.
    pub fn loaded(&self) -> usize {
        self.documents.iter().filter(|d| d.outcome.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, LoadOutcome::Skipped { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| matches!(d.outcome, LoadOutcome::Failed { .. }))
            .count()
    }
}

/// Load a parsed input value: a single document or an array of documents.
/// Documents are processed in order; a bad document never stops the batch.
pub fn load_value(store: &mut Store, input: &Value) -> LoadReport {
    let docs: Vec<&Value> = match input {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut report = LoadReport::default();
    for (index, doc) in docs.into_iter().enumerate() {
        report.documents.push(load_document(store, index, doc));
    }

    log::info!(
        "Loaded {} of {} document(s) ({} skipped, {} failed)",
        report.loaded(),
        report.documents.len(),
        report.skipped(),
        report.failed()
    );
    report
}

fn load_document(store: &mut Store, index: usize, doc: &Value) -> DocumentReport {
    let Normalized {
        job_id,
        fields,
        mut warnings,
    } = match normalize(doc) {
        Ok(n) => n,
        Err(e) => {
            log::warn!("Document {}: {}. Skipping entry.", index, e);
            return DocumentReport {
                index,
                job_id: None,
                outcome: LoadOutcome::Skipped {
                    reason: Error::from(e).to_string(),
                },
                warnings: Vec::new(),
            };
        }
    };

    for w in &warnings {
        log::warn!("job {}: {}", job_id, w);
    }

    let outcome = match reconcile(store, &job_id, &fields) {
        Ok(decoded) => {
            warnings.extend(decoded.warnings);
            decoded.value
        }
        Err(e) => {
            log::error!("Failed to load job {}: {}", job_id, e);
            LoadOutcome::Failed {
                reason: e.to_string(),
            }
        }
    };

    DocumentReport {
        index,
        job_id: Some(job_id),
        outcome,
        warnings,
    }
}

/// Snapshot-before-overwrite, all in one transaction. An existing record is
/// always snapshotted, even when the incoming fields are identical.
/// Warnings come from decoding the stored record being replaced.
pub fn reconcile(store: &mut Store, job_id: &JobId, fields: &common::JobFields) -> Result<Decoded<LoadOutcome>> {
    let tx = store.begin()?;
    let mut warnings = Vec::new();

    let outcome = match db::get_current(&tx, job_id.as_str())? {
        None => {
            db::upsert_current(&tx, job_id.as_str(), fields)?;
            log::debug!("Created job {}", job_id);
            LoadOutcome::Created
        }
        Some(current) => {
            for w in &current.warnings {
                log::warn!("job {} (stored): {}", job_id, w);
            }
            warnings.extend(current.warnings.iter().cloned());
            let changes = diff_fields(&current.value.fields, fields).len();
            let snapshot_version = db::snapshot(&tx, job_id.as_str(), &current.value.fields)?;
            db::upsert_current(&tx, job_id.as_str(), fields)?;
            log::debug!(
                "Updated job {} ({} change(s), previous state is version {})",
                job_id,
                changes,
                snapshot_version
            );
            LoadOutcome::Updated {
                snapshot_version,
                changes,
            }
        }
    };

    tx.commit()?;
    Ok(Decoded {
        value: outcome,
        warnings,
    })
}
