use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use common::{Change, JobRecord, VersionSnapshot};
use engine::{Comparison, LoadReport, LoadOutcome, SearchHit};
use serde_json::Value;

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn timestamp(record: &JobRecord) -> String {
    record.last_updated.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Strings print bare; everything else as compact JSON.
fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn search_table(hits: &[SearchHit]) -> Table {
    let mut table = table();
    table.set_header(vec![
        "Job ID",
        "Description",
        "Groups",
        "Bucket Span",
        "Influencers",
        "Created By",
        "Last Updated",
    ]);
    for hit in hits {
        let record = &hit.record;
        table.add_row(vec![
            record.job_id.to_string(),
            record.fields.description.clone(),
            record.fields.groups.to_stored(),
            hit.bucket_span.clone().unwrap_or_else(|| "N/A".to_string()),
            hit.influencers.join(", "),
            hit.created_by.clone().unwrap_or_else(|| "N/A".to_string()),
            timestamp(record),
        ]);
    }
    table
}

pub fn history_table(versions: &[VersionSnapshot]) -> Table {
    let mut table = table();
    table.set_header(vec!["Version", "Timestamp", "Description"]);
    for v in versions {
        table.add_row(vec![
            v.version.to_string(),
            v.timestamp.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
            v.fields.description.clone(),
        ]);
    }
    table
}

pub fn compare_table(cmp: &Comparison) -> Table {
    let mut table = table();
    table.set_header(vec!["Field", "Old", "New"]);
    for entry in cmp.diff.entries() {
        let (old, new) = match &entry.change {
            Change::ValueChanged { old, new } => (cell(old), cell(new)),
            Change::Added { value } => (String::new(), cell(value)),
            Change::Removed { value } => (cell(value), String::new()),
        };
        table.add_row(vec![entry.path.clone(), old, new]);
    }
    table
}

/// One line per document followed by a summary line.
pub fn load_lines(report: &LoadReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .documents
        .iter()
        .map(|doc| {
            let id = doc
                .job_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| format!("#{}", doc.index));
            match &doc.outcome {
                LoadOutcome::Created => format!("{}: created", id),
                LoadOutcome::Updated {
                    snapshot_version,
                    changes,
                } => format!(
                    "{}: updated, {} change(s) (previous state saved as version {})",
                    id, changes, snapshot_version
                ),
                LoadOutcome::Skipped { reason } => format!("{}: skipped ({})", id, reason),
                LoadOutcome::Failed { reason } => format!("{}: failed ({})", id, reason),
            }
        })
        .collect();
    lines.push(format!(
        "Loaded {} job(s), skipped {}, failed {}",
        report.loaded(),
        report.skipped(),
        report.failed()
    ));
    lines
}
