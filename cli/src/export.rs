use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use common::VersionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

pub fn default_output(job_id: &str, format: ExportFormat) -> PathBuf {
    PathBuf::from(format!("{}.{}", job_id, format.extension()))
}

const CSV_HEADER: [&str; 8] = [
    "Version",
    "Timestamp",
    "Description",
    "Groups",
    "AnalysisConfig",
    "AnalysisLimits",
    "DatafeedConfig",
    "CustomSettings",
];

fn write_csv<W: Write>(out: W, versions: &[VersionSnapshot]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(CSV_HEADER)?;
    for v in versions {
        let fields = &v.fields;
        writer.write_record([
            v.version.to_string(),
            v.timestamp.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            fields.description.clone(),
            fields.groups.to_stored(),
            serde_json::to_string(&fields.analysis_config)?,
            serde_json::to_string(&fields.analysis_limits)?,
            serde_json::to_string(&fields.datafeed_config)?,
            serde_json::to_string(&fields.custom_settings)?,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_json<W: Write>(mut out: W, versions: &[VersionSnapshot]) -> Result<()> {
    serde_json::to_writer_pretty(&mut out, versions)?;
    writeln!(out)?;
    Ok(())
}

/// Write the version history of one job to `path`.
pub fn export_versions(path: &Path, format: ExportFormat, versions: &[VersionSnapshot]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create export file: {:?}", path))?;
    match format {
        ExportFormat::Csv => write_csv(file, versions),
        ExportFormat::Json => write_json(file, versions),
    }
}
