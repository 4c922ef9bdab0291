//! Collapse duplicate snapshots of a job into one authoritative current value.

use std::collections::HashMap;
use std::str::FromStr;

use common::{JobId, VersionSnapshot};
use serde::{Deserialize, Serialize};

use crate::codec::EncodedFields;
use crate::db::{self, Store, VersionOrder};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Snapshot with the most recent timestamp.
    Latest,
    /// Snapshot with the oldest timestamp.
    Earliest,
    /// Content occurring most often; ties go to the newest.
    #[default]
    MostCommon,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Latest => "latest",
            MergeStrategy::Earliest => "earliest",
            MergeStrategy::MostCommon => "most_common",
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "latest" => Ok(MergeStrategy::Latest),
            "earliest" => Ok(MergeStrategy::Earliest),
            "most_common" => Ok(MergeStrategy::MostCommon),
            _ => Err(format!("unknown merge strategy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    pub strategy: MergeStrategy,
    /// Delete every losing snapshot of a merged job. Off unless asked for.
    pub prune: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedJob {
    pub job_id: JobId,
    pub winning_version: u32,
    pub candidates: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub strategy: MergeStrategy,
    pub jobs: Vec<MergedJob>,
    pub pruned: usize,
}

impl MergeReport {
    pub fn jobs_merged(&self) -> usize {
        self.jobs.len()
    }
}

/// Pick the winner among snapshots ordered newest first.
pub fn select_winner(strategy: MergeStrategy, newest_first: &[VersionSnapshot]) -> Option<&VersionSnapshot> {
    match strategy {
        MergeStrategy::Latest => newest_first.first(),
        MergeStrategy::Earliest => newest_first.last(),
        MergeStrategy::MostCommon => {
            let encoded: Vec<EncodedFields> = newest_first
                .iter()
                .map(|s| EncodedFields::encode(&s.fields))
                .collect();
            let mut counts: HashMap<&EncodedFields, usize> = HashMap::new();
            for content in &encoded {
                *counts.entry(content).or_insert(0) += 1;
            }

            // strict `>` keeps the first-encountered content on ties
            let mut best: Option<(usize, usize)> = None;
            for (i, content) in encoded.iter().enumerate() {
                let n = counts[content];
                if best.map_or(true, |(_, top)| n > top) {
                    best = Some((i, n));
                }
            }
            best.map(|(i, _)| &newest_first[i])
        }
    }
}

/// Merge every job that has more than one snapshot. Runs as one transaction.
///
/// The live record is overwritten with the winner without being snapshotted
/// first, so its previous state cannot be restored by `undo` afterwards.
pub fn merge(store: &mut Store, opts: MergeOptions) -> Result<MergeReport> {
    let tx = store.begin()?;

    let mut report = MergeReport {
        strategy: opts.strategy,
        jobs: Vec::new(),
        pruned: 0,
    };

    for (job_id, count) in db::jobs_with_duplicates(&tx)? {
        let versions = db::list_versions(&tx, job_id.as_str(), VersionOrder::NewestFirst)?;
        let Some(winner) = select_winner(opts.strategy, &versions) else {
            continue;
        };

        db::upsert_current(&tx, job_id.as_str(), &winner.fields)?;
        log::debug!(
            "Merged job {} using {}: version {} of {}",
            job_id,
            opts.strategy,
            winner.version,
            count
        );

        if opts.prune {
            for loser in versions.iter().filter(|v| v.version != winner.version) {
                db::delete_version(&tx, job_id.as_str(), loser.version)?;
                report.pruned += 1;
            }
        }

        report.jobs.push(MergedJob {
            job_id: job_id.clone(),
            winning_version: winner.version,
            candidates: versions.len(),
        });
    }

    tx.commit()?;
    log::info!(
        "Merged {} job(s) using strategy: {} ({} snapshot(s) pruned)",
        report.jobs_merged(),
        report.strategy,
        report.pruned
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use common::JobFields;

    fn snap(version: u32, description: &str, age_minutes: i64) -> VersionSnapshot {
        VersionSnapshot {
            id: version as i64,
            job_id: JobId::from("j1"),
            version,
            fields: JobFields {
                description: description.to_string(),
                ..Default::default()
            },
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn latest_and_earliest_pick_the_ends() {
        let v = [snap(3, "c", 0), snap(2, "b", 5), snap(1, "a", 10)];
        assert_eq!(select_winner(MergeStrategy::Latest, &v).unwrap().version, 3);
        assert_eq!(select_winner(MergeStrategy::Earliest, &v).unwrap().version, 1);
        assert!(select_winner(MergeStrategy::Latest, &[]).is_none());
    }

    #[test]
    fn most_common_prefers_majority_then_newest() {
        let v = [snap(3, "y", 0), snap(2, "x", 5), snap(1, "x", 10)];
        assert_eq!(select_winner(MergeStrategy::MostCommon, &v).unwrap().fields.description, "x");
        assert_eq!(select_winner(MergeStrategy::MostCommon, &v).unwrap().version, 2);

        let tie = [snap(2, "y", 0), snap(1, "x", 5)];
        assert_eq!(select_winner(MergeStrategy::MostCommon, &tie).unwrap().version, 2);
    }

    #[test]
    fn strategy_names_round_trip() {
        for s in [MergeStrategy::Latest, MergeStrategy::Earliest, MergeStrategy::MostCommon] {
            assert_eq!(s.as_str().parse::<MergeStrategy>().unwrap(), s);
        }
        assert!("newest".parse::<MergeStrategy>().is_err());
    }
}
