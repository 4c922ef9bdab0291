//! Read-only filtered listing of current job records.

use chrono::{DateTime, NaiveDate, Utc};
use common::JobRecord;
use serde::Serialize;
use serde_json::Value;

use crate::db::{self, Store};
use crate::error::Result;

pub const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct SearchFilter {
    /// Case-insensitive substring of the job id.
    pub job_id: Option<String>,
    /// Case-insensitive group membership.
    pub group: Option<String>,
    pub bucket_span: Option<String>,
    /// Every listed influencer must be present.
    pub influencers: Vec<String>,
    pub created_by: Option<String>,
    /// Updated on or after this day.
    pub start_date: Option<NaiveDate>,
    /// Updated on or before this day (whole day included).
    pub end_date: Option<NaiveDate>,
    pub limit: usize,
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            job_id: None,
            group: None,
            bucket_span: None,
            influencers: Vec::new(),
            created_by: None,
            start_date: None,
            end_date: None,
            limit: DEFAULT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub record: JobRecord,
    pub bucket_span: Option<String>,
    pub influencers: Vec<String>,
    pub created_by: Option<String>,
}

impl SearchHit {
    fn from_record(record: JobRecord) -> Self {
        let config = &record.fields.analysis_config;
        let bucket_span = config.get("bucket_span").and_then(Value::as_str).map(str::to_string);
        let influencers = config
            .get("influencers")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let created_by = record
            .fields
            .custom_settings
            .get("created_by")
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            record,
            bucket_span,
            influencers,
            created_by,
        }
    }
}

fn day_start(day: NaiveDate) -> Option<DateTime<Utc>> {
    day.and_hms_opt(0, 0, 0).map(|t| t.and_utc())
}

impl SearchFilter {
    fn matches(&self, hit: &SearchHit) -> bool {
        let record = &hit.record;

        if let Some(needle) = &self.job_id {
            if !record.job_id.as_str().to_lowercase().contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if !record.fields.groups.contains_ignore_case(group) {
                return false;
            }
        }
        if let Some(start) = self.start_date.and_then(day_start) {
            if record.last_updated < start {
                return false;
            }
        }
        if let Some(end) = self.end_date.and_then(|d| d.succ_opt()).and_then(day_start) {
            if record.last_updated >= end {
                return false;
            }
        }
        if let Some(span) = &self.bucket_span {
            if hit.bucket_span.as_deref() != Some(span.as_str()) {
                return false;
            }
        }
        if !self.influencers.iter().all(|i| hit.influencers.contains(i)) {
            return false;
        }
        if let Some(author) = &self.created_by {
            if hit.created_by.as_deref() != Some(author.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Matching records, most recently updated first, at most `filter.limit`.
pub fn search(store: &Store, filter: &SearchFilter) -> Result<Vec<SearchHit>> {
    let hits: Vec<SearchHit> = db::list_current(store.conn())?
        .into_iter()
        .map(SearchHit::from_record)
        .filter(|hit| filter.matches(hit))
        .take(filter.limit)
        .collect();
    log::debug!("Search matched {} job(s)", hits.len());
    Ok(hits)
}
