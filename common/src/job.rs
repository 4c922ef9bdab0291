use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A JSON object as carried by the object-valued job fields.
pub type JsonObject = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        JobId(s.to_string())
    }
}

/// Separator used when groups are flattened into a single column.
pub const GROUP_SEPARATOR: &str = ", ";

/// Ordered set of group names: first occurrence wins, duplicates are dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Groups(Vec<String>);

impl Groups {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !name.is_empty() && !out.contains(&name) {
                out.push(name);
            }
        }
        Groups(out)
    }

    /// Parse the flattened storage form back into a set.
    ///
    /// The form splits on `,`, so a name containing a comma comes back as
    /// several names. Elastic ML group names cannot contain commas.
    pub fn from_stored(s: &str) -> Self {
        Self::new(s.split(',').map(str::trim))
    }

    /// Deterministic, order-preserving storage form.
    pub fn to_stored(&self) -> String {
        self.0.join(GROUP_SEPARATOR)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains_ignore_case(&self, name: &str) -> bool {
        self.0.iter().any(|g| g.eq_ignore_ascii_case(name))
    }

    /// Set equality; order is not significant.
    pub fn same_members(&self, other: &Groups) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|g| other.0.contains(g))
    }
}

/// The tracked field set shared by the current record and its snapshots.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobFields {
    pub description: String,
    pub groups: Groups,
    pub analysis_config: JsonObject,
    pub analysis_limits: JsonObject,
    pub datafeed_config: JsonObject,
    pub custom_settings: JsonObject,
}

impl JobFields {
    /// Object-valued fields paired with their column names, in storage order.
    pub fn objects(&self) -> [(&'static str, &JsonObject); 4] {
        [
            ("analysis_config", &self.analysis_config),
            ("analysis_limits", &self.analysis_limits),
            ("datafeed_config", &self.datafeed_config),
            ("custom_settings", &self.custom_settings),
        ]
    }
}

/// The current (live) state of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    pub job_id: JobId,
    #[serde(flatten)]
    pub fields: JobFields,
    pub last_updated: DateTime<Utc>,
}

/// Immutable historical copy of a job's fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionSnapshot {
    pub id: i64,
    pub job_id: JobId,
    pub version: u32,
    #[serde(flatten)]
    pub fields: JobFields,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_drop_duplicates_and_keep_order() {
        let g = Groups::new(["b", "a", "b", ""]);
        assert_eq!(g.to_stored(), "b, a");
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn groups_round_trip_through_storage_form() {
        let g = Groups::new(["ops", "security", "ml"]);
        assert_eq!(Groups::from_stored(&g.to_stored()), g);
        assert!(Groups::from_stored("").is_empty());
    }

    #[test]
    fn groups_compare_as_sets() {
        let a = Groups::new(["x", "y"]);
        let b = Groups::new(["y", "x"]);
        assert!(a.same_members(&b));
        assert_ne!(a, b);
        assert!(!a.same_members(&Groups::new(["x"])));
        assert!(a.contains_ignore_case("Y"));
    }

    #[test]
    fn comma_in_a_group_name_splits_on_read() {
        let g = Groups::new(["a,b"]);
        assert_eq!(Groups::from_stored(&g.to_stored()), Groups::new(["a", "b"]));
    }
}
