//! Structural diff between two job field sets.
//!
//! Key order and array order are ignored. Changes are reported at the full
//! path of the leaf that changed, e.g. `analysis_config.detectors[0].function`.

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::job::{JobFields, JsonObject};

/// What happened at a path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// Present on both sides with different values.
    ValueChanged { old: Value, new: Value },
    /// Key (or array element) present only on the new side.
    Added { value: Value },
    /// Key (or array element) present only on the old side.
    Removed { value: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffEntry {
    pub path: String,
    #[serde(flatten)]
    pub change: Change,
}

/// Ordered list of changes between two field sets. Empty means identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct JobDiff {
    entries: Vec<DiffEntry>,
}

/// A [`JobDiff`] split by change category.
#[derive(Debug, Default)]
pub struct DiffGroups<'a> {
    pub values_changed: Vec<&'a DiffEntry>,
    pub added: Vec<&'a DiffEntry>,
    pub removed: Vec<&'a DiffEntry>,
}

impl JobDiff {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[DiffEntry] {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&Change> {
        self.entries.iter().find(|e| e.path == path).map(|e| &e.change)
    }

    pub fn grouped(&self) -> DiffGroups<'_> {
        let mut groups = DiffGroups::default();
        for entry in &self.entries {
            match entry.change {
                Change::ValueChanged { .. } => groups.values_changed.push(entry),
                Change::Added { .. } => groups.added.push(entry),
                Change::Removed { .. } => groups.removed.push(entry),
            }
        }
        groups
    }

    /// Raw grouped structure: `{"values_changed": {path: {old_value, new_value}},
    /// "added": {path: value}, "removed": {path: value}}`. Empty categories are omitted.
    pub fn to_json(&self) -> Value {
        let mut changed = Map::new();
        let mut added = Map::new();
        let mut removed = Map::new();
        for entry in &self.entries {
            match &entry.change {
                Change::ValueChanged { old, new } => {
                    changed.insert(entry.path.clone(), json!({"old_value": old, "new_value": new}));
                }
                Change::Added { value } => {
                    added.insert(entry.path.clone(), value.clone());
                }
                Change::Removed { value } => {
                    removed.insert(entry.path.clone(), value.clone());
                }
            }
        }

        let mut out = Map::new();
        for (name, section) in [("values_changed", changed), ("added", added), ("removed", removed)] {
            if !section.is_empty() {
                out.insert(name.to_string(), Value::Object(section));
            }
        }
        Value::Object(out)
    }
}

/// Diff every tracked field of `old` against `new`.
pub fn diff_fields(old: &JobFields, new: &JobFields) -> JobDiff {
    let mut entries = Vec::new();

    if old.description != new.description {
        entries.push(DiffEntry {
            path: "description".to_string(),
            change: Change::ValueChanged {
                old: Value::String(old.description.clone()),
                new: Value::String(new.description.clone()),
            },
        });
    }

    if !old.groups.same_members(&new.groups) {
        entries.push(DiffEntry {
            path: "groups".to_string(),
            change: Change::ValueChanged {
                old: Value::String(old.groups.to_stored()),
                new: Value::String(new.groups.to_stored()),
            },
        });
    }

    for ((name, old_obj), (_, new_obj)) in old.objects().into_iter().zip(new.objects()) {
        diff_objects(name, old_obj, new_obj, &mut entries);
    }

    JobDiff { entries }
}

/// Diff two arbitrary JSON values rooted at `path`.
pub fn diff_values(path: &str, old: &Value, new: &Value) -> JobDiff {
    let mut entries = Vec::new();
    diff_value(path.to_string(), old, new, &mut entries);
    JobDiff { entries }
}

fn diff_value(path: String, old: &Value, new: &Value, out: &mut Vec<DiffEntry>) {
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => diff_objects(&path, a, b, out),
        (Value::Array(a), Value::Array(b)) => diff_arrays(&path, a, b, out),
        _ if json_eq(old, new) => {}
        _ => out.push(DiffEntry {
            path,
            change: Change::ValueChanged {
                old: old.clone(),
                new: new.clone(),
            },
        }),
    }
}

fn diff_objects(path: &str, old: &JsonObject, new: &JsonObject, out: &mut Vec<DiffEntry>) {
    for (key, old_v) in old {
        let child = key_path(path, key);
        match new.get(key) {
            Some(new_v) => diff_value(child, old_v, new_v, out),
            None => out.push(DiffEntry {
                path: child,
                change: Change::Removed { value: old_v.clone() },
            }),
        }
    }
    for (key, new_v) in new {
        if !old.contains_key(key) {
            out.push(DiffEntry {
                path: key_path(path, key),
                change: Change::Added { value: new_v.clone() },
            });
        }
    }
}

// Elements equal as a multiset cancel out; the remaining unmatched elements
// are paired in order and diffed, leftovers are added/removed.
fn diff_arrays(path: &str, old: &[Value], new: &[Value], out: &mut Vec<DiffEntry>) {
    let mut old_left: Vec<usize> = (0..old.len()).collect();
    let mut new_left: Vec<usize> = Vec::new();

    for (j, nv) in new.iter().enumerate() {
        match old_left.iter().position(|&i| json_eq(&old[i], nv)) {
            Some(pos) => {
                old_left.remove(pos);
            }
            None => new_left.push(j),
        }
    }

    let paired = old_left.len().min(new_left.len());
    for k in 0..paired {
        diff_value(
            index_path(path, new_left[k]),
            &old[old_left[k]],
            &new[new_left[k]],
            out,
        );
    }
    for &i in &old_left[paired..] {
        out.push(DiffEntry {
            path: index_path(path, i),
            change: Change::Removed { value: old[i].clone() },
        });
    }
    for &j in &new_left[paired..] {
        out.push(DiffEntry {
            path: index_path(path, j),
            change: Change::Added { value: new[j].clone() },
        });
    }
}

/// Order-insensitive equality; numbers compare by value so `1 == 1.0`.
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if x.is_f64() || y.is_f64() {
                x.as_f64() == y.as_f64()
            } else {
                x == y
            }
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map_or(false, |w| json_eq(v, w)))
        }
        (Value::Array(x), Value::Array(y)) => {
            if x.len() != y.len() {
                return false;
            }
            let mut unmatched: Vec<&Value> = y.iter().collect();
            x.iter().all(|v| match unmatched.iter().position(|w| json_eq(v, w)) {
                Some(pos) => {
                    unmatched.swap_remove(pos);
                    true
                }
                None => false,
            })
        }
        _ => a == b,
    }
}

fn key_path(parent: &str, key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    match (parent.is_empty(), plain) {
        (true, true) => key.to_string(),
        (false, true) => format!("{parent}.{key}"),
        (_, false) => format!("{parent}[{key:?}]"),
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Groups;
    use serde_json::json;

    fn fields(analysis_config: Value) -> JobFields {
        JobFields {
            description: "d".to_string(),
            groups: Groups::new(["g1", "g2"]),
            analysis_config: analysis_config.as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    #[test]
    fn self_comparison_is_empty() {
        let f = fields(json!({
            "bucket_span": "15m",
            "detectors": [{"function": "sum", "field_name": "taxful_total_price"}],
            "influencers": ["a", "b"]
        }));
        assert!(diff_fields(&f, &f).is_empty());
    }

    #[test]
    fn single_nested_change_is_reported_at_its_path() {
        let old = fields(json!({"bucket_span": "15m", "model": {"params": {"alpha": 1, "beta": 2}}}));
        let new = fields(json!({"bucket_span": "15m", "model": {"params": {"alpha": 3, "beta": 2}}}));
        let d = diff_fields(&old, &new);
        assert_eq!(d.len(), 1);
        assert_eq!(
            d.entries()[0],
            DiffEntry {
                path: "analysis_config.model.params.alpha".to_string(),
                change: Change::ValueChanged { old: json!(1), new: json!(3) },
            }
        );
    }

    #[test]
    fn added_and_removed_keys() {
        let old = fields(json!({"bucket_span": "15m", "latency": "0s"}));
        let new = fields(json!({"bucket_span": "15m", "summary_count_field_name": "doc_count"}));
        let d = diff_fields(&old, &new);
        let g = d.grouped();
        assert!(g.values_changed.is_empty());
        assert_eq!(g.added.len(), 1);
        assert_eq!(g.added[0].path, "analysis_config.summary_count_field_name");
        assert_eq!(g.removed.len(), 1);
        assert_eq!(g.removed[0].path, "analysis_config.latency");
    }

    #[test]
    fn array_order_is_ignored() {
        let old = fields(json!({"influencers": ["a", "b", "c"]}));
        let new = fields(json!({"influencers": ["c", "a", "b"]}));
        assert!(diff_fields(&old, &new).is_empty());
    }

    #[test]
    fn array_element_changes_are_paired() {
        let old = fields(json!({"detectors": [
            {"function": "count"},
            {"function": "sum", "field_name": "price"}
        ]}));
        let new = fields(json!({"detectors": [
            {"function": "mean", "field_name": "price"},
            {"function": "count"}
        ]}));
        let d = diff_fields(&old, &new);
        assert_eq!(d.len(), 1);
        assert_eq!(
            d.get("analysis_config.detectors[0].function"),
            Some(&Change::ValueChanged { old: json!("sum"), new: json!("mean") })
        );
    }

    #[test]
    fn extra_array_elements_are_added() {
        let d = diff_values("influencers", &json!(["a"]), &json!(["a", "b"]));
        assert_eq!(d.get("influencers[1]"), Some(&Change::Added { value: json!("b") }));
    }

    #[test]
    fn scalars_and_group_sets() {
        let old = JobFields {
            description: "a".into(),
            groups: Groups::new(["x", "y"]),
            ..Default::default()
        };
        let mut new = old.clone();
        new.groups = Groups::new(["y", "x"]);
        assert!(diff_fields(&old, &new).is_empty());

        new.description = "b".into();
        new.groups = Groups::new(["x"]);
        let d = diff_fields(&old, &new);
        assert_eq!(
            d.get("description"),
            Some(&Change::ValueChanged { old: json!("a"), new: json!("b") })
        );
        assert_eq!(
            d.get("groups"),
            Some(&Change::ValueChanged { old: json!("x, y"), new: json!("x") })
        );
    }

    #[test]
    fn numbers_compare_by_value() {
        assert!(json_eq(&json!(1), &json!(1.0)));
        assert!(!json_eq(&json!(1), &json!(2)));
        assert!(json_eq(&json!({"a": [1, {"b": 2}]}), &json!({"a": [{"b": 2.0}, 1]})));
    }

    #[test]
    fn odd_keys_are_bracketed() {
        let d = diff_values("custom_settings", &json!({"a.b": 1}), &json!({"a.b": 2}));
        assert_eq!(d.entries()[0].path, "custom_settings[\"a.b\"]");
    }

    #[test]
    fn grouped_json_shape() {
        let old = fields(json!({"bucket_span": "15m", "gone": true}));
        let new = fields(json!({"bucket_span": "30m"}));
        let raw = diff_fields(&old, &new).to_json();
        assert_eq!(
            raw,
            json!({
                "values_changed": {
                    "analysis_config.bucket_span": {"old_value": "15m", "new_value": "30m"}
                },
                "removed": {"analysis_config.gone": true}
            })
        );
    }
}
