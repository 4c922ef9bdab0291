//! Extracts the tracked field set from a raw ML job document.
//!
//! Documents are shaped like `{"job": {...}, "datafeed": {...}}`. Only
//! `job.job_id` is required; every other field falls back to an empty
//! placeholder, and a field holding a value of the wrong shape is replaced
//! by that placeholder with a [`ParseWarning`].

use serde_json::Value;

use crate::error::{MissingFieldError, ParseWarning};
use crate::job::{Groups, JobFields, JobId, JsonObject};

/// A document reduced to its identifier and tracked fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub job_id: JobId,
    pub fields: JobFields,
    pub warnings: Vec<ParseWarning>,
}

pub fn normalize(doc: &Value) -> Result<Normalized, MissingFieldError> {
    let job = doc
        .get("job")
        .and_then(Value::as_object)
        .ok_or_else(|| MissingFieldError::new("job"))?;

    let job_id = match job.get("job_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => JobId(id.clone()),
        _ => return Err(MissingFieldError::new("job.job_id")),
    };

    let mut warnings = Vec::new();

    let description = match job.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            warnings.push(ParseWarning::new(
                "description",
                format!("expected a string, found {}", kind_of(other)),
            ));
            String::new()
        }
    };

    let groups = groups_field(job.get("groups"), &mut warnings);

    let fields = JobFields {
        description,
        groups,
        analysis_config: object_field("analysis_config", job.get("analysis_config"), &mut warnings),
        analysis_limits: object_field("analysis_limits", job.get("analysis_limits"), &mut warnings),
        datafeed_config: object_field("datafeed_config", doc.get("datafeed"), &mut warnings),
        custom_settings: object_field("custom_settings", job.get("custom_settings"), &mut warnings),
    };

    Ok(Normalized {
        job_id,
        fields,
        warnings,
    })
}

fn object_field(name: &str, value: Option<&Value>, warnings: &mut Vec<ParseWarning>) -> JsonObject {
    match value {
        None | Some(Value::Null) => JsonObject::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            warnings.push(ParseWarning::new(
                name,
                format!("expected an object, found {}; storing {{}}", kind_of(other)),
            ));
            JsonObject::new()
        }
    }
}

fn groups_field(value: Option<&Value>, warnings: &mut Vec<ParseWarning>) -> Groups {
    let items = match value {
        None | Some(Value::Null) => return Groups::default(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            warnings.push(ParseWarning::new(
                "groups",
                format!("expected an array of strings, found {}", kind_of(other)),
            ));
            return Groups::default();
        }
    };

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(s) => names.push(s.clone()),
            other => warnings.push(ParseWarning::new(
                "groups",
                format!("ignoring non-string group {}", other),
            )),
        }
    }
    Groups::new(names)
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
