//! Text encoding of job fields at the store boundary.
//!
//! Object fields are stored as compact JSON text and groups as a joined
//! string. Decoding never fails: unreadable object text becomes `{}` and a
//! [`ParseWarning`] is recorded.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use common::{Groups, JobFields, JsonObject, ParseWarning};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::Row;
use serde_json::Value;

/// Storage form of [`JobFields`]. Equality on this form is byte equality of
/// the persisted columns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedFields {
    pub description: String,
    pub groups: String,
    pub analysis_config: String,
    pub analysis_limits: String,
    pub datafeed_config: String,
    pub custom_settings: String,
}

impl EncodedFields {
    pub fn encode(fields: &JobFields) -> Self {
        Self {
            description: fields.description.clone(),
            groups: fields.groups.to_stored(),
            analysis_config: encode_object(&fields.analysis_config),
            analysis_limits: encode_object(&fields.analysis_limits),
            datafeed_config: encode_object(&fields.datafeed_config),
            custom_settings: encode_object(&fields.custom_settings),
        }
    }
}

pub fn encode_object(obj: &JsonObject) -> String {
    // Map keys are strings, so this cannot fail in practice
    serde_json::to_string(obj).unwrap_or_else(|_| String::from("{}"))
}

pub fn decode_object(field: &str, text: &str, warnings: &mut Vec<ParseWarning>) -> JsonObject {
    if text.trim().is_empty() {
        return JsonObject::new();
    }
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(Value::Null) => JsonObject::new(),
        Ok(_) => {
            warnings.push(ParseWarning::new(field, "stored value is not a JSON object; using {}"));
            JsonObject::new()
        }
        Err(e) => {
            warnings.push(ParseWarning::new(field, format!("invalid JSON ({e}); using {{}}")));
            JsonObject::new()
        }
    }
}

/// Read the six tracked columns by name.
pub fn fields_from_row(row: &Row<'_>, warnings: &mut Vec<ParseWarning>) -> rusqlite::Result<JobFields> {
    let description: Option<String> = row.get("description")?;
    let groups: Option<String> = row.get("groups")?;

    let mut object = |name: &str| -> rusqlite::Result<JsonObject> {
        let text: Option<String> = row.get(name)?;
        Ok(decode_object(name, text.as_deref().unwrap_or(""), warnings))
    };

    Ok(JobFields {
        description: description.unwrap_or_default(),
        groups: Groups::from_stored(groups.as_deref().unwrap_or("")),
        analysis_config: object("analysis_config")?,
        analysis_limits: object("analysis_limits")?,
        datafeed_config: object("datafeed_config")?,
        custom_settings: object("custom_settings")?,
    })
}

/// Timestamps are RFC 3339 UTC with millisecond precision so that text order
/// matches time order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Column wrapper that parses stored RFC 3339 text.
pub struct StoredTimestamp(pub DateTime<Utc>);

impl FromSql for StoredTimestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let text = value.as_str()?;
        DateTime::parse_from_rfc3339(text)
            .map(|ts| StoredTimestamp(ts.with_timezone(&Utc)))
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

pub fn timestamp_from_row(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let StoredTimestamp(ts) = row.get(column)?;
    Ok(ts)
}

/// Current time truncated to storage precision.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn encoding_is_deterministic() {
        let a = json!({"b": 1, "a": {"z": true, "y": [3, 2]}});
        let b = json!({"a": {"y": [3, 2], "z": true}, "b": 1});
        assert_eq!(
            encode_object(a.as_object().unwrap()),
            encode_object(b.as_object().unwrap())
        );
    }

    #[test]
    fn bad_text_decodes_to_empty_with_warning() {
        let mut warnings = Vec::new();
        assert!(decode_object("analysis_config", "{not json", &mut warnings).is_empty());
        assert!(decode_object("custom_settings", "[1, 2]", &mut warnings).is_empty());
        assert!(decode_object("analysis_limits", "", &mut warnings).is_empty());

        let fields: Vec<&str> = warnings.iter().map(|w| w.field.as_str()).collect();
        assert_eq!(fields, ["analysis_config", "custom_settings"]);
    }

    #[test]
    fn timestamps_keep_millisecond_precision() {
        let ts = now();
        let text = format_timestamp(ts);
        assert!(text.ends_with('Z'));
        assert_eq!(DateTime::parse_from_rfc3339(&text).unwrap(), ts);
    }
}
