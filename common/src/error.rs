use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A required field is absent from an input document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("missing required field `{field}`")]
pub struct MissingFieldError {
    pub field: String,
}

impl MissingFieldError {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }
}

/// A field that could not be decoded or had the wrong shape.
///
/// Never fatal: the field is replaced by its empty placeholder and the
/// warning travels next to the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseWarning {
    pub field: String,
    pub message: String,
}

impl ParseWarning {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
