use common::MissingFieldError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures returned by the engine. None of them are fatal to the process.
#[derive(Error, Debug)]
pub enum Error {
    /// Input document lacks a required field; the document is skipped.
    #[error("missing required field `{0}`")]
    MissingField(String),

    /// Requested job or version does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation needs a version snapshot and the job has none.
    #[error("no version history for job '{0}'")]
    NoHistory(String),

    /// Persistence failed; the enclosing transaction was rolled back.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

impl From<MissingFieldError> for Error {
    fn from(e: MissingFieldError) -> Self {
        Error::MissingField(e.field)
    }
}
