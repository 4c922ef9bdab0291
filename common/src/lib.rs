pub mod diff;
pub mod error;
pub mod job;
pub mod normalize;

pub use diff::{diff_fields, diff_values, Change, DiffEntry, DiffGroups, JobDiff};
pub use error::{MissingFieldError, ParseWarning};
pub use job::{Groups, JobFields, JobId, JobRecord, JsonObject, VersionSnapshot};
pub use normalize::{normalize, Normalized};

pub const DEFAULT_DB_PATH: &str = "ml_jobs.db";
pub const DB_PATH_ENV: &str = "MLJOBS_DB";

// Per-user config location; `~` is expanded against $HOME by the binary
pub const USER_CONFIG_PATH: &str = "~/.config/mljobs/config.yaml";
