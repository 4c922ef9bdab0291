//! Versioning and reconciliation engine for ML job configuration documents.
//!
//! Every entry point takes an explicit [`Store`] handle; each mutating
//! operation runs inside its own immediate transaction.

pub mod codec;
pub mod compare;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod load;
pub mod merge;
pub mod migrations;
pub mod search;
pub mod undo;

pub use compare::{compare, CompareRequest, Comparison, Side};
pub use config::Config;
pub use db::{Decoded, Store, VersionOrder};
pub use error::{Error, Result};
pub use history::history;
pub use load::{load_value, DocumentReport, LoadOutcome, LoadReport};
pub use merge::{merge, MergeOptions, MergeReport, MergeStrategy};
pub use search::{search, SearchFilter, SearchHit};
pub use undo::{undo, UndoReport};
