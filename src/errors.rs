//! Workload Engine Error Hierarchy
//!
//! Errors are split by how the engine reacts to them:
//! - [`DefinitionError`]: bad pattern or activity definition, fatal at startup
//! - [`StoreError`]: a single store operation failed, counted and logged
//! - [`Error::Reconnect`]: a client could not re-establish its connection, fatal

use std::time::Duration;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pattern compilation or activity setup failures
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// Store level failures
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A client failed to re-establish its connection after its use budget
    #[error("Client {client} failed to reconnect: {source}")]
    Reconnect {
        client: usize,
        #[source]
        source: StoreError,
    },

    /// Configuration loading failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("No patterns were supplied")]
    NoPatterns,

    #[error("Pattern '{0}' has no segments")]
    EmptyPattern(String),

    #[error("Pattern '{pattern}' references unknown builder rule '{name}'")]
    UnknownBuilderRule { pattern: String, name: String },

    #[error("Pattern '{pattern}' has a value specification before its last segment")]
    LeafNotLast { pattern: String },

    #[error("Pattern '{0}' doesn't have a value specification")]
    MissingValueSpec(String),

    #[error("Count of '{name}' ({count}) is greater than maximum allowed ({max})")]
    CountExceedsMax { name: String, count: usize, max: usize },

    #[error("Invalid count in segment '{0}'")]
    InvalidCount(String),

    #[error("Invalid regex '{regex}': {reason}")]
    InvalidRegex { regex: String, reason: String },

    #[error("Invalid format '{format}': {reason}")]
    InvalidFormat { format: String, reason: String },

    #[error("Builder rule '{0}' has neither values nor a pattern")]
    EmptyBuilderRule(String),

    #[error("Invalid value spec '{0}', expected 'n' or 'min,max'")]
    InvalidValueSpec(String),

    #[error("{activity} can't be used with more than 1 pattern (got {count})")]
    MultiplePatterns { activity: &'static str, count: usize },

    #[error("{activity} level {level} is too deep for a pattern with {depth} levels")]
    LevelTooDeep {
        activity: &'static str,
        level: usize,
        depth: usize,
    },

    #[error("Level {0} has no keys")]
    EmptyLevel(usize),

    #[error("Watch counts specify {levels} levels, but the pattern has {depth} levels")]
    WatchLevelMismatch { levels: usize, depth: usize },

    #[error("Invalid watch count '{0}'")]
    InvalidWatchCount(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Etcd(#[from] etcd_client::Error),

    #[error("Watch canceled for '{0}'")]
    WatchCanceled(String),

    #[error("Connection closed")]
    Closed,

    #[error("{0}")]
    Backend(String),
}
