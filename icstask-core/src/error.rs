//! Error types for icstask.

use thiserror::Error;

/// Errors that can occur while converting between tasks and VTODOs.
#[derive(Error, Debug)]
pub enum IcsTaskError {
    #[error("Task data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Taskwarrior invocation failed: {0}")]
    ExternalTool(String),

    #[error("Could not find an added or modified task in import output: {0}")]
    ImportParse(String),

    #[error("Unsupported recurrence: {0}")]
    UnsupportedRecurrence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for icstask operations.
pub type IcsTaskResult<T> = Result<T, IcsTaskError>;
