use std::path::PathBuf;
use thiserror::Error;

/// Why a pending media result never produced a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("result was never requested")]
    NotRequested,

    #[error("failed to decode {}: {message}", .path.display())]
    Decode { path: PathBuf, message: String },

    #[error("worker dropped the request before answering")]
    Cancelled,
}

pub type LoadResult<T> = Result<T, LoadError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("malformed command: {0:?}")]
    Malformed(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} expects an argument at position {position}")]
    MissingArgument { command: &'static str, position: usize },

    #[error("not a number: {0:?}")]
    InvalidNumber(String),

    #[error("tag {0} not present")]
    UnknownTag(i32),

    #[error("mode {0} not existent")]
    UnknownMode(String),

    #[error("{} not found", .0.display())]
    NotFound(PathBuf),

    #[error("{} already present", .0.display())]
    AlreadyPresent(PathBuf),
}
