//! Error types for assembling payloads and driving solver processes.

use std::path::PathBuf;

use mznforge_config::ConfigError;
use mznforge_core::MalformedDataError;
use thiserror::Error;

/// Failure to build a [`Payload`](crate::Payload).
///
/// Raised eagerly, before any solver process is started.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(String),

    #[error("malformed data in {origin}: {source}")]
    Data {
        origin: String,
        #[source]
        source: MalformedDataError,
    },

    #[error("no declaration of output variable '{0}' in the model")]
    UnknownOutputVar(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure of a solver process.
///
/// Carried inside [`RunStatus::Error`](crate::RunStatus::Error) rather than
/// raised, so it is cloneable and holds messages instead of sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("failed to launch {}: {message}", executable.display())]
    Spawn {
        executable: PathBuf,
        message: String,
    },

    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("solver exited with status {}", code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit { code: Option<i32> },

    #[error("solver reported an error")]
    Solver,

    #[error("malformed status line '{0}'")]
    MalformedStatus(String),

    #[error("invocation task aborted: {0}")]
    Aborted(String),
}

impl From<std::io::Error> for ProcessError {
    fn from(err: std::io::Error) -> Self {
        ProcessError::Io(err.to_string())
    }
}
