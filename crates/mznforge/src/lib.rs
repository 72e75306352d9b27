//! mznforge - drive MiniZinc from Rust
//!
//! Build a [`Minizinc`] from a model and its data, pick a solver, and read
//! typed solutions as the solver finds them.
//!
//! # Example
//!
//! ```rust
//! use mznforge::prelude::*;
//!
//! // dzn values convert both ways
//! let data = mznforge::dzn::decode("n = 3;\nprofit = [10, 3, 9];").unwrap();
//! assert_eq!(data["n"], Value::Int(3));
//! assert_eq!(mznforge::dzn::encode(&data).unwrap(), "n = 3;\nprofit = [10, 3, 9];\n");
//! ```
//!
//! With the `console` feature, solver runs are logged to the terminal with
//! colors.

use thiserror::Error;

// Values and the dzn codec
pub use mznforge_core::dzn;
pub use mznforge_core::{Array, Assignment, Decoder, Encoder, IndexSet, MalformedDataError, Value};

// Configuration
pub use mznforge_config::{ConfigError, Flags, SolveOptions, SolverConfig, SolverKind};

// Assembly, processes, streams and pools
pub use mznforge_solver::{
    annotate_output, minizinc_version, model_enums, parse, AssemblyError, CancelHandle,
    CountingEventListener, HandlebarsEngine, InvocationListener, LoggingEventListener, Payload,
    ProcessError, RunHandle, RunOutcome, RunStatus, SolutionRecord, SolutionStream, Solutions,
    SolveRequest, SolverPool, Statistics, TemplateEngine, TemplateVars, UnknownCause,
};

#[cfg(feature = "console")]
pub use mznforge_console as console;

mod minizinc;
pub use minizinc::{solve_many, solve_many_in, Minizinc};

/// Errors raised before a solver runs.
///
/// Problems while the solver runs are reported in its [`RunStatus`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] MalformedDataError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

pub mod prelude {
    pub use super::{solve_many, Minizinc};
    pub use super::{Assignment, Value};
    pub use super::{RunStatus, SolutionRecord, Solutions, UnknownCause};
    pub use super::{SolverConfig, SolverKind};
    pub use std::time::Duration;
}
