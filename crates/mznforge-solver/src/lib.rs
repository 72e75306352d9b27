//! MiniZinc solver driver
//!
//! This crate runs `minizinc` as a subprocess and turns its output into
//! typed solutions:
//! - Model assembly: templates, comment stripping, data merging and output
//!   variable selection
//! - Process driving: private work directories, timeouts, cancellation
//! - Solution stream parsing of `--output-mode dzn` output
//! - A bounded pool for solving many instances concurrently
//! - Event system for monitoring

pub mod assembler;
pub mod error;
pub mod event;
pub mod output;
pub mod parser;
pub mod pool;
pub mod process;
pub mod stream;
pub mod template;

pub use assembler::{
    assemble, model_enums, strip_comments, Assembler, DataSource, ModelSource, Payload,
};
pub use error::{AssemblyError, ProcessError};
pub use event::{
    CountingEventListener, InvocationEventSupport, InvocationListener, LoggingEventListener,
};
pub use output::annotate_output;
pub use parser::{
    parse, ParserState, Records, RunStatus, SolutionParser, SolutionRecord, Statistics,
    UnknownCause,
};
pub use pool::{RunHandle, SolveRequest, SolverPool};
pub use process::{
    command_args, minizinc_version, CancelHandle, Completion, DataArg, Invocation, Termination,
};
pub use stream::{RunOutcome, SolutionStream, Solutions};
pub use template::{HandlebarsEngine, TemplateEngine, TemplateVars};
