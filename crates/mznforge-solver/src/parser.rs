//! Solution stream parsing.
//!
//! MiniZinc in `--output-mode dzn` prints each solution as a block of dzn
//! statements closed by `----------`, and ends the run with at most one
//! status line:
//!
//! | line                         | status                           |
//! |------------------------------|----------------------------------|
//! | `==========`                 | [`RunStatus::Optimal`]           |
//! | `=====UNSATISFIABLE=====`    | [`RunStatus::Unsatisfiable`]     |
//! | `=====UNBOUNDED=====`        | [`RunStatus::Unbounded`]         |
//! | `=====UNSATorUNBOUNDED=====` | [`RunStatus::UnsatOrUnbounded`]  |
//! | `=====UNKNOWN=====`          | [`RunStatus::Unknown`]           |
//! | `=====ERROR=====`            | [`RunStatus::Error`]             |
//!
//! [`SolutionParser`] is the line-at-a-time state machine;
//! [`parse`] adapts it to any iterator of lines.

use std::time::Duration;

use indexmap::IndexMap;
use mznforge_core::{Assignment, Decoder, MalformedDataError, Value};
use tracing::trace;

use crate::error::ProcessError;

/// Closes one solution block.
pub const SOLUTION_SEPARATOR: &str = "----------";
/// Search completed: optimum proven or all solutions enumerated.
pub const SEARCH_COMPLETE: &str = "==========";
pub const UNSATISFIABLE: &str = "=====UNSATISFIABLE=====";
pub const UNKNOWN: &str = "=====UNKNOWN=====";
pub const UNBOUNDED: &str = "=====UNBOUNDED=====";
pub const UNSAT_OR_UNBOUNDED: &str = "=====UNSATorUNBOUNDED=====";
pub const ERROR: &str = "=====ERROR=====";

const STAT_PREFIX: &str = "%%%mzn-stat:";
const TIME_PREFIX: &str = "% time elapsed:";

/// Solver statistics, by name, in the order reported.
pub type Statistics = IndexMap<String, String>;

/// One decoded solution block.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionRecord {
    /// Position in the stream, starting at 0.
    pub index: usize,
    /// The decoded block, or why it could not be decoded.
    pub assignment: Result<Assignment, MalformedDataError>,
    /// Time reported by `% time elapsed:` inside the block.
    pub solve_time: Option<Duration>,
    /// `%%%mzn-stat:` lines inside the block.
    pub statistics: Statistics,
    /// The block's dzn text.
    pub raw: String,
}

impl SolutionRecord {
    /// Looks up a variable; `None` if absent or the block failed to decode.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.assignment.as_ref().ok()?.get(name)
    }

    /// The `_objective` value printed with `--output-objective`.
    pub fn objective(&self) -> Option<&Value> {
        self.get("_objective")
    }

    pub fn is_ok(&self) -> bool {
        self.assignment.is_ok()
    }
}

/// Why a run ended without a definite answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnknownCause {
    /// The solver printed `=====UNKNOWN=====` or exited without output.
    Reported,
    /// The time limit expired and the process was terminated.
    Timeout,
    /// The run was cancelled by the caller.
    Cancelled,
}

/// Terminal classification of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Solutions were found but search did not complete.
    Satisfied,
    /// Search completed.
    Optimal,
    Unsatisfiable,
    Unbounded,
    UnsatOrUnbounded,
    Unknown(UnknownCause),
    Error { error: ProcessError, stderr: String },
}

impl RunStatus {
    /// True when the solver proved its answer (optimality, exhaustion,
    /// unsatisfiability or unboundedness).
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            RunStatus::Optimal
                | RunStatus::Unsatisfiable
                | RunStatus::Unbounded
                | RunStatus::UnsatOrUnbounded
        )
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RunStatus::Error { .. })
    }

    /// Short lowercase name used in log fields.
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Satisfied => "satisfied",
            RunStatus::Optimal => "optimal",
            RunStatus::Unsatisfiable => "unsatisfiable",
            RunStatus::Unbounded => "unbounded",
            RunStatus::UnsatOrUnbounded => "unsat_or_unbounded",
            RunStatus::Unknown(UnknownCause::Reported) => "unknown",
            RunStatus::Unknown(UnknownCause::Timeout) => "timeout",
            RunStatus::Unknown(UnknownCause::Cancelled) => "cancelled",
            RunStatus::Error { .. } => "error",
        }
    }
}

/// Parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Collecting the lines of a block.
    Accumulating,
    /// A separator was just read.
    BlockComplete,
    /// A status line was read; only statistics follow.
    Terminal,
    /// An unrecognized status line was read; input is no longer consumed.
    Failed,
}

/// Line-at-a-time solution stream parser.
#[derive(Debug, Clone)]
pub struct SolutionParser {
    decoder: Decoder,
    state: ParserState,
    buffer: Vec<String>,
    block_statistics: Statistics,
    block_time: Option<Duration>,
    emitted: usize,
    terminal: Option<RunStatus>,
    malformed: Option<String>,
    statistics: Statistics,
}

impl SolutionParser {
    pub fn new() -> Self {
        Self::with_decoder(Decoder::new())
    }

    /// Decodes blocks with `decoder`, for instance one that knows the
    /// model's enum domains.
    pub fn with_decoder(decoder: Decoder) -> Self {
        Self {
            decoder,
            state: ParserState::Accumulating,
            buffer: Vec::new(),
            block_statistics: Statistics::new(),
            block_time: None,
            emitted: 0,
            terminal: None,
            malformed: None,
            statistics: Statistics::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// True once an unrecognized status line was read.
    pub fn is_failed(&self) -> bool {
        self.state == ParserState::Failed
    }

    /// Number of records emitted so far.
    pub fn solution_count(&self) -> usize {
        self.emitted
    }

    /// Statistics reported after the status line.
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Consumes one line, returning a record when it closes a block.
    pub fn feed(&mut self, line: &str) -> Option<SolutionRecord> {
        let line = line.trim_end();
        trace!(event = "solver_line", state = ?self.state, line);

        match self.state {
            ParserState::Failed => return None,
            ParserState::Terminal => {
                if let Some((key, value)) = parse_statistic(line) {
                    self.statistics.insert(key, value);
                }
                return None;
            }
            ParserState::Accumulating | ParserState::BlockComplete => {}
        }

        let line = line.trim_start();
        if line == SOLUTION_SEPARATOR {
            return Some(self.complete_block());
        }
        if let Some(status) = parse_status(line) {
            match status {
                Ok(status) => {
                    self.terminal = Some(status);
                    self.state = ParserState::Terminal;
                    // Statistics printed before the status line belong to the run.
                    let pending = std::mem::take(&mut self.block_statistics);
                    self.statistics.extend(pending);
                }
                Err(line) => {
                    self.malformed = Some(line);
                    self.state = ParserState::Failed;
                }
            }
            self.buffer.clear();
            return None;
        }

        if let Some((key, value)) = parse_statistic(line) {
            self.block_statistics.insert(key, value);
        } else if let Some(time) = parse_time_elapsed(line) {
            self.block_time = Some(time);
        } else if line.starts_with('%') || line.is_empty() {
            // comment
        } else {
            self.buffer.push(line.to_string());
            self.state = ParserState::Accumulating;
        }
        None
    }

    fn complete_block(&mut self) -> SolutionRecord {
        let raw = std::mem::take(&mut self.buffer).join("\n");
        let record = SolutionRecord {
            index: self.emitted,
            assignment: self.decoder.decode(&raw),
            solve_time: self.block_time.take(),
            statistics: std::mem::take(&mut self.block_statistics),
            raw,
        };
        self.emitted += 1;
        self.state = ParserState::BlockComplete;
        record
    }

    /// Concludes the stream once input is exhausted.
    ///
    /// A status line takes precedence over the exit code. Without one, the
    /// run is [`RunStatus::Satisfied`] if any solution was emitted, an error
    /// carrying `stderr` if the process exited unsuccessfully, and
    /// [`RunStatus::Unknown`] otherwise. `exit_code` is `None` when the
    /// process was killed by a signal.
    pub fn finish(&mut self, exit_code: Option<i32>, stderr: &str) -> RunStatus {
        if let Some(line) = &self.malformed {
            return RunStatus::Error {
                error: ProcessError::MalformedStatus(line.clone()),
                stderr: stderr.to_string(),
            };
        }
        if !self.buffer.is_empty() {
            trace!(
                event = "incomplete_block_discarded",
                lines = self.buffer.len()
            );
            self.buffer.clear();
        }
        match &self.terminal {
            Some(RunStatus::Error { .. }) => RunStatus::Error {
                error: ProcessError::Solver,
                stderr: stderr.to_string(),
            },
            Some(status) => status.clone(),
            None if self.emitted > 0 => RunStatus::Satisfied,
            None if exit_code != Some(0) => RunStatus::Error {
                error: ProcessError::NonZeroExit { code: exit_code },
                stderr: stderr.to_string(),
            },
            None => RunStatus::Unknown(UnknownCause::Reported),
        }
    }
}

impl Default for SolutionParser {
    fn default() -> Self {
        Self::new()
    }
}

// Some(Err(line)) for a line shaped like a status that is not one.
fn parse_status(line: &str) -> Option<Result<RunStatus, String>> {
    let status = match line {
        SEARCH_COMPLETE => RunStatus::Optimal,
        UNSATISFIABLE => RunStatus::Unsatisfiable,
        UNKNOWN => RunStatus::Unknown(UnknownCause::Reported),
        UNBOUNDED => RunStatus::Unbounded,
        UNSAT_OR_UNBOUNDED => RunStatus::UnsatOrUnbounded,
        ERROR => RunStatus::Error {
            error: ProcessError::Solver,
            stderr: String::new(),
        },
        _ if line.len() > 10 && line.starts_with("=====") && line.ends_with("=====") => {
            return Some(Err(line.to_string()));
        }
        _ => return None,
    };
    Some(Ok(status))
}

// `%%%mzn-stat: nodes=42` -> ("nodes", "42")
fn parse_statistic(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix(STAT_PREFIX)?.trim();
    let (key, value) = rest.split_once('=')?;
    Some((key.trim().to_string(), value.trim().trim_matches('"').to_string()))
}

// `% time elapsed: 0.12 s`
fn parse_time_elapsed(line: &str) -> Option<Duration> {
    let rest = line.strip_prefix(TIME_PREFIX)?.trim();
    let seconds = rest.strip_suffix('s').unwrap_or(rest).trim();
    Duration::try_from_secs_f64(seconds.parse().ok()?).ok()
}

/// Parses a complete line sequence lazily.
///
/// ```
/// use mznforge_core::Value;
/// use mznforge_solver::{parse, RunStatus};
///
/// let output = "x = 1;\n----------\nx = 3;\n----------\n==========\n";
/// let mut records = parse(output.lines());
///
/// let xs: Vec<_> = records.by_ref().map(|r| r.get("x").cloned()).collect();
/// assert_eq!(xs, vec![Some(Value::Int(1)), Some(Value::Int(3))]);
///
/// let (status, _statistics) = records.finish();
/// assert_eq!(status, RunStatus::Optimal);
/// ```
pub fn parse<I>(lines: I) -> Records<I::IntoIter>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    Records {
        lines: lines.into_iter(),
        parser: SolutionParser::new(),
    }
}

/// Iterator over the records of a line sequence. See [`parse`].
#[derive(Debug)]
pub struct Records<I> {
    lines: I,
    parser: SolutionParser,
}

impl<I> Records<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    /// Replaces the parser, for instance with one using a custom decoder.
    pub fn with_parser(mut self, parser: SolutionParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn parser(&self) -> &SolutionParser {
        &self.parser
    }

    /// Consumes the remaining lines and returns the final status together
    /// with the trailing statistics. The input is treated as the output of a
    /// process that exited successfully.
    pub fn finish(mut self) -> (RunStatus, Statistics) {
        while self.next().is_some() {}
        let status = self.parser.finish(Some(0), "");
        (status, self.parser.statistics)
    }
}

impl<I> Iterator for Records<I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = SolutionRecord;

    fn next(&mut self) -> Option<SolutionRecord> {
        while !self.parser.is_failed() {
            let line = self.lines.next()?;
            if let Some(record) = self.parser.feed(line.as_ref()) {
                return Some(record);
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
