//! Lazy solution streams over a running invocation.
//!
//! A [`SolutionStream`] pulls stdout lines from an [`Invocation`] and feeds
//! them to a [`SolutionParser`], yielding each solution as soon as its block
//! closes. When the output ends the stream reaps the process, classifies the
//! run and releases the invocation's files.

use std::sync::Arc;
use std::time::Duration;

use mznforge_config::SolverConfig;
use mznforge_core::Decoder;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assembler::{register_domains, Payload};
use crate::error::ProcessError;
use crate::event::InvocationEventSupport;
use crate::parser::{RunStatus, SolutionParser, SolutionRecord, Statistics, UnknownCause};
use crate::process::{CancelHandle, Completion, Invocation, Termination};

/// Final result of one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// Statistics reported outside solution blocks.
    pub statistics: Statistics,
    /// Number of solution records the run produced.
    pub solution_count: usize,
    /// `None` when the process was killed or never started.
    pub exit_code: Option<i32>,
    pub elapsed: Duration,
}

impl RunOutcome {
    /// Outcome of a run whose process could not be launched.
    pub fn failed(error: ProcessError) -> Self {
        Self::without_process(RunStatus::Error {
            error,
            stderr: String::new(),
        })
    }

    /// Outcome of a run cancelled before its process was launched.
    pub fn cancelled() -> Self {
        Self::without_process(RunStatus::Unknown(UnknownCause::Cancelled))
    }

    /// Outcome of a run whose driver went away before reporting.
    pub fn aborted(reason: impl Into<String>) -> Self {
        Self::failed(ProcessError::Aborted(reason.into()))
    }

    fn without_process(status: RunStatus) -> Self {
        Self {
            status,
            statistics: Statistics::new(),
            solution_count: 0,
            exit_code: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status.is_complete()
    }
}

/// Every record of a finished run, with its outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Solutions {
    records: Vec<SolutionRecord>,
    outcome: RunOutcome,
}

impl Solutions {
    pub fn new(records: Vec<SolutionRecord>, outcome: RunOutcome) -> Self {
        Self { records, outcome }
    }

    pub fn records(&self) -> &[SolutionRecord] {
        &self.records
    }

    pub fn outcome(&self) -> &RunOutcome {
        &self.outcome
    }

    pub fn status(&self) -> &RunStatus {
        &self.outcome.status
    }

    pub fn statistics(&self) -> &Statistics {
        &self.outcome.statistics
    }

    /// True when the solver proved its answer.
    pub fn is_complete(&self) -> bool {
        self.outcome.is_complete()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SolutionRecord> {
        self.records.get(index)
    }

    /// The last solution, which is the best one for optimisation problems.
    pub fn last(&self) -> Option<&SolutionRecord> {
        self.records.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SolutionRecord> {
        self.records.iter()
    }

    pub fn into_records(self) -> Vec<SolutionRecord> {
        self.records
    }
}

impl std::ops::Index<usize> for Solutions {
    type Output = SolutionRecord;

    fn index(&self, index: usize) -> &SolutionRecord {
        &self.records[index]
    }
}

impl IntoIterator for Solutions {
    type Item = SolutionRecord;
    type IntoIter = std::vec::IntoIter<SolutionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Solutions {
    type Item = &'a SolutionRecord;
    type IntoIter = std::slice::Iter<'a, SolutionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Solutions of one invocation, in the order the solver printed them.
///
/// Dropping a stream before it ends kills the solver and removes its files
/// without reporting an outcome.
///
/// ```no_run
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// use mznforge_config::SolverConfig;
/// use mznforge_core::Assignment;
/// use mznforge_solver::{Payload, SolutionStream};
///
/// let payload = Payload::new("count", "var 1..3: x; solve satisfy;", Assignment::new())?;
/// let config = SolverConfig::new().with_all_solutions(true);
/// let mut stream = SolutionStream::start(payload, &config, None)?;
/// while let Some(solution) = stream.next_solution().await {
///     println!("x = {:?}", solution.get("x"));
/// }
/// println!("{:?}", stream.outcome().map(|o| &o.status));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SolutionStream {
    id: Uuid,
    name: String,
    invocation: Option<Invocation>,
    cancel: CancelHandle,
    parser: SolutionParser,
    events: Arc<InvocationEventSupport>,
    outcome: Option<RunOutcome>,
}

impl SolutionStream {
    /// Launches the solver and streams its solutions.
    ///
    /// # Errors
    ///
    /// Fails like [`Invocation::start`].
    pub fn start(
        payload: Payload,
        config: &SolverConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, ProcessError> {
        let invocation = Invocation::start(payload, config, timeout)?;
        Ok(Self::new(invocation))
    }

    /// Streams the output of an already started invocation.
    pub fn new(invocation: Invocation) -> Self {
        Self::with_events(invocation, Arc::new(InvocationEventSupport::new()))
    }

    /// Like [`new`](Self::new), reporting lifecycle events to `events`.
    pub fn with_events(invocation: Invocation, events: Arc<InvocationEventSupport>) -> Self {
        let payload = invocation.payload();
        let decoder = payload
            .model_enums()
            .iter()
            .fold(Decoder::new(), |decoder, (name, literals)| {
                decoder.with_enum(name.clone(), literals.clone())
            });
        let decoder = register_domains(decoder, payload.assignment());
        let id = invocation.id();
        let name = invocation.name().to_string();
        events.fire_invocation_started(id, &name);
        Self {
            id,
            name,
            cancel: invocation.cancel_handle(),
            invocation: Some(invocation),
            parser: SolutionParser::with_decoder(decoder),
            events,
            outcome: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Base name of the model.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set once the stream has ended.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Stops the solver; records already read stay valid.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the next solution.
    ///
    /// Returns `None` once the run has ended; [`outcome`](Self::outcome) is
    /// then set.
    pub async fn next_solution(&mut self) -> Option<SolutionRecord> {
        loop {
            let invocation = self.invocation.as_mut()?;
            match invocation.next_line().await {
                Ok(Some(line)) => {
                    if let Some(record) = self.parser.feed(&line) {
                        debug!(
                            event = "solution",
                            id = %self.id,
                            index = record.index,
                            decoded = record.is_ok(),
                            solve_time_ms = record.solve_time.map(|t| t.as_millis() as u64),
                        );
                        self.events.fire_solution(self.id, &record);
                        return Some(record);
                    }
                    if self.parser.is_failed() {
                        self.conclude(None).await;
                        return None;
                    }
                }
                Ok(None) => {
                    self.conclude(None).await;
                    return None;
                }
                Err(error) => {
                    self.conclude(Some(error)).await;
                    return None;
                }
            }
        }
    }

    /// Reads every remaining solution.
    pub async fn collect_all(mut self) -> Solutions {
        let mut records = Vec::new();
        while let Some(record) = self.next_solution().await {
            records.push(record);
        }
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| RunOutcome::aborted("stream ended without an outcome"));
        Solutions::new(records, outcome)
    }

    /// Runs to the end, discarding remaining solutions.
    pub async fn finish(self) -> RunOutcome {
        self.collect_all().await.outcome
    }

    async fn conclude(&mut self, read_error: Option<ProcessError>) {
        let Some(mut invocation) = self.invocation.take() else {
            return;
        };
        if self.parser.is_failed() || read_error.is_some() {
            invocation.terminate().await;
        }

        let (completion, error) = match invocation.wait().await {
            Ok(completion) => (completion, read_error),
            Err(wait_error) => (
                Completion {
                    exit_code: None,
                    stderr: String::new(),
                    termination: invocation.termination(),
                    elapsed: invocation.elapsed(),
                },
                read_error.or(Some(wait_error)),
            ),
        };

        let mut status = match error {
            Some(error) => {
                self.parser.finish(completion.exit_code, &completion.stderr);
                RunStatus::Error {
                    error,
                    stderr: completion.stderr.clone(),
                }
            }
            None => self.parser.finish(completion.exit_code, &completion.stderr),
        };
        if let Some(termination) = completion.termination {
            if !status.is_complete() {
                status = RunStatus::Unknown(match termination {
                    Termination::Timeout => UnknownCause::Timeout,
                    Termination::Cancelled => UnknownCause::Cancelled,
                });
            }
        }

        let outcome = RunOutcome {
            status,
            statistics: self.parser.statistics().clone(),
            solution_count: self.parser.solution_count(),
            exit_code: completion.exit_code,
            elapsed: completion.elapsed,
        };
        if let RunStatus::Error { error, stderr } = &outcome.status {
            warn!(event = "invocation_error", id = %self.id, error = %error, stderr = %stderr.trim());
        }
        info!(
            event = "invocation_end",
            id = %self.id,
            model = %self.name,
            status = outcome.status.label(),
            solutions = outcome.solution_count,
            exit_code = outcome.exit_code,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
        );
        self.events.fire_invocation_finished(self.id, &outcome);
        self.outcome = Some(outcome);
        drop(invocation);
    }
}

#[cfg(test)]
#[path = "stream_tests.rs"]
mod tests;
