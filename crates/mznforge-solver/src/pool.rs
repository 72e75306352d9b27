//! Bounded concurrent solving.
//!
//! A [`SolverPool`] runs many solve requests with at most `concurrency`
//! solver processes alive at once. Requests are admitted in submission
//! order; each one reports through its own [`RunHandle`], so results never
//! mix between requests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mznforge_config::SolverConfig;
use tokio::sync::{mpsc, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::assembler::Payload;
use crate::event::{InvocationEventSupport, InvocationListener};
use crate::parser::SolutionRecord;
use crate::process::{CancelHandle, Invocation};
use crate::stream::{RunOutcome, SolutionStream, Solutions};

/// One model instance to solve.
#[derive(Debug, Clone)]
pub struct SolveRequest {
    pub payload: Payload,
    pub config: SolverConfig,
    pub timeout: Option<Duration>,
}

impl SolveRequest {
    pub fn new(payload: Payload, config: SolverConfig) -> Self {
        Self {
            payload,
            config,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl From<(Payload, SolverConfig)> for SolveRequest {
    fn from((payload, config): (Payload, SolverConfig)) -> Self {
        Self::new(payload, config)
    }
}

#[derive(Debug)]
enum RunMessage {
    Solution(SolutionRecord),
    Finished(RunOutcome),
}

struct Job {
    index: usize,
    request: SolveRequest,
    cancel: CancelHandle,
    tx: mpsc::UnboundedSender<RunMessage>,
}

impl Job {
    fn report(&self, outcome: RunOutcome) {
        let _ = self.tx.send(RunMessage::Finished(outcome));
    }
}

/// Runs solve requests with bounded concurrency.
///
/// # Example
///
/// ```no_run
/// # async fn run(requests: Vec<mznforge_solver::SolveRequest>) {
/// use mznforge_solver::SolverPool;
///
/// let pool = SolverPool::new(4);
/// for (index, solutions) in pool.solve_all(requests).await {
///     println!("request {index}: {}", solutions.status().label());
/// }
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SolverPool {
    concurrency: usize,
    events: InvocationEventSupport,
}

impl SolverPool {
    /// Creates a pool running at most `concurrency` solvers; zero means one.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            events: InvocationEventSupport::new(),
        }
    }

    /// Creates a pool sized by `config.concurrency`.
    pub fn from_config(config: &SolverConfig) -> Self {
        Self::new(config.concurrency)
    }

    /// Reports the lifecycle of every run to `listener`.
    pub fn with_listener(mut self, listener: Arc<dyn InvocationListener>) -> Self {
        self.events.add_listener(listener);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Submits `requests` and returns a handle per request, keyed by its
    /// position in `requests`.
    ///
    /// Must be called within a Tokio runtime. Launch failures are reported
    /// through the affected handle and do not disturb other requests.
    pub fn run_many<R>(&self, requests: impl IntoIterator<Item = R>) -> BTreeMap<usize, RunHandle>
    where
        R: Into<SolveRequest>,
    {
        let mut handles = BTreeMap::new();
        let mut jobs = Vec::new();
        for (index, request) in requests.into_iter().enumerate() {
            let (tx, rx) = mpsc::unbounded_channel();
            let cancel = CancelHandle::new();
            handles.insert(
                index,
                RunHandle {
                    index,
                    rx,
                    cancel: cancel.clone(),
                    outcome: None,
                },
            );
            jobs.push(Job {
                index,
                request: request.into(),
                cancel,
                tx,
            });
        }

        info!(
            event = "pool_start",
            requests = jobs.len(),
            concurrency = self.concurrency,
        );
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        tokio::spawn(dispatch(jobs, semaphore, Arc::new(self.events.clone())));
        handles
    }

    /// Runs every request to completion.
    pub async fn solve_all<R>(
        &self,
        requests: impl IntoIterator<Item = R>,
    ) -> BTreeMap<usize, Solutions>
    where
        R: Into<SolveRequest>,
    {
        let mut results = BTreeMap::new();
        for (index, handle) in self.run_many(requests) {
            results.insert(index, handle.collect_all().await);
        }
        results
    }
}

impl Default for SolverPool {
    fn default() -> Self {
        Self::from_config(&SolverConfig::default())
    }
}

// Admits jobs in order. The semaphore is fair, so permits are granted FIFO.
async fn dispatch(
    jobs: Vec<Job>,
    semaphore: Arc<Semaphore>,
    events: Arc<InvocationEventSupport>,
) {
    for job in jobs {
        if job.cancel.is_cancelled() {
            debug!(event = "cancelled_before_admission", index = job.index);
            job.report(RunOutcome::cancelled());
            continue;
        }
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    job.report(RunOutcome::aborted("solver pool closed"));
                    continue;
                }
            },
            _ = job.cancel.cancelled() => {
                debug!(event = "cancelled_before_admission", index = job.index);
                job.report(RunOutcome::cancelled());
                continue;
            }
        };
        debug!(event = "admitted", index = job.index);
        tokio::spawn(run_job(job, permit, events.clone()));
    }
}

async fn run_job(job: Job, _permit: OwnedSemaphorePermit, events: Arc<InvocationEventSupport>) {
    let Job {
        index,
        request,
        cancel,
        tx,
    } = job;
    let invocation = match Invocation::start_with_cancel(
        request.payload,
        &request.config,
        request.timeout,
        cancel,
    ) {
        Ok(invocation) => invocation,
        Err(error) => {
            warn!(event = "launch_failed", index, error = %error);
            let _ = tx.send(RunMessage::Finished(RunOutcome::failed(error)));
            return;
        }
    };

    let mut stream = SolutionStream::with_events(invocation, events);
    while let Some(record) = stream.next_solution().await {
        if tx.send(RunMessage::Solution(record)).is_err() {
            // Nobody is listening any more.
            stream.cancel();
        }
    }
    let outcome = stream
        .outcome()
        .cloned()
        .unwrap_or_else(|| RunOutcome::aborted("stream ended without an outcome"));
    let _ = tx.send(RunMessage::Finished(outcome));
}

/// Receives the solutions and outcome of one pooled request.
#[derive(Debug)]
pub struct RunHandle {
    index: usize,
    rx: mpsc::UnboundedReceiver<RunMessage>,
    cancel: CancelHandle,
    outcome: Option<RunOutcome>,
}

impl RunHandle {
    /// Position of the request in the submitted batch.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Cancels the request, whether queued or running.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Set once the request has finished.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.outcome.as_ref()
    }

    /// Waits for the next solution; `None` once the request has finished.
    pub async fn next_solution(&mut self) -> Option<SolutionRecord> {
        if self.outcome.is_some() {
            return None;
        }
        match self.rx.recv().await {
            Some(RunMessage::Solution(record)) => Some(record),
            Some(RunMessage::Finished(outcome)) => {
                self.outcome = Some(outcome);
                None
            }
            None => {
                self.outcome = Some(RunOutcome::aborted("solver task ended without an outcome"));
                None
            }
        }
    }

    pub async fn collect_all(mut self) -> Solutions {
        let mut records = Vec::new();
        while let Some(record) = self.next_solution().await {
            records.push(record);
        }
        let outcome = self
            .outcome
            .take()
            .unwrap_or_else(|| RunOutcome::aborted("solver task ended without an outcome"));
        Solutions::new(records, outcome)
    }

    /// Waits for the outcome, discarding remaining solutions.
    pub async fn finish(self) -> RunOutcome {
        self.collect_all().await.outcome().clone()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
