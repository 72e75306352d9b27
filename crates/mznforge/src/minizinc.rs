//! The `Minizinc` builder.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mznforge_config::{SolverConfig, SolverKind};
use mznforge_core::{Assignment, Value};
use mznforge_solver::{
    Assembler, DataSource, Invocation, InvocationEventSupport, InvocationListener, ModelSource,
    Payload, RunHandle, SolutionStream, Solutions, SolveRequest, SolverPool, TemplateEngine,
    TemplateVars,
};

use crate::Error;

/// Describes one solve: a model, its data and how to run it.
///
/// Data sources are merged in the order they were added, with values set
/// through [`assign`](Self::assign) applied last.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> Result<(), mznforge::Error> {
/// use mznforge::prelude::*;
///
/// let solutions = Minizinc::file("knapsack.mzn")
///     .data_file("knapsack.dzn")
///     .assign("capacity", 20)
///     .solver(SolverKind::Gecode)
///     .timeout(Duration::from_secs(10))
///     .solve_all()
///     .await?;
///
/// if let Some(best) = solutions.last() {
///     println!("x = {:?}", best.get("x"));
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Minizinc {
    model: ModelSource,
    data: Vec<DataSource>,
    assignment: Assignment,
    vars: TemplateVars,
    config: SolverConfig,
    timeout: Option<Duration>,
    assembler: Assembler,
    events: InvocationEventSupport,
}

impl Minizinc {
    fn new(model: ModelSource) -> Self {
        Self {
            model,
            data: Vec::new(),
            assignment: Assignment::new(),
            vars: TemplateVars::new(),
            config: SolverConfig::default(),
            timeout: None,
            assembler: Assembler::new(),
            events: InvocationEventSupport::new(),
        }
    }

    /// Solves the model in the `.mzn` file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(ModelSource::File(path.into()))
    }

    /// Solves the given model text.
    pub fn text(model: impl Into<String>) -> Self {
        Self::new(ModelSource::Text(model.into()))
    }

    pub fn data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data.push(DataSource::File(path.into()));
        self
    }

    /// Adds dzn data text.
    pub fn data_text(mut self, text: impl Into<String>) -> Self {
        self.data.push(DataSource::Text(text.into()));
        self
    }

    /// Binds one identifier.
    pub fn assign(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignment.insert(name.into(), value.into());
        self
    }

    /// Binds every identifier of `assignment`.
    pub fn assignment(mut self, assignment: Assignment) -> Self {
        self.assignment.extend(assignment);
        self
    }

    /// Sets a template variable; the model is rendered when any is set.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn solver(mut self, solver: SolverKind) -> Self {
        self.config.solver = solver;
        self
    }

    pub fn all_solutions(mut self, all: bool) -> Self {
        self.config.options.all_solutions = all;
        self
    }

    pub fn num_solutions(mut self, n: usize) -> Self {
        self.config.options.num_solutions = Some(n);
        self
    }

    /// Stops the solver after `timeout`, keeping the solutions found so far.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Restricts each solution to the named variables.
    pub fn output_vars<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assembler = self.assembler.output_vars(names);
        self
    }

    pub fn keep_comments(mut self, keep: bool) -> Self {
        self.assembler = self.assembler.keep_comments(keep);
        self
    }

    /// Renders model templates with `engine` instead of handlebars.
    pub fn engine(mut self, engine: Arc<dyn TemplateEngine>) -> Self {
        self.assembler = self.assembler.with_engine(engine);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn InvocationListener>) -> Self {
        self.events.add_listener(listener);
        self
    }

    pub fn solver_config(&self) -> &SolverConfig {
        &self.config
    }

    /// Builds the payload without running anything.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the model or data cannot be
    /// assembled.
    pub fn assemble(&self) -> Result<Payload, Error> {
        self.config.validate()?;
        let payload =
            self.assembler
                .assemble(&self.model, &self.data, &self.assignment, &self.vars)?;
        Ok(payload)
    }

    /// Assembles the payload and packages it for a [`SolverPool`].
    pub fn request(&self) -> Result<SolveRequest, Error> {
        Ok(SolveRequest {
            payload: self.assemble()?,
            config: self.config.clone(),
            timeout: self.timeout,
        })
    }

    /// Launches the solver and returns its solutions as a stream.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Configuration and assembly errors are returned before any process
    /// starts; so is a failure to launch the solver.
    pub fn solve(&self) -> Result<SolutionStream, Error> {
        #[cfg(feature = "console")]
        mznforge_console::init();

        let payload = self.assemble()?;
        let invocation = Invocation::start(payload, &self.config, self.timeout)?;
        Ok(SolutionStream::with_events(
            invocation,
            Arc::new(self.events.clone()),
        ))
    }

    /// Runs the solver to completion.
    pub async fn solve_all(&self) -> Result<Solutions, Error> {
        Ok(self.solve()?.collect_all().await)
    }
}

/// Solves many instances with at most `concurrency` solvers at once.
///
/// Every instance is assembled before any solver starts, so an assembly
/// error aborts the whole batch. Failures after that are reported through
/// the affected [`RunHandle`]. Listeners set on the instances are not
/// used; see [`solve_many_in`].
///
/// Must be called within a Tokio runtime.
pub fn solve_many(
    instances: &[Minizinc],
    concurrency: usize,
) -> Result<BTreeMap<usize, RunHandle>, Error> {
    solve_many_in(&SolverPool::new(concurrency), instances)
}

/// Like [`solve_many`], running the instances in `pool`.
pub fn solve_many_in(
    pool: &SolverPool,
    instances: &[Minizinc],
) -> Result<BTreeMap<usize, RunHandle>, Error> {
    #[cfg(feature = "console")]
    mznforge_console::init();

    let requests = instances
        .iter()
        .map(Minizinc::request)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pool.run_many(requests))
}

#[cfg(test)]
#[path = "minizinc_tests.rs"]
mod tests;
