//! Configuration system for mznforge.
//!
//! Load solver configuration from TOML or YAML files to pick the MiniZinc
//! executable, the solver backend, and the solve options without code
//! changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use mznforge_config::{SolverConfig, SolverKind};
//! use std::time::Duration;
//!
//! let config = SolverConfig::from_toml_str(r#"
//!     solver = "chuffed"
//!     concurrency = 4
//!
//!     [options]
//!     all_solutions = true
//!     time_limit_ms = 30000
//! "#).unwrap();
//!
//! assert_eq!(config.solver, SolverKind::Chuffed);
//! assert_eq!(config.time_limit(), Some(Duration::from_secs(30)));
//! assert_eq!(config.backend_args().unwrap(), vec!["-a"]);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use mznforge_config::SolverConfig;
//!
//! let config = SolverConfig::load("mznforge.toml").unwrap_or_default();
//! // Proceeds with defaults if file doesn't exist
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("solver '{solver}' does not support {feature}")]
    Unsupported {
        solver: SolverKind,
        feature: &'static str,
    },
}

/// Default MiniZinc executable name, resolved through `PATH`.
pub const DEFAULT_EXECUTABLE: &str = "minizinc";

/// Data shorter than this many characters is passed inline with `-D`.
pub const DEFAULT_INLINE_DATA_THRESHOLD: usize = 70;

/// Default delay between SIGTERM and SIGKILL on timeout or cancellation.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 500;

/// Main solver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SolverConfig {
    /// Path or name of the `minizinc` executable.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Solver backend passed to `--solver`.
    #[serde(default)]
    pub solver: SolverKind,

    /// Solve options translated into command-line flags.
    #[serde(default)]
    pub options: SolveOptions,

    /// Additional include directories (`-I`).
    #[serde(default)]
    pub include: Vec<PathBuf>,

    /// MiniZinc standard library directory (`--stdlib-dir`).
    #[serde(default)]
    pub stdlib_dir: Option<PathBuf>,

    /// Solver-specific globals directory (`-G`).
    #[serde(default)]
    pub globals_dir: Option<PathBuf>,

    /// Arguments appended verbatim before the model file.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Keep the generated files after the invocation ends.
    #[serde(default)]
    pub keep: bool,

    /// Parent directory for invocation files; the system temp dir if unset.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Data shorter than this is passed inline instead of in `data.dzn`.
    #[serde(default = "default_inline_data_threshold")]
    pub inline_data_threshold: usize,

    /// Milliseconds between SIGTERM and SIGKILL.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Maximum number of solver processes alive at once in a pool.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_executable() -> PathBuf {
    PathBuf::from(DEFAULT_EXECUTABLE)
}

fn default_inline_data_threshold() -> usize {
    DEFAULT_INLINE_DATA_THRESHOLD
}

fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD_MS
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            solver: SolverKind::default(),
            options: SolveOptions::default(),
            include: Vec::new(),
            stdlib_dir: None,
            globals_dir: None,
            extra_args: Vec::new(),
            keep: false,
            output_dir: None,
            inline_data_threshold: DEFAULT_INLINE_DATA_THRESHOLD,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            concurrency: default_concurrency(),
        }
    }
}

impl SolverConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Sets the MiniZinc executable.
    pub fn with_executable(mut self, executable: impl Into<PathBuf>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Sets the solver backend.
    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.solver = solver;
        self
    }

    /// Requests all solutions (or all intermediate solutions when optimizing).
    pub fn with_all_solutions(mut self, all: bool) -> Self {
        self.options.all_solutions = all;
        self
    }

    /// Requests at most `n` solutions.
    pub fn with_num_solutions(mut self, n: usize) -> Self {
        self.options.num_solutions = Some(n);
        self
    }

    /// Lets the solver ignore the model's search annotations.
    pub fn with_free_search(mut self, free: bool) -> Self {
        self.options.free_search = free;
        self
    }

    /// Sets the number of solver threads.
    pub fn with_parallel(mut self, threads: usize) -> Self {
        self.options.parallel = Some(threads);
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.options.seed = Some(seed);
        self
    }

    /// Asks the solver for statistics (`-s`).
    pub fn with_statistics(mut self, statistics: bool) -> Self {
        self.options.statistics = statistics;
        self
    }

    /// Sets the solver's own time limit (`--time-limit`).
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.options.time_limit_ms = Some(u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Adds an include directory.
    pub fn with_include(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include.push(dir.into());
        self
    }

    /// Appends a raw command-line argument.
    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Keeps generated files after the run.
    pub fn with_keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Sets the parent directory of invocation files.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Sets the maximum number of concurrent solver processes.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the SIGTERM to SIGKILL delay.
    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the solver's time limit, if configured.
    ///
    /// # Examples
    ///
    /// ```
    /// use mznforge_config::SolverConfig;
    /// use std::time::Duration;
    ///
    /// let config = SolverConfig::from_toml_str(r#"
    ///     [options]
    ///     time_limit_ms = 1500
    /// "#).unwrap();
    ///
    /// assert_eq!(config.time_limit(), Some(Duration::from_millis(1500)));
    /// ```
    pub fn time_limit(&self) -> Option<Duration> {
        self.options.time_limit_ms.map(Duration::from_millis)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Checks the configuration before any process is started.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for out-of-range values and
    /// [`ConfigError::Unsupported`] when the backend lacks a requested
    /// capability.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        if self.executable.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("executable must not be empty".into()));
        }
        if self.options.num_solutions == Some(0) {
            return Err(ConfigError::Invalid("num_solutions must be at least 1".into()));
        }
        if self.options.parallel == Some(0) {
            return Err(ConfigError::Invalid("parallel must be at least 1".into()));
        }
        self.solver.check_options(&self.options)
    }

    /// Backend-specific flags for the configured solve options.
    pub fn backend_args(&self) -> Result<Vec<String>, ConfigError> {
        self.solver.args(&self.options)
    }
}

/// Solve options translated into backend flags.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SolveOptions {
    /// All solutions for satisfaction problems, all intermediate solutions
    /// for optimization problems. Takes precedence over `num_solutions`.
    #[serde(default)]
    pub all_solutions: bool,

    /// Stop after this many solutions.
    #[serde(default)]
    pub num_solutions: Option<usize>,

    /// Allow the solver to ignore search annotations.
    #[serde(default)]
    pub free_search: bool,

    /// Number of solver threads.
    #[serde(default)]
    pub parallel: Option<usize>,

    /// Random seed.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Emit `%%%mzn-stat:` statistics.
    #[serde(default)]
    pub statistics: bool,

    /// Emit `% time elapsed:` after each solution.
    #[serde(default = "default_true")]
    pub output_time: bool,

    /// Emit the `_objective` variable in each solution.
    #[serde(default)]
    pub output_objective: bool,

    /// Time limit passed to MiniZinc itself.
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
}

fn default_true() -> bool {
    true
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            all_solutions: false,
            num_solutions: None,
            free_search: false,
            parallel: None,
            seed: None,
            statistics: false,
            output_time: true,
            output_objective: false,
            time_limit_ms: None,
        }
    }
}

/// The solver backends MiniZinc can drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum SolverKind {
    #[default]
    #[serde(rename = "gecode")]
    Gecode,

    #[serde(rename = "chuffed")]
    Chuffed,

    /// Google OR-Tools CP-SAT.
    #[serde(rename = "cp-sat")]
    OrTools,

    #[serde(rename = "coin-bc")]
    CoinBc,

    #[serde(rename = "gurobi")]
    Gurobi,

    #[serde(rename = "cplex")]
    Cplex,

    #[serde(rename = "highs")]
    Highs,
}

/// What a backend supports beyond plain solving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub all_solutions: bool,
    pub num_solutions: bool,
    pub free_search: bool,
    pub parallel: bool,
    pub seed: bool,
}

/// The command-line flag a backend takes for each solve option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub all_solutions: &'static str,
    pub num_solutions: &'static str,
    pub free_search: &'static str,
    pub parallel: &'static str,
    pub seed: &'static str,
}

impl Flags {
    /// MiniZinc's standard solver flags.
    pub const STANDARD: Flags = Flags {
        all_solutions: "-a",
        num_solutions: "-n",
        free_search: "-f",
        parallel: "-p",
        seed: "-r",
    };
}

impl SolverKind {
    pub const ALL: [SolverKind; 7] = [
        SolverKind::Gecode,
        SolverKind::Chuffed,
        SolverKind::OrTools,
        SolverKind::CoinBc,
        SolverKind::Gurobi,
        SolverKind::Cplex,
        SolverKind::Highs,
    ];

    /// The identifier passed to `minizinc --solver`.
    pub fn id(self) -> &'static str {
        match self {
            SolverKind::Gecode => "gecode",
            SolverKind::Chuffed => "chuffed",
            SolverKind::OrTools => "cp-sat",
            SolverKind::CoinBc => "coin-bc",
            SolverKind::Gurobi => "gurobi",
            SolverKind::Cplex => "cplex",
            SolverKind::Highs => "highs",
        }
    }

    pub fn capabilities(self) -> Capabilities {
        match self {
            SolverKind::Gecode | SolverKind::OrTools => Capabilities {
                all_solutions: true,
                num_solutions: true,
                free_search: true,
                parallel: true,
                seed: true,
            },
            SolverKind::Chuffed => Capabilities {
                all_solutions: true,
                num_solutions: true,
                free_search: true,
                parallel: false,
                seed: true,
            },
            SolverKind::Gurobi | SolverKind::Cplex => Capabilities {
                all_solutions: true,
                num_solutions: false,
                free_search: false,
                parallel: true,
                seed: true,
            },
            SolverKind::CoinBc | SolverKind::Highs => Capabilities {
                all_solutions: true,
                num_solutions: false,
                free_search: false,
                parallel: true,
                seed: false,
            },
        }
    }

    pub fn flags(self) -> Flags {
        match self {
            SolverKind::Gecode | SolverKind::Chuffed | SolverKind::OrTools => Flags::STANDARD,
            // The MIP interface names its seed option.
            SolverKind::Gurobi | SolverKind::Cplex => Flags {
                seed: "--random-seed",
                ..Flags::STANDARD
            },
            SolverKind::CoinBc | SolverKind::Highs => Flags::STANDARD,
        }
    }

    /// Fails if `options` ask for something this backend cannot do.
    pub fn check_options(self, options: &SolveOptions) -> Result<(), ConfigError> {
        let caps = self.capabilities();
        let unsupported = |feature| ConfigError::Unsupported {
            solver: self,
            feature,
        };
        if options.all_solutions && !caps.all_solutions {
            return Err(unsupported("all solutions"));
        }
        if !options.all_solutions && options.num_solutions.is_some() && !caps.num_solutions {
            return Err(unsupported("a solution count"));
        }
        if options.free_search && !caps.free_search {
            return Err(unsupported("free search"));
        }
        if options.parallel.is_some() && !caps.parallel {
            return Err(unsupported("parallel solving"));
        }
        if options.seed.is_some() && !caps.seed {
            return Err(unsupported("a random seed"));
        }
        Ok(())
    }

    /// Translates solve options into this backend's flags.
    pub fn args(self, options: &SolveOptions) -> Result<Vec<String>, ConfigError> {
        self.check_options(options)?;
        let flags = self.flags();
        let mut args = Vec::new();
        if options.all_solutions {
            args.push(flags.all_solutions.to_string());
        } else if let Some(n) = options.num_solutions {
            args.push(flags.num_solutions.to_string());
            args.push(n.to_string());
        }
        if options.free_search {
            args.push(flags.free_search.to_string());
        }
        if let Some(threads) = options.parallel {
            args.push(flags.parallel.to_string());
            args.push(threads.to_string());
        }
        if let Some(seed) = options.seed {
            args.push(flags.seed.to_string());
            args.push(seed.to_string());
        }
        Ok(args)
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SolverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SolverKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown solver '{s}'")))
    }
}

#[cfg(test)]
mod tests;
