//! Colorful console output for solver runs.
//!
//! Provides a custom `tracing` layer that formats invocation events with
//! colors.
//!
//! ## Log Levels
//!
//! - **INFO**: Lifecycle events (invocation start/stop/end, pool start)
//! - **DEBUG**: Individual solutions and generated files
//! - **TRACE**: Raw solver output lines

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();

const DEFAULT_FILTER: &str = "mznforge_solver=info";

/// Initializes the console output.
///
/// Safe to call multiple times - only the first call has effect.
/// `RUST_LOG` overrides the default `mznforge_solver=info` filter.
pub fn init() {
    INIT.get_or_init(|| {
        EPOCH.get_or_init(Instant::now);
        print_banner();

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(SolverConsoleLayer)
            .try_init();
    });
}

fn print_banner() {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(
        stdout,
        "{} {}",
        "mznforge".bright_cyan().bold(),
        format!("v{} - MiniZinc driver", env!("CARGO_PKG_VERSION")).bright_white()
    );
    let _ = stdout.flush();
}

fn elapsed_secs() -> f64 {
    EPOCH.get().map_or(0.0, |epoch| epoch.elapsed().as_secs_f64())
}

/// A tracing layer that formats invocation events with colors.
pub struct SolverConsoleLayer;

impl<S: Subscriber> Layer<S> for SolverConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("mznforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor, *metadata.level());
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Debug, Default)]
struct EventVisitor {
    event: Option<String>,
    id: Option<String>,
    model: Option<String>,
    solver: Option<String>,
    status: Option<String>,
    reason: Option<String>,
    error: Option<String>,
    path: Option<String>,
    line: Option<String>,
    pid: Option<u64>,
    index: Option<u64>,
    solutions: Option<u64>,
    requests: Option<u64>,
    concurrency: Option<u64>,
    exit_code: Option<i64>,
    timeout_ms: Option<u64>,
    elapsed_ms: Option<u64>,
    solve_time_ms: Option<u64>,
    decoded: Option<bool>,
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, format!("{:?}", value).trim_matches('"'));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "pid" => self.pid = Some(value),
            "index" => self.index = Some(value),
            "solutions" => self.solutions = Some(value),
            "requests" => self.requests = Some(value),
            "concurrency" => self.concurrency = Some(value),
            "exit_code" => self.exit_code = Some(value as i64),
            "timeout_ms" => self.timeout_ms = Some(value),
            "elapsed_ms" => self.elapsed_ms = Some(value),
            "solve_time_ms" => self.solve_time_ms = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match field.name() {
            "exit_code" => self.exit_code = Some(value),
            _ => self.record_u64(field, value.max(0) as u64),
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "decoded" {
            self.decoded = Some(value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        let slot = match field.name() {
            "event" => &mut self.event,
            "id" => &mut self.id,
            "model" => &mut self.model,
            "solver" => &mut self.solver,
            "status" => &mut self.status,
            "reason" => &mut self.reason,
            "error" => &mut self.error,
            "path" => &mut self.path,
            "line" => &mut self.line,
            _ => return,
        };
        *slot = Some(value.to_string());
    }
}

fn format_event(v: &EventVisitor, level: Level) -> String {
    match v.event.as_deref().unwrap_or("") {
        "pool_start" => format_pool_start(v),
        "invocation_start" => format_invocation_start(v),
        "solution" => format_solution(v),
        "invocation_stop" => format_invocation_stop(v),
        "invocation_end" => format_invocation_end(v),
        "invocation_error" | "launch_failed" => format_error(v),
        "file_generated" => format_file(v),
        "stdout_line" if level == Level::TRACE => format_line(v),
        _ => String::new(),
    }
}

fn format_elapsed() -> String {
    format!("{:>7.3}s", elapsed_secs()).bright_black().to_string()
}

// First block of the uuid; enough to tell concurrent runs apart.
fn short_id(v: &EventVisitor) -> String {
    let id = v.id.as_deref().unwrap_or("--------");
    let short = id.split('-').next().unwrap_or(id);
    format!("[{}]", short).bright_black().to_string()
}

fn format_pool_start(v: &EventVisitor) -> String {
    format!(
        "{} {} Pool │ {} requests │ {} at a time",
        format_elapsed(),
        "▶".bright_green().bold(),
        v.requests
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .bright_yellow(),
        v.concurrency
            .unwrap_or(1)
            .to_formatted_string(&Locale::en)
            .bright_yellow(),
    )
}

fn format_invocation_start(v: &EventVisitor) -> String {
    let mut output = format!(
        "{} {} {} Solving {} │ {}",
        format_elapsed(),
        short_id(v),
        "▶".bright_green().bold(),
        v.model.as_deref().unwrap_or("model").white().bold(),
        v.solver.as_deref().unwrap_or("?").bright_magenta(),
    );
    if let Some(pid) = v.pid {
        output.push_str(&format!(" │ pid {}", pid));
    }
    if let Some(ms) = v.timeout_ms {
        output.push_str(&format!(" │ {} limit", format_duration_ms(ms).bright_yellow()));
    }
    output
}

fn format_solution(v: &EventVisitor) -> String {
    let index = v.index.unwrap_or(0);
    let icon = if v.decoded.unwrap_or(true) {
        "✓".bright_green().to_string()
    } else {
        "✗".bright_red().to_string()
    };
    let mut output = format!(
        "{} {} {} Solution {:>6}",
        format_elapsed(),
        short_id(v),
        icon,
        (index + 1).to_formatted_string(&Locale::en).white(),
    );
    if let Some(ms) = v.solve_time_ms {
        output.push_str(&format!(" │ {}", format_duration_ms(ms).yellow()));
    }
    output
}

fn format_invocation_stop(v: &EventVisitor) -> String {
    format!(
        "{} {} {} Stopping │ {}",
        format_elapsed(),
        short_id(v),
        "■".bright_yellow().bold(),
        v.reason.as_deref().unwrap_or("requested").to_lowercase(),
    )
}

fn format_invocation_end(v: &EventVisitor) -> String {
    let status = v.status.as_deref().unwrap_or("unknown");
    let mut output = format!(
        "{} {} {} Finished │ {} │ {} solution(s) │ {}",
        format_elapsed(),
        short_id(v),
        "◀".bright_cyan().bold(),
        format_status(status),
        v.solutions
            .unwrap_or(0)
            .to_formatted_string(&Locale::en)
            .white(),
        format_duration_ms(v.elapsed_ms.unwrap_or(0)).yellow(),
    );
    if let Some(code) = v.exit_code.filter(|code| *code != 0) {
        output.push_str(&format!(" │ exit {}", code.to_string().bright_red()));
    }
    output
}

fn format_error(v: &EventVisitor) -> String {
    format!(
        "{} {} {} {}",
        format_elapsed(),
        short_id(v),
        "✗".bright_red().bold(),
        v.error.as_deref().unwrap_or("error").bright_red(),
    )
}

fn format_file(v: &EventVisitor) -> String {
    format!(
        "{} {}   wrote {}",
        format_elapsed(),
        short_id(v),
        v.path.as_deref().unwrap_or("").bright_black(),
    )
}

fn format_line(v: &EventVisitor) -> String {
    format!(
        "{} {}   {}",
        format_elapsed(),
        short_id(v),
        v.line.as_deref().unwrap_or("").bright_black(),
    )
}

fn format_status(status: &str) -> String {
    let upper = status.to_uppercase();
    match status {
        "optimal" | "satisfied" => upper.bright_green().bold().to_string(),
        "unsatisfiable" | "unbounded" | "unsat_or_unbounded" => upper.bright_yellow().bold().to_string(),
        "error" => upper.bright_red().bold().to_string(),
        _ => upper.white().bold().to_string(),
    }
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}
