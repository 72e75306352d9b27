//! Fake solver executables.
//!
//! Each [`FakeSolver`] is a `/bin/sh` script in its own temporary directory.
//! The script ignores the MiniZinc command line (optionally recording it) and
//! prints canned output, so process-level tests run without MiniZinc
//! installed. Unix only.

use std::fs;
use std::path::{Path, PathBuf};

use mznforge_config::SolverConfig;
use tempfile::TempDir;

const HEREDOC_END: &str = "MZNFORGE_FAKE_EOF";

/// A fake `minizinc` executable.
#[derive(Debug)]
pub struct FakeSolver {
    dir: TempDir,
    path: PathBuf,
}

impl FakeSolver {
    /// Creates a solver running `body` as a shell script.
    ///
    /// # Panics
    ///
    /// Panics if the script cannot be written.
    pub fn script(body: &str) -> Self {
        let dir = tempfile::tempdir().expect("create fake solver dir");
        let path = dir.path().join("minizinc");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write fake solver");
        make_executable(&path);
        Self { dir, path }
    }

    /// Prints `output` verbatim and exits successfully.
    pub fn printing(output: &str) -> Self {
        Self::script(&print(output))
    }

    /// Prints `output`, then sleeps for `seconds` without printing more.
    ///
    /// `exec` replaces the shell so a signal to the process stops the sleep.
    pub fn printing_then_sleeping(output: &str, seconds: u32) -> Self {
        Self::script(&format!("{}\nexec sleep {seconds}", print(output)))
    }

    /// Prints `output`, closes standard output, then sleeps for `seconds`.
    pub fn closing_output_then_sleeping(output: &str, seconds: u32) -> Self {
        Self::script(&format!("{}\nexec >&-\nexec sleep {seconds}", print(output)))
    }

    /// Like [`printing_then_sleeping`](Self::printing_then_sleeping), but
    /// ignores SIGTERM so only SIGKILL ends it.
    pub fn stubborn(output: &str, seconds: u32) -> Self {
        Self::script(&format!(
            "trap '' TERM\n{}\nsleep {seconds}\nsleep {seconds}",
            print(output)
        ))
    }

    /// Writes `stderr` to standard error and exits with `code`.
    pub fn failing(stderr: &str, code: i32) -> Self {
        Self::script(&format!(
            "cat >&2 <<'{HEREDOC_END}'\n{stderr}\n{HEREDOC_END}\nexit {code}"
        ))
    }

    /// Records its arguments to `args.txt`, then prints `output`.
    pub fn recording(output: &str) -> Self {
        let solver = Self::script("");
        let args = solver.dir.path().join("args.txt");
        let body = format!(
            "for arg in \"$@\"; do printf '%s\\n' \"$arg\" >> '{}'; done\n{}",
            args.display(),
            print(output)
        );
        fs::write(&solver.path, format!("#!/bin/sh\n{body}\n")).expect("write fake solver");
        solver
    }

    /// Prints the model file it was given as a solution block, followed by
    /// the working directory as `dir`.
    ///
    /// Models used with it must be valid dzn, such as `id = 3;`.
    pub fn echoing_model() -> Self {
        Self::script(concat!(
            "cat model.mzn\n",
            "echo\n",
            "printf 'dir = \"%s\";\\n' \"$(pwd)\"\n",
            "echo ----------\n",
            "echo ==========",
        ))
    }

    /// Sleeps for `seconds`, then prints `output`.
    pub fn sleeping_then_printing(seconds: f64, output: &str) -> Self {
        Self::script(&format!("sleep {seconds}\n{}", print(output)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Arguments recorded by a [`recording`](Self::recording) solver.
    pub fn recorded_args(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("args.txt"))
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// A configuration using this solver as the executable.
    pub fn config(&self) -> SolverConfig {
        SolverConfig::new().with_executable(&self.path)
    }
}

fn print(output: &str) -> String {
    format!("cat <<'{HEREDOC_END}'\n{output}\n{HEREDOC_END}")
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path).expect("stat fake solver").permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions).expect("chmod fake solver");
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) {}
