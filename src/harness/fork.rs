//! Fork/match: re-execute the current test binary for one scenario and
//! compare what it printed against the scenario's expectations.

use super::scenario::Scenario;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use thiserror::Error;

/// Environment variable that turns a re-executed binary into the subject
pub const MARKER_VAR: &str = "AMTOOL_FORK";

/// The only value of [`MARKER_VAR`] that selects subject mode
pub const MARKER_VALUE: &str = "1";

/// How the child process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Success,
    ExitedWithCode(i32),
    /// Killed by a signal, so no exit code
    Signalled(Option<i32>),
    FailedToStart(String),
}

impl Termination {
    /// What a scenario expecting `exit_code` must end with
    pub fn expected(exit_code: i32) -> Self {
        if exit_code == 0 {
            Termination::Success
        } else {
            Termination::ExitedWithCode(exit_code)
        }
    }
}

impl From<ExitStatus> for Termination {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return Termination::Success;
        }
        match status.code() {
            Some(code) => Termination::ExitedWithCode(code),
            None => Termination::Signalled(signal_of(&status)),
        }
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Success => write!(f, "success"),
            Termination::ExitedWithCode(code) => write!(f, "exit status {}", code),
            Termination::Signalled(Some(sig)) => write!(f, "killed by signal {}", sig),
            Termination::Signalled(None) => write!(f, "killed by a signal"),
            Termination::FailedToStart(reason) => write!(f, "failed to start: {}", reason),
        }
    }
}

/// Everything observable about one child run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedResult {
    pub stdout: String,
    pub stderr: String,
    pub outcome: Termination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// A single failed expectation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    #[error("child process could not be started: {0}")]
    SpawnFailed(String),

    #[error("expected {expected}, got {actual}")]
    ExitCode {
        expected: Termination,
        actual: Termination,
    },

    #[error("expected empty {stream}, got {} bytes", .actual.len())]
    UnexpectedOutput { stream: Stream, actual: String },

    #[error("{stream} does not contain {expected:?}")]
    MissingSubstring {
        stream: Stream,
        expected: String,
        actual: String,
    },
}

/// A failed scenario: its mismatches plus the full captured output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub scenario: &'static str,
    pub mismatches: Vec<Mismatch>,
    pub captured: CapturedResult,
}

impl Report {
    /// A scenario whose worker never recorded an outcome
    pub fn missing(scenario: &Scenario) -> Self {
        let reason = "no result recorded".to_string();
        Self {
            scenario: scenario.name,
            mismatches: vec![Mismatch::SpawnFailed(reason.clone())],
            captured: CapturedResult {
                stdout: String::new(),
                stderr: String::new(),
                outcome: Termination::FailedToStart(reason),
            },
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario {:?} failed:", self.scenario)?;
        for mismatch in &self.mismatches {
            writeln!(f, "  - {}", mismatch)?;
        }
        writeln!(f)?;
        writeln!(f, "STDOUT:\n{}", self.captured.stdout)?;
        write!(f, "STDERR:\n{}", self.captured.stderr)
    }
}

impl std::error::Error for Report {}

/// Compare a captured run against a scenario.
///
/// Every check runs so one report shows all differences. A child that never
/// started has no output to compare.
pub fn check(scenario: &Scenario, captured: &CapturedResult) -> Vec<Mismatch> {
    if let Termination::FailedToStart(reason) = &captured.outcome {
        return vec![Mismatch::SpawnFailed(reason.clone())];
    }

    let mut mismatches = Vec::new();

    let expected = Termination::expected(scenario.exit_code);
    if captured.outcome != expected {
        mismatches.push(Mismatch::ExitCode {
            expected,
            actual: captured.outcome.clone(),
        });
    }

    mismatches.extend(check_stream(Stream::Stderr, scenario.stderr, &captured.stderr));
    mismatches.extend(check_stream(Stream::Stdout, scenario.stdout, &captured.stdout));
    mismatches
}

fn check_stream(stream: Stream, expected: Option<&str>, actual: &str) -> Option<Mismatch> {
    match expected {
        None | Some("") if !actual.is_empty() => Some(Mismatch::UnexpectedOutput {
            stream,
            actual: actual.to_string(),
        }),
        Some(text) if !text.is_empty() && !actual.contains(text) => {
            Some(Mismatch::MissingSubstring {
                stream,
                expected: text.to_string(),
                actual: actual.to_string(),
            })
        }
        _ => None,
    }
}

/// Spawns the test binary once per scenario
#[derive(Debug, Clone)]
pub struct ForkRunner {
    program: PathBuf,
}

impl ForkRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runner for the binary of the current process
    pub fn current() -> std::io::Result<Self> {
        std::env::current_exe().map(Self::new)
    }

    /// Child command: select exactly this scenario, mark it as the subject
    pub fn command(&self, scenario: &Scenario) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(scenario.name)
            .arg("--exact")
            .env(MARKER_VAR, MARKER_VALUE)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Run the scenario in a child process and wait for it
    pub fn capture(&self, scenario: &Scenario) -> CapturedResult {
        tracing::debug!(scenario = scenario.name, program = %self.program.display(), "spawning child");
        match self.command(scenario).output() {
            Ok(output) => CapturedResult {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                outcome: output.status.into(),
            },
            Err(e) => CapturedResult {
                stdout: String::new(),
                stderr: String::new(),
                outcome: Termination::FailedToStart(e.to_string()),
            },
        }
    }

    /// Capture and check one scenario
    pub fn run(&self, scenario: &Scenario) -> Result<(), Report> {
        let captured = self.capture(scenario);
        let mismatches = check(scenario, &captured);
        tracing::debug!(
            scenario = scenario.name,
            outcome = %captured.outcome,
            mismatches = mismatches.len(),
            "scenario finished"
        );
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(Report {
                scenario: scenario.name,
                mismatches,
                captured,
            })
        }
    }
}
