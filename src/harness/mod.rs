//! Self-reexecuting CLI test harness
//!
//! One test binary plays two roles. As the *driver* it walks a scenario
//! table and, for each scenario, spawns itself again with the scenario name
//! as a libtest-style filter and [`fork::MARKER_VAR`] set. As the *subject*
//! (marker present) it calls the CLI entry point with the scenario's
//! arguments and exits with whatever code the entry point returned.
//!
//! The role is resolved once at startup into a [`Mode`] and passed to
//! [`main`] explicitly:
//!
//! ```no_run
//! use amtool::harness::{self, scenario::AMTOOL_SCENARIOS, HarnessArgs, Mode};
//! use clap::Parser;
//!
//! let mode = Mode::from_env();
//! let args = HarnessArgs::parse();
//! let code = harness::main(mode, &args, AMTOOL_SCENARIOS, &|argv: &[&str]| {
//!     amtool::run(argv.iter().copied())
//! });
//! std::process::exit(code);
//! ```

pub mod fork;
pub mod scenario;

use anyhow::{Context, Result};
use clap::Parser;
use fork::{ForkRunner, Report, MARKER_VALUE, MARKER_VAR};
use scenario::Scenario;
use std::ffi::OsStr;
use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Exit code libtest uses for a failed run
pub const EXIT_TESTS_FAILED: i32 = 101;

/// Program name handed to the entry point as `argv[0]`
pub const PROGRAM: &str = "amtool";

/// Which role this process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Orchestrates scenarios by spawning children
    #[default]
    Driver,
    /// Runs the CLI entry point for exactly one scenario
    Subject,
}

impl Mode {
    /// Decide the role from the marker's value; only the sentinel selects
    /// subject mode.
    pub fn from_marker(value: Option<&OsStr>) -> Self {
        match value {
            Some(v) if v == MARKER_VALUE => Mode::Subject,
            _ => Mode::Driver,
        }
    }

    /// Read the marker from the process environment
    pub fn from_env() -> Self {
        Self::from_marker(std::env::var_os(MARKER_VAR).as_deref())
    }
}

/// libtest-compatible command line, so `cargo test` and `cargo nextest`
/// can drive the harness binary unchanged
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "cli_fork", ignore_errors = true)]
pub struct HarnessArgs {
    /// Run only scenarios whose name contains (or with --exact, equals) a filter
    pub filters: Vec<String>,

    /// Match filters exactly
    #[arg(long)]
    pub exact: bool,

    /// List scenarios instead of running them
    #[arg(long)]
    pub list: bool,

    /// Skip scenarios whose name contains (or with --exact, equals) this
    #[arg(long, value_name = "FILTER")]
    pub skip: Vec<String>,

    /// Output format: pretty or terse
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Display one character per scenario
    #[arg(short, long)]
    pub quiet: bool,

    /// Number of scenarios to run in parallel
    #[arg(long = "test-threads", value_name = "N")]
    pub test_threads: Option<NonZeroUsize>,

    /// Run only ignored scenarios (there are none)
    #[arg(long)]
    pub ignored: bool,

    /// Run ignored and not ignored scenarios
    #[arg(long = "include-ignored")]
    pub include_ignored: bool,

    /// Accepted for libtest compatibility; child output is always captured
    #[arg(long)]
    pub nocapture: bool,

    /// Accepted for libtest compatibility
    #[arg(long = "show-output")]
    pub show_output: bool,

    /// Accepted for libtest compatibility
    #[arg(long, value_name = "WHEN")]
    pub color: Option<String>,
}

impl HarnessArgs {
    fn name_matches(&self, pattern: &str, name: &str) -> bool {
        if self.exact {
            name == pattern
        } else {
            name.contains(pattern)
        }
    }

    /// Whether the scenario named `name` is part of this run
    pub fn selects(&self, name: &str) -> bool {
        if self.ignored && !self.include_ignored {
            return false;
        }
        let included =
            self.filters.is_empty() || self.filters.iter().any(|f| self.name_matches(f, name));
        included && !self.skip.iter().any(|s| self.name_matches(s, name))
    }

    fn terse(&self) -> bool {
        self.quiet || self.format.as_deref() == Some("terse")
    }

    fn threads(&self) -> usize {
        self.test_threads
            .map(NonZeroUsize::get)
            .or_else(|| {
                std::env::var("RUST_TEST_THREADS")
                    .ok()
                    .and_then(|v| v.parse::<usize>().ok())
                    .filter(|n| *n > 0)
            })
            .or_else(|| std::thread::available_parallelism().ok().map(NonZeroUsize::get))
            .unwrap_or(1)
    }
}

/// Harness entry: run as subject or driver and return the process exit code
pub fn main(
    mode: Mode,
    args: &HarnessArgs,
    scenarios: &[Scenario],
    entry: &dyn Fn(&[&str]) -> i32,
) -> i32 {
    match mode {
        Mode::Subject => run_subject(args, scenarios, entry),
        Mode::Driver => match drive(args, scenarios) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {:#}", e);
                EXIT_TESTS_FAILED
            }
        },
    }
}

fn drive(args: &HarnessArgs, scenarios: &[Scenario]) -> Result<i32> {
    let runner = ForkRunner::current().context("cannot locate the test binary")?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    Ok(run_driver(&runner, args, scenarios, &mut out))
}

/// Subject side: call the entry point for the one selected scenario.
///
/// Nothing else is written to stdout or stderr, so the parent sees exactly
/// what the entry point printed.
pub fn run_subject(
    args: &HarnessArgs,
    scenarios: &[Scenario],
    entry: &dyn Fn(&[&str]) -> i32,
) -> i32 {
    let selected: Vec<&Scenario> = scenarios.iter().filter(|s| args.selects(s.name)).collect();
    match selected.as_slice() {
        [scenario] => entry(&scenario.argv(PROGRAM)),
        _ => {
            eprintln!(
                "error: subject mode needs exactly one scenario, filters {:?} selected {}",
                args.filters,
                selected.len()
            );
            EXIT_TESTS_FAILED
        }
    }
}

/// Driver side: fork every selected scenario, report like libtest
pub fn run_driver(
    runner: &ForkRunner,
    args: &HarnessArgs,
    scenarios: &[Scenario],
    out: &mut dyn Write,
) -> i32 {
    let selected: Vec<&Scenario> = scenarios.iter().filter(|s| args.selects(s.name)).collect();
    let filtered_out = scenarios.len() - selected.len();

    if args.list {
        for scenario in &selected {
            let _ = writeln!(out, "{}: test", scenario.name);
        }
        return 0;
    }

    let started = Instant::now();
    let _ = writeln!(
        out,
        "\nrunning {} {}",
        selected.len(),
        if selected.len() == 1 { "test" } else { "tests" }
    );

    let results = run_parallel(runner, &selected, args.threads());

    let mut failures: Vec<&Report> = Vec::new();
    for (scenario, result) in selected.iter().zip(&results) {
        let status = if result.is_ok() { "ok" } else { "FAILED" };
        if args.terse() {
            let _ = write!(out, "{}", if result.is_ok() { "." } else { "F" });
        } else {
            let _ = writeln!(out, "test {} ... {}", scenario.name, status);
        }
        if let Err(report) = result {
            failures.push(report);
        }
    }
    if args.terse() {
        let _ = writeln!(out);
    }

    if !failures.is_empty() {
        let _ = writeln!(out, "\nfailures:\n");
        for report in &failures {
            let _ = writeln!(out, "---- {} ----\n{}\n", report.scenario, report);
        }
        let _ = writeln!(out, "failures:");
        for report in &failures {
            let _ = writeln!(out, "    {}", report.scenario);
        }
    }

    let passed = selected.len() - failures.len();
    let _ = writeln!(
        out,
        "\ntest result: {}. {} passed; {} failed; 0 ignored; 0 measured; {} filtered out; finished in {:.2}s\n",
        if failures.is_empty() { "ok" } else { "FAILED" },
        passed,
        failures.len(),
        filtered_out,
        started.elapsed().as_secs_f64()
    );
    let _ = out.flush();

    if failures.is_empty() {
        0
    } else {
        EXIT_TESTS_FAILED
    }
}

/// Run scenarios on up to `threads` workers; results keep scenario order
pub fn run_parallel(
    runner: &ForkRunner,
    scenarios: &[&Scenario],
    threads: usize,
) -> Vec<Result<(), Report>> {
    let next = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<Result<(), Report>>>> =
        Mutex::new((0..scenarios.len()).map(|_| None).collect());
    let workers = threads.clamp(1, scenarios.len().max(1));

    std::thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let i = next.fetch_add(1, Ordering::SeqCst);
                let Some(scenario) = scenarios.get(i) else {
                    break;
                };
                let result = runner.run(scenario);
                let mut slots = slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                slots[i] = Some(result);
            });
        }
    });

    let slots = slots
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    collect_results(scenarios, slots)
}

/// Pair slots with their scenarios; a scenario without a result failed
fn collect_results(
    scenarios: &[&Scenario],
    slots: Vec<Option<Result<(), Report>>>,
) -> Vec<Result<(), Report>> {
    scenarios
        .iter()
        .zip(slots.into_iter().chain(std::iter::repeat_with(|| None)))
        .map(|(scenario, slot)| slot.unwrap_or_else(|| Err(Report::missing(scenario))))
        .collect()
}
