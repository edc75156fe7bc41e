//! Process entry point: argument parsing, command routing and top-level
//! error surfacing.
//!
//! Every failure ends up as a single `amtool: error: <message>` line on
//! stderr with exit status 1. Help and version output go to stdout with exit
//! status 0.

use crate::cli::Cli;
use crate::commands::{self, Settings};
use crate::error::{AmtoolError, Result};
use crate::version::BuildInfo;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

/// Exit status for any reported error
pub const EXIT_FAILURE: i32 = 1;

/// Run amtool against the real stdout/stderr and return the exit code.
///
/// `args` includes the program name, as `std::env::args_os()` does.
pub fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    run_with(args, &mut io::stdout(), &mut io::stderr())
}

/// Run amtool writing to the given streams
pub fn run_with<I, T>(args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let result = execute(args, out);
    // Output may be a pipe that was closed early; nothing useful to do then
    let _ = out.flush();

    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            let _ = writeln!(err, "amtool: error: {}", e);
            let _ = err.flush();
            EXIT_FAILURE
        }
    }
}

fn execute<I, T>(args: I, out: &mut dyn Write) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => return handle_parse_error(e, out),
    };

    init_tracing(cli.verbose);

    if cli.version {
        write!(out, "{}", BuildInfo::current())?;
        return Ok(());
    }

    let Some(command) = cli.command.clone() else {
        write!(out, "{}", Cli::command().render_help())?;
        return Ok(());
    };

    let settings = Settings::resolve(&cli)?;
    commands::dispatch(command, &settings, out)
}

fn handle_parse_error(e: clap::Error, out: &mut dyn Write) -> Result<()> {
    match e.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
            write!(out, "{}", e.render())?;
            Ok(())
        }
        ErrorKind::InvalidSubcommand => {
            let got = match e.get(ContextKind::InvalidSubcommand) {
                Some(ContextValue::String(s)) => s.clone(),
                _ => String::new(),
            };
            Err(AmtoolError::UnknownCommand(got))
        }
        _ => Err(AmtoolError::Usage(usage_message(&e))),
    }
}

/// First line of clap's rendered error, without its `error: ` prefix
fn usage_message(e: &clap::Error) -> String {
    let rendered = e.render().to_string();
    let first = rendered.lines().next().unwrap_or_default();
    first.strip_prefix("error: ").unwrap_or(first).to_string()
}

/// Initialize tracing subscriber for verbose output
fn init_tracing(verbose: bool) {
    if verbose {
        // A subscriber may already be installed when run() is called
        // repeatedly in one process; keep the first one.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    }
}
