//! Fork/match scenarios for the amtool entry point
//!
//! Built with `harness = false`: this binary is its own test runner. Without
//! `AMTOOL_FORK=1` it spawns itself once per scenario; with it, it runs the
//! selected scenario through `amtool::run` and exits with its status.

use amtool::harness::{self, scenario::AMTOOL_SCENARIOS, HarnessArgs, Mode};
use clap::Parser;

fn main() {
    let mode = Mode::from_env();
    let args = HarnessArgs::parse();
    let code = harness::main(mode, &args, AMTOOL_SCENARIOS, &|argv: &[&str]| {
        amtool::run(argv.iter().copied())
    });
    std::process::exit(code);
}
