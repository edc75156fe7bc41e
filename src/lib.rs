//! amtool - command-line client for the Alertmanager v2 API
//!
//! The binary is a thin wrapper around [`run`], which parses arguments,
//! routes the command and turns any failure into an exit status. The
//! [`harness`] module re-executes a test binary against that entry point to
//! check its stdout, stderr and exit status as a user would see them.

pub mod app;
pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod format;
pub mod harness;
pub mod matcher;
pub mod version;

pub use app::{run, run_with};
pub use error::{AmtoolError, ClientError};
