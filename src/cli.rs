//! CLI argument parsing for amtool

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level help layout; the usage line mirrors the classic amtool one
const HELP_TEMPLATE: &str = "usage: {usage}\n\n{about}\n\n{all-args}{after-help}\n";

/// Output format for alerts and silences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One line per item, key fields only (default)
    #[default]
    Simple,
    /// One line per item with every field
    Extended,
    /// Raw API objects as JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "amtool")]
#[command(about = "View and modify the current Alertmanager state.", long_about = None)]
#[command(override_usage = "amtool [<flags>] <command> [<args> ...]")]
#[command(help_template = HELP_TEMPLATE)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// Verbose running information
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Alertmanager to talk to
    #[arg(long = "alertmanager.url", value_name = "URL", global = true)]
    pub alertmanager_url: Option<String>,

    /// Output formatter (simple, extended, json)
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    /// Timeout for the executed command (e.g. 30s, 1m)
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout, global = true)]
    pub timeout: Option<Duration>,

    /// Config file to read flag defaults from
    #[arg(long = "config.file", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    /// Show application version.
    #[arg(long)]
    pub version: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add or query alerts.
    #[command(subcommand)]
    Alert(AlertCommand),

    /// Add, expire or view silences.
    #[command(subcommand)]
    Silence(SilenceCommand),
}

#[derive(Subcommand, Debug, Clone)]
pub enum AlertCommand {
    /// View and search through current alerts.
    Query(AlertQueryArgs),
    /// Add a new alert.
    Add(AlertAddArgs),
}

#[derive(Subcommand, Debug, Clone)]
pub enum SilenceCommand {
    /// Query Alertmanager silences.
    Query(SilenceQueryArgs),
    /// Add a new alertmanager silence.
    Add(SilenceAddArgs),
    /// Expire one or more silences.
    Expire(SilenceExpireArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct AlertQueryArgs {
    /// Show active alerts
    #[arg(short, long)]
    pub active: bool,

    /// Show silenced alerts
    #[arg(short, long)]
    pub silenced: bool,

    /// Show inhibited alerts
    #[arg(short, long)]
    pub inhibited: bool,

    /// Show unprocessed alerts
    #[arg(short, long)]
    pub unprocessed: bool,

    /// Show alerts that match the given receiver
    #[arg(short, long, value_name = "RECEIVER")]
    pub receiver: Option<String>,

    /// Query filter, e.g. `job=api` or `severity=~"page|ticket"`
    #[arg(value_name = "MATCHER")]
    pub matchers: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AlertAddArgs {
    /// Set an annotation to be included with the alert (key=value)
    #[arg(long = "annotation", value_name = "KEY=VALUE")]
    pub annotations: Vec<String>,

    /// Set when the alert should start (RFC3339)
    #[arg(long, value_name = "TIME")]
    pub start: Option<String>,

    /// Set when the alert should end (RFC3339)
    #[arg(long, value_name = "TIME")]
    pub end: Option<String>,

    /// Set the URL of the source that generated the alert
    #[arg(long = "generator-url", value_name = "URL")]
    pub generator_url: Option<String>,

    /// List of labels to be included with the alert
    #[arg(value_name = "LABEL")]
    pub labels: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SilenceQueryArgs {
    /// Show expired silences instead of active
    #[arg(short, long)]
    pub expired: bool,

    /// Only show silence ids
    #[arg(short, long)]
    pub quiet: bool,

    /// Query filter
    #[arg(value_name = "MATCHER")]
    pub matchers: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SilenceAddArgs {
    /// Username for CreatedBy field
    #[arg(short, long)]
    pub author: Option<String>,

    /// A comment to help describe the silence
    #[arg(short, long)]
    pub comment: Option<String>,

    /// Duration of silence
    #[arg(short, long, value_name = "DURATION", default_value = "1h")]
    pub duration: String,

    /// Set when the silence should start (RFC3339)
    #[arg(long, value_name = "TIME")]
    pub start: Option<String>,

    /// Set when the silence should end (RFC3339), overrides --duration
    #[arg(long, value_name = "TIME")]
    pub end: Option<String>,

    /// Matchers the silence applies to
    #[arg(value_name = "MATCHER", required = true)]
    pub matchers: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SilenceExpireArgs {
    /// Ids of silences to expire
    #[arg(value_name = "SILENCE_ID", required = true)]
    pub ids: Vec<String>,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    crate::config::parse_duration(s).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_empty_without_command() {
        let cli = Cli::parse_from(["amtool"]);
        assert!(cli.command.is_none());
        assert!(!cli.version);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_version_flag() {
        let cli = Cli::parse_from(["amtool", "--version"]);
        assert!(cli.version);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "amtool",
            "--verbose",
            "alert",
            "add",
            "--alertmanager.url=http://localhost:1",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.alertmanager_url.as_deref(), Some("http://localhost:1"));
        match cli.command {
            Some(Commands::Alert(AlertCommand::Add(args))) => assert!(args.labels.is_empty()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_alert_query_flags() {
        let cli = Cli::parse_from(["amtool", "alert", "query", "-s", "-i", "job=api"]);
        match cli.command {
            Some(Commands::Alert(AlertCommand::Query(args))) => {
                assert!(args.silenced);
                assert!(args.inhibited);
                assert!(!args.active);
                assert_eq!(args.matchers, vec!["job=api"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_output_and_timeout() {
        let cli = Cli::parse_from(["amtool", "-o", "json", "--timeout", "1m", "silence", "query"]);
        assert_eq!(cli.output, Some(OutputFormat::Json));
        assert_eq!(cli.timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_cli_bad_timeout_rejected() {
        assert!(Cli::try_parse_from(["amtool", "--timeout", "soon", "silence", "query"]).is_err());
    }

    #[test]
    fn test_cli_silence_add_defaults() {
        let cli = Cli::parse_from(["amtool", "silence", "add", "alertname=Foo"]);
        match cli.command {
            Some(Commands::Silence(SilenceCommand::Add(args))) => {
                assert_eq!(args.duration, "1h");
                assert!(args.comment.is_none());
                assert_eq!(args.matchers, vec!["alertname=Foo"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_silence_expire_requires_id() {
        assert!(Cli::try_parse_from(["amtool", "silence", "expire"]).is_err());
    }

    #[test]
    fn test_help_starts_with_usage_line() {
        let help = Cli::command().render_help().to_string();
        assert!(help.starts_with("usage: amtool [<flags>] <command> [<args> ...]"));
        assert!(help.contains("--alertmanager.url"));
    }
}
