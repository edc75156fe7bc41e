//! Command routing and the settings every command shares

pub mod alert;
pub mod silence;

use crate::cli::{Cli, Commands, OutputFormat};
use crate::client::AlertmanagerClient;
use crate::config::{self, Config};
use crate::error::{AmtoolError, Result};
use chrono::{DateTime, Utc};
use std::io::Write;
use std::time::Duration;

/// Global flags merged with the config file (flags win)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub alertmanager_url: Option<String>,
    pub output: OutputFormat,
    pub timeout: Duration,
    pub author: String,
    pub comment_required: bool,
    pub receiver: Option<String>,
}

impl Settings {
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let config = Config::load(cli.config_file.as_deref())?;
        Self::merge(cli, config)
    }

    pub fn merge(cli: &Cli, config: Config) -> Result<Self> {
        let output = match cli.output {
            Some(output) => output,
            None => config.output_format()?.unwrap_or_default(),
        };
        let timeout = match cli.timeout {
            Some(timeout) => timeout,
            None => config.timeout()?.unwrap_or(config::DEFAULT_TIMEOUT),
        };

        Ok(Self {
            alertmanager_url: cli.alertmanager_url.clone().or(config.alertmanager_url),
            output,
            timeout,
            author: config.author.unwrap_or_else(default_author),
            comment_required: config.comment_required,
            receiver: config.receiver,
        })
    }

    /// API client for the configured Alertmanager
    pub fn client(&self) -> Result<AlertmanagerClient> {
        let url = self
            .alertmanager_url
            .as_deref()
            .ok_or(AmtoolError::MissingAlertmanagerUrl)?;
        AlertmanagerClient::new(url, self.timeout)
    }
}

fn default_author() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "amtool".to_string())
}

/// Run a parsed command
pub fn dispatch(command: Commands, settings: &Settings, out: &mut dyn Write) -> Result<()> {
    tracing::debug!(?command, "dispatching command");
    match command {
        Commands::Alert(cmd) => alert::run(cmd, settings, out),
        Commands::Silence(cmd) => silence::run(cmd, settings, out),
    }
}

/// Parse an RFC3339 timestamp flag
pub(crate) fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|source| AmtoolError::BadTimestamp {
            value: value.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "amtool",
            "--alertmanager.url=http://flag:9093",
            "-o",
            "json",
            "--timeout",
            "5s",
        ]);
        let config = Config {
            alertmanager_url: Some("http://config:9093".to_string()),
            output: Some("extended".to_string()),
            timeout: Some("1m".to_string()),
            ..Config::default()
        };

        let settings = Settings::merge(&cli, config).unwrap();
        assert_eq!(settings.alertmanager_url.as_deref(), Some("http://flag:9093"));
        assert_eq!(settings.output, OutputFormat::Json);
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_fills_missing_flags() {
        let cli = Cli::parse_from(["amtool"]);
        let config = Config {
            alertmanager_url: Some("http://config:9093".to_string()),
            output: Some("extended".to_string()),
            author: Some("ops".to_string()),
            comment_required: true,
            ..Config::default()
        };

        let settings = Settings::merge(&cli, config).unwrap();
        assert_eq!(settings.alertmanager_url.as_deref(), Some("http://config:9093"));
        assert_eq!(settings.output, OutputFormat::Extended);
        assert_eq!(settings.timeout, config::DEFAULT_TIMEOUT);
        assert_eq!(settings.author, "ops");
        assert!(settings.comment_required);
    }

    #[test]
    fn test_missing_url_is_reported() {
        let cli = Cli::parse_from(["amtool"]);
        let settings = Settings::merge(&cli, Config::default()).unwrap();
        let err = settings.client().unwrap_err();
        assert_eq!(
            err.to_string(),
            "required flag --alertmanager.url not provided"
        );
    }

    #[test]
    fn test_parse_time() {
        let t = parse_time("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(matches!(
            parse_time("yesterday"),
            Err(AmtoolError::BadTimestamp { .. })
        ));
    }
}
