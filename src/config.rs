//! Config file support
//!
//! amtool reads defaults for its global flags from a TOML file:
//!
//! ```toml
//! alertmanager_url = "http://localhost:9093"
//! output = "extended"
//! timeout = "10s"
//! author = "oncall@example.com"
//! comment_required = true
//! ```
//!
//! Flags given on the command line always win over the file.

use crate::cli::OutputFormat;
use crate::error::{AmtoolError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default request timeout when neither flag nor config sets one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Values loaded from a config file (all optional)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub alertmanager_url: Option<String>,
    pub output: Option<String>,
    pub timeout: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub comment_required: bool,
    pub receiver: Option<String>,
}

impl Config {
    /// Parse config from TOML text
    pub fn from_toml(text: &str, path: &Path) -> Result<Self> {
        toml::from_str(text).map_err(|source| AmtoolError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load an explicit config file; it must exist
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| AmtoolError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, path)
    }

    /// Load the explicit file if given, otherwise the first default
    /// location that exists, otherwise an empty config.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "loading config file");
            return Self::from_file(path);
        }

        for path in default_paths() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "loading default config file");
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Output format from config, if set and valid
    pub fn output_format(&self) -> Result<Option<OutputFormat>> {
        self.output
            .as_deref()
            .map(|s| {
                <OutputFormat as clap::ValueEnum>::from_str(s, true).map_err(|_| {
                    AmtoolError::Usage(format!(
                        "invalid output format {:?} in config file",
                        s
                    ))
                })
            })
            .transpose()
    }

    /// Request timeout from config, if set
    pub fn timeout(&self) -> Result<Option<Duration>> {
        self.timeout.as_deref().map(parse_duration).transpose()
    }
}

/// `$HOME/.config/amtool/config.toml`, then `/etc/amtool/config.toml`
pub fn default_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(PathBuf::from(home).join(".config/amtool/config.toml"));
    }
    paths.push(PathBuf::from("/etc/amtool/config.toml"));
    paths
}

/// Parse a Go-style duration such as `30s`, `1h30m`, `1.5h` or `250ms`
pub fn parse_duration(input: &str) -> Result<Duration> {
    let bad = || AmtoolError::BadDuration(input.to_string());
    let s = input.trim();
    if s.is_empty() {
        return Err(bad());
    }
    if s == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(bad)?;
        let (whole, fraction) = match rest[..number_len].split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (&rest[..number_len], ""),
        };
        if (whole.is_empty() && fraction.is_empty()) || fraction.contains('.') {
            return Err(bad());
        }
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit_nanos: u128 = match &rest[..unit_len] {
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "d" => 86_400 * 1_000_000_000,
            _ => return Err(bad()),
        };
        rest = &rest[unit_len..];

        total_nanos = total_nanos
            .checked_add(span_nanos(whole, fraction, unit_nanos).ok_or_else(bad)?)
            .ok_or_else(bad)?;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| bad())?;
    let nanos = u32::try_from(total_nanos % 1_000_000_000).map_err(|_| bad())?;
    Ok(Duration::new(secs, nanos))
}

/// `whole.fraction` units in nanoseconds; sub-nanosecond digits are dropped
fn span_nanos(whole: &str, fraction: &str, unit_nanos: u128) -> Option<u128> {
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    let mut scale = unit_nanos;
    for digit in fraction.chars() {
        scale /= 10;
        if scale == 0 {
            break;
        }
        nanos = nanos.checked_add(u128::from(digit.to_digit(10)?) * scale)?;
    }
    Some(nanos)
}
