//! Error types surfaced by the amtool CLI

use std::path::PathBuf;
use thiserror::Error;

/// Every error amtool reports as `amtool: error: <message>`
#[derive(Error, Debug)]
pub enum AmtoolError {
    #[error("expected command but got {0:?}")]
    UnknownCommand(String),

    #[error("{0}")]
    Usage(String),

    #[error("required flag --alertmanager.url not provided")]
    MissingAlertmanagerUrl,

    #[error("invalid --alertmanager.url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("bad matcher format: {0}")]
    BadMatcher(String),

    #[error("invalid regular expression in matcher {matcher}: {source}")]
    BadMatcherRegex {
        matcher: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid label {0:?}: only equality matchers are allowed for labels")]
    BadLabel(String),

    #[error("invalid annotation {0:?}: expected key=value")]
    BadAnnotation(String),

    #[error("invalid duration {0:?}")]
    BadDuration(String),

    #[error("invalid timestamp {value:?}: {source}")]
    BadTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("invalid silence id {0:?}")]
    BadSilenceId(String),

    #[error("comment required by config")]
    CommentRequired,

    #[error("silence end time must be after its start time")]
    InvalidSilenceWindow,

    #[error("failed to read config file {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures talking to the Alertmanager API
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("{method} {url:?}: {cause}")]
    Transport {
        method: &'static str,
        url: String,
        cause: String,
    },

    #[error("{method} {url:?}: {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("{method} {url:?}: failed to decode response: {cause}")]
    Decode {
        method: &'static str,
        url: String,
        cause: String,
    },
}

pub type Result<T> = std::result::Result<T, AmtoolError>;
