//! Blocking client for the Alertmanager v2 HTTP API

use crate::error::{AmtoolError, ClientError, Result};
use crate::matcher::{self, ApiMatcher, Matcher};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Label set keyed by label name (sorted for stable output)
pub type LabelSet = BTreeMap<String, String>;

/// Alert as posted to `POST /api/v2/alerts`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostableAlert {
    pub labels: LabelSet,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: LabelSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", skip_serializing_if = "Option::is_none")]
    pub generator_url: Option<String>,
}

/// Alert as returned by `GET /api/v2/alerts`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GettableAlert {
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL", default)]
    pub generator_url: Option<String>,
    pub fingerprint: String,
    pub status: AlertStatus,
    #[serde(default)]
    pub receivers: Vec<Receiver>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStatus {
    pub state: String,
    #[serde(default)]
    pub silenced_by: Vec<String>,
    #[serde(default)]
    pub inhibited_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub name: String,
}

/// Silence as posted to `POST /api/v2/silences`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostableSilence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub matchers: Vec<ApiMatcher>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub created_by: String,
    pub comment: String,
}

/// Silence as returned by `GET /api/v2/silences`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GettableSilence {
    pub id: String,
    pub matchers: Vec<ApiMatcher>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub comment: String,
    pub status: SilenceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilenceStatus {
    pub state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostSilenceResponse {
    silence_id: String,
}

/// Filter for `GET /api/v2/alerts`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertFilter {
    pub active: bool,
    pub silenced: bool,
    pub inhibited: bool,
    pub unprocessed: bool,
    pub receiver: Option<String>,
    pub matchers: Vec<Matcher>,
}

impl AlertFilter {
    fn query(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("active".to_string(), self.active.to_string()),
            ("silenced".to_string(), self.silenced.to_string()),
            ("inhibited".to_string(), self.inhibited.to_string()),
            ("unprocessed".to_string(), self.unprocessed.to_string()),
        ];
        if let Some(receiver) = &self.receiver {
            params.push(("receiver".to_string(), receiver.clone()));
        }
        params.extend(matcher::filter_params(&self.matchers));
        params
    }
}

/// Alertmanager API client
#[derive(Debug, Clone)]
pub struct AlertmanagerClient {
    base: Url,
    http: Client,
}

impl AlertmanagerClient {
    /// Create a client for the Alertmanager at `base_url`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base = Url::parse(base_url).map_err(|e| AmtoolError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(AmtoolError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {:?}", base.scheme()),
            });
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut builder = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("amtool/", env!("CARGO_PKG_VERSION")));
        if is_loopback(&base) {
            // Never send local traffic through an environment proxy
            builder = builder.no_proxy();
        }
        let http = builder.build().map_err(ClientError::Build)?;

        tracing::debug!(base = %base, ?timeout, "created alertmanager client");
        Ok(Self { base, http })
    }

    /// Resolve an API path relative to the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| AmtoolError::InvalidUrl {
                url: format!("{}{}", self.base, path),
                reason: e.to_string(),
            })
    }

    pub fn get_alerts(&self, filter: &AlertFilter) -> Result<Vec<GettableAlert>> {
        let mut url = self.endpoint("api/v2/alerts")?;
        url.query_pairs_mut().extend_pairs(filter.query());
        let response = self.send("Get", &url, self.http.get(url.clone()))?;
        decode("Get", &url, response)
    }

    pub fn post_alerts(&self, alerts: &[PostableAlert]) -> Result<()> {
        let url = self.endpoint("api/v2/alerts")?;
        self.send("Post", &url, self.http.post(url.clone()).json(alerts))?;
        Ok(())
    }

    pub fn get_silences(&self, matchers: &[Matcher]) -> Result<Vec<GettableSilence>> {
        let mut url = self.endpoint("api/v2/silences")?;
        if !matchers.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(matcher::filter_params(matchers));
        }
        let response = self.send("Get", &url, self.http.get(url.clone()))?;
        decode("Get", &url, response)
    }

    /// Create or update a silence, returning its id
    pub fn post_silence(&self, silence: &PostableSilence) -> Result<String> {
        let url = self.endpoint("api/v2/silences")?;
        let response = self.send("Post", &url, self.http.post(url.clone()).json(silence))?;
        let body: PostSilenceResponse = decode("Post", &url, response)?;
        Ok(body.silence_id)
    }

    /// `api/v2/silence/<id>` with the id as a single escaped path segment
    pub fn silence_endpoint(&self, id: &str) -> Result<Url> {
        if matches!(id, "" | "." | "..") {
            return Err(AmtoolError::BadSilenceId(id.to_string()));
        }
        let mut url = self.endpoint("api/v2/silence")?;
        url.path_segments_mut()
            .map_err(|()| AmtoolError::InvalidUrl {
                url: self.base.to_string(),
                reason: "cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    pub fn delete_silence(&self, id: &str) -> Result<()> {
        let url = self.silence_endpoint(id)?;
        self.send("Delete", &url, self.http.delete(url.clone()))?;
        Ok(())
    }

    fn send(
        &self,
        method: &'static str,
        url: &Url,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<Response> {
        tracing::debug!(method, url = %url, "sending request");
        let response = request.send().map_err(|e| ClientError::Transport {
            method,
            url: url.to_string(),
            cause: describe_transport_error(&e, url),
        })?;

        let status = response.status();
        tracing::debug!(method, url = %url, %status, "received response");
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Status {
                method,
                url: url.to_string(),
                status,
                body: body.trim().to_string(),
            }
            .into());
        }
        Ok(response)
    }
}

fn decode<T: DeserializeOwned>(method: &'static str, url: &Url, response: Response) -> Result<T> {
    response.json().map_err(|e| {
        ClientError::Decode {
            method,
            url: url.to_string(),
            cause: e.to_string(),
        }
        .into()
    })
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Render a transport failure the way a socket dialer reports it, e.g.
/// `dial tcp 127.0.0.1:1: connect: connection refused`
pub fn describe_transport_error(err: &reqwest::Error, url: &Url) -> String {
    if err.is_timeout() {
        return "request timed out (Client.Timeout exceeded)".to_string();
    }

    let root = io_source(err);
    if !err.is_connect() {
        return root
            .map(|io| io.to_string())
            .unwrap_or_else(|| innermost_message(err));
    }

    let reason = match root {
        Some(io) => io_reason(io),
        None => innermost_message(err),
    };

    match url.socket_addrs(|| None) {
        Ok(addrs) => match preferred_addr(&addrs) {
            Some(addr) => format!("dial tcp {}: connect: {}", addr, reason),
            None => format!("dial tcp: {}", reason),
        },
        Err(e) => format!(
            "dial tcp: lookup {}: {}",
            url.host_str().unwrap_or_default(),
            e
        ),
    }
}

/// First IPv4 address, falling back to the first address of any family
pub fn preferred_addr(addrs: &[SocketAddr]) -> Option<SocketAddr> {
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

fn io_source(err: &reqwest::Error) -> Option<&std::io::Error> {
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return Some(io);
        }
        source = e.source();
    }
    None
}

fn innermost_message(err: &reqwest::Error) -> String {
    let mut current: &dyn std::error::Error = err;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}

fn io_reason(io: &std::io::Error) -> String {
    use std::io::ErrorKind;
    match io.kind() {
        ErrorKind::ConnectionRefused => "connection refused".to_string(),
        ErrorKind::ConnectionReset => "connection reset by peer".to_string(),
        ErrorKind::TimedOut => "i/o timeout".to_string(),
        ErrorKind::AddrNotAvailable => "cannot assign requested address".to_string(),
        _ => io.to_string(),
    }
}
