//! @acp:module "Support-Status Source"
//! @acp:summary "Fetch the versions currently under standard support"
//! @acp:domain cli
//! @acp:layer service
//!
//! Every call performs a fresh query; nothing is cached between runs.
//! Responses are parsed fail-closed: one unrecognizable release rejects the
//! whole answer instead of being skipped.

use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::error::{GateError, Result};
use crate::version::{SupportedVersionSet, VersionToken};

/// @acp:summary "Authoritative provider of the standard-support version set"
pub trait SupportSource {
    /// Query the source. Idempotent and safe to retry.
    fn fetch_supported_versions(&self) -> Result<SupportedVersionSet>;

    /// Human-readable origin, used in logs and errors
    fn describe(&self) -> String;
}

impl<T: SupportSource + ?Sized> SupportSource for Box<T> {
    fn fetch_supported_versions(&self) -> Result<SupportedVersionSet> {
        (**self).fetch_supported_versions()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// @acp:summary "endoflife.date product API over HTTP"
#[derive(Debug, Clone)]
pub struct EndOfLifeSource {
    url: String,
    timeout: Duration,
    user_agent: String,
}

impl EndOfLifeSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            user_agent: format!("version-gate/{}", crate::VERSION),
        }
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        Self {
            url: config.url.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }

    fn unavailable(&self, cause: impl Into<String>) -> GateError {
        GateError::SourceUnavailable {
            url: self.url.clone(),
            cause: cause.into(),
        }
    }
}

impl SupportSource for EndOfLifeSource {
    fn fetch_supported_versions(&self) -> Result<SupportedVersionSet> {
        info!(url = %self.url, "Fetching supported versions");

        let agent = ureq::AgentBuilder::new()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build();

        let response = match agent
            .get(&self.url)
            .set("Accept", "application/json")
            .call()
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(self.unavailable(format!("HTTP status {}", code)));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(self.unavailable(transport.to_string()));
            }
        };

        let body = response
            .into_string()
            .map_err(|e| self.unavailable(format!("failed to read body: {}", e)))?;
        debug!(bytes = body.len(), "Received support-status response");

        let versions = parse_releases(&body, &self.url)?;
        info!(versions = %versions.joined(), "Found supported versions");
        Ok(versions)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// @acp:summary "Release data read from a local JSON file"
///
/// Accepts the same payload as [`EndOfLifeSource`].
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SupportSource for FileSource {
    fn fetch_supported_versions(&self) -> Result<SupportedVersionSet> {
        info!(path = %self.path.display(), "Reading supported versions from file");
        let body = std::fs::read_to_string(&self.path).map_err(|e| GateError::SourceUnavailable {
            url: self.describe(),
            cause: e.to_string(),
        })?;
        parse_releases(&body, &self.describe())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

/// @acp:summary "Fixed version list, for manual dispatch and tests"
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    versions: Vec<String>,
}

impl StaticSource {
    pub fn new<I, S>(versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            versions: versions.into_iter().map(Into::into).collect(),
        }
    }
}

impl SupportSource for StaticSource {
    fn fetch_supported_versions(&self) -> Result<SupportedVersionSet> {
        let tokens = self
            .versions
            .iter()
            .map(|raw| VersionToken::parse(raw).map_err(GateError::SourceFormat))
            .collect::<Result<Vec<_>>>()?;
        SupportedVersionSet::new(tokens).ok_or_else(|| GateError::EmptyResult {
            origin: self.describe(),
        })
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}

/// @acp:summary "Parse an endoflife.date release payload into the supported set"
///
/// Accepts `{"result": {"releases": [...]}}` (API v1) or a bare array of
/// releases. A release is in standard support when `isEol` is `false`.
pub fn parse_releases(body: &str, origin: &str) -> Result<SupportedVersionSet> {
    let data: Value = serde_json::from_str(body)
        .map_err(|e| GateError::SourceFormat(format!("invalid JSON: {}", e)))?;

    let releases = match &data {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("result")
            .and_then(|result| result.get("releases"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                GateError::SourceFormat(format!(
                    "unexpected response structure, top-level keys: [{}]",
                    keys.join(", ")
                ))
            })?,
        other => {
            return Err(GateError::SourceFormat(format!(
                "unexpected response structure: {}",
                json_type(other)
            )))
        }
    };

    let mut supported = Vec::new();
    for (index, release) in releases.iter().enumerate() {
        let name = release
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| GateError::SourceFormat(format!("release #{} has no string 'name'", index)))?;
        let is_eol = release.get("isEol").and_then(Value::as_bool).ok_or_else(|| {
            GateError::SourceFormat(format!("release '{}' has no boolean 'isEol'", name))
        })?;
        let token = VersionToken::parse(name)
            .map_err(|e| GateError::SourceFormat(format!("release #{}: {}", index, e)))?;

        if !is_eol {
            supported.push(token);
        }
    }

    SupportedVersionSet::new(supported).ok_or_else(|| GateError::EmptyResult {
        origin: origin.to_string(),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
