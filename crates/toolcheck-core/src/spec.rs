//! Declarative test specification documents.
//!
//! One document per tool-server describes its config, connectivity and
//! health checks. Documents are parsed and validated eagerly so evaluators
//! only ever see well-formed, typed checks: unknown check types, bad regexes,
//! bad HTTP methods and malformed endpoints are load errors.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading a test specification document.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed test specification {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid test specification {origin}: {message}")]
    Invalid { origin: String, message: String },
}

/// A regular expression compiled when the document is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern(Regex);

impl Pattern {
    pub fn is_match(&self, haystack: &str) -> bool {
        self.0.is_match(haystack)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Pattern {
    type Error = regex::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Regex::new(&value).map(Pattern)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.0.as_str().to_string()
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// A category section: an enable flag plus its checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section<T> {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "Vec::new")]
    pub checks: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigCheckKind {
    EnvVar,
    File,
    Permission,
}

impl ConfigCheckKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigCheckKind::EnvVar => "env_var",
            ConfigCheckKind::File => "file",
            ConfigCheckKind::Permission => "permission",
        }
    }
}

/// Local precondition: an environment variable, a file, or a readable file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigCheck {
    #[serde(rename = "type")]
    pub kind: ConfigCheckKind,
    /// Variable name, or file path for `file`/`permission`.
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
    /// Must match the variable value, or the file content for `file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<Pattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
}

/// HTTP method for reachability checks. Any token-valid method is
/// accepted; names are case-insensitive and default to `HEAD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMethod(reqwest::Method);

impl HttpMethod {
    pub const HEAD: HttpMethod = HttpMethod(reqwest::Method::HEAD);
    pub const GET: HttpMethod = HttpMethod(reqwest::Method::GET);

    pub fn parse(name: &str) -> Result<Self, String> {
        reqwest::Method::from_bytes(name.trim().to_ascii_uppercase().as_bytes())
            .map(HttpMethod)
            .map_err(|_| format!("invalid HTTP method {name:?}"))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn to_reqwest(&self) -> reqwest::Method {
        self.0.clone()
    }
}

impl Default for HttpMethod {
    fn default() -> Self {
        Self::HEAD
    }
}

impl Serialize for HttpMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HttpMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        if name.trim().is_empty() {
            return Err(serde::de::Error::custom("HTTP method must not be empty"));
        }
        HttpMethod::parse(&name).map_err(serde::de::Error::custom)
    }
}

/// Reachability primitive a connectivity check exercises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectivityProbe {
    Http {
        endpoint: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        expected_status: Vec<u16>,
    },
    Tcp {
        /// `host:port`
        endpoint: String,
    },
    Docker {
        /// Container name or id.
        #[serde(alias = "container")]
        endpoint: String,
    },
}

impl ConnectivityProbe {
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectivityProbe::Http { .. } => "http",
            ConnectivityProbe::Tcp { .. } => "tcp",
            ConnectivityProbe::Docker { .. } => "docker",
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            ConnectivityProbe::Http { endpoint, .. }
            | ConnectivityProbe::Tcp { endpoint }
            | ConnectivityProbe::Docker { endpoint } => endpoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityCheck {
    #[serde(flatten)]
    pub probe: ConnectivityProbe,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
    /// Overrides the policy's per-check timeout.
    #[serde(
        default,
        rename = "timeout_ms",
        with = "crate::serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
}

/// Predicate over a health invocation's response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseValidator {
    #[default]
    NonEmpty,
    Contains {
        text: String,
    },
    Matches {
        pattern: Pattern,
    },
    FieldPresent {
        /// JSON pointer, e.g. `/content/0/text`.
        pointer: String,
    },
    FieldEquals {
        pointer: String,
        value: Value,
    },
}

impl ResponseValidator {
    /// Returns the rejection reason when the response does not satisfy the predicate.
    pub fn validate(&self, response: &Value) -> Result<(), String> {
        match self {
            ResponseValidator::NonEmpty => {
                if is_empty_value(response) {
                    Err("response was empty".to_string())
                } else {
                    Ok(())
                }
            }
            ResponseValidator::Contains { text } => {
                if response_text(response).contains(text.as_str()) {
                    Ok(())
                } else {
                    Err(format!("response does not contain {text:?}"))
                }
            }
            ResponseValidator::Matches { pattern } => {
                if pattern.is_match(&response_text(response)) {
                    Ok(())
                } else {
                    Err(format!("response does not match /{}/", pattern.as_str()))
                }
            }
            ResponseValidator::FieldPresent { pointer } => match response.pointer(pointer) {
                Some(value) if !value.is_null() => Ok(()),
                _ => Err(format!("response has no field at {pointer}")),
            },
            ResponseValidator::FieldEquals { pointer, value } => match response.pointer(pointer) {
                Some(actual) if actual == value => Ok(()),
                Some(actual) => Err(format!("field {pointer} is {actual}, expected {value}")),
                None => Err(format!("response has no field at {pointer}")),
            },
        }
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Flattens every string leaf of a response, falling back to its JSON text.
fn response_text(value: &Value) -> String {
    fn collect<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
        match value {
            Value::String(text) => out.push(text),
            Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
            Value::Object(fields) => fields.values().for_each(|field| collect(field, out)),
            _ => {}
        }
    }

    let mut parts = Vec::new();
    collect(value, &mut parts);
    if parts.is_empty() {
        value.to_string()
    } else {
        parts.join("\n")
    }
}

/// Functional check: invoke a capability and validate what comes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub tool: String,
    #[serde(default = "empty_object")]
    pub payload: Value,
    #[serde(default)]
    pub validator: ResponseValidator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_warning: Option<String>,
    /// Overrides the document-level endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(
        default,
        rename = "timeout_ms",
        with = "crate::serde_duration::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_suggestion: Option<String>,
}

/// All checks declared for one tool-server.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Base endpoint used by health checks that do not name their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Section<ConfigCheck>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectivity: Option<Section<ConnectivityCheck>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<Section<HealthCheck>>,
}

impl ServerSpec {
    /// Parses and validates one document. `origin` names it in errors.
    pub fn from_json(content: &str, origin: &str) -> Result<Self, SpecError> {
        let spec: ServerSpec =
            serde_json::from_str(content).map_err(|source| SpecError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        spec.validate().map_err(|message| SpecError::Invalid {
            origin: origin.to_string(),
            message,
        })?;
        Ok(spec)
    }

    /// Same as [`ServerSpec::from_json`] for an entry already parsed as JSON.
    pub fn from_value(value: Value, origin: &str) -> Result<Self, SpecError> {
        let spec: ServerSpec =
            serde_json::from_value(value).map_err(|source| SpecError::Parse {
                origin: origin.to_string(),
                source,
            })?;
        spec.validate().map_err(|message| SpecError::Invalid {
            origin: origin.to_string(),
            message,
        })?;
        Ok(spec)
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(section) = &self.config {
            for check in &section.checks {
                if check.name.trim().is_empty() {
                    return Err(format!("{} check has an empty name", check.kind.as_str()));
                }
            }
        }

        if let Some(section) = &self.connectivity {
            for check in &section.checks {
                validate_probe(&check.probe)?;
            }
        }

        if let Some(section) = &self.health {
            for check in &section.checks {
                if check.tool.trim().is_empty() {
                    return Err("health check has an empty tool name".to_string());
                }
                // Without an endpoint the check is skipped when it runs.
                if let Some(endpoint) = check.endpoint.as_ref().or(self.endpoint.as_ref()) {
                    validate_url(endpoint)?;
                }
            }
        }

        Ok(())
    }

    pub fn check_counts(&self) -> CheckCounts {
        fn count<T>(section: Option<&Section<T>>) -> usize {
            section
                .filter(|section| section.enabled)
                .map_or(0, |section| section.checks.len())
        }

        CheckCounts {
            config: count(self.config.as_ref()),
            connectivity: count(self.connectivity.as_ref()),
            health: count(self.health.as_ref()),
        }
    }

    /// Distinct cost warnings declared by enabled health checks.
    pub fn cost_warnings(&self) -> Vec<&str> {
        let mut warnings: Vec<&str> = Vec::new();
        let declared = self
            .health
            .iter()
            .filter(|section| section.enabled)
            .flat_map(|section| section.checks.iter())
            .filter_map(|check| check.cost_warning.as_deref());
        for warning in declared {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }
        warnings
    }
}

/// Enabled check counts per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CheckCounts {
    pub config: usize,
    pub connectivity: usize,
    pub health: usize,
}

/// A single document describing many servers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpecCatalog {
    #[serde(default)]
    pub servers: BTreeMap<String, Value>,
}

fn validate_probe(probe: &ConnectivityProbe) -> Result<(), String> {
    match probe {
        ConnectivityProbe::Http { endpoint, .. } => validate_url(endpoint),
        ConnectivityProbe::Tcp { endpoint } => match endpoint.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => Ok(()),
            _ => Err(format!("tcp endpoint '{endpoint}' is not host:port")),
        },
        ConnectivityProbe::Docker { endpoint } => {
            if endpoint.trim().is_empty() {
                Err("docker check has an empty container name".to_string())
            } else {
                Ok(())
            }
        }
    }
}

fn validate_url(endpoint: &str) -> Result<(), String> {
    let url = reqwest::Url::parse(endpoint)
        .map_err(|err| format!("endpoint '{endpoint}' is not a valid URL: {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("endpoint '{endpoint}' uses unsupported scheme {other}")),
    }
}

fn default_true() -> bool {
    true
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
