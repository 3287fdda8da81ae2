use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ConfigError;

use super::parse_duration_value;

/// Top-level jobs file.
#[derive(Debug, Default, Deserialize)]
pub struct JobsFile {
    #[serde(default)]
    pub jobs: Vec<JobSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    pub name: Option<String>,
    #[serde(default = "default_instances")]
    pub instances: usize,
    pub args: JobConfig,
}

const fn default_instances() -> usize {
    1
}

impl JobSpec {
    #[must_use]
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("job-{}", index.saturating_add(1)))
    }
}

/// Arguments of one HTTP traffic job.
///
/// `method`, `path`, `body` and both sides of every `headers` entry are
/// templates re-rendered on every iteration. `client` is decoded leniently
/// by [`ClientConfig::decode`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    pub method: String,
    pub path: String,
    pub body: String,
    pub headers: BTreeMap<String, String>,
    pub client: Value,
    pub interval_ms: u64,
    /// Stop after this many iterations; unlimited when unset or zero.
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ConfigError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ConfigError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => parse_duration_value(text),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    V1_0,
    V1_1,
    V1_2,
    V1_3,
}

impl std::str::FromStr for TlsVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "1.0" | "tls1.0" | "tls1" | "v1.0" => Ok(TlsVersion::V1_0),
            "1.1" | "tls1.1" | "v1.1" => Ok(TlsVersion::V1_1),
            "1.2" | "tls1.2" | "v1.2" => Ok(TlsVersion::V1_2),
            "1.3" | "tls1.3" | "v1.3" => Ok(TlsVersion::V1_3),
            _ => Err(ConfigError::InvalidTlsVersion {
                value: s.to_owned(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for TlsVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .parse::<TlsVersion>()
            .map_err(serde::de::Error::custom)
    }
}

/// Explicit TLS trust policy. When present it replaces the
/// skip-verification default entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub insecure_skip_verify: bool,
    pub min_version: Option<TlsVersion>,
    pub max_version: Option<TlsVersion>,
}

/// Recognized keys of a job's `client` object. Every field is optional and
/// defaulted independently when the client is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    pub tls_config: Option<TlsConfig>,
    pub timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub max_idle_connections: Option<usize>,
    pub proxy_urls: String,
}

/// Result of a lenient decode: every recognized key that decoded cleanly,
/// plus one error per key that did not.
#[derive(Debug, Default)]
pub struct DecodedClientConfig {
    pub config: ClientConfig,
    pub errors: Vec<ConfigError>,
}

impl ClientConfig {
    /// Decodes the recognized keys of `raw`, ignoring unknown keys.
    ///
    /// A malformed key is reported in [`DecodedClientConfig::errors`] and
    /// left unset so its default applies; the remaining keys still decode.
    #[must_use]
    pub fn decode(raw: &Value) -> DecodedClientConfig {
        let mut decoded = DecodedClientConfig::default();
        let fields = match raw {
            Value::Null => return decoded,
            Value::Object(fields) => fields,
            Value::Bool(_) => return not_object(decoded, "a boolean"),
            Value::Number(_) => return not_object(decoded, "a number"),
            Value::String(_) => return not_object(decoded, "a string"),
            Value::Array(_) => return not_object(decoded, "an array"),
        };

        let errors = &mut decoded.errors;
        let config = &mut decoded.config;
        config.tls_config = field::<TlsConfig>(fields, "tls_config", errors);
        config.timeout = duration_field(fields, "timeout", errors);
        config.read_timeout = duration_field(fields, "read_timeout", errors);
        config.write_timeout = duration_field(fields, "write_timeout", errors);
        config.idle_timeout = duration_field(fields, "idle_timeout", errors);
        config.max_idle_connections = field::<usize>(fields, "max_idle_connections", errors);
        config.proxy_urls = field::<String>(fields, "proxy_urls", errors).unwrap_or_default();
        decoded
    }
}

fn not_object(mut decoded: DecodedClientConfig, kind: &'static str) -> DecodedClientConfig {
    decoded.errors.push(ConfigError::ClientNotObject { kind });
    decoded
}

fn field<T: DeserializeOwned>(
    fields: &Map<String, Value>,
    name: &'static str,
    errors: &mut Vec<ConfigError>,
) -> Option<T> {
    let value = fields.get(name)?;
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            errors.push(ConfigError::ClientField {
                field: name,
                reason: err.to_string(),
            });
            None
        }
    }
}

fn duration_field(
    fields: &Map<String, Value>,
    name: &'static str,
    errors: &mut Vec<ConfigError>,
) -> Option<Duration> {
    let value = field::<DurationValue>(fields, name, errors)?;
    match value.to_duration() {
        Ok(duration) => Some(duration),
        Err(err) => {
            errors.push(ConfigError::ClientField {
                field: name,
                reason: err.to_string(),
            });
            None
        }
    }
}
