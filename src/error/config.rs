use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Failed to parse JSON config '{path}': {source}")]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Unsupported config extension '{ext}'. Use .toml or .json.")]
    UnsupportedExtension { ext: String },
    #[error("Config file must have .toml or .json extension.")]
    MissingExtension,
    #[error("No jobs file given and none of {candidates} exist.")]
    NoJobsFile { candidates: String },
    #[error("Jobs file defines no jobs.")]
    NoJobs,
    #[error("Client config must be an object, got {kind}.")]
    ClientNotObject { kind: &'static str },
    #[error("Ignoring client config '{field}': {reason}")]
    ClientField { field: &'static str, reason: String },
    #[error("Invalid TLS version '{value}'. Use 1.0, 1.1, 1.2 or 1.3.")]
    InvalidTlsVersion { value: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Invalid boolean '{value}'.")]
    InvalidBoolean { value: String },
}
