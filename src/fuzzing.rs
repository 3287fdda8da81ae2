//! Entry points exercised by the `fuzz/` targets.
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::args::parsers::parse_duration_arg;
use crate::config::types::JobsFile;
use crate::config::{ClientConfig, DecodedClientConfig, TlsVersion, parse_duration_value};
use crate::error::{AppError, AppResult, ConfigError, JobError};
use crate::http::{CompiledTemplateSet, RenderedRequest};
use crate::template::{Context, Template};

/// Parses a duration argument (e.g. `10s`, `500ms`).
///
/// # Errors
///
/// Returns an error when the duration is invalid.
pub fn parse_duration_arg_input(input: &str) -> AppResult<Duration> {
    parse_duration_arg(input)
}

/// Parses a duration value from a client config.
///
/// # Errors
///
/// Returns an error when the duration is invalid.
pub fn parse_duration_value_input(input: &str) -> Result<Duration, ConfigError> {
    parse_duration_value(input)
}

/// Parses a TLS version (e.g. `1.2`, `1.3`).
///
/// # Errors
///
/// Returns an error when the version is invalid.
pub fn parse_tls_version_input(input: &str) -> Result<TlsVersion, ConfigError> {
    input.parse::<TlsVersion>()
}

/// Parses a template and, when it parses, renders it once.
///
/// # Errors
///
/// Returns the parse error.
pub fn render_template_input(input: &str, vars: &Context) -> AppResult<String> {
    let template = Template::parse(input)?;
    Ok(template.render(Some(vars)))
}

/// Decodes a raw JSON `client` object the way jobs do.
///
/// # Errors
///
/// Returns an error when the input is not JSON at all.
pub fn decode_client_config_input(input: &[u8]) -> AppResult<DecodedClientConfig> {
    let raw: serde_json::Value = serde_json::from_slice(input)?;
    Ok(ClientConfig::decode(&raw))
}

/// Parses a TOML jobs document.
///
/// # Errors
///
/// Returns an error when the document does not match the schema.
pub fn parse_jobs_toml_input(input: &str) -> AppResult<JobsFile> {
    toml::from_str(input).map_err(AppError::from)
}

/// Parses a JSON jobs document.
///
/// # Errors
///
/// Returns an error when the document does not match the schema.
pub fn parse_jobs_json_input(input: &[u8]) -> AppResult<JobsFile> {
    serde_json::from_slice(input).map_err(AppError::from)
}

/// Compiles a request template set and renders one request from it.
///
/// # Errors
///
/// Returns an error naming the template that failed to compile.
pub fn render_request_input(
    method: &str,
    path: &str,
    body: &str,
    headers: &BTreeMap<String, String>,
) -> Result<RenderedRequest, JobError> {
    let templates = CompiledTemplateSet::compile(method, path, body, headers)?;
    Ok(templates.render("trafficgen-fuzz"))
}

/// Loads a jobs file from disk.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn load_jobs_file_input(path: &Path) -> AppResult<JobsFile> {
    crate::config::load_jobs_file(path)
}
