use std::collections::BTreeMap;

use url::Url;

use crate::config::JobConfig;
use crate::error::{DispatchError, JobError, TemplateField};
use crate::template::Template;

use super::wire::encode_request;

/// Request templates of one job, compiled once before the first dispatch.
#[derive(Debug, Clone)]
pub struct CompiledTemplateSet {
    method: Template,
    path: Template,
    body: Template,
    headers: Vec<(Template, Template)>,
}

impl CompiledTemplateSet {
    /// Compiles every template, failing on the first one that does not
    /// parse.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Template`] naming the offending field.
    pub fn compile(
        method: &str,
        path: &str,
        body: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Self, JobError> {
        let method = compile_field(method, TemplateField::Method)?;
        let path = compile_field(path, TemplateField::Path)?;
        let body = compile_field(body, TemplateField::Body)?;
        let mut compiled_headers = Vec::with_capacity(headers.len());
        for (key, value) in headers {
            let key_template = compile_field(key, TemplateField::HeaderKey(key.clone()))?;
            let value_template = compile_field(value, TemplateField::HeaderValue(value.clone()))?;
            compiled_headers.push((key_template, value_template));
        }
        Ok(Self {
            method,
            path,
            body,
            headers: compiled_headers,
        })
    }

    /// # Errors
    ///
    /// Same as [`CompiledTemplateSet::compile`].
    pub fn from_job(config: &JobConfig) -> Result<Self, JobError> {
        Self::compile(&config.method, &config.path, &config.body, &config.headers)
    }

    #[must_use]
    pub fn path_source(&self) -> &str {
        self.path.source()
    }

    /// Renders a fresh request. Nothing is carried over between calls.
    #[must_use]
    pub fn render(&self, user_agent: &str) -> RenderedRequest {
        RenderedRequest {
            method: self.method.render(None),
            uri: self.path.render(None),
            body: self.body.render(None),
            user_agent: user_agent.to_owned(),
            headers: self
                .headers
                .iter()
                .map(|(key, value)| (key.render(None), value.render(None)))
                .collect(),
        }
    }
}

fn compile_field(source: &str, field: TemplateField) -> Result<Template, JobError> {
    Template::parse(source).map_err(|err| JobError::Template { field, source: err })
}

/// One iteration's rendered request. Header names and values are sent as
/// rendered; a configured header overrides an injected one of the same
/// name, `User-Agent` included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRequest {
    pub method: String,
    pub uri: String,
    pub body: String,
    pub user_agent: String,
    pub headers: Vec<(String, String)>,
}

impl RenderedRequest {
    /// Bytes attributed to this request for traffic accounting: method,
    /// URI, body and every rendered header key and value. The injected
    /// User-Agent is not counted.
    #[must_use]
    pub fn payload_size(&self) -> u64 {
        let headers = self
            .headers
            .iter()
            .fold(0_usize, |acc, (key, value)| {
                acc.saturating_add(key.len()).saturating_add(value.len())
            });
        let total = self
            .method
            .len()
            .saturating_add(self.uri.len())
            .saturating_add(self.body.len())
            .saturating_add(headers);
        u64::try_from(total).unwrap_or(u64::MAX)
    }

    /// Method label for metrics. An empty method is sent as GET.
    #[must_use]
    pub fn method_label(&self) -> &str {
        if self.method.is_empty() {
            "GET"
        } else {
            &self.method
        }
    }

    /// Host (with explicit port) of the rendered URI, empty when it does
    /// not parse.
    #[must_use]
    pub fn host(&self) -> String {
        let Ok(url) = Url::parse(&self.uri) else {
            return String::new();
        };
        match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_owned(),
            (None, _) => String::new(),
        }
    }

    /// The HTTP/1.1 message this request is sent as: request line,
    /// headers and body, byte for byte.
    ///
    /// # Errors
    ///
    /// Returns an error when the method, URI or a header cannot form a
    /// valid HTTP request.
    pub fn to_wire_bytes(&self) -> Result<Vec<u8>, DispatchError> {
        encode_request(self).map(|wire| wire.bytes)
    }
}
