use std::fmt;

use thiserror::Error;

use super::TemplateError;

/// Identifies which request template failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateField {
    Method,
    Path,
    Body,
    HeaderKey(String),
    HeaderValue(String),
}

impl fmt::Display for TemplateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateField::Method => f.write_str("method"),
            TemplateField::Path => f.write_str("path"),
            TemplateField::Body => f.write_str("body"),
            TemplateField::HeaderKey(key) => write!(f, "header key {:?}", key),
            TemplateField::HeaderValue(value) => write!(f, "header value {:?}", value),
        }
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Error parsing {field} template: {source}")]
    Template {
        field: TemplateField,
        #[source]
        source: TemplateError,
    },
    #[error("Job '{name}' panicked.")]
    Panicked { name: String },
}
