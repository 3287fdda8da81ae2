use std::fmt;

use crate::entropy::Entropy;

/// Whether a dispatch obtained a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpOutcome {
    Success,
    Fail,
}

impl HttpOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HttpOutcome::Success => "success",
            HttpOutcome::Fail => "fail",
        }
    }
}

impl fmt::Display for HttpOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity under which one job instance reports traffic volume.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(String);

impl StreamId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn generate(entropy: &Entropy) -> Self {
        Self(entropy.uuid())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Label set of the per-request counter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpKey {
    pub host: String,
    pub method: String,
    pub outcome: HttpOutcome,
}
