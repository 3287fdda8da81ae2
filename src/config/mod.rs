//! Job configuration schema and jobs file loading.
mod loader;
mod parse;
pub mod types;


pub use loader::{DEFAULT_JOBS_FILES, load_jobs};
pub use types::{
    ClientConfig, DecodedClientConfig, JobConfig, JobSpec, JobsFile, TlsConfig, TlsVersion,
};

#[cfg(any(test, feature = "fuzzing"))]
pub(crate) use loader::load_jobs_file;
pub(crate) use parse::parse_duration_value;
