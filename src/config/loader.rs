use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult, ConfigError};

use super::types::JobsFile;

/// Jobs files checked, in order, when no path is given.
pub const DEFAULT_JOBS_FILES: [&str; 2] = ["trafficgen.toml", "trafficgen.json"];

/// Loads the jobs file from `path` or the first existing default location.
///
/// # Errors
///
/// Returns an error when no file is found, the file cannot be read or
/// parsed, or it defines no jobs.
pub fn load_jobs(path: Option<&Path>) -> AppResult<JobsFile> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => DEFAULT_JOBS_FILES
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists())
            .ok_or_else(|| {
                AppError::config(ConfigError::NoJobsFile {
                    candidates: DEFAULT_JOBS_FILES.join(", "),
                })
            })?,
    };

    let jobs = load_jobs_file(&path)?;
    if jobs.jobs.is_empty() {
        return Err(AppError::config(ConfigError::NoJobs));
    }
    Ok(jobs)
}

pub(crate) fn load_jobs_file(path: &Path) -> AppResult<JobsFile> {
    let content = std::fs::read_to_string(path).map_err(|err| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source: err,
        })
    })?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some("json") => serde_json::from_str(&content).map_err(|err| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source: err,
            })
        }),
        Some(ext) => Err(AppError::config(ConfigError::UnsupportedExtension {
            ext: ext.to_owned(),
        })),
        None => Err(AppError::config(ConfigError::MissingExtension)),
    }
}
