mod app;
mod config;
mod http;
mod job;
mod template;

pub use app::{AppError, AppResult};
pub use config::ConfigError;
pub use http::{DispatchError, TimeoutPhase};
pub use job::{JobError, TemplateField};
pub use template::TemplateError;
