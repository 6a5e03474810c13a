pub mod app_config;
pub mod config;
pub mod selection;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use selection::{Flag, Flags, SelectionError, UploadCapture, UploadFile, UploadSelection};

/// Errors from loading [`AppConfig`] out of the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
