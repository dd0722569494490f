pub mod app_config;
pub mod config;
pub mod layout;
pub mod products;

use thiserror::Error;

pub use app_config::AppConfig;
pub use config::{load_app_config, load_app_config_from_env};
pub use layout::WorkspaceLayout;
pub use products::{Category, Product};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProductError {
    #[error("product code must not be empty")]
    EmptyCode,

    #[error("product {code} has a negative {field}")]
    NegativeAmount { code: String, field: &'static str },

    /// The code names files in the workspace, so it must be a single path
    /// component.
    #[error("product code {code:?} is not usable as a file name")]
    UnsafeCode { code: String },
}
