use thiserror::Error;

use crate::{config_manager::ConfigError, security::SecurityError};

#[derive(Error, Debug)]
pub enum MoodscapeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Security error: {0}")]
    Security(#[from] SecurityError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("AI provider error: {0}")]
    Provider(String),
}

pub type Result<T> = std::result::Result<T, MoodscapeError>;
