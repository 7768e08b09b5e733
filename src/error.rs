use thiserror::Error;

use crate::recommendation::ERROR_MARKER;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Error: API Key not found. Please set the {variable} environment variable.")]
    ConfigurationMissing { variable: &'static str },

    #[error("{marker} {0:#}", marker = ERROR_MARKER)]
    ExternalCallFailure(#[from] anyhow::Error),
}
