//! Core error types for model extraction and rendering
//!
//! Only a provider that cannot produce a tree is a hard failure, and only for
//! the unit concerned. Unresolved identities, malformed template arguments and
//! duplicate definitions degrade silently and never show up here.

use std::path::PathBuf;

use thiserror::Error;

/// Core error types for the extraction pipeline
#[derive(Error, Debug)]
pub enum UmlError {
    #[error("Provider failure for {}: {message}", path.display())]
    ProviderFailure { path: PathBuf, message: String },

    #[error("Render error: {message}")]
    RenderError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("No translation unit could be extracted")]
    NoUnits,

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl UmlError {
    /// Create a new provider failure for one translation unit
    pub fn provider_failure(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ProviderFailure {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new render error
    pub fn render_error(message: impl Into<String>) -> Self {
        Self::RenderError {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// True when the error only concerns a single unit
    pub fn is_per_unit(&self) -> bool {
        matches!(self, Self::ProviderFailure { .. })
    }
}
