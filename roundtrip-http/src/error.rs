//! HTTP server error types

use thiserror::Error;

/// Errors that can occur while running the monitoring endpoints
#[derive(Debug, Error)]
pub enum HttpError {
    /// Failed to bind to the specified address
    #[error("Failed to bind HTTP server to {address}: {source}")]
    BindError {
        address: String,
        source: std::io::Error,
    },

    /// The detail page template could not be loaded or rendered
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    /// HTTP server encountered a runtime error
    #[error("HTTP server error: {0}")]
    ServerError(String),
}
