//! Duo API client errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid API host: {0}")]
    InvalidHost(String),

    #[error("Request signing failed: {0}")]
    Signing(String),
}
