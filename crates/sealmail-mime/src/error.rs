//! Error types for S/MIME message handling

use sealmail_cms::SmimeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MimeError {
    /// Signing or key store failure from the CMS layer
    #[error(transparent)]
    Smime(#[from] SmimeError),

    #[error("MIME parse error: {0}")]
    Parse(String),

    #[error("Invalid MIME structure: {0}")]
    Structure(String),

    #[error("Could not generate a unique boundary after {0} attempts")]
    BoundaryExhausted(usize),
}

pub type Result<T> = std::result::Result<T, MimeError>;
