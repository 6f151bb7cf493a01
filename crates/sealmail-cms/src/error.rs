//! Error types for CMS signing operations
//!
//! Verification never produces these: its failure modes are reported as
//! [`crate::SignatureResult`] values.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmimeError {
    #[error("Certificate chain is empty")]
    EmptyCertificateChain,

    #[error("Could not retrieve private key for alias: {0}")]
    KeyNotFound(String),

    #[error("Could not retrieve certificate chain for alias: {0}")]
    CertificateChainNotFound(String),

    #[error("Private key ({key}) does not match signer certificate key ({certificate})")]
    KeyMismatch {
        /// Algorithm family of the supplied private key
        key: &'static str,
        /// Algorithm family named by the signer certificate
        certificate: String,
    },

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(#[from] signature::Error),

    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Key store error: {0}")]
    KeyStore(String),
}

pub type Result<T> = std::result::Result<T, SmimeError>;
