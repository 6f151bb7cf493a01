//! Verification outcomes

use std::fmt;
use x509_cert::Certificate;

/// Why a signature was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationFailure {
    /// Content digest or signature value does not match
    InvalidSignature,
    /// Signer certificate is outside its validity period
    ExpiredCertificate,
    /// No signer, or no certificate matching the signer
    MissingCertificate,
    /// Signature structure could not be decoded or evaluated
    ParseError,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::InvalidSignature => "invalid signature",
            Self::ExpiredCertificate => "expired certificate",
            Self::MissingCertificate => "missing certificate",
            Self::ParseError => "parse error",
        };
        f.write_str(text)
    }
}

/// Result of verifying a detached signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureResult {
    Valid {
        signer_certificate: Box<Certificate>,
        signer_email: Option<String>,
    },
    Invalid {
        reason: VerificationFailure,
        signer_certificate: Option<Box<Certificate>>,
        signer_email: Option<String>,
    },
}

impl SignatureResult {
    pub(crate) const fn failed(reason: VerificationFailure) -> Self {
        Self::Invalid {
            reason,
            signer_certificate: None,
            signer_email: None,
        }
    }

    pub(crate) const fn parse_error() -> Self {
        Self::failed(VerificationFailure::ParseError)
    }

    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Failure reason, or `None` for a valid signature
    pub const fn failure(&self) -> Option<VerificationFailure> {
        match self {
            Self::Valid { .. } => None,
            Self::Invalid { reason, .. } => Some(*reason),
        }
    }

    pub fn signer_certificate(&self) -> Option<&Certificate> {
        match self {
            Self::Valid {
                signer_certificate, ..
            } => Some(signer_certificate),
            Self::Invalid {
                signer_certificate, ..
            } => signer_certificate.as_deref(),
        }
    }

    pub fn signer_email(&self) -> Option<&str> {
        match self {
            Self::Valid { signer_email, .. } | Self::Invalid { signer_email, .. } => {
                signer_email.as_deref()
            }
        }
    }
}
