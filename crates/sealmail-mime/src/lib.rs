//! S/MIME message handling
//!
//! Wraps outgoing messages in `multipart/signed`, verifies received signed
//! messages, and detects S/MIME encryption anywhere in a MIME tree. The CMS
//! work itself is done by `sealmail-cms`.
//!
//! # Components
//!
//! - **MIME tree**: [`MimePart`] with canonical CRLF serialization
//! - **Packaging**: [`sign_message`] and [`attach_signature`]
//! - **Verification**: [`verify_signed_message`] checks a raw signed message
//! - **Detection**: [`SmimeEncryptionDetector`] and the [`EncryptionExtractor`] chain
//! - **Builder**: [`SmimeMessageBuilder`] applies [`SigningConfig`] to outgoing mail
//!
//! # Examples
//!
//! ## Detecting Encryption
//!
//! ```
//! use sealmail_mime::{CompositeEncryptionExtractor, EncryptionExtractor, MimePart,
//!     SmimeEncryptionExtractor};
//!
//! let encrypted = MimePart::multipart(
//!     "mixed",
//!     "outer",
//!     vec![MimePart::leaf("application/pkcs7-mime; smime-type=enveloped-data", vec![0x30])],
//! );
//!
//! let extractors = CompositeEncryptionExtractor::default().with(SmimeEncryptionExtractor::new());
//! let found = extractors.extract_encryption(&encrypted).map(|r| r.protocol);
//! assert_eq!(found.as_deref(), Some("smime"));
//! ```
//!
//! ## Rejecting Unsigned Messages
//!
//! ```
//! use sealmail_mime::{VerificationFailure, verify_signed_message};
//!
//! let result = verify_signed_message(b"Content-Type: text/plain\r\n\r\nHello\r\n");
//! assert_eq!(result.failure(), Some(VerificationFailure::ParseError));
//! ```

pub mod builder;
pub mod config;
pub mod content_type;
pub mod detect;
pub mod error;
pub mod extractor;
pub mod packager;
pub mod part;
pub mod verify;

pub use error::{MimeError, Result};

// Re-export commonly used types
pub use builder::SmimeMessageBuilder;
pub use config::SigningConfig;
pub use content_type::ContentType;
pub use detect::SmimeEncryptionDetector;
pub use extractor::{
    CompositeEncryptionExtractor, EncryptionExtractor, EncryptionResult, SmimeEncryptionExtractor,
};
pub use packager::{attach_signature, content_entity, sign_message};
pub use part::{Body, Header, MimePart, Multipart};
pub use verify::verify_signed_message;

// Verification outcomes come from the CMS layer
pub use sealmail_cms::{SignatureResult, VerificationFailure};
