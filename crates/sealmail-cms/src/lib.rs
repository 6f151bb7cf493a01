//! CMS detached signatures for S/MIME mail
//!
//! This crate creates and checks the `application/pkcs7-signature` payload
//! of a `multipart/signed` message. MIME handling lives in `sealmail-mime`.
//!
//! # Components
//!
//! - **Policy**: signature algorithm selection and `micalg` labels
//! - **Signing**: [`sign`] builds a detached `SignedData` for a [`SigningIdentity`]
//! - **Verification**: [`verify_detached`] reports a [`SignatureResult`], never an error
//! - **Identity**: [`email_for`] resolves the signer's address from a certificate
//! - **Key Storage**: [`SigningIdentityProvider`] with an in-memory implementation
//!
//! # Examples
//!
//! ## Algorithm Policy
//!
//! ```
//! use sealmail_cms::{SignatureAlgorithm, mic_label_for, oids, signature_algorithm_for};
//!
//! assert_eq!(signature_algorithm_for("EC"), SignatureAlgorithm::Sha256WithEcdsa);
//! assert_eq!(signature_algorithm_for("DSA"), SignatureAlgorithm::Sha256WithRsa);
//! assert_eq!(mic_label_for(&oids::SHA512), "sha-512");
//! ```
//!
//! ## Rejecting Malformed Signatures
//!
//! ```
//! use sealmail_cms::{VerificationFailure, verify_detached};
//!
//! let result = verify_detached(b"Hello", b"not a signature");
//! assert_eq!(result.failure(), Some(VerificationFailure::ParseError));
//! ```

mod ber;
pub mod detached;
pub mod error;
pub mod identity;
pub mod key;
pub mod policy;
pub mod result;
pub mod signer;
pub mod store;
pub mod verifier;

pub use error::{Result, SmimeError};

// Re-export commonly used types
pub use detached::{DetachedSignature, mic_label_from_signature};
pub use identity::{email_for, email_from_dn, render_name};
pub use key::{PrivateKey, PublicKey, SigningIdentity};
pub use policy::{
    DEFAULT_MIC_ALGORITHM, DigestAlgorithm, SignatureAlgorithm, mic_label_for, oids,
    public_key_algorithm_name, signature_algorithm_for,
};
pub use result::{SignatureResult, VerificationFailure};
pub use signer::{sign, sign_at};
pub use store::{InMemoryIdentityStore, SigningIdentityProvider};
pub use verifier::{verify_detached, verify_detached_at};

// Certificate type used throughout the public API
pub use x509_cert::Certificate;
