//! Signing keys and identities
//!
//! A [`SigningIdentity`] pairs a private key with the certificate chain that
//! vouches for it. Neither type prints key material through `Debug`.

use crate::error::{Result, SmimeError};
use crate::policy::{oids, public_key_algorithm_name};
use der::Encode;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use std::fmt;
use x509_cert::Certificate;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

/// Private key usable for CMS signing
#[derive(Clone)]
pub enum PrivateKey {
    Rsa(RsaPrivateKey),
    EcdsaP256(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
}

impl PrivateKey {
    /// Load a PKCS#8 DER encoded private key
    ///
    /// RSA, P-256 and Ed25519 keys are recognised.
    pub fn from_pkcs8_der(der: &[u8]) -> Result<Self> {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_der(der) {
            return Ok(Self::Rsa(key));
        }
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_der(der) {
            return Ok(Self::EcdsaP256(key));
        }
        if let Ok(key) = ed25519_dalek::SigningKey::from_pkcs8_der(der) {
            return Ok(Self::Ed25519(key));
        }

        Err(SmimeError::InvalidKey(
            "not an RSA, P-256 or Ed25519 PKCS#8 key".to_string(),
        ))
    }

    /// Algorithm family, named the same way certificates are
    pub const fn algorithm(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::EcdsaP256(_) => "EC",
            Self::Ed25519(_) => "Ed25519",
        }
    }

    /// Public half of this key
    pub fn public_key(&self) -> PublicKey {
        match self {
            Self::Rsa(key) => PublicKey::Rsa(key.to_public_key()),
            Self::EcdsaP256(key) => PublicKey::EcdsaP256(p256::ecdsa::VerifyingKey::from(key)),
            Self::Ed25519(key) => PublicKey::Ed25519(key.verifying_key()),
        }
    }

    /// Check that this key belongs to `certificate`
    pub fn ensure_matches(&self, certificate: &Certificate) -> Result<()> {
        let spki = &certificate.tbs_certificate.subject_public_key_info;
        let mismatch = || SmimeError::KeyMismatch {
            key: self.algorithm(),
            certificate: public_key_algorithm_name(&spki.algorithm.oid),
        };

        match PublicKey::from_spki(spki) {
            Ok(public) if public == self.public_key() => Ok(()),
            Ok(_) | Err(SmimeError::InvalidKey(_)) => Err(mismatch()),
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Public key decoded from a certificate
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP256(p256::ecdsa::VerifyingKey),
    EcdsaP384(p384::ecdsa::VerifyingKey),
    Ed25519(ed25519_dalek::VerifyingKey),
}

impl PublicKey {
    /// Algorithm family, named the same way certificates are
    pub const fn algorithm(&self) -> &'static str {
        match self {
            Self::Rsa(_) => "RSA",
            Self::EcdsaP256(_) | Self::EcdsaP384(_) => "EC",
            Self::Ed25519(_) => "Ed25519",
        }
    }

    /// Decode a `SubjectPublicKeyInfo`
    ///
    /// EC keys on P-256 and P-384 are recognised.
    ///
    /// Returns [`SmimeError::UnsupportedAlgorithm`] for key types without a
    /// verifier and [`SmimeError::InvalidKey`] when the key bytes are bad.
    pub fn from_spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        let invalid = |e: &dyn fmt::Display| SmimeError::InvalidKey(e.to_string());

        match spki.algorithm.oid {
            oids::RSA_ENCRYPTION => RsaPublicKey::from_public_key_der(&der)
                .map(Self::Rsa)
                .map_err(|e| invalid(&e)),
            oids::EC_PUBLIC_KEY => p256::ecdsa::VerifyingKey::from_public_key_der(&der)
                .map(Self::EcdsaP256)
                .or_else(|_| {
                    p384::ecdsa::VerifyingKey::from_public_key_der(&der).map(Self::EcdsaP384)
                })
                .map_err(|e| invalid(&e)),
            oids::ED25519 => ed25519_dalek::VerifyingKey::from_public_key_der(&der)
                .map(Self::Ed25519)
                .map_err(|e| invalid(&e)),
            other => Err(SmimeError::UnsupportedAlgorithm(public_key_algorithm_name(
                &other,
            ))),
        }
    }
}

/// Private key plus certificate chain, signer certificate first
pub struct SigningIdentity {
    private_key: PrivateKey,
    signer: Certificate,
    intermediates: Vec<Certificate>,
}

impl SigningIdentity {
    /// Create an identity from a key and an ordered certificate chain
    pub fn new(private_key: PrivateKey, certificate_chain: Vec<Certificate>) -> Result<Self> {
        let mut chain = certificate_chain.into_iter();
        let signer = chain.next().ok_or(SmimeError::EmptyCertificateChain)?;

        Ok(Self {
            private_key,
            signer,
            intermediates: chain.collect(),
        })
    }

    pub const fn private_key(&self) -> &PrivateKey {
        &self.private_key
    }

    /// The certificate whose key produced the signature
    pub const fn signer_certificate(&self) -> &Certificate {
        &self.signer
    }

    /// Full chain in the order it was supplied
    pub fn certificate_chain(&self) -> impl Iterator<Item = &Certificate> {
        std::iter::once(&self.signer).chain(self.intermediates.iter())
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("algorithm", &self.private_key.algorithm())
            .field("chain_length", &(self.intermediates.len() + 1))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use rsa::pkcs8::EncodePrivateKey;

    #[test]
    fn test_pkcs8_ed25519() {
        let key = ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]);
        let der = key.to_pkcs8_der().expect("encode ed25519 key");

        let loaded = PrivateKey::from_pkcs8_der(der.as_bytes()).expect("load key");
        assert_eq!(loaded.algorithm(), "Ed25519");
        assert_eq!(loaded.public_key(), PublicKey::Ed25519(key.verifying_key()));
    }

    #[test]
    fn test_pkcs8_p256() {
        let key = p256::ecdsa::SigningKey::from_slice(&[0x11; 32]).expect("valid scalar");
        let der = key.to_pkcs8_der().expect("encode p256 key");

        let loaded = PrivateKey::from_pkcs8_der(der.as_bytes()).expect("load key");
        assert_eq!(loaded.algorithm(), "EC");
    }

    #[test]
    fn test_p384_public_key() {
        use der::Decode;
        use rsa::pkcs8::EncodePublicKey;

        let key = p384::ecdsa::SigningKey::from_slice(&[0x33; 48]).expect("valid scalar");
        let verifying_key = p384::ecdsa::VerifyingKey::from(&key);
        let der = verifying_key.to_public_key_der().expect("encode p384 key");
        let spki = SubjectPublicKeyInfoOwned::from_der(der.as_bytes()).expect("decode spki");

        assert_eq!(
            PublicKey::from_spki(&spki).unwrap(),
            PublicKey::EcdsaP384(verifying_key)
        );
    }

    #[test]
    fn test_pkcs8_garbage() {
        let result = PrivateKey::from_pkcs8_der(&[0x30, 0x03, 0x02, 0x01, 0x00]);
        assert!(matches!(result, Err(SmimeError::InvalidKey(_))));
    }

    #[test]
    fn test_debug_redacts_key() {
        let key = PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]));
        let rendered = format!("{key:?}");
        assert!(rendered.contains("Ed25519"));
        assert!(!rendered.contains("07, 07"));
        assert!(!rendered.contains("0707"));
    }

    #[test]
    fn test_empty_chain_rejected() {
        let key = PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[7u8; 32]));
        let result = SigningIdentity::new(key, Vec::new());
        assert!(matches!(result, Err(SmimeError::EmptyCertificateChain)));
    }
}
