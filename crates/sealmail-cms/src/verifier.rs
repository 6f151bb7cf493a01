//! Detached CMS signature verification
//!
//! Verification is a pipeline that stops at the first failing stage:
//!
//! 1. decode `ContentInfo` and `SignedData`, normalizing BER input
//! 2. take the first signer-info
//! 3. find the signer certificate among the embedded certificates
//! 4. check the certificate validity period
//! 5. check the message digest and the signature value, using the scheme
//!    named by the signer's signature algorithm
//!
//! Every outcome, including malformed input, is reported as a
//! [`SignatureResult`]. Only the signer certificate is evaluated; chain
//! building and revocation are out of scope.

use crate::detached::decode_signed_data;
use crate::identity::email_for;
use crate::key::PublicKey;
use crate::policy::{DigestAlgorithm, oids};
use crate::result::{SignatureResult, VerificationFailure};
use crate::{Result, SmimeError};
use cms::cert::CertificateChoices;
use cms::signed_data::{SignedAttributes, SignedData, SignerIdentifier, SignerInfo};
use der::asn1::OctetString;
use der::{Any, Decode, Encode};
use rsa::pkcs1::RsaPssParams;
use rsa::{RsaPublicKey, pkcs1v15, pss};
use sha2::{Sha256, Sha384, Sha512};
use signature::Verifier;
use signature::hazmat::PrehashVerifier;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, trace, warn};
use x509_cert::Certificate;
use x509_cert::ext::pkix::SubjectKeyIdentifier;

/// Verify a detached signature over `content` at the current time
pub fn verify_detached(content: &[u8], signature: &[u8]) -> SignatureResult {
    verify_detached_at(content, signature, SystemTime::now())
}

/// Verify a detached signature over `content`, evaluating certificate
/// validity at `now`
pub fn verify_detached_at(content: &[u8], signature: &[u8], now: SystemTime) -> SignatureResult {
    match evaluate(content, signature, now) {
        Ok(result) | Err(result) => result,
    }
}

fn evaluate(
    content: &[u8],
    signature: &[u8],
    now: SystemTime,
) -> std::result::Result<SignatureResult, SignatureResult> {
    let signed_data = decode_signed_data(signature).map_err(|e| {
        warn!("Failed to decode signature: {}", e);
        SignatureResult::parse_error()
    })?;

    check_encapsulated_content(&signed_data, content).map_err(|e| {
        warn!("Rejecting signature: {}", e);
        SignatureResult::parse_error()
    })?;

    let Some(signer) = signed_data.signer_infos.0.iter().next() else {
        debug!("SignedData has no signer-info");
        return Err(SignatureResult::failed(
            VerificationFailure::MissingCertificate,
        ));
    };

    let certificates = embedded_certificates(&signed_data);
    debug!("Found {} embedded certificates", certificates.len());

    let Some(certificate) = find_signer_certificate(&signer.sid, &certificates) else {
        debug!("No embedded certificate matches the signer identifier");
        return Err(SignatureResult::failed(
            VerificationFailure::MissingCertificate,
        ));
    };

    let signer_email = email_for(certificate);
    let invalid = |reason| SignatureResult::Invalid {
        reason,
        signer_certificate: Some(Box::new(certificate.clone())),
        signer_email: signer_email.clone(),
    };

    if !is_within_validity(certificate, now) {
        debug!("Signer certificate is not valid at verification time");
        return Err(invalid(VerificationFailure::ExpiredCertificate));
    }

    match verify_signer(signer, certificate, content) {
        Ok(true) => Ok(SignatureResult::Valid {
            signer_certificate: Box::new(certificate.clone()),
            signer_email,
        }),
        Ok(false) => Err(invalid(VerificationFailure::InvalidSignature)),
        Err(e) => {
            warn!("Signature could not be evaluated: {}", e);
            Err(invalid(VerificationFailure::ParseError))
        }
    }
}

/// Attached content is tolerated only when it equals the supplied content
fn check_encapsulated_content(signed_data: &SignedData, content: &[u8]) -> Result<()> {
    let Some(econtent) = &signed_data.encap_content_info.econtent else {
        return Ok(());
    };

    let embedded = OctetString::from_der(&econtent.to_der()?)
        .map_err(|e| SmimeError::Parse(format!("Invalid encapsulated content: {e}")))?;

    if embedded.as_bytes() == content {
        trace!("Encapsulated content matches detached content");
        Ok(())
    } else {
        Err(SmimeError::Parse(
            "Encapsulated content differs from detached content".to_string(),
        ))
    }
}

fn embedded_certificates(signed_data: &SignedData) -> Vec<&Certificate> {
    signed_data
        .certificates
        .as_ref()
        .map(|set| {
            set.0
                .iter()
                .filter_map(|choice| match choice {
                    CertificateChoices::Certificate(cert) => Some(cert),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn find_signer_certificate<'a>(
    sid: &SignerIdentifier,
    certificates: &[&'a Certificate],
) -> Option<&'a Certificate> {
    certificates.iter().copied().find(|cert| match sid {
        SignerIdentifier::IssuerAndSerialNumber(id) => {
            cert.tbs_certificate.issuer == id.issuer
                && cert.tbs_certificate.serial_number == id.serial_number
        }
        SignerIdentifier::SubjectKeyIdentifier(ski) => {
            subject_key_identifier(cert).is_some_and(|id| id == ski.0.as_bytes())
        }
    })
}

fn subject_key_identifier(certificate: &Certificate) -> Option<Vec<u8>> {
    certificate
        .tbs_certificate
        .extensions
        .as_ref()?
        .iter()
        .find(|ext| ext.extn_id == oids::SUBJECT_KEY_IDENTIFIER)
        .and_then(|ext| SubjectKeyIdentifier::from_der(ext.extn_value.as_bytes()).ok())
        .map(|ski| ski.0.as_bytes().to_vec())
}

/// Validity bounds are inclusive at one-second resolution
fn is_within_validity(certificate: &Certificate, now: SystemTime) -> bool {
    let validity = &certificate.tbs_certificate.validity;
    let now = Duration::from_secs(
        now.duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs()),
    );

    validity.not_before.to_unix_duration() <= now && now <= validity.not_after.to_unix_duration()
}

/// Returns `Ok(false)` for a digest or signature mismatch and `Err` when the
/// signer-info cannot be evaluated at all
fn verify_signer(signer: &SignerInfo, certificate: &Certificate, content: &[u8]) -> Result<bool> {
    let digest = DigestAlgorithm::from_oid(&signer.digest_alg.oid).ok_or_else(|| {
        SmimeError::UnsupportedAlgorithm(format!("digest {}", signer.digest_alg.oid))
    })?;
    let scheme = SignatureScheme::for_signer(signer, digest)?;
    let public_key = PublicKey::from_spki(&certificate.tbs_certificate.subject_public_key_info)?;
    trace!("Verifying {:?} signature with {} key", scheme, public_key.algorithm());

    let signed_bytes = match &signer.signed_attrs {
        Some(attrs) => {
            let expected = message_digest(attrs)?;
            if expected != digest.digest(content) {
                debug!("Message digest attribute does not match content");
                return Ok(false);
            }
            attrs.to_der()?
        }
        None => content.to_vec(),
    };

    let valid = scheme.verify(&public_key, &signed_bytes, signer.signature.as_bytes())?;
    trace!(
        "Signature verification: {}",
        if valid { "SUCCESS" } else { "FAILED" }
    );
    Ok(valid)
}

fn message_digest(attrs: &SignedAttributes) -> Result<Vec<u8>> {
    let value = attrs
        .iter()
        .find(|attr| attr.oid == oids::MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| SmimeError::Parse("Missing message-digest attribute".to_string()))?;

    let digest = OctetString::from_der(&value.to_der()?)
        .map_err(|e| SmimeError::Parse(format!("Invalid message-digest attribute: {e}")))?;
    Ok(digest.as_bytes().to_vec())
}

/// How the signature value of a signer-info is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureScheme {
    RsaPkcs1(DigestAlgorithm),
    RsaPss {
        digest: DigestAlgorithm,
        salt_len: usize,
    },
    Ecdsa(DigestAlgorithm),
    Ed25519,
}

impl SignatureScheme {
    /// Select the scheme named by the signer's signature algorithm
    ///
    /// Bare key-type OIDs (`rsaEncryption`, `id-ecPublicKey`) take the digest
    /// from the signer's digest algorithm.
    fn for_signer(signer: &SignerInfo, digest: DigestAlgorithm) -> Result<Self> {
        let algorithm = &signer.signature_algorithm;
        let scheme = match algorithm.oid {
            oids::RSA_ENCRYPTION => Self::RsaPkcs1(digest),
            oids::SHA256_WITH_RSA => Self::RsaPkcs1(DigestAlgorithm::Sha256),
            oids::SHA384_WITH_RSA => Self::RsaPkcs1(DigestAlgorithm::Sha384),
            oids::SHA512_WITH_RSA => Self::RsaPkcs1(DigestAlgorithm::Sha512),
            oids::RSASSA_PSS => Self::rsa_pss(algorithm.parameters.as_ref(), digest)?,
            oids::EC_PUBLIC_KEY => Self::Ecdsa(digest),
            oids::ECDSA_WITH_SHA256 => Self::Ecdsa(DigestAlgorithm::Sha256),
            oids::ECDSA_WITH_SHA384 => Self::Ecdsa(DigestAlgorithm::Sha384),
            oids::ECDSA_WITH_SHA512 => Self::Ecdsa(DigestAlgorithm::Sha512),
            oids::ED25519 => Self::Ed25519,
            other => {
                return Err(SmimeError::UnsupportedAlgorithm(format!(
                    "signature {other}"
                )));
            }
        };
        Ok(scheme)
    }

    /// Without parameters the signer digest is used with a salt of the same
    /// length
    fn rsa_pss(parameters: Option<&Any>, digest: DigestAlgorithm) -> Result<Self> {
        let Some(parameters) = parameters else {
            return Ok(Self::RsaPss {
                digest,
                salt_len: digest.output_len(),
            });
        };

        let der = parameters.to_der()?;
        let params = RsaPssParams::try_from(der.as_slice())
            .map_err(|e| SmimeError::Parse(format!("Invalid RSASSA-PSS parameters: {e}")))?;

        let hash = params.hash.oid;
        let mgf_hash = params.mask_gen.parameters.map_or(hash, |mgf| mgf.oid);
        if mgf_hash != hash {
            return Err(SmimeError::UnsupportedAlgorithm(format!(
                "RSASSA-PSS with MGF1 digest {mgf_hash}"
            )));
        }

        let digest = DigestAlgorithm::from_oid(&hash).ok_or_else(|| {
            SmimeError::UnsupportedAlgorithm(format!("RSASSA-PSS digest {hash}"))
        })?;
        Ok(Self::RsaPss {
            digest,
            salt_len: usize::from(params.salt_len),
        })
    }

    /// `Ok(false)` means the signature does not match; a key that cannot
    /// produce this kind of signature is an error
    fn verify(self, public_key: &PublicKey, data: &[u8], signature: &[u8]) -> Result<bool> {
        let valid = match (self, public_key) {
            (Self::RsaPkcs1(digest), PublicKey::Rsa(key)) => {
                verify_pkcs1v15(key, digest, data, signature)
            }
            (Self::RsaPss { digest, salt_len }, PublicKey::Rsa(key)) => {
                verify_pss(key, digest, salt_len, data, signature)
            }
            (Self::Ecdsa(digest), PublicKey::EcdsaP256(key)) => {
                p256::ecdsa::Signature::from_der(signature)
                    .is_ok_and(|sig| key.verify_prehash(&digest.digest(data), &sig).is_ok())
            }
            (Self::Ecdsa(digest), PublicKey::EcdsaP384(key)) => {
                p384::ecdsa::Signature::from_der(signature)
                    .is_ok_and(|sig| key.verify_prehash(&digest.digest(data), &sig).is_ok())
            }
            (Self::Ed25519, PublicKey::Ed25519(key)) => {
                ed25519_dalek::Signature::from_slice(signature)
                    .is_ok_and(|sig| key.verify(data, &sig).is_ok())
            }
            (scheme, key) => {
                return Err(SmimeError::UnsupportedAlgorithm(format!(
                    "{scheme:?} signature with {} key",
                    key.algorithm()
                )));
            }
        };
        Ok(valid)
    }
}

fn verify_pkcs1v15(
    key: &RsaPublicKey,
    digest: DigestAlgorithm,
    data: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(signature) = pkcs1v15::Signature::try_from(signature) else {
        return false;
    };
    let key = key.clone();
    match digest {
        DigestAlgorithm::Sha256 => pkcs1v15::VerifyingKey::<Sha256>::new(key)
            .verify(data, &signature)
            .is_ok(),
        DigestAlgorithm::Sha384 => pkcs1v15::VerifyingKey::<Sha384>::new(key)
            .verify(data, &signature)
            .is_ok(),
        DigestAlgorithm::Sha512 => pkcs1v15::VerifyingKey::<Sha512>::new(key)
            .verify(data, &signature)
            .is_ok(),
    }
}

fn verify_pss(
    key: &RsaPublicKey,
    digest: DigestAlgorithm,
    salt_len: usize,
    data: &[u8],
    signature: &[u8],
) -> bool {
    let Ok(signature) = pss::Signature::try_from(signature) else {
        return false;
    };
    let key = key.clone();
    match digest {
        DigestAlgorithm::Sha256 => pss::VerifyingKey::<Sha256>::new_with_salt_len(key, salt_len)
            .verify(data, &signature)
            .is_ok(),
        DigestAlgorithm::Sha384 => pss::VerifyingKey::<Sha384>::new_with_salt_len(key, salt_len)
            .verify(data, &signature)
            .is_ok(),
        DigestAlgorithm::Sha512 => pss::VerifyingKey::<Sha512>::new_with_salt_len(key, salt_len)
            .verify(data, &signature)
            .is_ok(),
    }
}
