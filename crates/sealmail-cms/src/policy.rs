//! Algorithm policy for S/MIME signing
//!
//! Maps the public-key algorithm of a signer certificate to the signature
//! algorithm used for the CMS signer-info, and maps digest algorithm OIDs to
//! the `micalg` labels carried by `multipart/signed`.

use der::asn1::ObjectIdentifier;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;

/// Object identifiers used by the CMS and X.509 code in this crate
pub mod oids {
    use der::asn1::ObjectIdentifier;

    /// PKCS#7 data
    pub const ID_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.1");
    /// PKCS#7 signedData
    pub const ID_SIGNED_DATA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

    /// `contentType` signed attribute
    pub const CONTENT_TYPE: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
    /// `messageDigest` signed attribute
    pub const MESSAGE_DIGEST: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
    /// `signingTime` signed attribute
    pub const SIGNING_TIME: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
    /// PKCS#9 `emailAddress` DN attribute
    pub const EMAIL_ADDRESS: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.1");

    pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
    pub const SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
    pub const SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");
    pub const MD5: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.5");

    pub const RSA_ENCRYPTION: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
    pub const RSASSA_PSS: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.10");
    pub const SHA256_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
    pub const SHA384_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
    pub const SHA512_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
    pub const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
    pub const ECDSA_WITH_SHA256: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
    pub const ECDSA_WITH_SHA384: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
    pub const ECDSA_WITH_SHA512: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");
    pub const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
    pub const ED448: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.113");

    // Distinguished name attributes
    pub const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
    pub const COUNTRY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.6");
    pub const LOCALITY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.7");
    pub const STATE_OR_PROVINCE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.8");
    pub const STREET: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.9");
    pub const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");
    pub const ORGANIZATIONAL_UNIT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.11");
    pub const USER_ID: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("0.9.2342.19200300.100.1.1");
    pub const DOMAIN_COMPONENT: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("0.9.2342.19200300.100.1.25");

    /// Subject Key Identifier extension
    pub const SUBJECT_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.14");
    /// Subject Alternative Name extension
    pub const SUBJECT_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.17");
}

/// MIC label used when the digest algorithm is not recognised
pub const DEFAULT_MIC_ALGORITHM: &str = "sha-256";

/// Signature algorithm chosen for a signer certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureAlgorithm {
    Sha256WithRsa,
    Sha256WithEcdsa,
    Ed25519,
    Ed448,
}

impl SignatureAlgorithm {
    /// JCA-style algorithm name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256WithRsa => "SHA256WithRSA",
            Self::Sha256WithEcdsa => "SHA256WithECDSA",
            Self::Ed25519 => "Ed25519",
            Self::Ed448 => "Ed448",
        }
    }

    /// Signature algorithm OID written into the signer-info
    pub const fn oid(self) -> ObjectIdentifier {
        match self {
            Self::Sha256WithRsa => oids::SHA256_WITH_RSA,
            Self::Sha256WithEcdsa => oids::ECDSA_WITH_SHA256,
            Self::Ed25519 => oids::ED25519,
            Self::Ed448 => oids::ED448,
        }
    }

    /// Digest algorithm paired with this signature algorithm in CMS
    ///
    /// Ed25519 uses SHA-512 (RFC 8419). Ed448 requires SHAKE256, which is
    /// not available, so it has no supported digest.
    pub const fn digest(self) -> Option<DigestAlgorithm> {
        match self {
            Self::Sha256WithRsa | Self::Sha256WithEcdsa => Some(DigestAlgorithm::Sha256),
            Self::Ed25519 => Some(DigestAlgorithm::Sha512),
            Self::Ed448 => None,
        }
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Select the signature algorithm for a public-key algorithm name
///
/// Unknown names fall back to SHA-256 with RSA; this never fails.
pub fn signature_algorithm_for(public_key_algorithm: &str) -> SignatureAlgorithm {
    match public_key_algorithm {
        "RSA" => SignatureAlgorithm::Sha256WithRsa,
        "EC" | "ECDSA" => SignatureAlgorithm::Sha256WithEcdsa,
        "Ed25519" => SignatureAlgorithm::Ed25519,
        "Ed448" => SignatureAlgorithm::Ed448,
        _ => SignatureAlgorithm::Sha256WithRsa,
    }
}

/// Name the public-key algorithm of a `SubjectPublicKeyInfo` OID
///
/// Unknown OIDs are returned in dotted form.
pub fn public_key_algorithm_name(oid: &ObjectIdentifier) -> String {
    match *oid {
        oids::RSA_ENCRYPTION => "RSA".to_string(),
        oids::EC_PUBLIC_KEY => "EC".to_string(),
        oids::ED25519 => "Ed25519".to_string(),
        oids::ED448 => "Ed448".to_string(),
        _ => oid.to_string(),
    }
}

/// Digest algorithms supported for signing and verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        match *oid {
            oids::SHA256 => Some(Self::Sha256),
            oids::SHA384 => Some(Self::Sha384),
            oids::SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    pub const fn oid(self) -> ObjectIdentifier {
        match self {
            Self::Sha256 => oids::SHA256,
            Self::Sha384 => oids::SHA384,
            Self::Sha512 => oids::SHA512,
        }
    }

    pub const fn mic_label(self) -> &'static str {
        match self {
            Self::Sha256 => "sha-256",
            Self::Sha384 => "sha-384",
            Self::Sha512 => "sha-512",
        }
    }

    /// Digest size in bytes
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Hash `data` with this algorithm
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// Map a digest algorithm OID to its `micalg` label
///
/// MD5 is labelled even though it is never produced here, so that received
/// signatures report the right value. Anything unrecognised yields
/// [`DEFAULT_MIC_ALGORITHM`].
pub fn mic_label_for(digest_oid: &ObjectIdentifier) -> &'static str {
    if *digest_oid == oids::MD5 {
        return "md5";
    }
    DigestAlgorithm::from_oid(digest_oid).map_or(DEFAULT_MIC_ALGORITHM, DigestAlgorithm::mic_label)
}
