//! Test utilities for sealmail
//!
//! Mints throwaway certificates and signing identities. Every certificate is
//! issued by a P-256 test CA; the subject key can be RSA, P-256 or Ed25519.
//! Helpers panic on failure since they only run inside tests.

use der::Decode;
use der::asn1::{BitString, Ia5String, UtcTime};
use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use sealmail_cms::{PrivateKey, SigningIdentity, oids};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use x509_cert::Certificate;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::time::{Time, Validity};

/// Subject used for identities unless a test overrides it
pub const ALICE_SUBJECT: &str =
    "CN=Alice Example,O=Sealmail Test,1.2.840.113549.1.9.1=alice@example.com";

/// Email carried in [`ALICE_SUBJECT`]
pub const ALICE_EMAIL: &str = "alice@example.com";

const CA_SUBJECT: &str = "CN=Sealmail Test CA,O=Sealmail Test";
const DAY: u64 = 24 * 60 * 60;

static RSA_PEM: &str = include_str!("../data/rsa-2048.pem");

/// Key types a test identity can be built with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Rsa,
    P256,
    Ed25519,
}

impl KeyKind {
    pub const ALL: [Self; 3] = [Self::Rsa, Self::P256, Self::Ed25519];
}

/// Fixed RSA-2048 key loaded from the bundled PKCS#8 file
pub fn rsa_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| RsaPrivateKey::from_pkcs8_pem(RSA_PEM).expect("bundled RSA key"))
}

pub fn p256_key() -> p256::ecdsa::SigningKey {
    p256::ecdsa::SigningKey::from_slice(&[0x11; 32]).expect("valid P-256 scalar")
}

pub fn ed25519_key() -> ed25519_dalek::SigningKey {
    ed25519_dalek::SigningKey::from_bytes(&[0x07; 32])
}

/// Private key of the given kind
pub fn private_key(kind: KeyKind) -> PrivateKey {
    match kind {
        KeyKind::Rsa => PrivateKey::Rsa(rsa_key().clone()),
        KeyKind::P256 => PrivateKey::EcdsaP256(p256_key()),
        KeyKind::Ed25519 => PrivateKey::Ed25519(ed25519_key()),
    }
}

/// `SubjectPublicKeyInfo` matching [`private_key`]
pub fn spki(kind: KeyKind) -> SubjectPublicKeyInfoOwned {
    let der = match kind {
        KeyKind::Rsa => rsa_key().to_public_key().to_public_key_der(),
        KeyKind::P256 => p256_key().verifying_key().to_public_key_der(),
        KeyKind::Ed25519 => ed25519_key().verifying_key().to_public_key_der(),
    }
    .expect("encode public key");

    SubjectPublicKeyInfoOwned::from_der(der.as_bytes()).expect("decode public key")
}

/// An Ed448 public key, for which no signer exists
pub fn ed448_spki() -> SubjectPublicKeyInfoOwned {
    SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: oids::ED448,
            parameters: None,
        },
        subject_public_key: BitString::from_bytes(&[0x42; 57]).expect("bit string"),
    }
}

fn time_at(offset_from_now: i64) -> Time {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock after epoch")
        .as_secs();
    let secs = now.checked_add_signed(offset_from_now).expect("time in range");
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).expect("UTCTime range"))
}

/// Valid from yesterday until a year from now
pub fn current_validity() -> Validity {
    Validity {
        not_before: time_at(-(DAY as i64)),
        not_after: time_at(365 * DAY as i64),
    }
}

/// Expired a year ago
pub fn expired_validity() -> Validity {
    Validity {
        not_before: time_at(-(730 * DAY as i64)),
        not_after: time_at(-(365 * DAY as i64)),
    }
}

/// Parameters for a leaf certificate
#[derive(Debug, Clone)]
pub struct LeafOptions {
    pub subject: String,
    pub spki: SubjectPublicKeyInfoOwned,
    pub serial: u64,
    pub validity: Validity,
    pub san_email: Option<String>,
}

impl LeafOptions {
    pub fn new(kind: KeyKind) -> Self {
        Self::with_spki(spki(kind))
    }

    pub fn with_spki(spki: SubjectPublicKeyInfoOwned) -> Self {
        Self {
            subject: ALICE_SUBJECT.to_string(),
            spki,
            serial: 1001,
            validity: current_validity(),
            san_email: None,
        }
    }

    #[must_use]
    pub fn subject(mut self, subject: &str) -> Self {
        self.subject = subject.to_string();
        self
    }

    #[must_use]
    pub fn serial(mut self, serial: u64) -> Self {
        self.serial = serial;
        self
    }

    #[must_use]
    pub fn validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    #[must_use]
    pub fn san_email(mut self, email: &str) -> Self {
        self.san_email = Some(email.to_string());
        self
    }
}

/// Certificate authority that signs every test certificate
pub struct TestCa {
    key: p256::ecdsa::SigningKey,
    certificate: Certificate,
}

impl TestCa {
    pub fn new() -> Self {
        let key = p256::ecdsa::SigningKey::from_slice(&[0x5a; 32]).expect("valid CA scalar");
        let ca_spki = SubjectPublicKeyInfoOwned::from_der(
            key.verifying_key()
                .to_public_key_der()
                .expect("encode CA key")
                .as_bytes(),
        )
        .expect("decode CA key");

        let builder = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::from(1u64),
            current_validity(),
            Name::from_str(CA_SUBJECT).expect("CA subject"),
            ca_spki,
            &key,
        )
        .expect("CA builder");
        let certificate = builder
            .build::<p256::ecdsa::DerSignature>()
            .expect("CA certificate");

        Self { key, certificate }
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Issue a leaf certificate
    pub fn issue(&self, options: &LeafOptions) -> Certificate {
        let profile = Profile::Leaf {
            issuer: self.certificate.tbs_certificate.subject.clone(),
            enable_key_agreement: false,
            enable_key_encipherment: false,
        };

        let mut builder = CertificateBuilder::new(
            profile,
            SerialNumber::from(options.serial),
            options.validity.clone(),
            Name::from_str(&options.subject).expect("leaf subject"),
            options.spki.clone(),
            &self.key,
        )
        .expect("leaf builder");

        if let Some(email) = &options.san_email {
            let san = SubjectAltName(vec![GeneralName::Rfc822Name(
                Ia5String::new(email).expect("ASCII email"),
            )]);
            builder.add_extension(&san).expect("SAN extension");
        }

        builder
            .build::<p256::ecdsa::DerSignature>()
            .expect("leaf certificate")
    }
}

impl Default for TestCa {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity for [`ALICE_SUBJECT`] with a currently valid certificate
pub fn identity(kind: KeyKind) -> SigningIdentity {
    identity_with(kind, &LeafOptions::new(kind))
}

/// Identity whose leaf is issued from `options`, chain `[leaf, ca]`
pub fn identity_with(kind: KeyKind, options: &LeafOptions) -> SigningIdentity {
    let ca = TestCa::new();
    let leaf = ca.issue(options);
    SigningIdentity::new(private_key(kind), vec![leaf, ca.certificate().clone()])
        .expect("non-empty chain")
}
