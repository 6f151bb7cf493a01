//! Detached CMS signature creation
//!
//! Produces a `ContentInfo`/`SignedData` with a single signer-info. The
//! payload itself is not embedded. Signed attributes carry the content type,
//! the payload digest and the signing time, so the signature is computed over
//! the DER encoding of that attribute set.

use crate::detached::DetachedSignature;
use crate::error::{Result, SmimeError};
use crate::key::{PrivateKey, SigningIdentity};
use crate::policy::{SignatureAlgorithm, oids, public_key_algorithm_name, signature_algorithm_for};
use cms::cert::{CertificateChoices, IssuerAndSerialNumber};
use cms::content_info::{CmsVersion, ContentInfo};
use cms::signed_data::{
    CertificateSet, DigestAlgorithmIdentifiers, EncapsulatedContentInfo, SignatureValue,
    SignedAttributes, SignedData, SignerIdentifier, SignerInfo, SignerInfos,
};
use der::asn1::{GeneralizedTime, OctetString, SetOfVec, UtcTime};
use der::{Any, Encode};
use sha2::Sha256;
use signature::{SignatureEncoding, Signer};
use std::time::SystemTime;
use tracing::{debug, trace};
use x509_cert::Certificate;
use x509_cert::attr::Attribute;
use x509_cert::spki::AlgorithmIdentifierOwned;
use x509_cert::time::Time;

/// Sign `payload` with `identity`, producing a detached signature
pub fn sign(payload: &[u8], identity: &SigningIdentity) -> Result<DetachedSignature> {
    sign_at(payload, identity, SystemTime::now())
}

/// Sign `payload` recording `signing_time` in the signed attributes
pub fn sign_at(
    payload: &[u8],
    identity: &SigningIdentity,
    signing_time: SystemTime,
) -> Result<DetachedSignature> {
    let certificate = identity.signer_certificate();
    let key_algorithm = public_key_algorithm_name(
        &certificate
            .tbs_certificate
            .subject_public_key_info
            .algorithm
            .oid,
    );
    let algorithm = signature_algorithm_for(&key_algorithm);

    let digest_algorithm = algorithm
        .digest()
        .ok_or_else(|| SmimeError::UnsupportedAlgorithm(algorithm.name().to_string()))?;

    identity.private_key().ensure_matches(certificate)?;

    debug!(
        "Signing {} bytes with {} ({})",
        payload.len(),
        algorithm,
        digest_algorithm.mic_label()
    );

    let signed_attrs = signed_attributes(&digest_algorithm.digest(payload), signing_time)?;
    let to_sign = signed_attrs.to_der()?;
    let signature = raw_signature(identity.private_key(), &to_sign)?;
    trace!("Produced {}-byte signature value", signature.len());

    let digest_alg = AlgorithmIdentifierOwned {
        oid: digest_algorithm.oid(),
        parameters: None,
    };

    let signer_info = SignerInfo {
        version: CmsVersion::V1,
        sid: SignerIdentifier::IssuerAndSerialNumber(IssuerAndSerialNumber {
            issuer: certificate.tbs_certificate.issuer.clone(),
            serial_number: certificate.tbs_certificate.serial_number.clone(),
        }),
        digest_alg: digest_alg.clone(),
        signed_attrs: Some(signed_attrs),
        signature_algorithm: signature_algorithm_identifier(algorithm),
        signature: SignatureValue::new(signature)?,
        unsigned_attrs: None,
    };

    let signed_data = SignedData {
        version: CmsVersion::V1,
        digest_algorithms: DigestAlgorithmIdentifiers::try_from(vec![digest_alg])?,
        encap_content_info: EncapsulatedContentInfo {
            econtent_type: oids::ID_DATA,
            econtent: None,
        },
        certificates: Some(certificate_set(identity.certificate_chain())?),
        crls: None,
        signer_infos: SignerInfos(SetOfVec::try_from(vec![signer_info])?),
    };

    let content_info = ContentInfo {
        content_type: oids::ID_SIGNED_DATA,
        content: Any::encode_from(&signed_data)?,
    };

    Ok(DetachedSignature::new(
        content_info.to_der()?,
        digest_algorithm.oid(),
    ))
}

fn signed_attributes(message_digest: &[u8], signing_time: SystemTime) -> Result<SignedAttributes> {
    let content_type = Attribute {
        oid: oids::CONTENT_TYPE,
        values: SetOfVec::try_from(vec![Any::encode_from(&oids::ID_DATA)?])?,
    };

    let digest = Attribute {
        oid: oids::MESSAGE_DIGEST,
        values: SetOfVec::try_from(vec![Any::encode_from(&OctetString::new(
            message_digest,
        )?)?])?,
    };

    // UTCTime covers 1950 through 2049; later times need GeneralizedTime
    let time = match UtcTime::from_system_time(signing_time) {
        Ok(utc) => Time::UtcTime(utc),
        Err(_) => Time::GeneralTime(GeneralizedTime::from_system_time(signing_time)?),
    };
    let signing_time = Attribute {
        oid: oids::SIGNING_TIME,
        values: SetOfVec::try_from(vec![Any::encode_from(&time)?])?,
    };

    Ok(SignedAttributes::try_from(vec![
        content_type,
        digest,
        signing_time,
    ])?)
}

fn raw_signature(key: &PrivateKey, data: &[u8]) -> Result<Vec<u8>> {
    let signature = match key {
        PrivateKey::Rsa(key) => {
            let signing_key = rsa::pkcs1v15::SigningKey::<Sha256>::new(key.clone());
            signing_key.try_sign(data)?.to_vec()
        }
        PrivateKey::EcdsaP256(key) => {
            let signature: p256::ecdsa::DerSignature = key.try_sign(data)?;
            signature.to_vec()
        }
        PrivateKey::Ed25519(key) => key.try_sign(data)?.to_vec(),
    };
    Ok(signature)
}

fn signature_algorithm_identifier(algorithm: SignatureAlgorithm) -> AlgorithmIdentifierOwned {
    // RSA PKCS#1 identifiers carry an explicit NULL parameter
    let parameters = match algorithm {
        SignatureAlgorithm::Sha256WithRsa => Some(Any::null()),
        _ => None,
    };
    AlgorithmIdentifierOwned {
        oid: algorithm.oid(),
        parameters,
    }
}

fn certificate_set<'a>(chain: impl Iterator<Item = &'a Certificate>) -> Result<CertificateSet> {
    let choices = chain
        .cloned()
        .map(CertificateChoices::Certificate)
        .collect::<Vec<_>>();
    Ok(CertificateSet(SetOfVec::try_from(choices)?))
}

