//! Encoded detached signatures

use crate::ber;
use crate::error::{Result, SmimeError};
use crate::policy::{mic_label_for, oids};
use cms::content_info::ContentInfo;
use cms::signed_data::SignedData;
use der::asn1::ObjectIdentifier;
use der::{Decode, Encode};
use tracing::debug;

/// DER encoded CMS `ContentInfo` holding a detached `SignedData`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSignature {
    der: Vec<u8>,
    digest_algorithm: ObjectIdentifier,
}

impl DetachedSignature {
    pub(crate) const fn new(der: Vec<u8>, digest_algorithm: ObjectIdentifier) -> Self {
        Self {
            der,
            digest_algorithm,
        }
    }

    /// Wrap already-encoded signature bytes
    ///
    /// The digest algorithm is read from the first signer-info. A signature
    /// without signers is assumed to use SHA-256.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let signed_data = decode_signed_data(&der)?;
        let digest_algorithm = signed_data
            .signer_infos
            .0
            .iter()
            .next()
            .map_or(oids::SHA256, |signer| signer.digest_alg.oid);

        Ok(Self::new(der, digest_algorithm))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.der
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.der
    }

    /// Digest algorithm used to produce the signature
    pub const fn digest_algorithm(&self) -> &ObjectIdentifier {
        &self.digest_algorithm
    }

    /// `micalg` value for a `multipart/signed` wrapper
    pub fn mic_label(&self) -> &'static str {
        mic_label_for(&self.digest_algorithm)
    }
}

impl AsRef<[u8]> for DetachedSignature {
    fn as_ref(&self) -> &[u8] {
        &self.der
    }
}

/// Derive the `micalg` label from encoded signature bytes
pub fn mic_label_from_signature(signature: &[u8]) -> Result<&'static str> {
    let signed_data = decode_signed_data(signature)?;
    Ok(signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .map_or(crate::policy::DEFAULT_MIC_ALGORITHM, |signer| {
            mic_label_for(&signer.digest_alg.oid)
        }))
}

/// Decode a `ContentInfo` and unwrap its `SignedData`
///
/// Input that is not valid DER is normalized from BER and decoded again.
pub(crate) fn decode_signed_data(bytes: &[u8]) -> Result<SignedData> {
    let err = match decode_der(bytes) {
        Ok(signed_data) => return Ok(signed_data),
        Err(err) => err,
    };

    match ber::to_der(bytes) {
        Ok(normalized) if normalized != bytes => {
            debug!("Signature is not DER, decoding BER normalized form");
            decode_der(&normalized)
        }
        _ => Err(err),
    }
}

fn decode_der(bytes: &[u8]) -> Result<SignedData> {
    let content_info = ContentInfo::from_der(bytes)
        .map_err(|e| SmimeError::Parse(format!("Invalid ContentInfo: {e}")))?;

    if content_info.content_type != oids::ID_SIGNED_DATA {
        return Err(SmimeError::Parse(format!(
            "ContentInfo is not SignedData: {}",
            content_info.content_type
        )));
    }

    let signed_data_bytes = content_info
        .content
        .to_der()
        .map_err(|e| SmimeError::Parse(format!("Failed to encode SignedData content: {e}")))?;

    SignedData::from_der(&signed_data_bytes)
        .map_err(|e| SmimeError::Parse(format!("Failed to parse SignedData: {e}")))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use cms::content_info::CmsVersion;
    use cms::signed_data::{EncapsulatedContentInfo, SignerInfos};
    use der::Any;
    use der::asn1::SetOfVec;

    fn empty_signed_data() -> Vec<u8> {
        let signed_data = SignedData {
            version: CmsVersion::V1,
            digest_algorithms: SetOfVec::new(),
            encap_content_info: EncapsulatedContentInfo {
                econtent_type: oids::ID_DATA,
                econtent: None,
            },
            certificates: None,
            crls: None,
            signer_infos: SignerInfos(SetOfVec::new()),
        };
        ContentInfo {
            content_type: oids::ID_SIGNED_DATA,
            content: Any::encode_from(&signed_data).expect("encode SignedData"),
        }
        .to_der()
        .expect("encode ContentInfo")
    }

    #[test]
    fn test_no_signer_defaults_to_sha256() {
        let der = empty_signed_data();
        assert_eq!(mic_label_from_signature(&der).expect("parse"), "sha-256");

        let signature = DetachedSignature::from_der(der).expect("parse");
        assert_eq!(signature.digest_algorithm(), &oids::SHA256);
        assert_eq!(signature.mic_label(), "sha-256");
    }

    #[test]
    fn test_wrong_content_type() {
        let content_info = ContentInfo {
            content_type: oids::ID_DATA,
            content: Any::encode_from(&der::asn1::OctetString::new(b"hi".to_vec()).unwrap())
                .unwrap(),
        };
        let der = content_info.to_der().unwrap();

        let err = mic_label_from_signature(&der).expect_err("not signed data");
        assert!(matches!(err, SmimeError::Parse(_)));
    }

    #[test]
    fn test_indefinite_length_content_info() {
        let der = empty_signed_data();
        assert!(der[1] < 0x80, "short-form outer length");

        let mut ber = vec![0x30, 0x80];
        ber.extend_from_slice(&der[2..]);
        ber.extend_from_slice(&[0x00, 0x00]);

        assert!(ContentInfo::from_der(&ber).is_err());
        assert_eq!(mic_label_from_signature(&ber).expect("parse BER"), "sha-256");
        let signature = DetachedSignature::from_der(ber.clone()).expect("parse BER");
        assert_eq!(signature.as_bytes(), ber.as_slice());
    }

    #[test]
    fn test_garbage_bytes() {
        assert!(mic_label_from_signature(b"not a signature").is_err());
        assert!(DetachedSignature::from_der(Vec::new()).is_err());
    }
}
