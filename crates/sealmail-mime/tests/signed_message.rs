#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! End-to-end tests for `multipart/signed` messages
//!
//! Messages are signed, serialized to wire bytes and verified from those
//! bytes alone, the way a receiving client would see them.

use pretty_assertions::assert_eq;
use sealmail_cms::{DigestAlgorithm, mic_label_from_signature};
use sealmail_mime::{
    Body, MimePart, SignatureResult, VerificationFailure, content_entity, sign_message,
    verify_signed_message,
};
use sealmail_test_utils::{
    ALICE_EMAIL, KeyKind, LeafOptions, expired_validity, identity, identity_with,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("sealmail_mime=trace,sealmail_cms=debug")
        .with_test_writer()
        .try_init();
}

fn plain_message() -> MimePart {
    let mut message = MimePart::leaf("text/plain; charset=utf-8", "Meet at noon.\r\n");
    message.add_header("From", ALICE_EMAIL);
    message.add_header("To", "bob@example.org");
    message.add_header("Subject", "Lunch");
    message
}

fn mixed_message() -> MimePart {
    let mut attachment = MimePart::leaf("application/octet-stream", vec![0u8, 1, 2, 0xff, b'\n']);
    attachment.add_header("Content-Transfer-Encoding", "base64");
    attachment.add_header("Content-Disposition", "attachment; filename=\"data.bin\"");

    let mut message = MimePart::multipart(
        "mixed",
        "mixed-boundary",
        vec![MimePart::leaf("text/plain", "See attached.\n"), attachment],
    );
    message.add_header("From", ALICE_EMAIL);
    message.add_header("Subject", "Data");
    message
}

fn signed_wire(mut message: MimePart, kind: KeyKind) -> Vec<u8> {
    sign_message(&mut message, &identity(kind)).expect("sign message");
    message.to_bytes()
}

fn replace_once(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    let pos = haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .expect("needle present");
    let mut out = haystack[..pos].to_vec();
    out.extend_from_slice(replacement);
    out.extend_from_slice(&haystack[pos + needle.len()..]);
    out
}

#[test]
fn test_round_trip_all_key_kinds() {
    init_tracing();

    for kind in KeyKind::ALL {
        let wire = signed_wire(plain_message(), kind);
        let result = verify_signed_message(&wire);

        assert!(result.is_valid(), "{kind:?}: {result:?}");
        assert_eq!(result.signer_email(), Some(ALICE_EMAIL), "{kind:?}");
        assert_eq!(
            result.signer_certificate().map(|c| c.tbs_certificate.serial_number.clone()),
            Some(identity(kind).signer_certificate().tbs_certificate.serial_number.clone())
        );
    }
}

#[test]
fn test_round_trip_nested_multipart() {
    let wire = signed_wire(mixed_message(), KeyKind::Rsa);
    assert!(verify_signed_message(&wire).is_valid());

    let parsed = MimePart::parse(&wire).expect("parse signed");
    let entity = &parsed.children()[0];
    assert!(entity.content_type().is("multipart/mixed"));
    assert_eq!(entity.children().len(), 2);
}

#[test]
fn test_wire_structure() {
    let wire = signed_wire(plain_message(), KeyKind::P256);
    let parsed = MimePart::parse(&wire).expect("parse signed");

    assert_eq!(parsed.header("Subject"), Some("Lunch"));
    assert_eq!(parsed.header("From"), Some(ALICE_EMAIL));

    let content_type = parsed.content_type();
    assert!(content_type.is("multipart/signed"));
    assert_eq!(content_type.param("protocol"), Some("application/pkcs7-signature"));
    assert_eq!(content_type.param("micalg"), Some("sha-256"));

    let parts = parsed.children();
    assert_eq!(parts.len(), 2);
    assert!(parts[0].content_type().is("text/plain"));
    assert_eq!(parts[0].content_type().param("charset"), Some("utf-8"));
    assert!(parts[1].content_type().is("application/pkcs7-signature"));
    assert_eq!(parts[1].content_type().param("name"), Some("smime.p7s"));
    assert_eq!(
        parts[1].header("Content-Disposition"),
        Some("attachment; filename=\"smime.p7s\"")
    );
    assert_eq!(parts[1].header("Content-Transfer-Encoding"), Some("base64"));

    // DER SEQUENCE with a two-byte length encodes as "MII" in base64
    let text = String::from_utf8_lossy(&wire);
    assert!(text.contains("filename=\"smime.p7s\"\r\n\r\nMII"));

    let Body::Bytes(signature) = parts[1].body() else {
        panic!("signature part is not a leaf");
    };
    assert_eq!(mic_label_from_signature(signature).unwrap(), "sha-256");
}

#[test]
fn test_ed25519_micalg_is_sha512() {
    let wire = signed_wire(plain_message(), KeyKind::Ed25519);
    let parsed = MimePart::parse(&wire).expect("parse signed");

    assert_eq!(
        parsed.content_type().param("micalg"),
        Some(DigestAlgorithm::Sha512.mic_label())
    );
    assert!(verify_signed_message(&wire).is_valid());
}

#[test]
fn test_signed_bytes_are_content_entity() {
    let message = plain_message();
    let expected = content_entity(&message).to_bytes();

    let wire = signed_wire(message, KeyKind::Rsa);
    let position = wire
        .windows(expected.len())
        .position(|w| w == expected.as_slice());
    assert!(position.is_some());
}

#[test]
fn test_tampered_body_is_invalid() {
    for kind in KeyKind::ALL {
        let wire = signed_wire(plain_message(), kind);
        let tampered = replace_once(&wire, b"Meet at noon.", b"Meet at nine.");

        let result = verify_signed_message(&tampered);
        assert_eq!(
            result.failure(),
            Some(VerificationFailure::InvalidSignature),
            "{kind:?}"
        );
        assert_eq!(result.signer_email(), Some(ALICE_EMAIL));
    }
}

#[test]
fn test_tampered_content_header_is_invalid() {
    let wire = signed_wire(plain_message(), KeyKind::P256);
    let tampered = replace_once(&wire, b"charset=utf-8", b"charset=latin1");

    assert_eq!(
        verify_signed_message(&tampered).failure(),
        Some(VerificationFailure::InvalidSignature)
    );
}

#[test]
fn test_outer_headers_are_not_signed() {
    let wire = signed_wire(plain_message(), KeyKind::Ed25519);
    let edited = replace_once(&wire, b"Subject: Lunch", b"Subject: Dinner");

    assert!(verify_signed_message(&edited).is_valid());
}

#[test]
fn test_continued_boundary_parameter() {
    let wire = signed_wire(plain_message(), KeyKind::P256);
    let parsed = MimePart::parse(&wire).expect("parse signed");
    let boundary = parsed.content_type().boundary().unwrap().to_string();

    // Same boundary, split into RFC 2231 continuations in the unsigned outer header
    let (head, tail) = boundary.split_at(boundary.len() / 2);
    let continued = replace_once(
        &wire,
        format!("boundary=\"{boundary}\"").as_bytes(),
        format!("boundary*0=\"{head}\";\r\n\tboundary*1=\"{tail}\"").as_bytes(),
    );

    let result = verify_signed_message(&continued);
    assert!(result.is_valid(), "{result:?}");
    assert_eq!(result.signer_email(), Some(ALICE_EMAIL));
}

#[test]
fn test_expired_signer() {
    let options = LeafOptions::new(KeyKind::Rsa).validity(expired_validity());
    let mut message = plain_message();
    sign_message(&mut message, &identity_with(KeyKind::Rsa, &options)).expect("sign");

    let result = verify_signed_message(&message.to_bytes());
    assert_eq!(result.failure(), Some(VerificationFailure::ExpiredCertificate));
    assert!(result.signer_certificate().is_some());
    assert_eq!(result.signer_email(), Some(ALICE_EMAIL));
}

#[test]
fn test_signature_part_swapped_for_text() {
    let wire = signed_wire(plain_message(), KeyKind::Rsa);
    let parsed = MimePart::parse(&wire).expect("parse");
    let boundary = parsed.content_type().boundary().unwrap().to_string();

    let forged = MimePart::multipart(
        "signed",
        &boundary,
        vec![
            parsed.children()[0].clone(),
            MimePart::leaf("application/pkcs7-signature", "not der"),
        ],
    );

    let result = verify_signed_message(&forged.to_bytes());
    assert_eq!(result.failure(), Some(VerificationFailure::ParseError));
    assert!(matches!(result, SignatureResult::Invalid { signer_certificate: None, .. }));
}

#[test]
fn test_unsigned_message_is_parse_error() {
    let wire = plain_message().to_bytes();
    assert_eq!(
        verify_signed_message(&wire).failure(),
        Some(VerificationFailure::ParseError)
    );
    assert_eq!(
        verify_signed_message(b"").failure(),
        Some(VerificationFailure::ParseError)
    );
}
