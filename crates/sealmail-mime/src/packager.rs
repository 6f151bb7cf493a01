//! `multipart/signed` packaging
//!
//! Signing takes the message's content entity (its `Content-*` headers and
//! body), signs the canonical serialization of that entity, and replaces the
//! message body with a two-part `multipart/signed` structure. Non-content
//! headers such as `From` or `Subject` stay on the outer message.

use crate::error::{MimeError, Result};
use crate::part::{Body, Header, MimePart, Multipart};
use rand::{RngExt, rng};
use sealmail_cms::{SigningIdentity, mic_label_from_signature, sign};
use tracing::{debug, trace};

/// Content type of the signature part
pub const SIGNATURE_CONTENT_TYPE: &str = "application/pkcs7-signature; name=\"smime.p7s\"";

/// Disposition of the signature part
pub const SIGNATURE_DISPOSITION: &str = "attachment; filename=\"smime.p7s\"";

/// Value of the `protocol` parameter on the outer entity
pub const SIGNED_PROTOCOL: &str = "application/pkcs7-signature";

const BOUNDARY_PREFIX: &str = "----=_smime_";
const MAX_BOUNDARY_ATTEMPTS: usize = 16;

/// The entity that gets signed: `Content-*` headers plus body
///
/// A message without a `Content-Type` gets `text/plain` so the signed bytes
/// state their type explicitly.
pub fn content_entity(message: &MimePart) -> MimePart {
    let mut headers: Vec<Header> = message
        .headers()
        .iter()
        .filter(|h| h.is_content_header())
        .cloned()
        .collect();

    if !headers.iter().any(|h| h.is("Content-Type")) {
        headers.insert(0, Header::new("Content-Type", "text/plain"));
    }

    MimePart::new(headers, message.body().clone())
}

/// Wrap `message` in `multipart/signed` with a detached `signature`
///
/// `mic_label` becomes the `micalg` parameter and must describe the digest
/// used inside `signature`.
pub fn attach_signature(message: &mut MimePart, signature: &[u8], mic_label: &str) -> Result<()> {
    let entity = content_entity(message);
    let serialized = entity.to_bytes();

    let boundary = unique_boundary(&entity, &serialized, random_boundary)?;
    trace!("Selected multipart/signed boundary {boundary}");

    let mut signature_part = MimePart::leaf(SIGNATURE_CONTENT_TYPE, signature);
    signature_part.add_header("Content-Transfer-Encoding", "base64");
    signature_part.add_header("Content-Disposition", SIGNATURE_DISPOSITION);

    message.retain_headers(|h| !h.is_content_header());
    message.add_header(
        "Content-Type",
        format!(
            "multipart/signed; protocol=\"{SIGNED_PROTOCOL}\"; micalg={mic_label}; boundary=\"{boundary}\""
        ),
    );
    message.set_body(Body::Multipart(Multipart {
        subtype: "signed".to_string(),
        boundary,
        parts: vec![entity, signature_part],
    }));

    debug!(
        "Attached {} byte signature over {} byte entity (micalg={mic_label})",
        signature.len(),
        serialized.len()
    );
    Ok(())
}

/// Sign `message` in place with `identity`
pub fn sign_message(message: &mut MimePart, identity: &SigningIdentity) -> Result<()> {
    let signed_bytes = content_entity(message).to_bytes();
    let signature = sign(&signed_bytes, identity)?;
    let mic_label = mic_label_from_signature(signature.as_bytes())?;

    attach_signature(message, signature.as_bytes(), mic_label)
}

fn random_boundary() -> String {
    format!("{BOUNDARY_PREFIX}{:032x}", rng().random::<u128>())
}

/// Draw boundaries until one is absent from the tree and the signed bytes
fn unique_boundary(
    entity: &MimePart,
    serialized: &[u8],
    mut generate: impl FnMut() -> String,
) -> Result<String> {
    let existing = entity.boundaries();

    for attempt in 1..=MAX_BOUNDARY_ATTEMPTS {
        let candidate = generate();
        if candidate.is_empty() {
            continue;
        }
        let in_tree = existing.iter().any(|b| *b == candidate);
        let in_content = serialized
            .windows(candidate.len())
            .any(|window| window == candidate.as_bytes());

        if !in_tree && !in_content {
            return Ok(candidate);
        }
        trace!("Boundary collision on attempt {attempt}, regenerating");
    }

    Err(MimeError::BoundaryExhausted(MAX_BOUNDARY_ATTEMPTS))
}
