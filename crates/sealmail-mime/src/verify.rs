//! Verification of received `multipart/signed` messages
//!
//! The signed bytes are taken from the raw message, never from a
//! re-serialized tree: any transformation by the parser (charset decoding,
//! header unfolding) would break the digest.

use crate::error::{MimeError, Result};
use crate::part::{Body, MimePart};
use sealmail_cms::{SignatureResult, VerificationFailure, verify_detached};
use tracing::{debug, trace, warn};

/// Verify a raw `multipart/signed` message
///
/// Structural problems (not `multipart/signed`, missing boundary, fewer than
/// two parts) are reported as [`VerificationFailure::ParseError`].
pub fn verify_signed_message(raw: &[u8]) -> SignatureResult {
    debug!("Verifying signed message: {} bytes", raw.len());

    match extract_signed_parts(raw) {
        Ok((content, signature)) => {
            trace!(
                "Signed content {} bytes, signature {} bytes",
                content.len(),
                signature.len()
            );
            verify_detached(content, &signature)
        }
        Err(e) => {
            warn!("Signed message structure rejected: {e}");
            SignatureResult::Invalid {
                reason: VerificationFailure::ParseError,
                signer_certificate: None,
                signer_email: None,
            }
        }
    }
}

/// Split a signed message into the exact signed bytes and decoded signature
fn extract_signed_parts(raw: &[u8]) -> Result<(&[u8], Vec<u8>)> {
    let message = MimePart::parse(raw)?;

    let content_type = message.content_type();
    if !content_type.is("multipart/signed") {
        return Err(MimeError::Structure(format!(
            "expected multipart/signed, found {}",
            content_type.mime_type()
        )));
    }

    // Taken from the parsed tree so RFC 2231 continuations are joined
    let Body::Multipart(multipart) = message.body() else {
        return Err(MimeError::Structure(
            "multipart/signed without boundary".to_string(),
        ));
    };

    let parts = &multipart.parts;
    if parts.len() < 2 {
        return Err(MimeError::Structure(format!(
            "multipart/signed has {} parts",
            parts.len()
        )));
    }

    let signature = match parts[1].body() {
        Body::Bytes(bytes) if !bytes.is_empty() => bytes.clone(),
        _ => {
            return Err(MimeError::Structure(
                "signature part has no content".to_string(),
            ));
        }
    };

    let content = first_part_bytes(raw, &multipart.boundary)?;
    Ok((content, signature))
}

/// Raw bytes of the first body part
///
/// Starts after the line holding the first delimiter and ends before the
/// line break that precedes the next delimiter.
fn first_part_bytes<'a>(raw: &'a [u8], boundary: &str) -> Result<&'a [u8]> {
    let body_start = find_body_start(raw)
        .ok_or_else(|| MimeError::Structure("message has no body".to_string()))?;
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let opening = find_delimiter(raw, delimiter, body_start)
        .ok_or_else(|| MimeError::Structure("opening delimiter not found".to_string()))?;
    let content_start = raw[opening..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|pos| opening + pos + 1)
        .ok_or_else(|| MimeError::Structure("opening delimiter line unterminated".to_string()))?;

    let next = find_delimiter(raw, delimiter, content_start)
        .ok_or_else(|| MimeError::Structure("second delimiter not found".to_string()))?;

    // The line break before a delimiter belongs to the delimiter
    let content = &raw[content_start..next];
    let content = content
        .strip_suffix(b"\r\n")
        .or_else(|| content.strip_suffix(b"\n"))
        .unwrap_or(content);

    Ok(content)
}

/// Find the end of the header block, accepting CRLF or bare LF
fn find_body_start(raw: &[u8]) -> Option<usize> {
    let crlf = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4);
    let lf = raw.windows(2).position(|w| w == b"\n\n").map(|pos| pos + 2);

    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Next delimiter line at or after `from`
///
/// A delimiter must start a line and be followed by `--`, whitespace or the
/// end of the line, so boundary `b` does not match a line starting `--b1`.
fn find_delimiter(raw: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while pos + delimiter.len() <= raw.len() {
        let offset = raw[pos..]
            .windows(delimiter.len())
            .position(|w| w == delimiter)?;
        let start = pos + offset;
        let end = start + delimiter.len();

        let at_line_start = start == from || start == 0 || raw[start - 1] == b'\n';
        let terminated = match raw.get(end) {
            None => true,
            Some(b'\r' | b'\n' | b' ' | b'\t') => true,
            Some(b'-') => raw.get(end + 1) == Some(&b'-'),
            Some(_) => false,
        };

        if at_line_start && terminated {
            return Some(start);
        }
        pos = start + 1;
    }
    None
}
