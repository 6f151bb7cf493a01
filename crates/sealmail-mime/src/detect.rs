//! S/MIME encryption detection

use crate::part::MimePart;
use tracing::trace;

const PKCS7_MIME: &str = "application/pkcs7-mime";

/// Finds `application/pkcs7-mime` parts carrying encrypted content
///
/// A part matches when its `smime-type` is `enveloped-data` or
/// `authenveloped-data`. A missing `smime-type` also matches, since older
/// clients omit it on encrypted messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmimeEncryptionDetector;

impl SmimeEncryptionDetector {
    pub const fn new() -> Self {
        Self
    }

    /// Depth-first search of `part` and all of its descendants
    pub fn is_encrypted(&self, part: &MimePart) -> bool {
        if is_encrypted_part(part) {
            trace!("Found S/MIME encrypted part");
            return true;
        }
        part.children().iter().any(|child| self.is_encrypted(child))
    }
}

fn is_encrypted_part(part: &MimePart) -> bool {
    let content_type = part.content_type();
    if !content_type.is(PKCS7_MIME) {
        return false;
    }

    match content_type.param("smime-type") {
        None => true,
        Some(smime_type) => {
            smime_type.eq_ignore_ascii_case("enveloped-data")
                || smime_type.eq_ignore_ascii_case("authenveloped-data")
        }
    }
}
