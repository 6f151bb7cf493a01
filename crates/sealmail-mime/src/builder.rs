//! Outgoing message signing driven by configuration

use crate::config::SigningConfig;
use crate::error::Result;
use crate::packager::sign_message;
use crate::part::MimePart;
use sealmail_cms::SigningIdentityProvider;
use tracing::{debug, error};

/// Applies S/MIME signing to outgoing messages
///
/// Drafts are never signed. When signing is enabled and an alias is set, any
/// failure is returned to the caller rather than sending the message
/// unsigned.
#[derive(Debug, Clone)]
pub struct SmimeMessageBuilder<P> {
    config: SigningConfig,
    provider: P,
}

impl<P: SigningIdentityProvider> SmimeMessageBuilder<P> {
    pub fn new(config: SigningConfig, provider: P) -> Self {
        Self { config, provider }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    /// Sign `message` if the configuration asks for it
    pub fn build(&self, message: MimePart, is_draft: bool) -> Result<MimePart> {
        if is_draft {
            debug!("Skipping S/MIME signing for draft");
            return Ok(message);
        }
        let Some(alias) = self.config.active_alias() else {
            return Ok(message);
        };

        self.sign(message, alias).inspect_err(|e| {
            error!("S/MIME signing with alias '{alias}' failed: {e}");
        })
    }

    fn sign(&self, mut message: MimePart, alias: &str) -> Result<MimePart> {
        let identity = self.provider.signing_identity(alias)?;
        debug!(
            "Signing message with {} key for alias '{alias}'",
            identity.private_key().algorithm()
        );

        sign_message(&mut message, &identity)?;
        Ok(message)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::MimeError;
    use sealmail_cms::{InMemoryIdentityStore, SmimeError};
    use sealmail_test_utils::{KeyKind, identity};

    fn message() -> MimePart {
        let mut message = MimePart::leaf("text/plain", "Quarterly report\r\n");
        message.add_header("Subject", "Report");
        message
    }

    fn store() -> InMemoryIdentityStore {
        let identity = identity(KeyKind::P256);
        let mut store = InMemoryIdentityStore::new();
        store.insert(
            "work",
            identity.private_key().clone(),
            identity.certificate_chain().cloned().collect(),
        );
        store
    }

    #[test]
    fn test_disabled_leaves_message() {
        let builder = SmimeMessageBuilder::new(SigningConfig::default(), store());
        assert_eq!(builder.build(message(), false).unwrap(), message());
    }

    #[test]
    fn test_enabled_without_alias_leaves_message() {
        let config = SigningConfig {
            enabled: true,
            certificate_alias: None,
        };
        let builder = SmimeMessageBuilder::new(config, store());
        assert_eq!(builder.build(message(), false).unwrap(), message());
    }

    #[test]
    fn test_draft_is_not_signed() {
        let builder = SmimeMessageBuilder::new(SigningConfig::with_alias("work"), store());
        assert_eq!(builder.build(message(), true).unwrap(), message());
    }

    #[test]
    fn test_signs_when_configured() {
        let store = store();
        let builder = SmimeMessageBuilder::new(SigningConfig::with_alias("work"), &store);

        let signed = builder.build(message(), false).unwrap();
        assert!(signed.content_type().is("multipart/signed"));
        assert_eq!(signed.header("Subject"), Some("Report"));
        assert_eq!(signed.children().len(), 2);
    }

    #[test]
    fn test_unknown_alias_fails() {
        let builder = SmimeMessageBuilder::new(SigningConfig::with_alias("missing"), store());
        let err = builder.build(message(), false).unwrap_err();
        assert!(matches!(
            err,
            MimeError::Smime(SmimeError::KeyNotFound(ref alias)) if alias == "missing"
        ));
    }
}
