//! Signing identity lookup
//!
//! Platform key stores are abstracted behind [`SigningIdentityProvider`].
//! Keys are addressed by an opaque alias; a missing alias is `Ok(None)`,
//! while a store that cannot be read returns an error.

use crate::error::{Result, SmimeError};
use crate::key::{PrivateKey, SigningIdentity};
use std::collections::HashMap;
use std::fmt;
use x509_cert::Certificate;

/// Source of signing keys and certificate chains
pub trait SigningIdentityProvider {
    /// Private key stored under `alias`
    fn private_key(&self, alias: &str) -> Result<Option<PrivateKey>>;

    /// Certificate chain stored under `alias`, signer certificate first
    fn certificate_chain(&self, alias: &str) -> Result<Option<Vec<Certificate>>>;

    /// Load both halves of an identity
    ///
    /// Fails with [`SmimeError::KeyNotFound`] or
    /// [`SmimeError::CertificateChainNotFound`] when either is absent.
    fn signing_identity(&self, alias: &str) -> Result<SigningIdentity> {
        let key = self
            .private_key(alias)?
            .ok_or_else(|| SmimeError::KeyNotFound(alias.to_string()))?;
        let chain = self
            .certificate_chain(alias)?
            .ok_or_else(|| SmimeError::CertificateChainNotFound(alias.to_string()))?;

        SigningIdentity::new(key, chain)
    }
}

impl<T: SigningIdentityProvider + ?Sized> SigningIdentityProvider for &T {
    fn private_key(&self, alias: &str) -> Result<Option<PrivateKey>> {
        (**self).private_key(alias)
    }

    fn certificate_chain(&self, alias: &str) -> Result<Option<Vec<Certificate>>> {
        (**self).certificate_chain(alias)
    }
}

/// In-memory identity store keyed by alias
#[derive(Default)]
pub struct InMemoryIdentityStore {
    keys: HashMap<String, PrivateKey>,
    chains: HashMap<String, Vec<Certificate>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a key and chain under `alias`, replacing any previous entry
    pub fn insert(
        &mut self,
        alias: impl Into<String>,
        private_key: PrivateKey,
        certificate_chain: Vec<Certificate>,
    ) {
        let alias = alias.into();
        self.keys.insert(alias.clone(), private_key);
        self.chains.insert(alias, certificate_chain);
    }

    /// Store only a private key, leaving the chain absent
    pub fn insert_key(&mut self, alias: impl Into<String>, private_key: PrivateKey) {
        self.keys.insert(alias.into(), private_key);
    }

    /// Remove an alias, returning whether anything was stored under it
    pub fn remove(&mut self, alias: &str) -> bool {
        let had_key = self.keys.remove(alias).is_some();
        let had_chain = self.chains.remove(alias).is_some();
        had_key || had_chain
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.keys.contains_key(alias) || self.chains.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        let mut aliases: Vec<&String> = self.keys.keys().chain(self.chains.keys()).collect();
        aliases.sort();
        aliases.dedup();
        aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.chains.is_empty()
    }
}

impl SigningIdentityProvider for InMemoryIdentityStore {
    fn private_key(&self, alias: &str) -> Result<Option<PrivateKey>> {
        Ok(self.keys.get(alias).cloned())
    }

    fn certificate_chain(&self, alias: &str) -> Result<Option<Vec<Certificate>>> {
        Ok(self.chains.get(alias).cloned())
    }
}

impl fmt::Debug for InMemoryIdentityStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryIdentityStore")
            .field("aliases", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ed25519_key() -> PrivateKey {
        PrivateKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&[9u8; 32]))
    }

    #[test]
    fn test_missing_alias() {
        let store = InMemoryIdentityStore::new();
        assert!(store.private_key("nobody").unwrap().is_none());
        assert!(store.certificate_chain("nobody").unwrap().is_none());

        let err = store.signing_identity("nobody").unwrap_err();
        assert!(matches!(err, SmimeError::KeyNotFound(alias) if alias == "nobody"));
    }

    #[test]
    fn test_key_without_chain() {
        let mut store = InMemoryIdentityStore::new();
        store.insert_key("alice", ed25519_key());

        assert!(store.contains_alias("alice"));
        assert_eq!(store.len(), 1);

        let err = store.signing_identity("alice").unwrap_err();
        assert!(matches!(err, SmimeError::CertificateChainNotFound(_)));
    }

    #[test]
    fn test_empty_chain_surfaces() {
        let mut store = InMemoryIdentityStore::new();
        store.insert("alice", ed25519_key(), Vec::new());

        let err = store.signing_identity("alice").unwrap_err();
        assert!(matches!(err, SmimeError::EmptyCertificateChain));
    }

    #[test]
    fn test_remove() {
        let mut store = InMemoryIdentityStore::new();
        store.insert("alice", ed25519_key(), Vec::new());
        assert!(!store.is_empty());

        assert!(store.remove("alice"));
        assert!(!store.remove("alice"));
        assert!(store.is_empty());
    }
}
