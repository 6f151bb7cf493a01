//! Per-protocol encryption extractors
//!
//! Each extractor recognises one encryption protocol. The composite asks its
//! extractors in registration order and reports the first match.

use crate::detect::SmimeEncryptionDetector;
use crate::part::MimePart;
use tracing::debug;

/// Protocol name reported for S/MIME encrypted messages
pub const SMIME_PROTOCOL: &str = "smime";

/// Encryption found on a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResult {
    pub protocol: String,
    /// Protocol-specific metadata
    pub metadata: i64,
}

pub trait EncryptionExtractor: Send + Sync {
    /// Inspect `message`, returning `None` when this protocol is not present
    fn extract_encryption(&self, message: &MimePart) -> Option<EncryptionResult>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SmimeEncryptionExtractor {
    detector: SmimeEncryptionDetector,
}

impl SmimeEncryptionExtractor {
    pub const fn new() -> Self {
        Self {
            detector: SmimeEncryptionDetector::new(),
        }
    }
}

impl EncryptionExtractor for SmimeEncryptionExtractor {
    fn extract_encryption(&self, message: &MimePart) -> Option<EncryptionResult> {
        self.detector
            .is_encrypted(message)
            .then(|| EncryptionResult {
                protocol: SMIME_PROTOCOL.to_string(),
                metadata: 0,
            })
    }
}

/// Ordered chain of extractors; the first `Some` wins
#[derive(Default)]
pub struct CompositeEncryptionExtractor {
    extractors: Vec<Box<dyn EncryptionExtractor>>,
}

impl CompositeEncryptionExtractor {
    pub fn new(extractors: Vec<Box<dyn EncryptionExtractor>>) -> Self {
        Self { extractors }
    }

    /// Append an extractor after those already registered
    #[must_use]
    pub fn with(mut self, extractor: impl EncryptionExtractor + 'static) -> Self {
        self.extractors.push(Box::new(extractor));
        self
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl EncryptionExtractor for CompositeEncryptionExtractor {
    fn extract_encryption(&self, message: &MimePart) -> Option<EncryptionResult> {
        let result = self
            .extractors
            .iter()
            .find_map(|extractor| extractor.extract_encryption(message));

        if let Some(found) = &result {
            debug!("Message encrypted with {}", found.protocol);
        }
        result
    }
}

impl std::fmt::Debug for CompositeEncryptionExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEncryptionExtractor")
            .field("extractors", &self.extractors.len())
            .finish()
    }
}
