//! Correlation identifiers attached to requests and echoed on replies.
//!
//! An id is `hex(blake3(instance_nonce || sequence_le))[..32]`. The nonce is
//! drawn once per generator, so two gateways sharing a reply topic never
//! hand out the same id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::RngCore;

/// Hex characters kept from the hash.
const ID_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Parse correlation data received from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        if text.is_empty() {
            return None;
        }
        Some(Self(text.to_string()))
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub struct CorrelationIdGenerator {
    nonce: [u8; 16],
    sequence: AtomicU64,
}

impl CorrelationIdGenerator {
    pub fn new() -> Self {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self {
            nonce,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn next_id(&self) -> CorrelationId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut h = blake3::Hasher::new();
        h.update(&self.nonce);
        h.update(&seq.to_le_bytes());
        let mut id = hex::encode(h.finalize().as_bytes());
        id.truncate(ID_LEN);
        CorrelationId(id)
    }
}

impl Default for CorrelationIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
