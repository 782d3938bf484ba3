//! Streaming content digests.

use sha2::{Digest, Sha256};

/// Incremental SHA-256 digest over a document's canonical bytes.
///
/// Fed chunk-by-chunk as the payload streams through the gateway, so the
/// payload never has to be materialized just for hashing.
#[derive(Default, Debug)]
pub struct ContentDigest {
    hasher: Sha256,
}

impl ContentDigest {
    /// Create a fresh digest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of canonical bytes.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Finish and render the digest in its canonical `sha256:<hex>` form.
    pub fn finalize(self) -> String {
        format!("sha256:{}", hex::encode(self.hasher.finalize()))
    }

    /// Digest a payload already held in memory.
    pub fn of(data: &[u8]) -> String {
        let mut digest = Self::new();
        digest.update(data);
        digest.finalize()
    }
}
