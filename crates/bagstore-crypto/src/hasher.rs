use bagstore_types::ContentHash;

/// BLAKE3 content hasher.
///
/// The digest is taken over the raw object bytes with no framing, so any
/// party holding the bytes (client, peer, this node) arrives at the same
/// [`ContentHash`].
pub struct ContentHasher;

impl ContentHasher {
    /// Hash a complete buffer.
    pub fn hash(data: &[u8]) -> ContentHash {
        ContentHash::from_bytes(data)
    }

    /// Verify that data produces the expected content hash.
    pub fn verify(data: &[u8], expected: &ContentHash) -> bool {
        Self::hash(data) == *expected
    }

    /// Start an incremental hash for data that arrives in chunks.
    pub fn streaming() -> StreamingHasher {
        StreamingHasher::new()
    }
}

/// Incremental hasher that also counts bytes.
#[derive(Clone, Default)]
pub struct StreamingHasher {
    inner: blake3::Hasher,
    len: u64,
}

impl StreamingHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk.
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.len += chunk.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish and return the digest together with the total length.
    pub fn finalize(&self) -> (ContentHash, u64) {
        (
            ContentHash::from_digest(*self.inner.finalize().as_bytes()),
            self.len,
        )
    }
}

impl std::fmt::Debug for StreamingHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingHasher").field("len", &self.len).finish()
    }
}
