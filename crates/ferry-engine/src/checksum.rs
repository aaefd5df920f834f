//! Chunk-combined SHA-256
//!
//! Every strategy produces the same checksum for the same bytes and chunk
//! size: SHA-256 per chunk-size-aligned segment, digests concatenated in
//! index order, and a final SHA-256 over the concatenation. A single-stream
//! transfer that keeps no chunk accounting therefore agrees with a parallel
//! transfer whose workers finished in arbitrary order.

use sha2::{Digest, Sha256};

/// Rolling hasher that segments its input at chunk boundaries.
pub struct ChunkedSha256 {
    chunk_size: u64,
    current: Sha256,
    current_len: u64,
    digests: Vec<[u8; 32]>,
}

impl ChunkedSha256 {
    pub fn new(chunk_size: u64) -> Self {
        ChunkedSha256 {
            chunk_size: chunk_size.max(1),
            current: Sha256::new(),
            current_len: 0,
            digests: Vec::new(),
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            let remaining = (self.chunk_size - self.current_len) as usize;
            let take = remaining.min(data.len());
            self.current.update(&data[..take]);
            self.current_len += take as u64;
            data = &data[take..];

            if self.current_len == self.chunk_size {
                let digest = std::mem::replace(&mut self.current, Sha256::new()).finalize();
                self.digests.push(digest.into());
                self.current_len = 0;
            }
        }
    }

    pub fn finalize(mut self) -> String {
        if self.current_len > 0 {
            let digest = self.current.finalize();
            self.digests.push(digest.into());
        }
        combine_digests(&self.digests)
    }
}

/// SHA-256 of one complete chunk.
pub fn digest_chunk(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Combine per-chunk digests in index order into the overall checksum.
pub fn combine_digests(digests: &[[u8; 32]]) -> String {
    let mut combiner = Sha256::new();
    for digest in digests {
        combiner.update(digest);
    }
    hex::encode(combiner.finalize())
}
