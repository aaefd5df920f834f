//! Chunk planning
//!
//! A chunk is a contiguous byte range `[offset, offset + length)` of the
//! source object. Chunks exist only while a transfer runs; they are the unit
//! of progress, retry, and parallelism.

/// One contiguous byte range of the source object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: u32,
    pub offset: u64,
    pub length: u64,
}

impl Chunk {
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    pub fn range(&self) -> std::ops::Range<u64> {
        self.offset..self.end()
    }
}

/// Partition `bytes_total` into `ceil(bytes_total / chunk_size)` chunks, the
/// final one short. An empty object yields no chunks.
pub fn partition(bytes_total: u64, chunk_size: u64) -> Vec<Chunk> {
    if bytes_total == 0 || chunk_size == 0 {
        return Vec::new();
    }

    let count = bytes_total.div_ceil(chunk_size);
    (0..count)
        .map(|i| {
            let offset = i * chunk_size;
            Chunk {
                index: i as u32,
                offset,
                length: chunk_size.min(bytes_total - offset),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * MIB;

    #[test]
    fn two_gibibytes_in_ten_mib_chunks() {
        // ceil(2 * 1024 / 10) chunks for a 2 GiB object.
        let chunks = partition(2 * GIB, 10 * MIB);
        assert_eq!(chunks.len(), 205);
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[0].length, 10 * MIB);
        assert_eq!(chunks[204].length, 2 * GIB - 204 * 10 * MIB);
        assert_eq!(chunks.iter().map(|c| c.length).sum::<u64>(), 2 * GIB);
    }

    #[test]
    fn exact_multiple_has_no_short_tail() {
        let chunks = partition(40, 10);
        assert_eq!(chunks.len(), 4);
        assert!(chunks.iter().all(|c| c.length == 10));
    }

    #[test]
    fn short_tail_carries_the_remainder() {
        let chunks = partition(45, 10);
        assert_eq!(chunks.len(), 5);
        assert_eq!(chunks[4].length, 5);
        assert_eq!(chunks[4].offset, 40);
        assert_eq!(chunks[4].range(), 40..45);
    }

    #[test]
    fn empty_object_has_no_chunks() {
        assert!(partition(0, 10).is_empty());
    }

    #[test]
    fn object_smaller_than_chunk_is_one_chunk() {
        let chunks = partition(3, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].length, 3);
    }

    #[test]
    fn indices_are_contiguous() {
        let chunks = partition(100, 7);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index as usize, i);
        }
    }
}
