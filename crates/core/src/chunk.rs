//! Chunk geometry: how a declared file size maps onto fixed-size chunks.

use serde::{Deserialize, Serialize};

/// Geometry of a chunked upload: total size, chunk size, and derived counts.
///
/// All chunks have length `chunk_size` except possibly the last, which
/// carries the remainder. A file whose size is an exact multiple of the
/// chunk size has a full-length last chunk, never a zero-length one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkGeometry {
    declared_size: u64,
    chunk_size: u64,
}

impl ChunkGeometry {
    /// Create a geometry for `declared_size` bytes split into `chunk_size` chunks.
    ///
    /// Both sizes must be positive.
    pub fn new(declared_size: u64, chunk_size: u64) -> crate::Result<Self> {
        if declared_size == 0 || chunk_size == 0 {
            return Err(crate::Error::InvalidChunkGeometry {
                declared_size,
                chunk_size,
            });
        }
        Ok(Self {
            declared_size,
            chunk_size,
        })
    }

    /// Total declared size in bytes.
    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    /// Chunk size in bytes.
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Number of chunks: `ceil(declared_size / chunk_size)`, always >= 1.
    pub fn total_chunks(&self) -> u64 {
        self.declared_size.div_ceil(self.chunk_size)
    }

    /// Check that `index` addresses a valid chunk.
    pub fn contains_index(&self, index: u64) -> bool {
        index < self.total_chunks()
    }

    /// Expected byte length of the chunk at `index`.
    ///
    /// Returns `None` for out-of-range indices.
    pub fn expected_len(&self, index: u64) -> Option<u64> {
        let total = self.total_chunks();
        if index >= total {
            return None;
        }
        if index == total - 1 {
            Some(self.declared_size - (total - 1) * self.chunk_size)
        } else {
            Some(self.chunk_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sizes() {
        assert!(ChunkGeometry::new(0, 4).is_err());
        assert!(ChunkGeometry::new(4, 0).is_err());
    }

    #[test]
    fn single_byte_file_one_chunk() {
        let geo = ChunkGeometry::new(1, 1024 * 1024).unwrap();
        assert_eq!(geo.total_chunks(), 1);
        assert_eq!(geo.expected_len(0), Some(1));
    }

    #[test]
    fn exact_multiple_keeps_full_last_chunk() {
        let geo = ChunkGeometry::new(8, 4).unwrap();
        assert_eq!(geo.total_chunks(), 2);
        assert_eq!(geo.expected_len(0), Some(4));
        assert_eq!(geo.expected_len(1), Some(4));
    }

    #[test]
    fn remainder_goes_to_last_chunk() {
        let geo = ChunkGeometry::new(11, 4).unwrap();
        assert_eq!(geo.total_chunks(), 3);
        assert_eq!(geo.expected_len(0), Some(4));
        assert_eq!(geo.expected_len(1), Some(4));
        assert_eq!(geo.expected_len(2), Some(3));
    }

    #[test]
    fn out_of_range_index() {
        let geo = ChunkGeometry::new(11, 4).unwrap();
        assert!(!geo.contains_index(3));
        assert_eq!(geo.expected_len(3), None);
    }

    #[test]
    fn chunk_lengths_sum_to_declared_size() {
        for (size, chunk) in [(1u64, 7u64), (7, 7), (8, 7), (100, 9), (1024, 128)] {
            let geo = ChunkGeometry::new(size, chunk).unwrap();
            let sum: u64 = (0..geo.total_chunks())
                .map(|i| geo.expected_len(i).unwrap())
                .sum();
            assert_eq!(sum, size);
        }
    }
}
