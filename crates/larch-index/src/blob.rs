//! Blob references into the arena.

use serde::{Deserialize, Serialize};

/// A byte range inside the arena: the unit of indirection for both keys
/// and values.
///
/// A blob is valid only against the arena that produced it. The arena
/// never moves or mutates bytes once written, so the (offset, size) pair
/// stays valid for the life of the process. An update to a key's value
/// writes a new blob and repoints the node; old bytes are left in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blob {
    /// Byte offset from the start of the arena.
    pub offset: u32,
    /// Length of the range in bytes.
    pub size: u32,
}

impl Blob {
    /// The empty blob: a zero-length range at offset 0.
    pub const EMPTY: Blob = Blob { offset: 0, size: 0 };

    /// Creates a new blob reference.
    pub fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    /// Returns the length of the range in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.size as usize
    }

    /// Returns true for a zero-length range.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the offset one past the end of the range.
    #[inline]
    pub fn end(&self) -> usize {
        self.offset as usize + self.size as usize
    }
}

impl std::fmt::Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.offset, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_new() {
        let blob = Blob::new(128, 16);
        assert_eq!(blob.offset, 128);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob.end(), 144);
        assert!(!blob.is_empty());
    }

    #[test]
    fn test_blob_empty() {
        assert!(Blob::EMPTY.is_empty());
        assert_eq!(Blob::EMPTY.len(), 0);
        assert_eq!(Blob::EMPTY.end(), 0);
    }

    #[test]
    fn test_blob_display() {
        assert_eq!(Blob::new(4096, 32).to_string(), "4096+32");
    }
}
