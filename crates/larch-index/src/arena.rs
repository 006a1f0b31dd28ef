//! Append-only arena allocator over a reserve/commit backing.

use crate::blob::Blob;
use crate::reserve::ReserveBacking;
use larch_common::Result;

/// Append-only byte arena.
///
/// Hands out monotonically increasing byte ranges as [`Blob`] references,
/// committing backing memory on demand. There is no free, resize, or
/// shrink: bytes keep their offset for the life of the arena, which is
/// what keeps every blob held by the index tree valid. Bytes a node no
/// longer references are simply left behind; reclaiming them belongs to
/// an external compaction tier, not this core.
pub struct Arena {
    backing: Box<dyn ReserveBacking>,
    /// Bytes logically allocated. Monotonic.
    size: usize,
}

impl Arena {
    /// Creates an empty arena over the given backing.
    pub fn new(backing: Box<dyn ReserveBacking>) -> Self {
        Self { backing, size: 0 }
    }

    /// Bytes allocated so far.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes with committed backing memory. Always `>= size()`.
    #[inline]
    pub fn committed(&self) -> usize {
        self.backing.committed()
    }

    /// Total reserved capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.backing.capacity()
    }

    /// Allocates the next `len` bytes and returns a blob for the range.
    ///
    /// Commit grows in whole chunks to cover the request before `size`
    /// advances, so the returned range is immediately writable.
    pub fn alloc(&mut self, len: usize) -> Result<Blob> {
        let end = self.size + len;
        self.backing.commit(end)?;
        let blob = Blob::new(self.size as u32, len as u32);
        self.size = end;
        Ok(blob)
    }

    /// Copies `data` into the arena and returns a blob for the copy.
    pub fn append(&mut self, data: &[u8]) -> Result<Blob> {
        let blob = self.alloc(data.len())?;
        self.backing
            .bytes_mut(blob.offset as usize, blob.len())
            .copy_from_slice(data);
        Ok(blob)
    }

    /// The bytes a blob refers to, read in place with no copy.
    #[inline]
    pub fn bytes(&self, blob: Blob) -> &[u8] {
        self.backing.bytes(blob.offset as usize, blob.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reserve::HeapReservation;
    use larch_common::LarchError;

    fn arena(capacity: usize, chunk: usize) -> Arena {
        Arena::new(Box::new(HeapReservation::new(capacity, chunk)))
    }

    #[test]
    fn test_append_then_read() {
        let mut arena = arena(1 << 16, 4096);
        let blob = arena.append(b"hello").unwrap();
        assert_eq!(blob.offset, 0);
        assert_eq!(blob.len(), 5);
        assert_eq!(arena.bytes(blob), b"hello");
    }

    #[test]
    fn test_offsets_are_monotonic() {
        let mut arena = arena(1 << 16, 4096);
        let a = arena.append(b"aaa").unwrap();
        let b = arena.append(b"bb").unwrap();
        let c = arena.append(b"cccc").unwrap();

        assert_eq!(a.offset, 0);
        assert_eq!(b.offset as usize, a.end());
        assert_eq!(c.offset as usize, b.end());
        assert_eq!(arena.size(), 9);

        // Earlier blobs stay intact as the arena grows.
        assert_eq!(arena.bytes(a), b"aaa");
        assert_eq!(arena.bytes(b), b"bb");
    }

    #[test]
    fn test_committed_covers_size() {
        let mut arena = arena(1 << 20, 4096);
        for _ in 0..100 {
            arena.append(&[0xab; 100]).unwrap();
            assert!(arena.committed() >= arena.size());
            assert_eq!(arena.committed() % 4096, 0);
        }
    }

    #[test]
    fn test_alloc_zero_length() {
        let mut arena = arena(1 << 16, 4096);
        arena.append(b"x").unwrap();
        let empty = arena.alloc(0).unwrap();
        assert!(empty.is_empty());
        assert_eq!(arena.bytes(empty), b"");
        assert_eq!(arena.size(), 1);
    }

    #[test]
    fn test_exhaustion_is_typed() {
        let mut arena = arena(8192, 4096);
        arena.append(&[0u8; 8000]).unwrap();
        let err = arena.append(&[0u8; 500]).unwrap_err();
        assert!(matches!(err, LarchError::ArenaExhausted { .. }));
        // Size never advances past a failed allocation.
        assert_eq!(arena.size(), 8000);
    }
}
