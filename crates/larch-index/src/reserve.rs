//! Reserve/commit memory backends for the arena.
//!
//! The arena pre-claims a fixed span of address space so that blob offsets
//! stay valid 32-bit positions for the life of the process, and commits
//! physical memory in fixed chunks as data is appended. The backend sits
//! behind a trait so the arena, blob, and tree logic never touch the
//! virtual memory calls directly, and tests can run on a plain heap buffer.

use larch_common::{LarchError, Result};
use tracing::debug;

/// Trait for arena memory backends.
///
/// A backing reserves a fixed capacity at construction and commits it in
/// whole chunk steps. Committed bytes are readable and writable, and their
/// offsets are stable for the life of the backing. There is no decommit.
pub trait ReserveBacking {
    /// Total reserved capacity in bytes.
    fn capacity(&self) -> usize;

    /// Bytes currently committed. Always a whole number of chunks except
    /// possibly the final step up to `capacity`.
    fn committed(&self) -> usize;

    /// Grows the committed region to cover at least `min_bytes`.
    ///
    /// Growth rounds up to whole chunks. Requests beyond the reserved
    /// capacity fail with [`LarchError::ArenaExhausted`].
    fn commit(&mut self, min_bytes: usize) -> Result<()>;

    /// Read access to a committed range.
    fn bytes(&self, offset: usize, len: usize) -> &[u8];

    /// Write access to a committed range.
    fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8];
}

/// Rounds `min_bytes` up to a whole number of chunks, capped at `capacity`.
fn round_to_chunk(min_bytes: usize, chunk: usize, capacity: usize) -> usize {
    (min_bytes.div_ceil(chunk) * chunk).min(capacity)
}

// =============================================================================
// Virtual memory backing (unix)
// =============================================================================

/// Virtual memory reservation.
///
/// Maps the full capacity with no access rights up front (`PROT_NONE`,
/// `MAP_NORESERVE`), then raises protection to read/write chunk by chunk
/// as commit grows. The base address is fixed once the mapping exists,
/// which is what guarantees offset stability without any realloc.
#[cfg(unix)]
pub struct VmemReservation {
    base: *mut u8,
    capacity: usize,
    committed: usize,
    chunk: usize,
}

#[cfg(unix)]
impl VmemReservation {
    /// Reserves `capacity` bytes of address space with no backing memory.
    ///
    /// `chunk` is the commit granularity and must be a multiple of the OS
    /// page size.
    pub fn new(capacity: usize, chunk: usize) -> Result<Self> {
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                capacity,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(LarchError::ReserveFailed {
                capacity,
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        debug!(capacity, chunk, "reserved arena address space");
        Ok(Self {
            base: base as *mut u8,
            capacity,
            committed: 0,
            chunk,
        })
    }
}

#[cfg(unix)]
impl ReserveBacking for VmemReservation {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn committed(&self) -> usize {
        self.committed
    }

    fn commit(&mut self, min_bytes: usize) -> Result<()> {
        if min_bytes <= self.committed {
            return Ok(());
        }
        if min_bytes > self.capacity {
            return Err(LarchError::ArenaExhausted {
                requested: min_bytes,
                capacity: self.capacity,
            });
        }

        let target = round_to_chunk(min_bytes, self.chunk, self.capacity);
        let grow = target - self.committed;
        let rc = unsafe {
            libc::mprotect(
                self.base.add(self.committed) as *mut libc::c_void,
                grow,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if rc != 0 {
            return Err(LarchError::CommitFailed {
                committed: self.committed,
                requested: target,
                reason: std::io::Error::last_os_error().to_string(),
            });
        }
        debug!(from = self.committed, to = target, "grew arena commit");
        self.committed = target;
        Ok(())
    }

    fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        debug_assert!(offset + len <= self.committed);
        unsafe { std::slice::from_raw_parts(self.base.add(offset), len) }
    }

    fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        debug_assert!(offset + len <= self.committed);
        unsafe { std::slice::from_raw_parts_mut(self.base.add(offset), len) }
    }
}

#[cfg(unix)]
impl Drop for VmemReservation {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.capacity);
        }
    }
}

// =============================================================================
// Heap backing (portable)
// =============================================================================

/// Heap-backed reservation.
///
/// A growable buffer with the same chunked commit accounting as the
/// virtual memory backing. The buffer may reallocate as it grows, but all
/// access goes through byte offsets, so blob references stay valid.
pub struct HeapReservation {
    buf: Vec<u8>,
    capacity: usize,
    chunk: usize,
}

impl HeapReservation {
    /// Creates a heap reservation of `capacity` bytes, committed in
    /// `chunk` steps.
    pub fn new(capacity: usize, chunk: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity,
            chunk,
        }
    }
}

impl ReserveBacking for HeapReservation {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn committed(&self) -> usize {
        self.buf.len()
    }

    fn commit(&mut self, min_bytes: usize) -> Result<()> {
        if min_bytes <= self.buf.len() {
            return Ok(());
        }
        if min_bytes > self.capacity {
            return Err(LarchError::ArenaExhausted {
                requested: min_bytes,
                capacity: self.capacity,
            });
        }
        let target = round_to_chunk(min_bytes, self.chunk, self.capacity);
        self.buf.resize(target, 0);
        debug!(to = target, "grew heap arena commit");
        Ok(())
    }

    fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.buf[offset..offset + len]
    }

    fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        &mut self.buf[offset..offset + len]
    }
}
