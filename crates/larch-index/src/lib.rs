//! In-memory indexing core for LarchDB.
//!
//! This crate provides:
//! - Reserve/commit memory backends for the append-only arena
//! - Arena allocator handing out stable (offset, length) blob references
//! - Height-balanced index tree addressed by 16-bit node ids
//! - Store facade composing the arena with the tree
//!
//! The defining constraint ties the pieces together: tree nodes reference
//! their keys and values as blobs into the arena, and those references stay
//! valid only because the arena never moves, frees, or mutates bytes once
//! written. Everything here is single-writer and synchronous; callers in a
//! concurrent context must serialize externally.

mod arena;
mod blob;
mod constants;
mod reserve;
mod store;
mod tree;

pub use arena::Arena;
pub use blob::Blob;
pub use constants::MAX_NODE_SLOTS;
#[cfg(unix)]
pub use reserve::VmemReservation;
pub use reserve::{HeapReservation, ReserveBacking};
pub use store::{Lookup, Store};
pub use tree::{compare_keys, IndexTree, Iter, NodeId, SearchResult};
