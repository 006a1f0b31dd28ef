//! Sizing constants for the index tree.

/// Maximum number of node slots in one tree.
///
/// Nodes are addressed by 16-bit ids with id 0 reserved as the null
/// sentinel. Slots are never reclaimed (removal only tombstones), so this
/// bounds the number of distinct keys a tree can ever index.
pub const MAX_NODE_SLOTS: usize = u16::MAX as usize - 1;
