//! Height-balanced index tree over arena blob references.
//!
//! Nodes live in a flat array addressed by 16-bit [`NodeId`] handles; slot
//! 0 is a reserved null sentinel and never a live node. Keys and values
//! are [`Blob`] references, so every comparison dereferences the arena.
//! Slots are allocated by insertion and never reclaimed: removal only
//! tombstones a node, and a later put of the same key revives the slot in
//! place. The tree shape therefore only ever changes on structural
//! inserts, which is the one path that rebalances.

use crate::arena::Arena;
use crate::blob::Blob;
use crate::constants::MAX_NODE_SLOTS;
use larch_common::{LarchError, Result};
use std::cmp::Ordering;

/// Handle to a node slot. Slot 0 is the null sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u16);

impl NodeId {
    /// The null sentinel: no such node.
    pub const NULL: NodeId = NodeId(0);

    /// Returns true for the null sentinel.
    #[inline]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One node slot.
#[derive(Debug, Clone, Copy)]
struct Node {
    key: Blob,
    val: Blob,
    parent: NodeId,
    left: NodeId,
    right: NodeId,
    /// Height of the subtree rooted here; a leaf is 1, a null child 0.
    height: i16,
    /// Tombstone: key logically deleted, slot and tree shape intact.
    deleted: bool,
}

/// Outcome of a point lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchResult {
    /// Key present and live.
    Found(NodeId),
    /// Key present but tombstoned. Not a miss: callers must not fall
    /// through to a backing tier for a tombstoned key.
    Tombstone(NodeId),
    /// Descent reached a null child; the key was never indexed here.
    Missing,
}

/// Where a descent for a key ended up.
enum Descent {
    /// A node with exactly this key.
    Found(NodeId),
    /// A null child under `parent`; `left` tells which side.
    Vacant { parent: NodeId, left: bool },
    /// The tree has no root yet.
    Empty,
}

/// Key comparison using a u64 prefix for 8+ byte keys.
///
/// Falls back to slice comparison for shorter keys or when the prefix
/// matches. Equivalent to byte-lexicographic unsigned ordering with the
/// shorter key ranking first on a prefix tie.
#[inline(always)]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    if a.len() >= 8 && b.len() >= 8 {
        let a_prefix = u64::from_be_bytes([a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7]]);
        let b_prefix = u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
        if a_prefix != b_prefix {
            return a_prefix.cmp(&b_prefix);
        }
        if a.len() == 8 && b.len() == 8 {
            return Ordering::Equal;
        }
    }
    a.cmp(b)
}

/// Height-balanced binary search tree with tombstone deletes.
pub struct IndexTree {
    /// Node slots; slot 0 is the reserved sentinel.
    nodes: Vec<Node>,
    root: NodeId,
}

impl IndexTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        let sentinel = Node {
            key: Blob::EMPTY,
            val: Blob::EMPTY,
            parent: NodeId::NULL,
            left: NodeId::NULL,
            right: NodeId::NULL,
            height: 0,
            deleted: false,
        };
        Self {
            nodes: vec![sentinel],
            root: NodeId::NULL,
        }
    }

    /// Number of node slots ever allocated. Tombstones count; the live
    /// entry count is [`live_len`](Self::live_len).
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Returns true when no slot has ever been allocated.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live (non-tombstoned) entries. Derived, not stored.
    pub fn live_len(&self) -> usize {
        self.nodes[1..].iter().filter(|n| !n.deleted).count()
    }

    /// The root node, or the null sentinel for an empty tree.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Height of the whole tree (0 when empty).
    #[inline]
    pub fn height(&self) -> i16 {
        self.height_of(self.root)
    }

    /// Key blob stored at a node.
    #[inline]
    pub fn key(&self, id: NodeId) -> Blob {
        self.node(id).key
    }

    /// Value blob stored at a node.
    #[inline]
    pub fn value(&self, id: NodeId) -> Blob {
        self.node(id).val
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Inserts `key` or overwrites an existing node with the same key
    /// bytes.
    ///
    /// An overwrite clears the tombstone and repoints the value blob
    /// without touching tree shape, so it never rebalances. A structural
    /// insert allocates a trailing slot and rebalances up from the
    /// insertion point.
    pub fn put(&mut self, arena: &Arena, key: Blob, val: Blob) -> Result<NodeId> {
        match self.descend(arena, arena.bytes(key)) {
            Descent::Found(id) => {
                let node = self.node_mut(id);
                node.val = val;
                node.deleted = false;
                Ok(id)
            }
            Descent::Vacant { parent, left } => {
                let id = self.alloc_node(key, val, parent)?;
                if left {
                    self.node_mut(parent).left = id;
                } else {
                    self.node_mut(parent).right = id;
                }
                self.rebalance(parent);
                Ok(id)
            }
            Descent::Empty => {
                let id = self.alloc_node(key, val, NodeId::NULL)?;
                self.root = id;
                Ok(id)
            }
        }
    }

    /// Tombstones `key`, inserting a placeholder node when the key was
    /// never indexed.
    ///
    /// Tombstoning changes no subtree height, so this never rebalances;
    /// the placeholder insert path rebalances exactly like `put`.
    pub fn remove(&mut self, arena: &Arena, key: Blob) -> Result<NodeId> {
        let id = match self.descend(arena, arena.bytes(key)) {
            Descent::Found(id) => id,
            Descent::Vacant { parent, left } => {
                let id = self.alloc_node(key, Blob::EMPTY, parent)?;
                if left {
                    self.node_mut(parent).left = id;
                } else {
                    self.node_mut(parent).right = id;
                }
                self.rebalance(parent);
                id
            }
            Descent::Empty => {
                let id = self.alloc_node(key, Blob::EMPTY, NodeId::NULL)?;
                self.root = id;
                id
            }
        };
        self.node_mut(id).deleted = true;
        Ok(id)
    }

    /// Point lookup. Caller key bytes are compared in place; they are
    /// never copied into the arena.
    pub fn get(&self, arena: &Arena, key: &[u8]) -> SearchResult {
        match self.descend(arena, key) {
            Descent::Found(id) if self.node(id).deleted => SearchResult::Tombstone(id),
            Descent::Found(id) => SearchResult::Found(id),
            _ => SearchResult::Missing,
        }
    }

    /// In-order iterator over live entries as (key, value) blob pairs,
    /// ascending by key bytes.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    // =========================================================================
    // Node plumbing
    // =========================================================================

    #[inline]
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    #[inline]
    fn height_of(&self, id: NodeId) -> i16 {
        if id.is_null() {
            0
        } else {
            self.node(id).height
        }
    }

    #[inline]
    fn balance_factor(&self, id: NodeId) -> i16 {
        let node = self.node(id);
        self.height_of(node.left) - self.height_of(node.right)
    }

    #[inline]
    fn update_height(&mut self, id: NodeId) {
        let node = self.node(id);
        let h = 1 + self.height_of(node.left).max(self.height_of(node.right));
        self.node_mut(id).height = h;
    }

    fn alloc_node(&mut self, key: Blob, val: Blob, parent: NodeId) -> Result<NodeId> {
        if self.len() >= MAX_NODE_SLOTS {
            return Err(LarchError::IndexFull {
                capacity: MAX_NODE_SLOTS,
            });
        }
        let id = NodeId(self.nodes.len() as u16);
        self.nodes.push(Node {
            key,
            val,
            parent,
            left: NodeId::NULL,
            right: NodeId::NULL,
            height: 1,
            deleted: false,
        });
        Ok(id)
    }

    fn descend(&self, arena: &Arena, key: &[u8]) -> Descent {
        if self.root.is_null() {
            return Descent::Empty;
        }
        let mut cur = self.root;
        loop {
            let node = self.node(cur);
            match compare_keys(key, arena.bytes(node.key)) {
                Ordering::Equal => return Descent::Found(cur),
                Ordering::Less => {
                    if node.left.is_null() {
                        return Descent::Vacant {
                            parent: cur,
                            left: true,
                        };
                    }
                    cur = node.left;
                }
                Ordering::Greater => {
                    if node.right.is_null() {
                        return Descent::Vacant {
                            parent: cur,
                            left: false,
                        };
                    }
                    cur = node.right;
                }
            }
        }
    }

    // =========================================================================
    // Rebalancing
    // =========================================================================

    /// Climbs from `from` toward the root restoring the AVL invariant.
    ///
    /// At each ancestor: recompute height, check the balance factor,
    /// rotate when it hits ±2 (double rotation when the heavy child leans
    /// the other way). Stops once a step leaves the subtree height
    /// unchanged: the tree above is then already balanced and unaffected.
    fn rebalance(&mut self, from: NodeId) {
        let mut cur = from;
        while !cur.is_null() {
            let before = self.node(cur).height;
            self.update_height(cur);

            let bf = self.balance_factor(cur);
            let top = if bf > 1 {
                let left = self.node(cur).left;
                if self.balance_factor(left) < 0 {
                    self.rotate_left(left);
                }
                self.rotate_right(cur)
            } else if bf < -1 {
                let right = self.node(cur).right;
                if self.balance_factor(right) > 0 {
                    self.rotate_right(right);
                }
                self.rotate_left(cur)
            } else {
                cur
            };

            if self.node(top).height == before {
                break;
            }
            cur = self.node(top).parent;
        }
    }

    /// Rotates `i` down to the left; its right child takes its place.
    /// Returns the new subtree root.
    fn rotate_left(&mut self, i: NodeId) -> NodeId {
        let r = self.node(i).right;
        debug_assert!(!r.is_null());
        let inner = self.node(r).left;
        let grand = self.node(i).parent;

        // The child's inner subtree moves to the parent's far side.
        self.node_mut(i).right = inner;
        if !inner.is_null() {
            self.node_mut(inner).parent = i;
        }

        self.node_mut(r).left = i;
        self.node_mut(i).parent = r;
        self.node_mut(r).parent = grand;

        // Retarget whichever pointer used to reach `i`; for the sentinel
        // grandparent that is the root pointer itself.
        if grand.is_null() {
            self.root = r;
        } else if self.node(grand).left == i {
            self.node_mut(grand).left = r;
        } else {
            self.node_mut(grand).right = r;
        }

        // Old parent first: the new root's height depends on it.
        self.update_height(i);
        self.update_height(r);
        r
    }

    /// Rotates `i` down to the right; its left child takes its place.
    /// Returns the new subtree root.
    fn rotate_right(&mut self, i: NodeId) -> NodeId {
        let l = self.node(i).left;
        debug_assert!(!l.is_null());
        let inner = self.node(l).right;
        let grand = self.node(i).parent;

        self.node_mut(i).left = inner;
        if !inner.is_null() {
            self.node_mut(inner).parent = i;
        }

        self.node_mut(l).right = i;
        self.node_mut(i).parent = l;
        self.node_mut(l).parent = grand;

        if grand.is_null() {
            self.root = l;
        } else if self.node(grand).left == i {
            self.node_mut(grand).left = l;
        } else {
            self.node_mut(grand).right = l;
        }

        self.update_height(i);
        self.update_height(l);
        l
    }

    // =========================================================================
    // Invariant checks (for tests)
    // =========================================================================

    /// Verifies the height, balance, order, and count invariants over the
    /// reachable tree. Panics on the first violation. For tests.
    pub fn check_invariants(&self, arena: &Arena) {
        let mut count = 0usize;
        let mut last: Option<Vec<u8>> = None;
        self.check_subtree(arena, self.root, NodeId::NULL, &mut count, &mut last);
        assert_eq!(
            count,
            self.len(),
            "reachable nodes must equal allocated slots"
        );
    }

    fn check_subtree(
        &self,
        arena: &Arena,
        id: NodeId,
        parent: NodeId,
        count: &mut usize,
        last: &mut Option<Vec<u8>>,
    ) -> i16 {
        if id.is_null() {
            return 0;
        }
        let node = self.node(id);
        assert_eq!(node.parent, parent, "parent pointer broken at {id}");

        let lh = self.check_subtree(arena, node.left, id, count, last);

        // In-order keys are strictly ascending, tombstones included.
        let key = arena.bytes(node.key);
        if let Some(prev) = last {
            assert_eq!(
                compare_keys(prev.as_slice(), key),
                Ordering::Less,
                "key order broken at {id}"
            );
        }
        *last = Some(key.to_vec());
        *count += 1;

        let rh = self.check_subtree(arena, node.right, id, count, last);

        assert_eq!(node.height, 1 + lh.max(rh), "stored height wrong at {id}");
        assert!((lh - rh).abs() <= 1, "balance factor out of range at {id}");
        1 + lh.max(rh)
    }
}

impl Default for IndexTree {
    fn default() -> Self {
        Self::new()
    }
}

/// In-order iterator over live entries.
pub struct Iter<'a> {
    tree: &'a IndexTree,
    stack: Vec<NodeId>,
}

impl<'a> Iter<'a> {
    fn new(tree: &'a IndexTree) -> Self {
        let mut iter = Self {
            tree,
            stack: Vec::new(),
        };
        iter.push_left_spine(tree.root);
        iter
    }

    fn push_left_spine(&mut self, mut id: NodeId) {
        while !id.is_null() {
            self.stack.push(id);
            id = self.tree.node(id).left;
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Blob, Blob);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = *self.tree.node(id);
            self.push_left_spine(node.right);
            if !node.deleted {
                return Some((node.key, node.val));
            }
        }
        None
    }
}
