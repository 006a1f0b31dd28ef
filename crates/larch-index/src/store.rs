//! Store facade composing the arena allocator with the index tree.

use crate::arena::Arena;
use crate::reserve::{HeapReservation, ReserveBacking};
#[cfg(unix)]
use crate::reserve::VmemReservation;
use crate::tree::{IndexTree, SearchResult};
use larch_common::{ArenaBacking, Result, StoreConfig};
use tracing::debug;

/// Outcome of a [`Store::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    /// Key present and live; the bytes are read in place from the arena.
    Exists(&'a [u8]),
    /// Key present but tombstoned. Distinct from a miss: the caller must
    /// not consult a backing tier for a tombstoned key.
    Deleted,
    /// Key absent from the in-memory index. An external disk tier, when
    /// one exists, is authoritative for such keys.
    NotFound,
}

/// Single-writer in-memory key-value index.
///
/// Caller-supplied key and value slices are copied into the arena once on
/// `put` and referenced by blob from then on; callers need not keep their
/// slices alive after the call. There is no internal locking: concurrent
/// use requires external serialization, by design.
pub struct Store {
    arena: Arena,
    tree: IndexTree,
}

impl Store {
    /// Opens a store with the given configuration.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let backing: Box<dyn ReserveBacking> = match config.backing {
            #[cfg(unix)]
            ArenaBacking::Vmem => Box::new(VmemReservation::new(
                config.reserve_bytes,
                config.commit_chunk,
            )?),
            #[cfg(not(unix))]
            ArenaBacking::Vmem => {
                return Err(larch_common::LarchError::ConfigError(
                    "virtual memory backing requires a unix target".to_string(),
                ))
            }
            ArenaBacking::Heap => Box::new(HeapReservation::new(
                config.reserve_bytes,
                config.commit_chunk,
            )),
        };
        debug!(
            reserve = config.reserve_bytes,
            chunk = config.commit_chunk,
            backing = ?config.backing,
            "opened store"
        );
        Ok(Self {
            arena: Arena::new(backing),
            tree: IndexTree::new(),
        })
    }

    /// Copies `key` and `val` into the arena and indexes the key.
    ///
    /// Overwriting an existing key writes a new value blob and repoints
    /// the node; the old value bytes stay in the arena untouched.
    pub fn put(&mut self, key: &[u8], val: &[u8]) -> Result<()> {
        let key_blob = self.arena.append(key)?;
        let val_blob = self.arena.append(val)?;
        self.tree.put(&self.arena, key_blob, val_blob)?;
        Ok(())
    }

    /// Point lookup. Key bytes are compared in place and never persisted.
    pub fn get(&self, key: &[u8]) -> Lookup<'_> {
        match self.tree.get(&self.arena, key) {
            SearchResult::Found(id) => Lookup::Exists(self.arena.bytes(self.tree.value(id))),
            SearchResult::Tombstone(_) => Lookup::Deleted,
            SearchResult::Missing => Lookup::NotFound,
        }
    }

    /// Tombstones `key`, indexing a placeholder node when the key was
    /// never put.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        let key_blob = self.arena.append(key)?;
        self.tree.remove(&self.arena, key_blob)?;
        Ok(())
    }

    /// Live entries in ascending key order, read in place from the arena.
    pub fn scan(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.tree
            .iter()
            .map(|(k, v)| (self.arena.bytes(k), self.arena.bytes(v)))
    }

    /// Node slots ever allocated (tombstones included).
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns true when nothing has ever been indexed.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Live (non-tombstoned) entry count.
    pub fn live_len(&self) -> usize {
        self.tree.live_len()
    }

    /// The arena backing this store.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The index tree backing this store.
    pub fn tree(&self) -> &IndexTree {
        &self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_config() -> StoreConfig {
        StoreConfig {
            reserve_bytes: 4 << 20,
            commit_chunk: 4096,
            backing: ArenaBacking::Heap,
        }
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = StoreConfig {
            commit_chunk: 0,
            ..heap_config()
        };
        assert!(Store::open(&config).is_err());
    }

    #[test]
    fn test_put_get_round_trip() {
        let mut store = Store::open(&heap_config()).unwrap();
        store.put(b"key", b"value").unwrap();
        assert_eq!(store.get(b"key"), Lookup::Exists(b"value".as_slice()));
        assert_eq!(store.get(b"other"), Lookup::NotFound);
    }

    #[test]
    fn test_remove_then_revive() {
        let mut store = Store::open(&heap_config()).unwrap();
        store.put(b"k", b"v1").unwrap();
        store.remove(b"k").unwrap();
        assert_eq!(store.get(b"k"), Lookup::Deleted);
        assert_eq!(store.len(), 1);

        store.put(b"k", b"v2").unwrap();
        assert_eq!(store.get(b"k"), Lookup::Exists(b"v2".as_slice()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_absent_key() {
        let mut store = Store::open(&heap_config()).unwrap();
        store.remove(b"ghost").unwrap();
        assert_eq!(store.get(b"ghost"), Lookup::Deleted);
        assert_eq!(store.live_len(), 0);
    }

    #[test]
    fn test_get_is_zero_copy() {
        let mut store = Store::open(&heap_config()).unwrap();
        store.put(b"k", b"value").unwrap();

        let arena_range = store.arena().bytes(crate::Blob::new(0, store.arena().size() as u32));
        match store.get(b"k") {
            Lookup::Exists(val) => {
                // The returned slice aliases the arena's own memory.
                let arena_start = arena_range.as_ptr() as usize;
                let val_start = val.as_ptr() as usize;
                assert!(val_start >= arena_start);
                assert!(val_start + val.len() <= arena_start + arena_range.len());
            }
            other => panic!("expected Exists, got {other:?}"),
        }
    }

    #[test]
    fn test_scan_in_key_order() {
        let mut store = Store::open(&heap_config()).unwrap();
        for key in ["banana", "apple", "cherry"] {
            store.put(key.as_bytes(), b"fruit").unwrap();
        }
        store.remove(b"banana").unwrap();

        let keys: Vec<&[u8]> = store.scan().map(|(k, _)| k).collect();
        assert_eq!(keys, [b"apple".as_slice(), b"cherry".as_slice()]);
    }

    #[test]
    fn test_caller_slices_need_not_outlive_put() {
        let mut store = Store::open(&heap_config()).unwrap();
        {
            let key = b"ephemeral".to_vec();
            let val = vec![0x5a; 64];
            store.put(&key, &val).unwrap();
        }
        assert_eq!(store.get(b"ephemeral"), Lookup::Exists([0x5a; 64].as_slice()));
    }
}
