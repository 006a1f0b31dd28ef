//! Configuration structures for LarchDB.

use crate::error::{LarchError, Result};
use serde::{Deserialize, Serialize};

/// Default address space reserved for the arena (4 GiB).
///
/// Reservation is virtual only; physical memory is committed on demand in
/// [`DEFAULT_COMMIT_CHUNK`] steps. Blob offsets are 32-bit, so the
/// reservation can never exceed 4 GiB.
pub const DEFAULT_RESERVE_BYTES: usize = 4 << 30;

/// Default commit granularity (2 MiB). Must be a multiple of the OS page
/// size for the virtual memory backing.
pub const DEFAULT_COMMIT_CHUNK: usize = 2 << 20;

/// Memory backend for the store's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArenaBacking {
    /// Reserve address space up front, commit pages on demand (unix only).
    #[default]
    Vmem,
    /// Growable heap buffer with the same chunked commit accounting.
    /// Portable; useful for tests and platforms without page protection.
    Heap,
}

/// Configuration for a LarchDB store instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Bytes of address space reserved for the arena.
    pub reserve_bytes: usize,
    /// Commit granularity in bytes.
    pub commit_chunk: usize,
    /// Memory backend for the arena.
    pub backing: ArenaBacking,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            reserve_bytes: DEFAULT_RESERVE_BYTES,
            commit_chunk: DEFAULT_COMMIT_CHUNK,
            backing: ArenaBacking::default(),
        }
    }
}

impl StoreConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.reserve_bytes == 0 {
            return Err(LarchError::ConfigError(
                "reserve_bytes must be non-zero".to_string(),
            ));
        }
        if self.commit_chunk == 0 {
            return Err(LarchError::ConfigError(
                "commit_chunk must be non-zero".to_string(),
            ));
        }
        if self.commit_chunk > self.reserve_bytes {
            return Err(LarchError::ConfigError(format!(
                "commit_chunk ({}) exceeds reserve_bytes ({})",
                self.commit_chunk, self.reserve_bytes
            )));
        }
        // Blob offsets are 32-bit relative positions into the arena.
        if self.reserve_bytes as u64 > 1 << 32 {
            return Err(LarchError::ConfigError(format!(
                "reserve_bytes ({}) exceeds the 4 GiB blob offset range",
                self.reserve_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.reserve_bytes, 4 << 30);
        assert_eq!(config.commit_chunk, 2 << 20);
        assert_eq!(config.backing, ArenaBacking::Vmem);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_store_config_custom() {
        let config = StoreConfig {
            reserve_bytes: 64 << 20,
            commit_chunk: 64 << 10,
            backing: ArenaBacking::Heap,
        };
        assert_eq!(config.reserve_bytes, 64 << 20);
        assert_eq!(config.backing, ArenaBacking::Heap);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_reserve() {
        let config = StoreConfig {
            reserve_bytes: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let config = StoreConfig {
            commit_chunk: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_chunk_over_reserve() {
        let config = StoreConfig {
            reserve_bytes: 1 << 20,
            commit_chunk: 2 << 20,
            backing: ArenaBacking::Heap,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserve_over_offset_range() {
        let config = StoreConfig {
            reserve_bytes: (1usize << 32) + 4096,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_config_serde_roundtrip() {
        let original = StoreConfig {
            reserve_bytes: 128 << 20,
            commit_chunk: 1 << 20,
            backing: ArenaBacking::Heap,
        };
        let serialized = serde_json::to_string(&original).unwrap();
        let deserialized: StoreConfig = serde_json::from_str(&serialized).unwrap();

        assert_eq!(original.reserve_bytes, deserialized.reserve_bytes);
        assert_eq!(original.commit_chunk, deserialized.commit_chunk);
        assert_eq!(original.backing, deserialized.backing);
    }

    #[test]
    fn test_arena_backing_default() {
        assert_eq!(ArenaBacking::default(), ArenaBacking::Vmem);
    }

    #[test]
    fn test_arena_backing_serde_roundtrip() {
        for backing in [ArenaBacking::Vmem, ArenaBacking::Heap] {
            let serialized = serde_json::to_string(&backing).unwrap();
            let deserialized: ArenaBacking = serde_json::from_str(&serialized).unwrap();
            assert_eq!(backing, deserialized);
        }
    }
}
