//! LarchDB common types, errors, and configuration.
//!
//! This crate provides shared definitions used across all LarchDB components.

pub mod config;
pub mod error;

pub use config::{ArenaBacking, StoreConfig};
pub use error::{LarchError, Result};
