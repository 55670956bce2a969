//! Named, versioned cache stores for offline support.
//!
//! This module provides the storage side of the worker:
//! - A `CacheStorage` trait over named key-value stores of responses
//! - An in-memory backend for tests and throwaway hosts
//! - A SQLite backend that persists across sessions

mod storage;
mod traits;

pub use storage::{MemoryStorage, SqliteStorage};
pub use traits::{CacheNames, CacheStorage};
