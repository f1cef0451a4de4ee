//! Key-value persistence for the local ledger.
//!
//! ## Backends
//!
//! - **InMemoryStore**: Fast, ephemeral storage for testing
//! - **FileStore**: JSON file-based persistence for development
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zkprice::storage::{InMemoryStore, TypedStore};
//!
//! let store = TypedStore::new(InMemoryStore::new());
//! ```

pub mod backend;

pub use backend::*;
