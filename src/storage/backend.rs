//! Storage backend implementations.
//!
//! This module provides different storage backends:
//! - InMemoryStore: Fast, ephemeral storage for testing
//! - FileStore: JSON file-based persistent storage
//!
//! Both backends support a guarded multi-key write
//! ([`StorageBackend::commit_if_absent`]) that the ledger verifier uses to
//! record a proof digest and its attestation records as one step.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// STORAGE TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Key type for storage operations
pub type StorageKey = Vec<u8>;

/// Value type for storage operations
pub type StorageValue = Vec<u8>;

/// Trait for storage backends
pub trait StorageBackend: Send + Sync {
    /// Get a value by key
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>>;

    /// Check if a key exists
    fn exists(&self, key: &[u8]) -> Result<bool>;

    /// List all keys with a given prefix
    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>>;

    /// Flush any pending writes to persistent storage
    fn flush(&self) -> Result<()>;

    /// Apply `writes` and set `guard_key` only if `guard_key` is absent
    ///
    /// Returns `false` without writing anything when the guard already
    /// exists. The check and the writes happen under one lock.
    fn commit_if_absent(
        &self,
        guard_key: &[u8],
        guard_value: &[u8],
        writes: &[(StorageKey, StorageValue)],
    ) -> Result<bool>;
}

fn lock_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Storage(format!("Lock error: {}", e))
}

fn apply_guarded(
    data: &mut HashMap<Vec<u8>, Vec<u8>>,
    guard_key: &[u8],
    guard_value: &[u8],
    writes: &[(StorageKey, StorageValue)],
) -> bool {
    if data.contains_key(guard_key) {
        return false;
    }
    for (key, value) in writes {
        data.insert(key.clone(), value.clone());
    }
    data.insert(guard_key.to_vec(), guard_value.to_vec());
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// In-memory storage backend (for testing and ephemeral use)
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl StorageBackend for InMemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let data = self.data.read().map_err(lock_error)?;
        Ok(data.get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let data = self.data.read().map_err(lock_error)?;
        Ok(data.contains_key(key))
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let data = self.data.read().map_err(lock_error)?;
        Ok(data
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn flush(&self) -> Result<()> {
        // In-memory store doesn't need flushing
        Ok(())
    }

    fn commit_if_absent(
        &self,
        guard_key: &[u8],
        guard_value: &[u8],
        writes: &[(StorageKey, StorageValue)],
    ) -> Result<bool> {
        let mut data = self.data.write().map_err(lock_error)?;
        Ok(apply_guarded(&mut data, guard_key, guard_value, writes))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FILE-BASED STORE
// ═══════════════════════════════════════════════════════════════════════════════

const DATA_FILE: &str = "data.json";
const TMP_FILE: &str = "data.json.tmp";

/// File-based storage backend using JSON
#[derive(Debug)]
pub struct FileStore {
    /// Base directory for storage
    base_path: PathBuf,
    /// In-memory cache
    cache: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
    /// Whether cache is dirty and needs flushing
    dirty: RwLock<bool>,
}

impl FileStore {
    /// Create a new file store at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let base_path = path.as_ref().to_path_buf();

        // Create directory if it doesn't exist
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                Error::Storage(format!("Failed to create storage directory: {}", e))
            })?;
        }

        let store = Self {
            base_path,
            cache: RwLock::new(HashMap::new()),
            dirty: RwLock::new(false),
        };

        // Load existing data
        store.load_from_disk()?;

        Ok(store)
    }

    /// Get the path for a specific data file
    fn data_file_path(&self) -> PathBuf {
        self.base_path.join(DATA_FILE)
    }

    /// Load data from disk
    fn load_from_disk(&self) -> Result<()> {
        let path = self.data_file_path();

        if !path.exists() {
            return Ok(());
        }

        let file = File::open(&path).map_err(|e| {
            Error::Storage(format!("Failed to open data file: {}", e))
        })?;

        let reader = BufReader::new(file);

        // Read as JSON with hex-encoded keys and values
        let data: HashMap<String, String> = serde_json::from_reader(reader).map_err(|e| {
            Error::Storage(format!("Failed to parse data file: {}", e))
        })?;

        let mut cache = self.cache.write().map_err(lock_error)?;

        for (key_hex, value_hex) in data {
            let key = hex::decode(&key_hex).map_err(|e| {
                Error::Storage(format!("Invalid key in storage: {}", e))
            })?;
            let value = hex::decode(&value_hex).map_err(|e| {
                Error::Storage(format!("Invalid value in storage: {}", e))
            })?;
            cache.insert(key, value);
        }

        Ok(())
    }

    /// Save data to disk
    ///
    /// Writes a sibling temp file and renames it over `data.json`, so a
    /// crash mid-write leaves the previous snapshot intact.
    fn save_to_disk(&self) -> Result<()> {
        let cache = self.cache.read().map_err(lock_error)?;

        // Convert to hex-encoded format for JSON storage
        let data: HashMap<String, String> = cache
            .iter()
            .map(|(k, v)| (hex::encode(k), hex::encode(v)))
            .collect();

        let tmp_path = self.base_path.join(TMP_FILE);
        {
            let file = File::create(&tmp_path)
                .map_err(|e| Error::Storage(format!("Failed to create temp data file: {}", e)))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &data).map_err(|e| {
                Error::Storage(format!("Failed to write data file: {}", e))
            })?;
            let file = writer
                .into_inner()
                .map_err(|e| Error::Storage(format!("Failed to write data file: {}", e)))?;
            file.sync_all()
                .map_err(|e| Error::Storage(format!("Failed to sync data file: {}", e)))?;
        }
        fs::rename(&tmp_path, self.data_file_path())
            .map_err(|e| Error::Storage(format!("Failed to replace data file: {}", e)))?;

        let mut dirty = self.dirty.write().map_err(lock_error)?;
        *dirty = false;

        Ok(())
    }
}

impl StorageBackend for FileStore {
    fn get(&self, key: &[u8]) -> Result<Option<StorageValue>> {
        let cache = self.cache.read().map_err(lock_error)?;
        Ok(cache.get(key).cloned())
    }

    fn exists(&self, key: &[u8]) -> Result<bool> {
        let cache = self.cache.read().map_err(lock_error)?;
        Ok(cache.contains_key(key))
    }

    fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        let cache = self.cache.read().map_err(lock_error)?;
        Ok(cache
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn flush(&self) -> Result<()> {
        let dirty = *self.dirty.read().map_err(lock_error)?;
        if dirty {
            self.save_to_disk()?;
        }
        Ok(())
    }

    fn commit_if_absent(
        &self,
        guard_key: &[u8],
        guard_value: &[u8],
        writes: &[(StorageKey, StorageValue)],
    ) -> Result<bool> {
        let mut cache = self.cache.write().map_err(lock_error)?;
        if !apply_guarded(&mut cache, guard_key, guard_value, writes) {
            return Ok(false);
        }

        let mut dirty = self.dirty.write().map_err(lock_error)?;
        *dirty = true;

        Ok(true)
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        // Attempt to flush on drop
        let _ = self.flush();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPED STORE WRAPPER
// ═══════════════════════════════════════════════════════════════════════════════

/// Type-safe wrapper around a storage backend
pub struct TypedStore<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> TypedStore<B> {
    /// Create a new typed store
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Get a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self.backend.get(key)? {
            Some(data) => {
                let value = bincode::deserialize(&data).map_err(|e| {
                    Error::Deserialization(format!("Failed to deserialize value: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Check if a key exists
    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        self.backend.exists(key)
    }

    /// List keys with prefix
    pub fn list_prefix(&self, prefix: &[u8]) -> Result<Vec<StorageKey>> {
        self.backend.list_prefix(prefix)
    }

    /// Flush pending writes
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Guarded multi-key write of typed values
    pub fn commit_if_absent<G: Serialize>(
        &self,
        guard_key: &[u8],
        guard_value: &G,
        writes: Vec<(StorageKey, StorageValue)>,
    ) -> Result<bool> {
        let guard = encode(guard_value)?;
        self.backend.commit_if_absent(guard_key, &guard, &writes)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// KEY PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

/// Key prefixes for different data types
pub mod prefixes {
    /// Used proof digest prefix
    pub const USED_PROOF: &[u8] = b"used:";
    /// Price history prefix (asset, NUL, big-endian timestamp)
    pub const PRICE: &[u8] = b"prc:";
    /// Attestation metadata prefix (big-endian attestation id)
    pub const META: &[u8] = b"meta:";
}

/// Bincode-encode a value for storage
pub fn encode<T: Serialize>(value: &T) -> Result<StorageValue> {
    bincode::serialize(value)
        .map_err(|e| Error::Serialization(format!("Failed to serialize value: {}", e)))
}

/// Create a key with a prefix
pub fn make_key(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(prefix.len() + key.len());
    result.extend_from_slice(prefix);
    result.extend_from_slice(key);
    result
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
