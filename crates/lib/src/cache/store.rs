//! Persisted argument-digest stores.
//!
//! # Storage Layout
//!
//! ```text
//! {cache_dir}/hashes/
//! └── <sha256(identity)>.json   # HashRecord for one target
//! ```
//!
//! One file per target identity means writers for distinct targets never
//! touch the same file, so no cross-key locking is needed.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::platform::paths::hash_store_dir;
use crate::util::hash::hash_bytes;

/// Current on-disk record format version.
pub const HASH_RECORD_VERSION: u32 = 1;

/// Errors reading or writing hash records.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to read hash record {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("corrupt hash record {path}: {message}")]
  Corrupt { path: PathBuf, message: String },

  #[error("failed to write hash record {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Key/value store of opaque digests keyed by opaque target identities.
pub trait HashStore: Send + Sync {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError>;

  fn set(&self, key: &[u8], digest: &[u8]) -> Result<(), CacheError>;
}

/// On-disk record for one target.
#[derive(Debug, Serialize, Deserialize)]
pub struct HashRecord {
  pub version: u32,
  /// Lowercase hex argument digest.
  pub digest: String,
}

/// Hash store with one JSON file per target under a directory.
#[derive(Debug, Clone)]
pub struct FileHashStore {
  base_path: PathBuf,
}

impl FileHashStore {
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  /// Create a store at the default location.
  ///
  /// Honors `STAGECRAFT_CACHE`, else the platform cache directory.
  pub fn default_store() -> Self {
    Self::new(hash_store_dir())
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  /// Path of the record file for an identity.
  pub fn record_path(&self, key: &[u8]) -> PathBuf {
    self.base_path.join(format!("{}.json", hash_bytes(key)))
  }
}

impl HashStore for FileHashStore {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
    let path = self.record_path(key);

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
      Err(source) => return Err(CacheError::Read { path, source }),
    };

    let record: HashRecord = serde_json::from_str(&content).map_err(|e| CacheError::Corrupt {
      path: path.clone(),
      message: e.to_string(),
    })?;

    if record.version != HASH_RECORD_VERSION {
      return Err(CacheError::Corrupt {
        path,
        message: format!("unsupported record version {}", record.version),
      });
    }

    hex::decode(&record.digest).map(Some).map_err(|e| CacheError::Corrupt {
      path,
      message: e.to_string(),
    })
  }

  /// Writes atomically (temp file, then rename) so readers never see a
  /// half-written record.
  fn set(&self, key: &[u8], digest: &[u8]) -> Result<(), CacheError> {
    let path = self.record_path(key);
    let write_err = |source| CacheError::Write {
      path: path.clone(),
      source,
    };

    fs::create_dir_all(&self.base_path).map_err(write_err)?;

    let record = HashRecord {
      version: HASH_RECORD_VERSION,
      digest: hex::encode(digest),
    };
    let content = serde_json::to_string(&record).map_err(|e| write_err(io::Error::other(e)))?;

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, format!("{}\n", content)).map_err(write_err)?;
    fs::rename(&temp_path, &path).map_err(write_err)?;

    Ok(())
  }
}

/// In-memory hash store, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryHashStore {
  records: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryHashStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.records.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl HashStore for MemoryHashStore {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, CacheError> {
    let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
    Ok(records.get(key).cloned())
  }

  fn set(&self, key: &[u8], digest: &[u8]) -> Result<(), CacheError> {
    let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
    records.insert(key.to_vec(), digest.to_vec());
    Ok(())
  }
}
