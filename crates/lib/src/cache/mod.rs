//! Flag-change-aware hash cache.
//!
//! File timestamps cannot see a change in build flags: recompiling with `-O2`
//! instead of `-O0` touches no input file. The cache closes that gap by
//! remembering, per target identity, the digest of the argument list used at
//! the last successful build.
//!
//! The scheduler consults [`HashCache::is_stale`] before deciding to build.
//! The engine calls [`HashCache::check_and_record`] before dispatch and
//! [`HashCache::commit`] only after the builder succeeded, so a record never
//! describes a build that did not happen.
//!
//! Store failures never fail a build. An unreadable or corrupt record reads as
//! `Changed`; a failed write costs one unneeded rebuild later.

mod store;

use tracing::{debug, warn};

use crate::target::Target;
use crate::util::hash::{ArgsDigest, digest};

pub use store::{CacheError, FileHashStore, HashRecord, HashStore, MemoryHashStore};

/// Result of comparing a target's arguments with its stored digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
  Unchanged,
  Changed,
}

/// A comparison ready to be committed once the build succeeds.
#[derive(Debug, Clone)]
#[must_use = "a check is only persisted through HashCache::commit"]
pub struct HashCheck {
  key: Option<Vec<u8>>,
  digest: ArgsDigest,
  status: CacheStatus,
}

impl HashCheck {
  pub fn status(&self) -> CacheStatus {
    self.status
  }

  pub fn is_changed(&self) -> bool {
    self.status == CacheStatus::Changed
  }

  pub fn digest(&self) -> ArgsDigest {
    self.digest
  }
}

/// Argument-digest cache over a [`HashStore`].
#[derive(Debug)]
pub struct HashCache<S> {
  store: S,
}

impl<S: HashStore> HashCache<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  /// Compare the digest of `args` with the one recorded for `target`.
  ///
  /// Nothing is written; pass the result to [`commit`](Self::commit) after
  /// the builder succeeds.
  pub fn check_and_record(&self, target: &Target, args: &[String]) -> HashCheck {
    let digest = digest(args);

    let key = match target.key().identity_bytes() {
      Ok(key) => key,
      Err(e) => {
        warn!(target = %target, error = %e, "cannot encode target identity, treating as changed");
        return HashCheck {
          key: None,
          digest,
          status: CacheStatus::Changed,
        };
      }
    };

    let status = match self.store.get(&key) {
      Ok(Some(stored)) if stored == digest.as_bytes() => CacheStatus::Unchanged,
      Ok(Some(_)) => {
        debug!(target = %target, "argument digest changed");
        CacheStatus::Changed
      }
      Ok(None) => {
        debug!(target = %target, "no recorded argument digest");
        CacheStatus::Changed
      }
      Err(e) => {
        warn!(target = %target, error = %e, "hash record unreadable, treating as changed");
        CacheStatus::Changed
      }
    };

    HashCheck {
      key: Some(key),
      digest,
      status,
    }
  }

  /// Persist the digest from a successful build, replacing any prior record.
  pub fn commit(&self, check: HashCheck) {
    let Some(key) = check.key else {
      return;
    };
    if let Err(e) = self.store.set(&key, check.digest.as_bytes()) {
      warn!(digest = %check.digest, error = %e, "failed to persist hash record");
    }
  }

  /// Whether `target` must be rebuilt because its arguments changed.
  pub fn is_stale(&self, target: &Target, args: &[String]) -> bool {
    self.check_and_record(target, args).is_changed()
  }
}
