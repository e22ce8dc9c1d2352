//! Hashing utilities for the argument-digest cache.
//!
//! This module provides:
//! - `ArgsDigest`: a fixed-size SHA-256 digest of a resolved argument list
//! - `digest()`: order-sensitive hashing of argument lists
//! - `hash_bytes()`: arbitrary byte hashing, hex encoded

use std::fmt;

use sha2::{Digest, Sha256};

pub type HashError = serde_json::Error;

/// Digest of a resolved argument list.
///
/// Two argument lists produce the same digest only if they have the same
/// arguments in the same order. Each argument is length-prefixed, so
/// `["-o", "x"]` and `["-ox"]` never collide by concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArgsDigest([u8; 32]);

impl ArgsDigest {
  pub const LEN: usize = 32;

  pub fn as_bytes(&self) -> &[u8] {
    &self.0
  }

  /// Rebuild a digest from stored bytes; `None` if the length is wrong.
  pub fn from_slice(bytes: &[u8]) -> Option<Self> {
    <[u8; 32]>::try_from(bytes).ok().map(Self)
  }

  pub fn to_hex(&self) -> String {
    hex::encode(self.0)
  }
}

impl fmt::Display for ArgsDigest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hex())
  }
}

/// Hash a resolved argument list.
pub fn digest<S: AsRef<str>>(args: &[S]) -> ArgsDigest {
  let mut hasher = Sha256::new();
  hasher.update((args.len() as u64).to_le_bytes());
  for arg in args {
    let arg = arg.as_ref().as_bytes();
    hasher.update((arg.len() as u64).to_le_bytes());
    hasher.update(arg);
  }
  let mut out = [0u8; 32];
  out.copy_from_slice(&hasher.finalize());
  ArgsDigest(out)
}

/// Hash arbitrary bytes.
///
/// Returns the full 64-character lowercase hex SHA-256.
pub fn hash_bytes(data: &[u8]) -> String {
  hex::encode(Sha256::digest(data))
}
