//! Crate-wide constants.

/// Application name, used for platform directory names.
pub const APP_NAME: &str = "stagecraft";

/// Environment variable overriding the hash store directory.
pub const CACHE_ENV: &str = "STAGECRAFT_CACHE";

/// Directory name for argument-digest records within the cache directory.
pub const HASHES_DIR: &str = "hashes";

/// Glob matched against an archiver target's output to select create mode.
pub const ARCHIVE_PATTERN: &str = "*.a";
