//! stagecraft-lib: action execution for a staged compiler build
//!
//! This crate runs one build target at a time on behalf of an external
//! scheduler:
//! - `Target`: a builder invocation in a (stage, package, way) context
//! - `ResourceRegistry`: named counting pools limiting concurrent builders
//! - `HashCache`: per-target argument digests for flag-change detection
//! - `Engine`: resolve, acquire, dispatch, record

pub mod cache;
pub mod consts;
pub mod execute;
pub mod platform;
pub mod resource;
pub mod target;
pub mod util;
