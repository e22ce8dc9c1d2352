//! Target and context model.
//!
//! A [`Target`] is one unit of build work handed to the engine by the external
//! scheduler. It is immutable once constructed; its identity for caching and
//! resource purposes is the [`TargetKey`] (builder, context, outputs).

mod types;

pub use types::{BuilderKind, Context, Protocol, Stage, Target, TargetKey, Way};
