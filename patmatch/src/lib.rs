//! Structural pattern matching over dynamic [`host::Value`]s.
//!
//! Patterns are immutable trees built from [`Pattern`] nodes. A top-level
//! call ([`match_pattern`] or [`match_captures`]) walks the tree against a
//! subject, collecting named captures in a per-call [`CaptureContext`], and
//! settles every [`Binder`] referenced by the pattern once the outcome is
//! known.

pub mod binder;
pub mod context;
pub mod engine;
pub mod error;
pub mod pattern;

pub use host;

pub use binder::{Binder, BinderState, CaptureHandle};
pub use context::{Bindings, CaptureContext, Checkpoint};
pub use engine::{match_captures, match_pattern, match_recursive};
pub use error::{MatchError, PredicateError};
pub use pattern::{
    Pattern, Predicate, all, capture, cons, instance_of, list, lit, map_shape, object, pred, some,
    try_pred, tuple,
};
