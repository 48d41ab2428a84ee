use thiserror::Error;

use crate::binder::BinderState;

/// Raised by a host predicate. Aborts the whole top-level match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("predicate `{predicate}` failed: {message}")]
pub struct PredicateError {
    pub predicate: String,
    pub message: String,
}

impl PredicateError {
    pub fn new(predicate: impl Into<String>, message: impl Into<String>) -> Self {
        PredicateError {
            predicate: predicate.into(),
            message: message.into(),
        }
    }
}

/// Faults surfaced to the caller. A structural mismatch is never one of
/// these: it is a plain `false` / `None` result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// The binder was destroyed, or the name was not captured on the
    /// winning path.
    #[error("binding not found: `{name}` in binder `{binder}`")]
    BindingNotFound { binder: String, name: String },

    #[error("binder `{binder}` is {state}, cannot {operation}")]
    InvalidBinderState {
        binder: String,
        state: BinderState,
        operation: &'static str,
    },

    #[error(transparent)]
    Predicate(#[from] PredicateError),
}
