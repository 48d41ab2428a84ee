use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use host::Value;

use crate::context::Bindings;
use crate::error::MatchError;
use crate::pattern::Pattern;

/// Lifecycle of a [`Binder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderState {
    /// Handles act as capture patterns; values cannot be read yet.
    Open,
    /// Claimed by an in-flight top-level match.
    Matching,
    /// The last match succeeded; committed values are readable.
    Closed,
    /// The last match failed or aborted; no values are available.
    Destroyed,
}

impl fmt::Display for BinderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinderState::Open => "open",
            BinderState::Matching => "matching",
            BinderState::Closed => "closed",
            BinderState::Destroyed => "destroyed",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct BinderInner {
    state: BinderState,
    /// Names handed out through [`Binder::handle`].
    names: BTreeSet<String>,
    values: Bindings,
}

/// A named set of capture handles shared across one pattern tree.
///
/// Cloning a `Binder` yields another reference to the same binder.
#[derive(Clone)]
pub struct Binder {
    name: Arc<str>,
    inner: Arc<Mutex<BinderInner>>,
}

impl Binder {
    pub fn new(name: impl AsRef<str>) -> Self {
        Binder {
            name: Arc::from(name.as_ref()),
            inner: Arc::new(Mutex::new(BinderInner {
                state: BinderState::Open,
                names: BTreeSet::new(),
                values: Bindings::new(),
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> BinderState {
        self.inner.lock().state
    }

    /// Get a capture handle for `name`, registering the name with this binder.
    pub fn handle(&self, name: &str) -> CaptureHandle {
        self.inner.lock().names.insert(name.to_string());
        CaptureHandle {
            name: name.to_string(),
            binder: self.clone(),
        }
    }

    /// Shorthand for `self.handle(name).into()`.
    pub fn capture(&self, name: &str) -> Pattern {
        self.handle(name).into()
    }

    /// True if a handle for `name` was ever handed out.
    pub fn has_handle(&self, name: &str) -> bool {
        self.inner.lock().names.contains(name)
    }

    /// Read a committed value.
    pub fn get(&self, name: &str) -> Result<Value, MatchError> {
        let inner = self.inner.lock();
        match inner.state {
            BinderState::Closed => {
                inner
                    .values
                    .get(name)
                    .cloned()
                    .ok_or_else(|| MatchError::BindingNotFound {
                        binder: self.name.to_string(),
                        name: name.to_string(),
                    })
            }
            BinderState::Destroyed => Err(MatchError::BindingNotFound {
                binder: self.name.to_string(),
                name: name.to_string(),
            }),
            state @ (BinderState::Open | BinderState::Matching) => {
                Err(self.invalid_state(state, "read a binding"))
            }
        }
    }

    /// All committed values. Empty once destroyed.
    pub fn values(&self) -> Result<Bindings, MatchError> {
        let inner = self.inner.lock();
        match inner.state {
            BinderState::Closed | BinderState::Destroyed => Ok(inner.values.clone()),
            state => Err(self.invalid_state(state, "read bindings")),
        }
    }

    /// Reopen the binder for another match, dropping committed values.
    /// Handles already handed out stay valid.
    pub fn reset(&self) -> Result<(), MatchError> {
        let mut inner = self.inner.lock();
        if inner.state == BinderState::Matching {
            return Err(self.invalid_state(inner.state, "reset"));
        }
        inner.state = BinderState::Open;
        inner.values.clear();
        tracing::debug!(binder = %self.name, "binder reset");
        Ok(())
    }

    pub(crate) fn claim(&self) -> Result<(), MatchError> {
        let mut inner = self.inner.lock();
        if inner.state != BinderState::Open {
            return Err(self.invalid_state(inner.state, "start a match"));
        }
        inner.state = BinderState::Matching;
        Ok(())
    }

    /// Undo a claim that never reached a match.
    pub(crate) fn release(&self) {
        let mut inner = self.inner.lock();
        if inner.state == BinderState::Matching {
            inner.state = BinderState::Open;
        }
    }

    /// Commit the values of this binder's names out of the final context.
    pub(crate) fn close(&self, committed: &Bindings) {
        let mut inner = self.inner.lock();
        let values: Bindings = committed
            .iter()
            .filter(|(name, _)| inner.names.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        tracing::debug!(binder = %self.name, captured = values.len(), "binder closed");
        inner.values = values;
        inner.state = BinderState::Closed;
    }

    pub(crate) fn destroy(&self) {
        let mut inner = self.inner.lock();
        inner.values.clear();
        inner.state = BinderState::Destroyed;
        tracing::debug!(binder = %self.name, "binder destroyed");
    }

    pub(crate) fn same(&self, other: &Binder) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn invalid_state(&self, state: BinderState, operation: &'static str) -> MatchError {
        MatchError::InvalidBinderState {
            binder: self.name.to_string(),
            state,
            operation,
        }
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A capture bound to a [`Binder`].
///
/// While the binder is open it matches like `Capture(name)`; once the
/// binder is settled, [`CaptureHandle::value`] reads the committed value.
#[derive(Debug, Clone)]
pub struct CaptureHandle {
    name: String,
    binder: Binder,
}

impl CaptureHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn binder(&self) -> &Binder {
        &self.binder
    }

    pub fn value(&self) -> Result<Value, MatchError> {
        self.binder.get(&self.name)
    }
}
