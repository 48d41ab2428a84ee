use std::collections::{BTreeMap, HashMap};

use host::Value;

/// Captures committed by a successful match, ordered by name.
pub type Bindings = BTreeMap<String, Value>;

/// Restore point for [`CaptureContext::rollback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Name → value mapping threaded through one top-level match.
///
/// Bindings are only ever added, never overwritten, so the context keeps a
/// trail of names in binding order. A checkpoint is a trail length;
/// rolling back removes the names bound since.
#[derive(Debug, Default)]
pub struct CaptureContext {
    values: HashMap<String, Value>,
    trail: Vec<String>,
}

impl CaptureContext {
    pub fn new() -> Self {
        CaptureContext::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.trail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trail.is_empty()
    }

    /// Bind `name` to `value`. A name that is already bound is an equality
    /// constraint: the call succeeds only if the stored value equals `value`.
    pub fn bind(&mut self, name: &str, value: &Value) -> bool {
        match self.values.get(name) {
            Some(existing) => existing == value,
            None => {
                self.values.insert(name.to_string(), value.clone());
                self.trail.push(name.to_string());
                true
            }
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.trail.len())
    }

    /// Discard every binding made after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        for name in self.trail.drain(checkpoint.0..) {
            self.values.remove(&name);
        }
    }

    /// Names bound since `checkpoint`, in binding order.
    pub fn bound_since(&self, checkpoint: Checkpoint) -> &[String] {
        &self.trail[checkpoint.0..]
    }

    pub fn into_bindings(self) -> Bindings {
        self.values.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_name_is_equality_constraint() {
        let mut ctx = CaptureContext::new();
        assert!(ctx.bind("a", &Value::Int(1)));
        assert!(ctx.bind("a", &Value::Int(1)));
        assert!(!ctx.bind("a", &Value::Int(2)));
        assert_eq!(ctx.get("a"), Some(&Value::Int(1)));
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn rollback_discards_later_bindings_only() {
        let mut ctx = CaptureContext::new();
        ctx.bind("a", &Value::Int(1));
        let checkpoint = ctx.checkpoint();
        ctx.bind("b", &Value::Int(2));
        ctx.bind("c", &Value::Int(3));
        assert_eq!(ctx.bound_since(checkpoint), ["b", "c"]);

        ctx.rollback(checkpoint);
        assert_eq!(ctx.get("a"), Some(&Value::Int(1)));
        assert_eq!(ctx.get("b"), None);
        assert_eq!(ctx.get("c"), None);
        assert!(ctx.bind("b", &Value::str("again")));
    }

    #[test]
    fn nested_checkpoints() {
        let mut ctx = CaptureContext::new();
        let outer = ctx.checkpoint();
        ctx.bind("x", &Value::Int(1));
        let inner = ctx.checkpoint();
        ctx.bind("y", &Value::Int(2));
        ctx.rollback(inner);
        assert_eq!(ctx.len(), 1);
        ctx.rollback(outer);
        assert!(ctx.is_empty());
    }

    #[test]
    fn into_bindings_is_sorted() {
        let mut ctx = CaptureContext::new();
        ctx.bind("b", &Value::Int(2));
        ctx.bind("a", &Value::Int(1));
        let names: Vec<_> = ctx.into_bindings().into_keys().collect();
        assert_eq!(names, ["a", "b"]);
    }
}
