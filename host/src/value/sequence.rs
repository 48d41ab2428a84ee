use std::fmt;
use std::sync::Arc;

use super::Value;

/// The concrete kind of an ordered sequence. Kinds never compare equal to
/// each other: a tuple is not a list even with the same elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqKind {
    List,
    Tuple,
}

/// An immutable ordered sequence of values.
///
/// A `Seq` is a view into shared storage, so taking the tail with
/// [`Seq::split_first`] is O(1) and does not copy elements. A tail is
/// indistinguishable from a freshly built sequence with the same elements.
#[derive(Clone)]
pub struct Seq {
    items: Arc<[Value]>,
    start: usize,
}

impl Seq {
    pub fn new(items: Vec<Value>) -> Self {
        Seq {
            items: items.into(),
            start: 0,
        }
    }

    pub fn empty() -> Self {
        Seq::new(Vec::new())
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items[self.start..]
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.as_slice().iter()
    }

    /// Split into the first element and the remaining elements.
    /// The tail shares storage with `self`.
    pub fn split_first(&self) -> Option<(&Value, Seq)> {
        let head = self.as_slice().first()?;
        let tail = Seq {
            items: Arc::clone(&self.items),
            start: self.start + 1,
        };
        Some((head, tail))
    }
}

impl Default for Seq {
    fn default() -> Self {
        Seq::empty()
    }
}

impl PartialEq for Seq {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl fmt::Debug for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl From<Vec<Value>> for Seq {
    fn from(items: Vec<Value>) -> Self {
        Seq::new(items)
    }
}

impl FromIterator<Value> for Seq {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Seq::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Seq {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
