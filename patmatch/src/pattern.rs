use std::fmt;
use std::sync::Arc;

use host::{SeqKind, Type, Value};

use crate::binder::{Binder, CaptureHandle};
use crate::error::PredicateError;

type PredicateFn = dyn Fn(&Value) -> Result<bool, String> + Send + Sync;

/// A named host predicate.
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Predicate {
            name: name.into(),
            func: Arc::new(move |value: &Value| -> Result<bool, String> { Ok(func(value)) }),
        }
    }

    /// A predicate that can fail. An `Err` aborts the whole match.
    pub fn fallible<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<bool, String> + Send + Sync + 'static,
    {
        Predicate {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn test(&self, value: &Value) -> Result<bool, PredicateError> {
        (self.func)(value).map_err(|message| PredicateError::new(&self.name, message))
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", self.name)
    }
}

/// A node of a pattern tree. Trees are immutable; all match state lives in
/// the [`CaptureContext`](crate::context::CaptureContext) of a call.
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A bare value. Matches an equal subject; a type value matches subjects
    /// of exactly that type; a list or tuple value matches a sequence of the
    /// same kind and length element by element.
    Value(Value),
    /// Matches an equal subject, nothing else.
    Literal(Value),
    /// Matches instances of the type, including subclass instances.
    TypeTag(Type),
    Predicate(Predicate),
    /// Positional match against a sequence of the same kind and length.
    Sequence(SeqKind, Vec<Pattern>),
    /// Every pattern matches, checked in order.
    Conjunction(Vec<Pattern>),
    /// The first pattern that matches wins; failed branches leave no bindings.
    Disjunction(Vec<Pattern>),
    /// A non-empty sequence split into its first element and the rest.
    Decompose { head: Box<Pattern>, tail: Box<Pattern> },
    ObjectShape {
        class: Option<Type>,
        fields: Vec<(String, Pattern)>,
    },
    /// Key lookup; an absent key fails the match.
    MapShape(Vec<(Value, Pattern)>),
    Capture(String),
    Handle(CaptureHandle),
}

impl Pattern {
    pub fn kind(&self) -> &'static str {
        match self {
            Pattern::Value(_) => "value",
            Pattern::Literal(_) => "literal",
            Pattern::TypeTag(_) => "type_tag",
            Pattern::Predicate(_) => "predicate",
            Pattern::Sequence(SeqKind::List, _) => "list",
            Pattern::Sequence(SeqKind::Tuple, _) => "tuple",
            Pattern::Conjunction(_) => "all",
            Pattern::Disjunction(_) => "some",
            Pattern::Decompose { .. } => "cons",
            Pattern::ObjectShape { .. } => "object",
            Pattern::MapShape(_) => "map",
            Pattern::Capture(_) => "capture",
            Pattern::Handle(_) => "handle",
        }
    }

    /// Direct sub-patterns, in evaluation order.
    pub fn children(&self) -> Vec<&Pattern> {
        match self {
            Pattern::Sequence(_, items)
            | Pattern::Conjunction(items)
            | Pattern::Disjunction(items) => items.iter().collect(),
            Pattern::Decompose { head, tail } => vec![head.as_ref(), tail.as_ref()],
            Pattern::ObjectShape { fields, .. } => fields.iter().map(|(_, p)| p).collect(),
            Pattern::MapShape(fields) => fields.iter().map(|(_, p)| p).collect(),
            Pattern::Value(_)
            | Pattern::Literal(_)
            | Pattern::TypeTag(_)
            | Pattern::Predicate(_)
            | Pattern::Capture(_)
            | Pattern::Handle(_) => Vec::new(),
        }
    }

    /// Every distinct binder referenced by a handle anywhere in the tree.
    pub fn binders(&self) -> Vec<Binder> {
        let mut found: Vec<Binder> = Vec::new();
        let mut stack = vec![self];
        while let Some(pattern) = stack.pop() {
            if let Pattern::Handle(handle) = pattern {
                if !found.iter().any(|b| b.same(handle.binder())) {
                    found.push(handle.binder().clone());
                }
            }
            stack.extend(pattern.children());
        }
        found
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Pattern]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Value(Value::Type(ty)) => write!(f, "{}", ty),
            Pattern::Value(value) => write!(f, "{}", value),
            Pattern::Literal(value) => write!(f, "lit({})", value),
            Pattern::TypeTag(ty) => write!(f, "instance_of({})", ty),
            Pattern::Predicate(p) => write!(f, "pred({})", p.name()),
            Pattern::Sequence(SeqKind::List, items) => {
                write!(f, "[")?;
                write_list(f, items)?;
                write!(f, "]")
            }
            Pattern::Sequence(SeqKind::Tuple, items) => {
                write!(f, "(")?;
                write_list(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Pattern::Conjunction(items) => {
                write!(f, "all(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Pattern::Disjunction(items) => {
                write!(f, "some(")?;
                write_list(f, items)?;
                write!(f, ")")
            }
            Pattern::Decompose { head, tail } => write!(f, "cons({}, {})", head, tail),
            Pattern::ObjectShape { class, fields } => {
                match class {
                    Some(ty) => write!(f, "{} {{", ty)?,
                    None => write!(f, "object {{")?,
                }
                for (i, (name, p)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", name, p)?;
                }
                write!(f, " }}")
            }
            Pattern::MapShape(fields) => {
                write!(f, "{{")?;
                for (i, (key, p)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, p)?;
                }
                write!(f, "}}")
            }
            Pattern::Capture(name) => write!(f, "?{}", name),
            Pattern::Handle(handle) => write!(f, "?{}.{}", handle.binder().name(), handle.name()),
        }
    }
}

impl From<Value> for Pattern {
    fn from(value: Value) -> Self {
        Pattern::Value(value)
    }
}

/// A bare type: matches subjects of exactly this type.
impl From<Type> for Pattern {
    fn from(ty: Type) -> Self {
        Pattern::Value(Value::Type(ty))
    }
}

impl From<CaptureHandle> for Pattern {
    fn from(handle: CaptureHandle) -> Self {
        Pattern::Handle(handle)
    }
}

impl From<i64> for Pattern {
    fn from(n: i64) -> Self {
        Pattern::Value(Value::Int(n))
    }
}

impl From<i32> for Pattern {
    fn from(n: i32) -> Self {
        Pattern::Value(Value::from(n))
    }
}

impl From<bool> for Pattern {
    fn from(b: bool) -> Self {
        Pattern::Value(Value::Bool(b))
    }
}

impl From<f64> for Pattern {
    fn from(n: f64) -> Self {
        Pattern::Value(Value::Float(n))
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Pattern::Value(Value::str(s))
    }
}

fn collect<I>(patterns: I) -> Vec<Pattern>
where
    I: IntoIterator,
    I::Item: Into<Pattern>,
{
    patterns.into_iter().map(Into::into).collect()
}

pub fn lit(value: impl Into<Value>) -> Pattern {
    Pattern::Literal(value.into())
}

pub fn instance_of(ty: Type) -> Pattern {
    Pattern::TypeTag(ty)
}

pub fn pred<F>(name: &str, func: F) -> Pattern
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Pattern::Predicate(Predicate::new(name, func))
}

pub fn try_pred<F>(name: &str, func: F) -> Pattern
where
    F: Fn(&Value) -> Result<bool, String> + Send + Sync + 'static,
{
    Pattern::Predicate(Predicate::fallible(name, func))
}

pub fn list<I>(items: I) -> Pattern
where
    I: IntoIterator,
    I::Item: Into<Pattern>,
{
    Pattern::Sequence(SeqKind::List, collect(items))
}

pub fn tuple<I>(items: I) -> Pattern
where
    I: IntoIterator,
    I::Item: Into<Pattern>,
{
    Pattern::Sequence(SeqKind::Tuple, collect(items))
}

pub fn all<I>(patterns: I) -> Pattern
where
    I: IntoIterator,
    I::Item: Into<Pattern>,
{
    Pattern::Conjunction(collect(patterns))
}

pub fn some<I>(patterns: I) -> Pattern
where
    I: IntoIterator,
    I::Item: Into<Pattern>,
{
    Pattern::Disjunction(collect(patterns))
}

pub fn cons(head: impl Into<Pattern>, tail: impl Into<Pattern>) -> Pattern {
    Pattern::Decompose {
        head: Box::new(head.into()),
        tail: Box::new(tail.into()),
    }
}

/// Object shape. `class` filters by instance-of before any field is read.
pub fn object<I, K>(class: Option<Type>, fields: I) -> Pattern
where
    I: IntoIterator<Item = (K, Pattern)>,
    K: Into<String>,
{
    Pattern::ObjectShape {
        class,
        fields: fields.into_iter().map(|(k, p)| (k.into(), p)).collect(),
    }
}

pub fn map_shape<I, K>(fields: I) -> Pattern
where
    I: IntoIterator<Item = (K, Pattern)>,
    K: Into<Value>,
{
    Pattern::MapShape(fields.into_iter().map(|(k, p)| (k.into(), p)).collect())
}

/// A plain capture, not tied to any binder.
pub fn capture(name: &str) -> Pattern {
    Pattern::Capture(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let cv = Binder::new("cv");
        let pattern = some([
            tuple([cv.capture("a"), Pattern::from(Type::Int)]),
            list([capture("b"), lit(3)]),
            cons(instance_of(Type::Str), pred("positive", |_| true)),
        ]);
        assert_eq!(
            pattern.to_string(),
            "some((?cv.a, int), [?b, lit(3)], cons(instance_of(str), pred(positive)))"
        );
    }

    #[test]
    fn binders_are_deduplicated() {
        let cv = Binder::new("cv");
        let other = Binder::new("other");
        let pattern = all([
            cv.capture("a"),
            list([cv.capture("b"), other.capture("c")]),
            object(None, [("x", cv.capture("d"))]),
        ]);
        let binders = pattern.binders();
        assert_eq!(binders.len(), 2);
        assert!(binders.iter().any(|b| b.same(&cv)));
        assert!(binders.iter().any(|b| b.same(&other)));
    }

    #[test]
    fn plain_patterns_have_no_binders() {
        let pattern = list([capture("a"), Pattern::from(1)]);
        assert!(pattern.binders().is_empty());
    }
}
