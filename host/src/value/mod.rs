pub mod record;
pub mod sequence;

use std::fmt;
use std::sync::Arc;

use crate::types::Type;
use record::{Map, Object};
use sequence::{Seq, SeqKind};

/// A dynamic host value: the subject of a match and the payload of literal
/// patterns.
#[derive(Debug, Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Seq),
    Tuple(Seq),
    Map(Map),
    Object(Object),
    /// A type used as a value, e.g. `int` or a class.
    Type(Type),
}

impl Value {
    pub fn str(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    /// Wrap a sequence as a value of the given kind.
    pub fn from_seq(kind: SeqKind, seq: Seq) -> Self {
        match kind {
            SeqKind::List => Value::List(seq),
            SeqKind::Tuple => Value::Tuple(seq),
        }
    }

    /// The concrete runtime type.
    pub fn type_of(&self) -> Type {
        match self {
            Value::Unit => Type::Unit,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::Float(_) => Type::Float,
            Value::Str(_) => Type::Str,
            Value::List(_) => Type::List,
            Value::Tuple(_) => Type::Tuple,
            Value::Map(_) => Type::Map,
            Value::Object(object) => Type::Class(object.class().clone()),
            Value::Type(_) => Type::Type,
        }
    }

    /// Sequence introspection: the kind and elements of an ordered sequence.
    pub fn as_sequence(&self) -> Option<(SeqKind, &Seq)> {
        match self {
            Value::List(seq) => Some((SeqKind::List, seq)),
            Value::Tuple(seq) => Some((SeqKind::Tuple, seq)),
            _ => None,
        }
    }

    /// Attribute lookup. Only objects expose fields.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Object(object) => object.field(name),
            _ => None,
        }
    }

    /// The map behind a key/value-lookupable value.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Key lookup. `None` both for absent keys and for non-map values.
    pub fn lookup(&self, key: &Value) -> Option<&Value> {
        self.as_map()?.get(key)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b, // NaN != NaN per IEEE 754
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Type(a), Value::Type(b)) => a == b,
            _ => false,
        }
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &Seq) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "unit"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{:?}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items)?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items)?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Map(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
            Value::Object(object) => {
                write!(f, "{}(", object.class().name())?;
                for (i, (name, value)) in object.fields().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", name, value)?;
                }
                write!(f, ")")
            }
            Value::Type(ty) => write!(f, "<type {}>", ty),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<Type> for Value {
    fn from(ty: Type) -> Self {
        Value::Type(ty)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Value::Object(object)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Map(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Class;

    #[test]
    fn equality_is_variant_strict() {
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Bool(true));
        assert_ne!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::str("1"), Value::Int(1));
    }

    #[test]
    fn list_and_tuple_never_equal() {
        let list = Value::list([Value::Int(1), Value::Int(2)]);
        let tuple = Value::tuple([Value::Int(1), Value::Int(2)]);
        assert_ne!(list, tuple);
        assert_eq!(list, Value::list([Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn tail_equals_fresh_sequence() {
        let list = Value::list([Value::Int(1), Value::Int(2), Value::Int(3)]);
        let (kind, seq) = list.as_sequence().expect("sequence");
        let (_, tail) = seq.split_first().expect("non-empty");
        assert_eq!(
            Value::from_seq(kind, tail),
            Value::list([Value::Int(2), Value::Int(3)])
        );
    }

    #[test]
    fn introspection() {
        let point = Class::new("Point");
        let object = Value::Object(Object::new(&point, [("x", Value::Int(3))]));
        assert_eq!(object.field("x"), Some(&Value::Int(3)));
        assert_eq!(object.field("y"), None);
        assert_eq!(object.type_of(), Type::Class(point));
        assert!(object.as_map().is_none());

        let map = Value::Map(Map::from_entries([(Value::str("k"), Value::Unit)]));
        assert_eq!(map.lookup(&Value::str("k")), Some(&Value::Unit));
        assert_eq!(map.field("k"), None);
        assert_eq!(Value::Int(1).lookup(&Value::str("k")), None);
    }

    #[test]
    fn display() {
        let point = Class::new("Point");
        let value = Value::list([
            Value::Int(1),
            Value::tuple([Value::str("a")]),
            Value::Map(Map::from_entries([(Value::str("k"), Value::Float(1.5))])),
            Value::Object(Object::new(&point, [("x", Value::Int(0))])),
            Value::Type(Type::Int),
        ]);
        assert_eq!(
            value.to_string(),
            r#"[1, ("a",), {"k": 1.5}, Point(x=0), <type int>]"#
        );
    }
}
