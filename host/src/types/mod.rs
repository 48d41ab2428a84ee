use std::fmt;
use std::sync::Arc;

use crate::value::Value;

#[derive(Debug)]
struct ClassDef {
    name: String,
    parent: Option<Class>,
}

/// A user-declared class.
///
/// Identity is the allocation: two classes declared with the same name are
/// still distinct types. Cloning a `Class` yields the same class.
#[derive(Clone)]
pub struct Class(Arc<ClassDef>);

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Class(Arc::new(ClassDef {
            name: name.into(),
            parent: None,
        }))
    }

    /// Declare a class that inherits from `parent`.
    pub fn with_parent(name: impl Into<String>, parent: &Class) -> Self {
        Class(Arc::new(ClassDef {
            name: name.into(),
            parent: Some(parent.clone()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn parent(&self) -> Option<&Class> {
        self.0.parent.as_ref()
    }

    /// True if `self` is `other` or inherits from it, directly or not.
    pub fn is_subclass_of(&self, other: &Class) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == other {
                return true;
            }
            current = class.parent();
        }
        false
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Class({})", self.0.name)
    }
}

/// The concrete runtime type of a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Unit,
    Bool,
    Int,
    Float,
    Str,
    List,
    Tuple,
    Map,
    /// The type of type values themselves.
    Type,
    Class(Class),
}

impl Type {
    pub fn name(&self) -> &str {
        match self {
            Type::Unit => "unit",
            Type::Bool => "bool",
            Type::Int => "int",
            Type::Float => "float",
            Type::Str => "str",
            Type::List => "list",
            Type::Tuple => "tuple",
            Type::Map => "map",
            Type::Type => "type",
            Type::Class(class) => class.name(),
        }
    }

    /// Look up a builtin type by name. `dict` is accepted as an alias of `map`.
    pub fn from_builtin_name(name: &str) -> Option<Type> {
        let ty = match name {
            "unit" => Type::Unit,
            "bool" => Type::Bool,
            "int" => Type::Int,
            "float" => Type::Float,
            "str" => Type::Str,
            "list" => Type::List,
            "tuple" => Type::Tuple,
            "map" | "dict" => Type::Map,
            "type" => Type::Type,
            _ => return None,
        };
        Some(ty)
    }

    /// Instance-of test. Builtin types only admit their own values; a class
    /// also admits instances of its subclasses.
    pub fn is_instance(&self, value: &Value) -> bool {
        match (self, value.type_of()) {
            (Type::Class(expected), Type::Class(actual)) => actual.is_subclass_of(expected),
            (expected, actual) => *expected == actual,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record::Object;

    #[test]
    fn class_identity_is_by_declaration() {
        let a = Class::new("Point");
        let b = Class::new("Point");
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn subclass_walks_parent_chain() {
        let shape = Class::new("Shape");
        let polygon = Class::with_parent("Polygon", &shape);
        let square = Class::with_parent("Square", &polygon);
        assert!(square.is_subclass_of(&shape));
        assert!(square.is_subclass_of(&square));
        assert!(!shape.is_subclass_of(&square));
    }

    #[test]
    fn instance_of_builtin_is_exact() {
        assert!(Type::Int.is_instance(&Value::Int(3)));
        assert!(!Type::Int.is_instance(&Value::Float(3.0)));
        assert!(!Type::Int.is_instance(&Value::Bool(true)));
        assert!(Type::Map.is_instance(&Value::Map(Default::default())));
    }

    #[test]
    fn instance_of_class_accepts_subclasses() {
        let shape = Class::new("Shape");
        let circle = Class::with_parent("Circle", &shape);
        let value = Value::Object(Object::new(&circle, [("r", Value::Int(1))]));
        assert!(Type::Class(shape.clone()).is_instance(&value));
        assert!(Type::Class(circle).is_instance(&value));
        assert!(!Type::Class(Class::new("Shape")).is_instance(&value));
    }

    #[test]
    fn builtin_names() {
        assert_eq!(Type::from_builtin_name("dict"), Some(Type::Map));
        assert_eq!(Type::from_builtin_name("int").map(|t| t.to_string()), Some("int".to_string()));
        assert_eq!(Type::from_builtin_name("Point"), None);
    }
}
