use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use codespan_reporting::diagnostic::{Diagnostic, Label};
use serde::Deserialize;
use toml::Spanned;

use patmatch::host::{Class, Map, Object, Type, Value};
use patmatch::{
    Binder, BinderState, Bindings, MatchError, Pattern, all, capture, cons, instance_of, list,
    map_shape, match_captures, object, some, tuple,
};

use crate::predicates;

/// A case file that could not be loaded, with the byte span it points at.
#[derive(Debug, Clone)]
pub struct CaseError {
    pub message: String,
    pub span: Option<Range<usize>>,
    pub notes: Vec<String>,
}

impl CaseError {
    pub fn new(message: impl Into<String>, span: Option<Range<usize>>) -> Self {
        CaseError {
            message: message.into(),
            span,
            notes: Vec::new(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Convert to a codespan-reporting Diagnostic for display.
    pub fn to_diagnostic(&self, file_id: usize) -> Diagnostic<usize> {
        let diagnostic = Diagnostic::error()
            .with_message(&self.message)
            .with_notes(self.notes.clone());
        match &self.span {
            Some(span) => diagnostic.with_labels(vec![Label::primary(file_id, span.clone())]),
            None => diagnostic,
        }
    }
}

impl From<toml::de::Error> for CaseError {
    fn from(err: toml::de::Error) -> Self {
        CaseError::new(err.message().trim_end(), err.span())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassDecl {
    #[serde(default)]
    parent: Option<Spanned<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PredicateSpec {
    name: Spanned<String>,
    #[serde(default)]
    arg: Option<Spanned<toml::Value>>,
}

/// Pattern notation: a single-key table naming the node kind.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PatternSpec {
    Value(Spanned<toml::Value>),
    Literal(Spanned<toml::Value>),
    /// Bare type, exact match.
    Type(Spanned<String>),
    InstanceOf(Spanned<String>),
    Predicate(PredicateSpec),
    List(Vec<PatternSpec>),
    Tuple(Vec<PatternSpec>),
    All(Vec<PatternSpec>),
    #[serde(rename = "some")]
    Any(Vec<PatternSpec>),
    Cons {
        head: Box<PatternSpec>,
        tail: Box<PatternSpec>,
    },
    Object {
        #[serde(default)]
        class: Option<Spanned<String>>,
        #[serde(default)]
        fields: BTreeMap<String, PatternSpec>,
    },
    Map(BTreeMap<String, PatternSpec>),
    Capture(String),
    Bind(String),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExpectSpec {
    #[serde(default = "default_matched")]
    matched: bool,
    #[serde(default)]
    bindings: BTreeMap<String, Spanned<toml::Value>>,
    #[serde(default)]
    unbound: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

fn default_matched() -> bool {
    true
}

impl Default for ExpectSpec {
    fn default() -> Self {
        ExpectSpec {
            matched: true,
            bindings: BTreeMap::new(),
            unbound: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaseFile {
    /// Human-readable case description.
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    classes: BTreeMap<String, ClassDecl>,
    subject: Spanned<toml::Value>,
    pattern: PatternSpec,
    #[serde(default)]
    expect: ExpectSpec,
}

#[derive(Debug)]
pub struct Expectation {
    pub matched: bool,
    pub bindings: Vec<(String, Value)>,
    pub unbound: Vec<String>,
    /// Substring of the expected MatchError message.
    pub error: Option<String>,
}

/// A loaded case: a subject, a pattern whose `bind` nodes belong to
/// `binder`, and what the match should produce.
#[derive(Debug)]
pub struct Case {
    pub description: Option<String>,
    pub subject: Value,
    pub pattern: Pattern,
    pub binder: Binder,
    pub expect: Expectation,
}

pub type Outcome = Result<Option<Bindings>, MatchError>;

/// Parse a `.case.toml` source. `bind` nodes get handles from a fresh
/// binder called `binder_name`.
pub fn parse_case(source: &str, binder_name: &str) -> Result<Case, CaseError> {
    let file: CaseFile = toml::from_str(source)?;
    let classes = declare_classes(&file.classes)?;
    let loader = Loader {
        classes,
        binder: Binder::new(binder_name),
    };

    let subject = loader.spanned_value(&file.subject)?;
    let pattern = loader.pattern(&file.pattern)?;
    let bindings = file
        .expect
        .bindings
        .iter()
        .map(|(name, raw)| Ok((name.clone(), loader.spanned_value(raw)?)))
        .collect::<Result<Vec<_>, CaseError>>()?;

    Ok(Case {
        description: file.description,
        subject,
        pattern,
        binder: loader.binder,
        expect: Expectation {
            matched: file.expect.matched,
            bindings,
            unbound: file.expect.unbound,
            error: file.expect.error,
        },
    })
}

fn declare_classes(
    decls: &BTreeMap<String, ClassDecl>,
) -> Result<HashMap<String, Class>, CaseError> {
    let mut declared = HashMap::new();
    for name in decls.keys() {
        declare_class(name, decls, &mut declared, &mut Vec::new())?;
    }
    Ok(declared)
}

fn declare_class(
    name: &str,
    decls: &BTreeMap<String, ClassDecl>,
    declared: &mut HashMap<String, Class>,
    visiting: &mut Vec<String>,
) -> Result<Class, CaseError> {
    if let Some(class) = declared.get(name) {
        return Ok(class.clone());
    }
    if Type::from_builtin_name(name).is_some() {
        return Err(CaseError::new(
            format!("class `{}` shadows a builtin type", name),
            None,
        ));
    }
    if visiting.iter().any(|v| v == name) {
        return Err(
            CaseError::new(format!("class `{}` inherits from itself", name), None)
                .with_note(format!("chain: {} -> {}", visiting.join(" -> "), name)),
        );
    }

    let parent = decls.get(name).and_then(|decl| decl.parent.as_ref());
    let class = match parent {
        None => Class::new(name),
        Some(parent) => {
            if !decls.contains_key(parent.get_ref()) {
                return Err(CaseError::new(
                    format!("unknown parent class `{}`", parent.get_ref()),
                    Some(parent.span()),
                ));
            }
            visiting.push(name.to_string());
            let parent_class = declare_class(parent.get_ref(), decls, declared, visiting)?;
            visiting.pop();
            Class::with_parent(name, &parent_class)
        }
    };
    declared.insert(name.to_string(), class.clone());
    Ok(class)
}

struct Loader {
    classes: HashMap<String, Class>,
    binder: Binder,
}

impl Loader {
    fn type_named(&self, name: &str, span: &Range<usize>) -> Result<Type, CaseError> {
        if let Some(ty) = Type::from_builtin_name(name) {
            return Ok(ty);
        }
        self.classes
            .get(name)
            .map(|class| Type::Class(class.clone()))
            .ok_or_else(|| {
                CaseError::new(format!("unknown type `{}`", name), Some(span.clone()))
                    .with_note("declare classes in a [classes] table")
            })
    }

    fn spanned_type(&self, name: &Spanned<String>) -> Result<Type, CaseError> {
        self.type_named(name.get_ref(), &name.span())
    }

    fn spanned_value(&self, raw: &Spanned<toml::Value>) -> Result<Value, CaseError> {
        self.value(raw.get_ref(), &raw.span())
    }

    /// Value notation. Nested values carry no spans of their own, so
    /// errors point at the enclosing spanned value.
    fn value(&self, raw: &toml::Value, span: &Range<usize>) -> Result<Value, CaseError> {
        match raw {
            toml::Value::String(s) => Ok(Value::str(s)),
            toml::Value::Integer(n) => Ok(Value::Int(*n)),
            toml::Value::Float(f) => Ok(Value::Float(*f)),
            toml::Value::Boolean(b) => Ok(Value::Bool(*b)),
            toml::Value::Datetime(dt) => Ok(Value::str(dt.to_string())),
            toml::Value::Array(items) => Ok(Value::list(self.values(items, span)?)),
            toml::Value::Table(table) => self.tagged_value(table, span),
        }
    }

    fn values(&self, items: &[toml::Value], span: &Range<usize>) -> Result<Vec<Value>, CaseError> {
        items.iter().map(|item| self.value(item, span)).collect()
    }

    fn tagged_value(&self, table: &toml::Table, span: &Range<usize>) -> Result<Value, CaseError> {
        if let Some(class) = table.get("class") {
            return self.object_value(table, class, span);
        }
        let mut entries = table.iter();
        let (key, inner) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => return Err(bad_table(span)),
        };
        match (key.as_str(), inner) {
            ("tuple", toml::Value::Array(items)) => Ok(Value::tuple(self.values(items, span)?)),
            ("map", toml::Value::Table(entries)) => {
                let entries = entries
                    .iter()
                    .map(|(k, v)| Ok((Value::str(k), self.value(v, span)?)))
                    .collect::<Result<Vec<_>, CaseError>>()?;
                Ok(Value::Map(Map::from_entries(entries)))
            }
            ("type", toml::Value::String(name)) => Ok(Value::Type(self.type_named(name, span)?)),
            ("unit", toml::Value::Boolean(true)) => Ok(Value::Unit),
            _ => Err(bad_table(span)),
        }
    }

    fn object_value(
        &self,
        table: &toml::Table,
        class: &toml::Value,
        span: &Range<usize>,
    ) -> Result<Value, CaseError> {
        let Some(class_name) = class.as_str() else {
            return Err(CaseError::new("`class` must be a class name", Some(span.clone())));
        };
        let class = match self.type_named(class_name, span)? {
            Type::Class(class) => class,
            builtin => {
                return Err(CaseError::new(
                    format!("`{}` is a builtin type, not a class", builtin),
                    Some(span.clone()),
                ));
            }
        };
        let mut fields = Vec::new();
        for (key, inner) in table {
            match (key.as_str(), inner) {
                ("class", _) => {}
                ("fields", toml::Value::Table(entries)) => {
                    for (name, raw) in entries {
                        fields.push((name.clone(), self.value(raw, span)?));
                    }
                }
                _ => return Err(bad_table(span)),
            }
        }
        Ok(Value::Object(Object::new(&class, fields)))
    }

    fn patterns(&self, specs: &[PatternSpec]) -> Result<Vec<Pattern>, CaseError> {
        specs.iter().map(|spec| self.pattern(spec)).collect()
    }

    fn pattern(&self, spec: &PatternSpec) -> Result<Pattern, CaseError> {
        let pattern = match spec {
            PatternSpec::Value(raw) => Pattern::Value(self.spanned_value(raw)?),
            PatternSpec::Literal(raw) => Pattern::Literal(self.spanned_value(raw)?),
            PatternSpec::Type(name) => Pattern::from(self.spanned_type(name)?),
            PatternSpec::InstanceOf(name) => instance_of(self.spanned_type(name)?),
            PatternSpec::Predicate(spec) => {
                let arg = spec
                    .arg
                    .as_ref()
                    .map(|raw| self.spanned_value(raw))
                    .transpose()?;
                let predicate = predicates::resolve(spec.name.get_ref(), arg).map_err(|message| {
                    CaseError::new(message, Some(spec.name.span()))
                        .with_note(format!("known predicates: {}", predicates::NAMES.join(", ")))
                })?;
                Pattern::Predicate(predicate)
            }
            PatternSpec::List(items) => list(self.patterns(items)?),
            PatternSpec::Tuple(items) => tuple(self.patterns(items)?),
            PatternSpec::All(items) => all(self.patterns(items)?),
            PatternSpec::Any(items) => some(self.patterns(items)?),
            PatternSpec::Cons { head, tail } => cons(self.pattern(head)?, self.pattern(tail)?),
            PatternSpec::Object { class, fields } => {
                let class = class
                    .as_ref()
                    .map(|name| self.spanned_type(name))
                    .transpose()?;
                let fields = fields
                    .iter()
                    .map(|(name, spec)| Ok((name.clone(), self.pattern(spec)?)))
                    .collect::<Result<Vec<_>, CaseError>>()?;
                object(class, fields)
            }
            PatternSpec::Map(fields) => {
                let fields = fields
                    .iter()
                    .map(|(key, spec)| Ok((key.clone(), self.pattern(spec)?)))
                    .collect::<Result<Vec<_>, CaseError>>()?;
                map_shape(fields)
            }
            PatternSpec::Capture(name) => capture(name),
            PatternSpec::Bind(name) => self.binder.capture(name),
        };
        Ok(pattern)
    }
}

fn bad_table(span: &Range<usize>) -> CaseError {
    CaseError::new("unrecognised table value", Some(span.clone())).with_note(
        "tables must be one of { tuple = [..] }, { map = {..} }, { type = \"..\" }, \
         { unit = true } or { class = \"..\", fields = {..} }",
    )
}

fn describe(matched: bool) -> &'static str {
    if matched { "a match" } else { "no match" }
}

impl Case {
    pub fn run(&self) -> Outcome {
        match_captures(&self.pattern, &self.subject)
    }

    /// Read `name` after a match: through the binder when it handed out a
    /// handle for it, otherwise from the returned captures.
    pub fn read(&self, bindings: Option<&Bindings>, name: &str) -> Result<Value, MatchError> {
        if self.binder.has_handle(name) {
            return self.binder.get(name);
        }
        bindings
            .and_then(|b| b.get(name))
            .cloned()
            .ok_or_else(|| MatchError::BindingNotFound {
                binder: self.binder.name().to_string(),
                name: name.to_string(),
            })
    }

    /// Compare an outcome with the expectation. Returns `Some(reason)` on mismatch.
    pub fn check(&self, outcome: &Outcome) -> Option<String> {
        let bindings = match (outcome, &self.expect.error) {
            (Err(err), Some(expected)) => {
                let text = err.to_string();
                if !text.contains(expected.as_str()) {
                    return Some(format!(
                        "expected error containing \"{}\", got: {}",
                        expected, text
                    ));
                }
                if self.binder.state() == BinderState::Closed {
                    return Some("binder was closed by a failed match".to_string());
                }
                None
            }
            (Ok(_), Some(expected)) => {
                return Some(format!(
                    "expected error containing \"{}\", but the match completed",
                    expected
                ));
            }
            (Err(err), None) => return Some(format!("unexpected match error: {}", err)),
            (Ok(bindings), None) => {
                if bindings.is_some() != self.expect.matched {
                    return Some(format!(
                        "expected {}, got {}",
                        describe(self.expect.matched),
                        describe(bindings.is_some())
                    ));
                }
                bindings.as_ref()
            }
        };

        for (name, expected) in &self.expect.bindings {
            match self.read(bindings, name) {
                Ok(actual) if actual == *expected => {}
                Ok(actual) => {
                    return Some(format!(
                        "binding `{}` mismatch\n  expected: {}\n  actual:   {}",
                        name, expected, actual
                    ));
                }
                Err(err) => return Some(format!("binding `{}`: {}", name, err)),
            }
        }

        for name in &self.expect.unbound {
            match self.read(bindings, name) {
                Err(MatchError::BindingNotFound { .. }) => {}
                Ok(actual) => {
                    return Some(format!(
                        "expected `{}` to be unbound, but it is {}",
                        name, actual
                    ));
                }
                Err(err) => {
                    return Some(format!("expected `{}` to be unbound, got: {}", name, err));
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(source: &str) -> Case {
        parse_case(source, "case").expect("case should load")
    }

    fn load_err(source: &str) -> CaseError {
        parse_case(source, "case").expect_err("case should not load")
    }

    #[test]
    fn decompose_case_passes() {
        let case = load(
            r#"
description = "head and tail"
subject = [1, 2, 3]
pattern = { cons = { head = { bind = "a" }, tail = { bind = "b" } } }

[expect]
bindings = { a = 1, b = [2, 3] }
"#,
        );
        let outcome = case.run();
        assert_eq!(case.check(&outcome), None);
        assert_eq!(case.binder.state(), BinderState::Closed);
    }

    #[test]
    fn tagged_values() {
        let case = load(
            r#"
subject = { tuple = [1, { map = { k = "v" } }, { type = "int" }, { unit = true }] }
pattern = { value = 0 }
"#,
        );
        assert_eq!(
            case.subject,
            Value::tuple([
                Value::Int(1),
                Value::Map(Map::from_entries([(Value::str("k"), Value::str("v"))])),
                Value::Type(Type::Int),
                Value::Unit,
            ])
        );
    }

    #[test]
    fn classes_and_objects() {
        let case = load(
            r#"
subject = { class = "Circle", fields = { r = 2 } }
pattern = { object = { class = "Shape", fields = { r = { capture = "r" } } } }

[classes]
Shape = {}
Circle = { parent = "Shape" }

[expect]
bindings = { r = 2 }
"#,
        );
        assert_eq!(case.check(&case.run()), None);
    }

    #[test]
    fn disjunction_losing_branch_is_unbound() {
        let case = load(
            r#"
subject = [1, 2, 3]
pattern = { some = [
    { tuple = [{ bind = "a" }, { bind = "b" }, { bind = "c" }] },
    { list = [{ bind = "d" }, { bind = "e" }, { bind = "f" }] },
] }

[expect]
bindings = { d = 1, e = 2, f = 3 }
unbound = ["a", "b", "c"]
"#,
        );
        assert_eq!(case.check(&case.run()), None);
    }

    #[test]
    fn predicate_error_expectation() {
        let case = load(
            r#"
subject = 5
pattern = { all = [{ bind = "x" }, { predicate = { name = "raise" } }] }

[expect]
error = "raised on 5"
unbound = ["x"]
"#,
        );
        let outcome = case.run();
        assert!(outcome.is_err());
        assert_eq!(case.check(&outcome), None);
        assert_eq!(case.binder.state(), BinderState::Destroyed);
    }

    #[test]
    fn mismatch_is_reported() {
        let case = load(
            r#"
subject = [1, 2]
pattern = { list = [{ bind = "a" }, { type = "str" }] }

[expect]
bindings = { a = 1 }
"#,
        );
        let reason = case.check(&case.run()).expect("should fail");
        assert_eq!(reason, "expected a match, got no match");
    }

    #[test]
    fn unknown_predicate_points_at_name() {
        let source = "subject = 1\npattern = { predicate = { name = \"prime\" } }\n";
        let err = load_err(source);
        assert_eq!(err.message, "unknown predicate `prime`");
        let span = err.span.expect("span");
        assert!(source[span].contains("prime"));
    }

    #[test]
    fn unknown_type_and_cyclic_classes() {
        let err = load_err("subject = 1\npattern = { instance_of = \"Point\" }\n");
        assert_eq!(err.message, "unknown type `Point`");

        let err = load_err(concat!(
            "subject = 1\npattern = { value = 1 }\n",
            "[classes]\nA = { parent = \"B\" }\nB = { parent = \"A\" }\n",
        ));
        assert!(err.message.contains("inherits from itself"), "{}", err.message);
    }

    #[test]
    fn toml_errors_keep_their_span() {
        let err = load_err("subject = [1,\n");
        assert!(err.span.is_some());
        let err = load_err("subject = 1\n");
        assert!(err.message.contains("pattern"), "{}", err.message);
    }
}
