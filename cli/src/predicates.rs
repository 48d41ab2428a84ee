use patmatch::Predicate;
use patmatch::host::Value;

/// Predicates a case file can name. `gt`, `lt` and `eq` take an `arg`.
pub const NAMES: &[&str] = &[
    "positive", "negative", "even", "odd", "non_empty", "gt", "lt", "eq", "raise",
];

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

fn numeric_arg(name: &str, arg: &Value) -> Result<f64, String> {
    number(arg).ok_or_else(|| format!("`{}` needs a numeric argument, got {}", name, arg))
}

/// Build the predicate called `name`.
pub fn resolve(name: &str, arg: Option<Value>) -> Result<Predicate, String> {
    let predicate = match (name, arg) {
        ("positive", None) => Predicate::new(name, |v| number(v).is_some_and(|n| n > 0.0)),
        ("negative", None) => Predicate::new(name, |v| number(v).is_some_and(|n| n < 0.0)),
        ("even", None) => Predicate::new(name, |v| matches!(v, Value::Int(n) if n % 2 == 0)),
        ("odd", None) => Predicate::new(name, |v| matches!(v, Value::Int(n) if n % 2 != 0)),
        ("non_empty", None) => Predicate::new(name, |v| match v {
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Map(map) => !map.is_empty(),
            _ => false,
        }),
        ("gt", Some(arg)) => {
            let bound = numeric_arg(name, &arg)?;
            Predicate::new(name, move |v| number(v).is_some_and(|n| n > bound))
        }
        ("lt", Some(arg)) => {
            let bound = numeric_arg(name, &arg)?;
            Predicate::new(name, move |v| number(v).is_some_and(|n| n < bound))
        }
        ("eq", Some(arg)) => Predicate::new(name, move |v| *v == arg),
        ("raise", None) => Predicate::fallible(name, |v| Err(format!("raised on {}", v))),
        ("gt" | "lt" | "eq", None) => return Err(format!("predicate `{}` needs an `arg`", name)),
        (known, Some(_)) if NAMES.contains(&known) => {
            return Err(format!("predicate `{}` takes no `arg`", name));
        }
        (unknown, _) => return Err(format!("unknown predicate `{}`", unknown)),
    };
    Ok(predicate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_predicates() {
        let gt = resolve("gt", Some(Value::Int(4))).unwrap();
        assert_eq!(gt.test(&Value::Int(7)), Ok(true));
        assert_eq!(gt.test(&Value::Float(3.5)), Ok(false));
        assert_eq!(gt.test(&Value::str("9")), Ok(false));

        let even = resolve("even", None).unwrap();
        assert_eq!(even.test(&Value::Int(-2)), Ok(true));
        assert_eq!(even.test(&Value::Int(3)), Ok(false));
    }

    #[test]
    fn raise_reports_its_name() {
        let raise = resolve("raise", None).unwrap();
        let err = raise.test(&Value::Int(1)).unwrap_err();
        assert_eq!(err.predicate, "raise");
        assert_eq!(err.message, "raised on 1");
    }

    #[test]
    fn argument_errors() {
        assert!(resolve("gt", None).is_err());
        assert!(resolve("gt", Some(Value::str("x"))).is_err());
        assert!(resolve("even", Some(Value::Int(1))).is_err());
        assert_eq!(
            resolve("prime", None).err(),
            Some("unknown predicate `prime`".to_string())
        );
    }
}
