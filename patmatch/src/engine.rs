use host::{Type, Value};

use crate::binder::Binder;
use crate::context::{Bindings, CaptureContext};
use crate::error::{MatchError, PredicateError};
use crate::pattern::Pattern;

/// Match `subject` against `pattern`.
///
/// Every binder referenced by the pattern is closed with the committed
/// captures on success and destroyed on failure or error.
pub fn match_pattern(pattern: &Pattern, subject: &Value) -> Result<bool, MatchError> {
    Ok(match_captures(pattern, subject)?.is_some())
}

/// Like [`match_pattern`], but also returns the committed captures,
/// including plain `Capture` names that no binder owns.
pub fn match_captures(pattern: &Pattern, subject: &Value) -> Result<Option<Bindings>, MatchError> {
    let claim = Claim::acquire(pattern.binders())?;

    let span = tracing::debug_span!("match", pattern = pattern.kind(), %subject);
    let _enter = span.enter();

    let mut context = CaptureContext::new();
    match match_recursive(pattern, subject, &mut context) {
        Ok(true) => {
            let bindings = context.into_bindings();
            tracing::debug!(captured = bindings.len(), "matched");
            claim.close(&bindings);
            Ok(Some(bindings))
        }
        Ok(false) => {
            tracing::debug!("no match");
            claim.destroy();
            Ok(None)
        }
        Err(err) => {
            tracing::debug!(error = %err, "match aborted");
            claim.destroy();
            Err(err.into())
        }
    }
}

/// Binders held by one in-flight match. Dropped without being settled
/// (a panicking predicate), they are destroyed.
struct Claim {
    binders: Vec<Binder>,
    settled: bool,
}

impl Claim {
    fn acquire(binders: Vec<Binder>) -> Result<Self, MatchError> {
        for (i, binder) in binders.iter().enumerate() {
            if let Err(err) = binder.claim() {
                for claimed in &binders[..i] {
                    claimed.release();
                }
                return Err(err);
            }
        }
        Ok(Claim {
            binders,
            settled: false,
        })
    }

    fn close(mut self, bindings: &Bindings) {
        for binder in &self.binders {
            binder.close(bindings);
        }
        self.settled = true;
    }

    fn destroy(mut self) {
        for binder in &self.binders {
            binder.destroy();
        }
        self.settled = true;
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        if !self.settled {
            for binder in &self.binders {
                binder.destroy();
            }
        }
    }
}

/// The recursive matcher. Bindings made by successful sub-matches are left
/// in `context`; only a disjunction rolls back what its failed branches did.
pub fn match_recursive(
    pattern: &Pattern,
    subject: &Value,
    context: &mut CaptureContext,
) -> Result<bool, PredicateError> {
    match pattern {
        Pattern::Value(value) => Ok(match_bare(value, subject)),

        Pattern::Literal(value) => Ok(value == subject),

        Pattern::TypeTag(ty) => Ok(ty.is_instance(subject)),

        Pattern::Predicate(predicate) => predicate.test(subject),

        Pattern::Sequence(kind, items) => match subject.as_sequence() {
            Some((subject_kind, seq)) if subject_kind == *kind && seq.len() == items.len() => {
                for (item, element) in items.iter().zip(seq.iter()) {
                    if !match_recursive(item, element, context)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        },

        Pattern::Conjunction(patterns) => {
            for pattern in patterns {
                if !match_recursive(pattern, subject, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Pattern::Disjunction(alternatives) => {
            for (branch, alternative) in alternatives.iter().enumerate() {
                let checkpoint = context.checkpoint();
                if match_recursive(alternative, subject, context)? {
                    tracing::trace!(
                        branch,
                        bound = ?context.bound_since(checkpoint),
                        "branch matched"
                    );
                    return Ok(true);
                }
                tracing::trace!(branch, "branch failed, rolling back");
                context.rollback(checkpoint);
            }
            Ok(false)
        }

        Pattern::Decompose { head, tail } => {
            let Some((kind, seq)) = subject.as_sequence() else {
                return Ok(false);
            };
            let Some((first, rest)) = seq.split_first() else {
                return Ok(false);
            };
            if !match_recursive(head, first, context)? {
                return Ok(false);
            }
            tracing::trace!(remaining = rest.len(), "decompose tail");
            match_recursive(tail, &Value::from_seq(kind, rest), context)
        }

        Pattern::ObjectShape { class, fields } => {
            if let Some(class) = class {
                if !class.is_instance(subject) {
                    return Ok(false);
                }
            }
            for (name, pattern) in fields {
                let Some(value) = subject.field(name) else {
                    return Ok(false);
                };
                if !match_recursive(pattern, value, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Pattern::MapShape(fields) => {
            if subject.as_map().is_none() {
                return Ok(false);
            }
            for (key, pattern) in fields {
                let Some(value) = subject.lookup(key) else {
                    return Ok(false);
                };
                if !match_recursive(pattern, value, context)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Pattern::Capture(name) => Ok(context.bind(name, subject)),

        Pattern::Handle(handle) => Ok(context.bind(handle.name(), subject)),
    }
}

/// Structural fallback for bare values: equality, then exact type for a
/// type value, then positional match for a same-kind, same-length sequence.
fn match_bare(pattern: &Value, subject: &Value) -> bool {
    if pattern == subject {
        return true;
    }
    if let Value::Type(ty) = pattern {
        return exact_type(ty, subject);
    }
    match (pattern.as_sequence(), subject.as_sequence()) {
        (Some((kind, items)), Some((subject_kind, elements)))
            if kind == subject_kind && items.len() == elements.len() =>
        {
            items
                .iter()
                .zip(elements.iter())
                .all(|(item, element)| match_bare(item, element))
        }
        _ => false,
    }
}

/// A bare type never admits subclass instances.
fn exact_type(ty: &Type, subject: &Value) -> bool {
    subject.type_of() == *ty
}
