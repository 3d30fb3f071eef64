//! Expression evaluation scope.
//!
//! Expressions resolve names against the owning tag instance: loop variables
//! and user-state first, then `opts.*`. Loop item instances inherit the
//! surrounding scope, so an expression inside a loop body still sees the
//! parent's state and opts; regular nested tags do not inherit (they only
//! see what was passed through their opts).

use std::rc::Rc;

use serde_json::Value;

use super::tag::Tag;

/// Evaluation context for one tag instance.
#[derive(Clone)]
pub struct Scope {
    tag: Rc<Tag>,
}

impl Scope {
    pub(crate) fn new(tag: Rc<Tag>) -> Self {
        Self { tag }
    }

    /// The instance this scope evaluates against. Handlers and computed
    /// expressions use this to reach user-state.
    pub fn tag(&self) -> &Rc<Tag> {
        &self.tag
    }

    /// Resolve a dot path. `opts.` prefixed paths read the opts snapshot,
    /// everything else reads user-state. Missing paths resolve to `Null`.
    pub fn get(&self, path: &str) -> Value {
        if path == "opts" {
            return self.tag.opts();
        }
        if let Some(rest) = path.strip_prefix("opts.") {
            return self.lookup_opt(rest);
        }
        self.lookup_state(path)
    }

    fn lookup_state(&self, path: &str) -> Value {
        let mut tag = Some(self.tag.clone());
        while let Some(t) = tag {
            if let Some(v) = t.try_get(path) {
                return v;
            }
            tag = if t.inherits_scope() { t.parent() } else { None };
        }
        Value::Null
    }

    fn lookup_opt(&self, path: &str) -> Value {
        let mut tag = Some(self.tag.clone());
        while let Some(t) = tag {
            if let Some(v) = t.try_opt(path) {
                return v;
            }
            tag = if t.inherits_scope() { t.parent() } else { None };
        }
        Value::Null
    }
}

// =============================================================================
// Value semantics
// =============================================================================

/// Truthiness rules used by conditional directives and attribute bindings.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Render a value as DOM text. `Null` renders empty, never as a literal
/// "null"; strings render verbatim; everything else serializes.
pub fn render_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Walk a dot path into a value. `None` means the path is absent, which is
/// distinct from a present `Null`.
pub(crate) fn walk_path(value: &Value, path: &str) -> Option<Value> {
    let mut cur = value;
    for seg in path.split('.') {
        cur = cur.as_object()?.get(seg)?;
    }
    Some(cur.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_walk_path() {
        let v = json!({ "a": { "b": 1 }, "n": null });
        assert_eq!(walk_path(&v, "a.b"), Some(json!(1)));
        assert_eq!(walk_path(&v, "n"), Some(Value::Null));
        assert_eq!(walk_path(&v, "a.missing"), None);
        assert_eq!(walk_path(&v, "missing.deep"), None);
    }

    #[test]
    fn test_render_text() {
        assert_eq!(render_text(&Value::Null), "");
        assert_eq!(render_text(&json!("hi")), "hi");
        assert_eq!(render_text(&json!(10)), "10");
        assert_eq!(render_text(&json!(1.5)), "1.5");
        assert_eq!(render_text(&json!(false)), "false");
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(&Value::Null));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("x")));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!(2)));
    }
}
