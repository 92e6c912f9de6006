//! Render contexts and value coercions.
//!
//! Template data is a [`serde_json::Value`]. A loop iteration does not copy
//! its parent context; it overlays a single binding on top of it.

use serde_json::Value;

/// The data a template is rendered against.
#[derive(Clone, Copy, Debug)]
pub enum Context<'a> {
    Root(&'a Value),
    Bound {
        parent: &'a Context<'a>,
        name: &'a str,
        value: &'a Value,
    },
}

impl<'a> Context<'a> {
    pub fn root(value: &'a Value) -> Self {
        Self::Root(value)
    }

    /// A derived context where `name` resolves to `value` and every other
    /// name falls through to `self`.
    pub fn bind<'b>(&'b self, name: &'b str, value: &'b Value) -> Context<'b>
    where
        'a: 'b,
    {
        Context::Bound { parent: self, name, value }
    }

    fn lookup(&self, key: &str) -> Option<&'a Value> {
        match *self {
            Self::Root(value) => value.as_object()?.get(key),
            Self::Bound { parent, name, value } => {
                if name == key { Some(value) } else { parent.lookup(key) }
            }
        }
    }

    /// Resolves an accessor such as `user.name` or `users[0].email`.
    ///
    /// Names index mappings, integers index sequences. Any missing step
    /// yields `None`; resolution never fails the render.
    pub fn resolve(&self, path: &str) -> Option<&'a Value> {
        let mut segments = path.split(['.', '[', ']']).filter(|s| !s.is_empty());
        let mut current = self.lookup(segments.next()?)?;
        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Truthiness of a resolved value: missing, `null`, `false`, `0`, `NaN`
/// and `""` are falsy; everything else, including empty sequences and
/// mappings, is truthy.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

/// Text form of a value as it appears in rendered output.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => format!("{f:.0}"),
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_nested_paths() {
        let data = json!({
            "user": {"name": "Ada", "tags": ["x", "y"]},
            "users": [{"email": "a@example.com"}, {"email": "b@example.com"}],
        });
        let ctx = Context::root(&data);
        assert_eq!(ctx.resolve("user.name"), Some(&json!("Ada")));
        assert_eq!(ctx.resolve("user.tags[1]"), Some(&json!("y")));
        assert_eq!(ctx.resolve("users[1].email"), Some(&json!("b@example.com")));
        assert_eq!(ctx.resolve("users.0.email"), Some(&json!("a@example.com")));
    }

    #[test]
    fn test_missing_steps_resolve_to_none() {
        let data = json!({"a": {"b": null}, "list": [1]});
        let ctx = Context::root(&data);
        assert_eq!(ctx.resolve("nope"), None);
        assert_eq!(ctx.resolve("a.b.c"), None);
        assert_eq!(ctx.resolve("a.x.y"), None);
        assert_eq!(ctx.resolve("list[5]"), None);
        assert_eq!(ctx.resolve("list.first"), None);
        assert_eq!(ctx.resolve(""), None);
    }

    #[test]
    fn test_binding_shadows_parent() {
        let data = json!({"x": "outer", "title": "T"});
        let item = json!({"name": "inner"});
        let root = Context::root(&data);
        let scope = root.bind("x", &item);
        assert_eq!(scope.resolve("x.name"), Some(&json!("inner")));
        assert_eq!(scope.resolve("title"), Some(&json!("T")));
        assert_eq!(root.resolve("x"), Some(&json!("outer")));
    }

    #[test]
    fn test_truthiness() {
        for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!truthy(Some(&falsy)), "{falsy} should be falsy");
        }
        for truthy_value in [json!(true), json!(-1), json!("0"), json!([]), json!({})] {
            assert!(truthy(Some(&truthy_value)), "{truthy_value} should be truthy");
        }
        assert!(!truthy(None));
    }

    #[test]
    fn test_stringify() {
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&json!(2.0)), "2");
        assert_eq!(stringify(&json!(2.5)), "2.5");
        assert_eq!(stringify(&json!(true)), "true");
        assert_eq!(stringify(&json!(null)), "");
        assert_eq!(stringify(&json!([1, "a", null])), "1,a,");
        assert_eq!(stringify(&json!({"a": 1})), "[object Object]");
    }
}
