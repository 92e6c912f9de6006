//! Route template compilation.
//!
//! A template such as `/users/:id/posts/:post` compiles to an anchored
//! regular expression plus the parameter names in the order they appear.
//! Templates without a `:` compile to an exact, fully escaped match.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// `:name`: a run of non-`/` characters following a colon.
static PARAM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r":([^/]+)").unwrap());

/// Path parameters extracted by a successful match.
pub type Params = HashMap<String, String>;

/// A compiled route template.
#[derive(Debug, Clone)]
pub struct Matcher {
    template: String,
    regex: Regex,
    params: Vec<String>,
}

impl Matcher {
    /// Compiles `template` into a matcher.
    ///
    /// Compilation is a pure function of the template: compiling the same
    /// string twice yields matchers with identical parameter order and
    /// identical match behaviour.
    ///
    /// ```
    /// use nanoweb::Matcher;
    ///
    /// let m = Matcher::compile("/posts/:id/comments/:comment").unwrap();
    /// let params = m.captures("/posts/42/comments/7").unwrap();
    /// assert_eq!(params["id"], "42");
    /// assert_eq!(params["comment"], "7");
    /// assert!(m.captures("/posts/42").is_none());
    /// ```
    pub fn compile(template: &str) -> Result<Self, regex::Error> {
        let mut params = Vec::new();
        let mut source = String::with_capacity(template.len() + 8);
        source.push('^');

        let mut literal_from = 0;
        for caps in PARAM.captures_iter(template) {
            let whole = caps.get(0).map_or(0..0, |m| m.range());
            source.push_str(&regex::escape(&template[literal_from..whole.start]));
            source.push_str("([^/]+)");
            params.push(caps[1].to_owned());
            literal_from = whole.end;
        }
        source.push_str(&regex::escape(&template[literal_from..]));
        source.push('$');

        Ok(Self {
            template: template.to_owned(),
            regex: Regex::new(&source)?,
            params,
        })
    }

    /// The template this matcher was compiled from.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.params
    }

    /// True when the template has no `:name` segments.
    pub fn is_literal(&self) -> bool {
        self.params.is_empty()
    }

    /// Matches `path` against the template.
    ///
    /// Returns `None` when the path does not match, and `Some` with the
    /// extracted parameters (possibly none) when it does. Values are paired
    /// with names by position.
    pub fn captures(&self, path: &str) -> Option<Params> {
        let caps = self.regex.captures(path)?;
        let params = self
            .params
            .iter()
            .enumerate()
            .filter_map(|(i, name)| {
                caps.get(i + 1)
                    .map(|value| (name.clone(), value.as_str().to_owned()))
            })
            .collect();
        Some(params)
    }
}
