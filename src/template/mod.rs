//! Text templates.
//!
//! A template is plain text with `{{ path }}` interpolations and `<? … ?>`
//! control markers (see [`directive`] for the grammar). Rendering rewrites
//! the whole text in four passes, in this order:
//!
//! 1. **Interpolation**: every `{{ path }}` outside a `foreach` body is
//!    replaced by the resolved value, or by nothing if it does not resolve.
//! 2. **Conditionals**: each `if/elseif/else/endif` block is replaced by
//!    the first branch whose condition is truthy (`else` always is). The
//!    chosen branch is scanned again for nested conditionals.
//! 3. **Loops**: each `foreach ($items as $item)` block is replaced by its
//!    body rendered once per element, against the parent context with
//!    `item` bound to the element.
//! 4. **Includes**: each `include 'name'` is replaced by the named
//!    template rendered against the same context.
//!
//! Includes nest at most [`MAX_INCLUDE_DEPTH`] levels and `if`/`foreach`
//! blocks at most [`MAX_BLOCK_DEPTH`]; anything deeper renders as empty text.
//!
//! Nothing in a render fails: unresolved names, missing sequences and
//! missing includes all produce empty text. Rendering has no state; the same
//! template and context always produce the same output.

pub mod directive;
pub mod source;
pub mod value;

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use directive::Directive;
pub use source::{Directory, TemplateSource};
pub use value::Context;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([\w.\[\]]+)\s*\}\}").unwrap());

/// Include nesting beyond this depth renders as empty text.
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// `if` and `foreach` blocks nested beyond this depth render as empty text.
pub const MAX_BLOCK_DEPTH: usize = 64;

/// How far a render has descended.
#[derive(Clone, Copy, Debug, Default)]
struct Depth {
    includes: usize,
    blocks: usize,
}

/// Renders templates loaded from a [`TemplateSource`].
#[derive(Clone)]
pub struct TemplateEngine {
    source: Arc<dyn TemplateSource>,
    extension: String,
}

impl TemplateEngine {
    /// Views stored as `{dir}/{name}.html`.
    pub fn new(views_dir: impl Into<PathBuf>) -> Self {
        Self::with_source(Directory::new(views_dir))
    }

    pub fn with_source(source: impl TemplateSource + 'static) -> Self {
        Self { source: Arc::new(source), extension: "html".to_owned() }
    }

    /// File extension appended to view names by [`render_view`](Self::render_view).
    pub fn extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_owned();
        self
    }

    /// Renders template text against `context`.
    pub fn render(&self, template: &str, context: &Value) -> String {
        self.expand(template, &Context::root(context), Depth::default())
    }

    /// Loads the view `name` (plus the configured extension) and renders it.
    ///
    /// Returns `None` if the view does not exist.
    pub fn render_view(&self, name: &str, context: &Value) -> Option<String> {
        let template = self.source.load(&format!("{name}.{}", self.extension))?;
        Some(self.render(&template, context))
    }

    fn expand(&self, template: &str, context: &Context<'_>, depth: Depth) -> String {
        let text = interpolate(template, context);
        let text = select_branches(&text, context, depth.blocks);
        let text = self.expand_loops(&text, context, depth);
        self.expand_includes(&text, context, depth)
    }

    fn expand_loops(&self, text: &str, context: &Context<'_>, depth: Depth) -> String {
        let found = directive::loops(&directive::scan(text));
        if found.is_empty() {
            return text.to_owned();
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for block in found {
            out.push_str(&text[last..block.span.start]);
            if depth.blocks >= MAX_BLOCK_DEPTH {
                warn!(depth = depth.blocks, "block nesting too deep, rendering empty");
            } else if let Some(Value::Array(items)) = context.resolve(&block.source) {
                let body = &text[block.body.clone()];
                let inner = Depth { blocks: depth.blocks + 1, ..depth };
                for item in items {
                    let scope = context.bind(&block.binding, item);
                    out.push_str(&self.expand(body, &scope, inner));
                }
            }
            last = block.span.end;
        }
        out.push_str(&text[last..]);
        out
    }

    fn expand_includes(&self, text: &str, context: &Context<'_>, depth: Depth) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for marker in directive::scan(text) {
            let Directive::Include(name) = &marker.directive else {
                continue;
            };
            out.push_str(&text[last..marker.span.start]);
            out.push_str(&self.include(name, context, depth));
            last = marker.span.end;
        }
        out.push_str(&text[last..]);
        out
    }

    fn include(&self, name: &str, context: &Context<'_>, depth: Depth) -> String {
        if depth.includes >= MAX_INCLUDE_DEPTH {
            warn!(name, depth = depth.includes, "include nesting too deep, rendering empty");
            return String::new();
        }
        match self.source.load(name) {
            Some(template) => {
                let inner = Depth { includes: depth.includes + 1, ..depth };
                self.expand(&template, context, inner)
            }
            None => {
                debug!(name, "include target missing, rendering empty");
                String::new()
            }
        }
    }
}

impl Default for TemplateEngine {
    /// Views in `./views`.
    fn default() -> Self {
        Self::new("./views")
    }
}

fn interpolate(text: &str, context: &Context<'_>) -> String {
    let loop_bodies: Vec<_> = directive::loops(&directive::scan(text))
        .into_iter()
        .map(|l| l.body)
        .collect();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for caps in VARIABLE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if loop_bodies.iter().any(|body| body.contains(&whole.start())) {
            continue;
        }
        out.push_str(&text[last..whole.start()]);
        if let Some(value) = context.resolve(&caps[1]) {
            out.push_str(&value::stringify(value));
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);
    out
}

fn select_branches(text: &str, context: &Context<'_>, level: usize) -> String {
    let markers = directive::scan(text);
    let found = directive::conditionals(&markers, &directive::loops(&markers));
    if found.is_empty() {
        return text.to_owned();
    }

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for block in found {
        out.push_str(&text[last..block.span.start]);
        let chosen = block.branches.iter().find(|branch| {
            branch
                .condition
                .as_deref()
                .is_none_or(|condition| value::truthy(context.resolve(condition)))
        });
        if level >= MAX_BLOCK_DEPTH {
            warn!(depth = level, "block nesting too deep, rendering empty");
        } else if let Some(branch) = chosen {
            out.push_str(&select_branches(&text[branch.body.clone()], context, level + 1));
        }
        last = block.span.end;
    }
    out.push_str(&text[last..]);
    out
}
