//! Control markers and block structure.
//!
//! ```text
//! <? if ($cond): ?> … <? elseif ($other): ?> … <? else: ?> … <? endif; ?>
//! <? foreach ($items as $item): ?> … <? endforeach; ?>
//! <? include 'partial.html' ?>
//! ```
//!
//! A marker whose arguments do not parse is not a marker: it stays in the
//! output as literal text. Blocks are found by depth counting, so nested
//! blocks of the same kind pair up correctly, and an unbalanced opener or
//! closer is left alone.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<\?\s*(elseif|else|endif|endforeach|foreach|if|include)\b(.*?)\?>").unwrap()
});
static CONDITION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\(\s*\$?([\w.\[\]]+)\s*\)\s*:\s*$").unwrap());
static FOREACH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(\s*\$?([\w.\[\]]+)\s+as\s+\$?(\w+)\s*\)\s*:\s*$").unwrap()
});
static INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s+['"]([^'"]+)['"]\s*$"#).unwrap());
static ELSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*:\s*$").unwrap());
static END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*;\s*$").unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    If(String),
    ElseIf(String),
    Else,
    EndIf,
    Foreach { source: String, binding: String },
    EndForeach,
    Include(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marker {
    pub directive: Directive,
    pub span: Range<usize>,
}

/// A `foreach` block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Loop {
    pub span: Range<usize>,
    pub body: Range<usize>,
    pub source: String,
    pub binding: String,
}

/// An `if` block: the `if` branch first, then `elseif`s, then `else`
/// (condition `None`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conditional {
    pub span: Range<usize>,
    pub branches: Vec<Branch>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    pub condition: Option<String>,
    pub body: Range<usize>,
}

/// All well-formed markers in `text`, in order.
pub fn scan(text: &str) -> Vec<Marker> {
    MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let span = caps.get(0)?.range();
            let args = caps.get(2).map_or("", |m| m.as_str());
            let directive = match &caps[1] {
                "if" => Directive::If(CONDITION.captures(args)?[1].to_owned()),
                "elseif" => Directive::ElseIf(CONDITION.captures(args)?[1].to_owned()),
                "else" if ELSE.is_match(args) => Directive::Else,
                "endif" if END.is_match(args) => Directive::EndIf,
                "foreach" => {
                    let caps = FOREACH.captures(args)?;
                    Directive::Foreach { source: caps[1].to_owned(), binding: caps[2].to_owned() }
                }
                "endforeach" if END.is_match(args) => Directive::EndForeach,
                "include" => Directive::Include(INCLUDE.captures(args)?[1].to_owned()),
                _ => return None,
            };
            Some(Marker { directive, span })
        })
        .collect()
}

/// Outermost `foreach` blocks.
pub fn loops(markers: &[Marker]) -> Vec<Loop> {
    let mut found = Vec::new();
    let mut open: Option<&Marker> = None;
    let mut depth = 0usize;

    for marker in markers {
        match &marker.directive {
            Directive::Foreach { .. } => {
                if depth == 0 {
                    open = Some(marker);
                }
                depth += 1;
            }
            Directive::EndForeach if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some(Marker { directive: Directive::Foreach { source, binding }, span }) = open.take() {
                        found.push(Loop {
                            span: span.start..marker.span.end,
                            body: span.end..marker.span.start,
                            source: source.clone(),
                            binding: binding.clone(),
                        });
                    }
                }
            }
            _ => {}
        }
    }
    found
}

/// Outermost `if` blocks that are not inside any of `loops`.
///
/// Conditionals inside a loop body belong to the iteration, which renders
/// the body on its own.
pub fn conditionals(markers: &[Marker], loops: &[Loop]) -> Vec<Conditional> {
    let mut found = Vec::new();
    let mut current: Option<(usize, Vec<Branch>)> = None;
    let mut depth = 0usize;

    let outside_loops = markers.iter().filter(|m| {
        !loops.iter().any(|l| l.span.start <= m.span.start && m.span.end <= l.span.end)
    });

    for marker in outside_loops {
        match &marker.directive {
            Directive::If(condition) => {
                if depth == 0 {
                    let branch = Branch { condition: Some(condition.clone()), body: marker.span.end..marker.span.end };
                    current = Some((marker.span.start, vec![branch]));
                }
                depth += 1;
            }
            Directive::ElseIf(_) | Directive::Else if depth == 1 => {
                if let Some((_, branches)) = current.as_mut() {
                    if let Some(last) = branches.last_mut() {
                        last.body.end = marker.span.start;
                    }
                    let condition = match &marker.directive {
                        Directive::ElseIf(condition) => Some(condition.clone()),
                        _ => None,
                    };
                    branches.push(Branch { condition, body: marker.span.end..marker.span.end });
                }
            }
            Directive::EndIf if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if let Some((start, mut branches)) = current.take() {
                        if let Some(last) = branches.last_mut() {
                            last.body.end = marker.span.start;
                        }
                        found.push(Conditional { span: start..marker.span.end, branches });
                    }
                }
            }
            _ => {}
        }
    }
    found
}
