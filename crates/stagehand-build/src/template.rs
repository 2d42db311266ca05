//! HTML template stage.
//!
//! The template is rendered with `{ "scripts": [...] }`, where `scripts` is
//! the sorted list of bundle file names found directly under the output
//! directory. Templates use mustache tags:
//!
//! ```text
//! {{name}}            escaped value        {{{name}}}  raw value
//! {{#name}}…{{/name}} section / list loop  {{^name}}…{{/name}} inverted
//! {{.}}               current list item    {{! comment }}
//! ```

use std::path::{Path, PathBuf};

use serde_json::Value;
use stagehand_core::{BuildConfig, SiteLayout};

use crate::fingerprint::{self, ReferenceMap};
use crate::minify;

/// File names directly under `out_dir` matching `pattern`, sorted.
pub fn scan_scripts(out_dir: &Path, pattern: &str) -> Result<Vec<String>, TemplateError> {
    let matcher = glob::Pattern::new(pattern).map_err(|e| TemplateError::InvalidPattern {
        pattern: pattern.to_owned(),
        source: e,
    })?;

    let entries = std::fs::read_dir(out_dir).map_err(|e| TemplateError::Scan {
        path: out_dir.to_path_buf(),
        source: e,
    })?;

    let mut scripts = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| TemplateError::Scan {
            path: out_dir.to_path_buf(),
            source: e,
        })?;
        let is_file = entry.file_type().is_ok_and(|t| t.is_file());
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_file && matcher.matches(&name) {
            scripts.push(name);
        }
    }
    scripts.sort();
    Ok(scripts)
}

/// Render the site template into `out_dir` and return the written path.
///
/// Transform order: render → minify (`minimize_html`) → reference rewrite
/// (when CSS fingerprinting is on). The rewrite runs last and the result is
/// not minified again.
pub fn render_site(
    layout: &SiteLayout,
    config: &BuildConfig,
    references: &ReferenceMap,
) -> Result<PathBuf, TemplateError> {
    let scripts = scan_scripts(&layout.out_dir, &config.template.scripts)?;
    tracing::debug!(?scripts, "bundles discovered for template");

    let source = std::fs::read_to_string(&layout.template).map_err(|e| TemplateError::Read {
        path: layout.template.clone(),
        source: e,
    })?;

    let data = serde_json::json!({ "scripts": scripts });
    let mut html = render(&source, &data)?;

    if config.minimize_html {
        html = minify::minify_html(&html, &config.minifier).map_err(TemplateError::Minify)?;
    }
    if config.fingerprint_css() {
        html = fingerprint::apply_references(&html, references);
    }

    let file_name = layout
        .template
        .file_name()
        .ok_or_else(|| TemplateError::InvalidTemplatePath(layout.template.clone()))?;
    let dest = layout.out_dir.join(file_name);
    std::fs::write(&dest, html).map_err(|e| TemplateError::Write {
        path: dest.clone(),
        source: e,
    })?;

    Ok(dest)
}

// ── Mustache rendering ──

#[derive(Debug)]
enum Node {
    Text(String),
    Var { name: String, escape: bool },
    Section { name: String, inverted: bool, children: Vec<Node> },
}

/// Render a mustache template against `data`.
pub fn render(template: &str, data: &Value) -> Result<String, TemplateError> {
    let nodes = parse(template)?;
    let mut out = String::with_capacity(template.len());
    let mut stack = vec![data];
    render_nodes(&nodes, &mut stack, &mut out);
    Ok(out)
}

fn parse(template: &str) -> Result<Vec<Node>, TemplateError> {
    // Each open section keeps its name and the nodes collected so far.
    let mut open: Vec<(String, bool, Vec<Node>)> = Vec::new();
    let mut current: Vec<Node> = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            current.push(Node::Text(rest[..start].to_owned()));
        }
        let after = &rest[start..];

        let (tag, consumed) = if after.starts_with("{{{") {
            let end = after
                .find("}}}")
                .ok_or_else(|| TemplateError::Unclosed(snippet(after)))?;
            (&after[..end + 3], end + 3)
        } else {
            let end = after
                .find("}}")
                .ok_or_else(|| TemplateError::Unclosed(snippet(after)))?;
            (&after[..end + 2], end + 2)
        };
        rest = &after[consumed..];

        if let Some(inner) = tag.strip_prefix("{{{").and_then(|t| t.strip_suffix("}}}")) {
            current.push(Node::Var {
                name: inner.trim().to_owned(),
                escape: false,
            });
            continue;
        }

        let inner = tag[2..tag.len() - 2].trim();
        match inner.chars().next() {
            Some('!') => {}
            Some(sigil @ ('#' | '^')) => {
                let name = inner[1..].trim().to_owned();
                open.push((name, sigil == '^', std::mem::take(&mut current)));
            }
            Some('/') => {
                let name = inner[1..].trim();
                let Some((open_name, inverted, parent)) = open.pop() else {
                    return Err(TemplateError::UnexpectedClose(name.to_owned()));
                };
                if open_name != name {
                    return Err(TemplateError::MismatchedClose {
                        expected: open_name,
                        found: name.to_owned(),
                    });
                }
                let children = std::mem::replace(&mut current, parent);
                current.push(Node::Section {
                    name: open_name,
                    inverted,
                    children,
                });
            }
            Some('&') => current.push(Node::Var {
                name: inner[1..].trim().to_owned(),
                escape: false,
            }),
            _ => current.push(Node::Var {
                name: inner.to_owned(),
                escape: true,
            }),
        }
    }

    if !rest.is_empty() {
        current.push(Node::Text(rest.to_owned()));
    }
    if let Some((name, _, _)) = open.pop() {
        return Err(TemplateError::UnclosedSection(name));
    }
    Ok(current)
}

fn render_nodes<'v>(nodes: &[Node], stack: &mut Vec<&'v Value>, out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Var { name, escape } => {
                let text = lookup(stack, name).map(display_value).unwrap_or_default();
                if *escape {
                    escape_html(&text, out);
                } else {
                    out.push_str(&text);
                }
            }
            Node::Section {
                name,
                inverted,
                children,
            } => {
                let value = lookup(stack, name);
                if *inverted {
                    if !value.is_some_and(truthy) {
                        render_nodes(children, stack, out);
                    }
                    continue;
                }
                match value {
                    Some(Value::Array(items)) => {
                        for item in items {
                            stack.push(item);
                            render_nodes(children, stack, out);
                            stack.pop();
                        }
                    }
                    Some(v) if truthy(v) => {
                        stack.push(v);
                        render_nodes(children, stack, out);
                        stack.pop();
                    }
                    _ => {}
                }
            }
        }
    }
}

fn lookup<'a>(stack: &[&'a Value], name: &str) -> Option<&'a Value> {
    if name == "." {
        return stack.last().copied();
    }
    let mut parts = name.split('.');
    let head = parts.next()?;
    let mut value = stack.iter().rev().find_map(|ctx| ctx.get(head))?;
    for part in parts {
        value = value.get(part)?;
    }
    Some(value)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(items) => !items.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(_) | Value::Object(_) => true,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => String::new(),
    }
}

fn escape_html(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
}

fn snippet(s: &str) -> String {
    s.chars().take(24).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("invalid scripts pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("failed to scan {path} for bundles")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read template {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("template path {0} has no file name")]
    InvalidTemplatePath(PathBuf),
    #[error("unclosed tag near {0:?}")]
    Unclosed(String),
    #[error("section {0:?} is never closed")]
    UnclosedSection(String),
    #[error("closing tag {0:?} without an open section")]
    UnexpectedClose(String),
    #[error("expected {{{{/{expected}}}}} but found {{{{/{found}}}}}")]
    MismatchedClose { expected: String, found: String },
    #[error("minified page is not valid UTF-8")]
    Minify(#[source] std::string::FromUtf8Error),
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
