//! Syntax front end: extract include-style calls from one source file.

use std::path::Path;

use proc_macro2::Span;
use syn::spanned::Spanned;
use syn::visit::{self, Visit};

use crate::config::SCANNED_CALLS;
use crate::error::{Error, Result};

/// One call site the scanner matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHit {
    /// Which scanned function was called, e.g. `open`.
    pub call: String,
    /// The first argument, if it was a resolvable literal.
    pub arg: ScanArg,
    /// 1-based line of the call expression.
    pub line: usize,
    /// 1-based column of the call expression.
    pub column: usize,
    /// Raw source text of the call expression.
    pub expr: String,
}

/// Classification of a call's first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanArg {
    /// A string literal, unescaped.
    Literal(String),
    /// Anything that cannot be resolved without running the program.
    Computed,
}

/// Scan one parsed source file for calls to the crate-level filesystem
/// functions, bare (`open(..)`) or crate-qualified (`packfs::open(..)`).
///
/// Syntax errors become [`Error::Parse`] carrying the offending position.
pub fn scan_file(path: &Path, source: &str) -> Result<Vec<ScanHit>> {
    let ast = syn::parse_file(source).map_err(|e| {
        let start = e.span().start();
        Error::Parse {
            file: path.to_path_buf(),
            line: start.line,
            column: start.column + 1,
            message: e.to_string(),
        }
    })?;
    let mut visitor = CallVisitor {
        lines: source.lines().collect(),
        hits: Vec::new(),
    };
    visitor.visit_file(&ast);
    Ok(visitor.hits)
}

struct CallVisitor<'a> {
    lines: Vec<&'a str>,
    hits: Vec<ScanHit>,
}

impl<'a, 'ast> Visit<'ast> for CallVisitor<'a> {
    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let Some(call) = scanned_call_name(&node.func) {
            let start = node.span().start();
            self.hits.push(ScanHit {
                call,
                arg: classify_arg(node.args.first()),
                line: start.line,
                column: start.column + 1,
                expr: self.snippet(node.span()),
            });
        }
        visit::visit_expr_call(self, node);
    }
}

impl CallVisitor<'_> {
    /// Source text covered by a span, joined across lines.
    fn snippet(&self, span: Span) -> String {
        let start = span.start();
        let end = span.end();
        let line_at = |n: usize| self.lines.get(n.wrapping_sub(1)).copied().unwrap_or("");
        if start.line == end.line {
            return slice_columns(line_at(start.line), start.column, end.column);
        }
        let mut parts = vec![slice_columns(line_at(start.line), start.column, usize::MAX)];
        for n in (start.line + 1)..end.line {
            parts.push(line_at(n).to_string());
        }
        parts.push(slice_columns(line_at(end.line), 0, end.column));
        parts.join("\n")
    }
}

// Span columns count characters, not bytes.
fn slice_columns(line: &str, start: usize, end: usize) -> String {
    line.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

fn scanned_call_name(func: &syn::Expr) -> Option<String> {
    let path = match func {
        syn::Expr::Path(p) if p.qself.is_none() => &p.path,
        _ => return None,
    };
    let last = path.segments.last()?.ident.to_string();
    if !SCANNED_CALLS.contains(&last.as_str()) {
        return None;
    }
    match path.segments.len() {
        1 => Some(last),
        2 if path.segments[0].ident == "packfs" => Some(last),
        _ => None,
    }
}

fn classify_arg(arg: Option<&syn::Expr>) -> ScanArg {
    match arg {
        Some(syn::Expr::Lit(lit)) => match &lit.lit {
            syn::Lit::Str(s) => ScanArg::Literal(s.value()),
            _ => ScanArg::Computed,
        },
        _ => ScanArg::Computed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scan(source: &str) -> Vec<ScanHit> {
        scan_file(&PathBuf::from("src/main.rs"), source).unwrap()
    }

    #[test]
    fn test_finds_bare_and_qualified_calls() {
        let hits = scan(
            "fn main() {\n    let _ = open(\"/a.txt\");\n    let _ = packfs::stat(\"/b\");\n}\n",
        );
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].call, "open");
        assert_eq!(hits[0].arg, ScanArg::Literal("/a.txt".to_string()));
        assert_eq!(hits[0].line, 2);
        assert_eq!(hits[0].expr, "open(\"/a.txt\")");
        assert_eq!(hits[1].call, "stat");
        assert_eq!(hits[1].expr, "packfs::stat(\"/b\")");
    }

    #[test]
    fn test_raw_string_literal_resolves() {
        let hits = scan("fn f() { walk(r\"/dir\"); }\n");
        assert_eq!(hits[0].arg, ScanArg::Literal("/dir".to_string()));
    }

    #[test]
    fn test_computed_argument_flagged() {
        let hits = scan(
            "fn f(name: &str) {\n    let _ = open(name);\n    let _ = open(format!(\"/{}\", name).as_str());\n}\n",
        );
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.arg == ScanArg::Computed));
    }

    #[test]
    fn test_unrelated_calls_ignored() {
        let hits = scan(
            "fn f() {\n    std::fs::read(\"/x\").ok();\n    other::open(\"/x\");\n    handle.walk(\"/x\");\n    println!(\"open\");\n}\n",
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn test_include_marker_scanned() {
        let hits = scan("fn f() { include(\"/assets\"); }\n");
        assert_eq!(hits[0].call, "include");
        assert_eq!(hits[0].arg, ScanArg::Literal("/assets".to_string()));
    }

    #[test]
    fn test_multiline_call_snippet() {
        let hits = scan("fn f() {\n    open(\n        \"/a.txt\",\n    );\n}\n");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].expr, "open(\n        \"/a.txt\",\n    )");
    }

    #[test]
    fn test_nested_calls_both_found() {
        let hits = scan("fn f() { open(stat(\"/x\")); }\n");
        let calls: Vec<&str> = hits.iter().map(|h| h.call.as_str()).collect();
        assert_eq!(calls, ["open", "stat"]);
        assert_eq!(hits[0].arg, ScanArg::Computed);
        assert_eq!(hits[1].arg, ScanArg::Literal("/x".to_string()));
    }

    #[test]
    fn test_syntax_error_reports_position() {
        let err = scan_file(&PathBuf::from("bad.rs"), "fn broken( {\n").unwrap_err();
        match err {
            Error::Parse { file, line, .. } => {
                assert_eq!(file, PathBuf::from("bad.rs"));
                assert!(line >= 1);
            }
            other => panic!("expected Parse, got {:?}", other),
        }
    }
}
