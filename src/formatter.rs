//! Canonical formatter for query trees.
//!
//! Rendering dispatches on node kind; kinds without a rule of their own
//! fall through to the default "pieces" walk, which reconstructs a node
//! from verbatim gap text plus its recursively rendered children. The
//! specific rules put each clause on its own line with upper-cased
//! keywords and two-space continuation indents.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::{CanonError, ErrorKind};
use crate::syntax::{NodeId, NodeKind, SyntaxTree, Tag};

/// Aliases stay bare only when they look like a plain lower-case
/// identifier.
static NEEDS_QUOTING: Lazy<Regex> =
    Lazy::new(|| Regex::new("[^a-z0-9_]").expect("static pattern compiles"));

/// Render a whole tree to its canonical text: every line right-trimmed,
/// no leading or trailing blank lines, exactly one trailing newline.
pub fn format(tree: &SyntaxTree) -> Result<String, CanonError> {
    let rendered = format_node(tree, tree.root())?;
    let trimmed: Vec<&str> = rendered.split('\n').map(str::trim_end).collect();
    Ok(format!("{}\n", trimmed.join("\n").trim()))
}

/// Render one node via the kind dispatch table.
pub fn format_node(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    match tree.kind(node) {
        NodeKind::SelectExpression => format_select_expression(tree, node),
        NodeKind::SelectStatement => format_select_statement(tree, node),
        NodeKind::LimitStatement => format_limit_statement(tree, node),
        NodeKind::WhereStatement => format_where_statement(tree, node),
        NodeKind::FromStatement => format_from_statement(tree, node),
        NodeKind::JoinStatement => format_join_statement(tree, node),
        NodeKind::OrderByStatement => format_order_by_statement(tree, node),
        _ => default_format(tree, node),
    }
}

/// The "pieces" decomposition: gap text before each child, the rendered
/// child, then any trailing gap. A childless node is its verbatim text.
/// Coverage of the node's span is complete and non-overlapping.
fn default_format(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let span = tree.span(node);
    let mut cursor = span.start;
    let mut out = String::new();
    for &child in tree.children(node) {
        let child_span = tree.span(child);
        if cursor < child_span.start {
            out.push_str(tree.slice(cursor, child_span.start));
        }
        out.push_str(&format_node(tree, child)?);
        cursor = child_span.end;
    }
    if cursor < span.end {
        out.push_str(tree.slice(cursor, span.end));
    }
    Ok(out)
}

fn format_select_expression(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let expr = tree.children(node).first().copied().ok_or_else(|| {
        CanonError::new(
            ErrorKind::UnsupportedInput {
                construct: "select expression without an expression".into(),
            },
            &tree.source_context(),
            tree.span(node),
        )
    })?;
    let mut out = format_node(tree, expr)?;
    if let Some(alias) = tree.alias_node(node) {
        out.push_str(" AS ");
        out.push_str(&quote_alias_if_needed(tree.text(alias)));
    }
    Ok(out)
}

fn format_select_statement(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let expressions = tree.query(
        node,
        Tag::Kind(NodeKind::SelectExpression),
        Some(Tag::Kind(NodeKind::Query)),
    );
    let rendered = expressions
        .iter()
        .map(|&e| format_node(tree, e))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("\nSELECT\n{}", eager_indent(&rendered.join(",\n"))))
}

fn format_limit_statement(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let mut out = String::from("\nLIMIT");
    for &child in tree.children(node).iter().skip(1) {
        out.push_str(tree.text(child));
    }
    Ok(out)
}

fn format_where_statement(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let body = expression_children(tree, node)
        .into_iter()
        .map(|e| default_format(tree, e))
        .collect::<Result<Vec<_>, _>>()?
        .concat();
    Ok(format!("\nWHERE {}", indent(&body)))
}

fn format_from_statement(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let expressions = tree.query(
        node,
        Tag::Kind(NodeKind::FromExpression),
        Some(Tag::Kind(NodeKind::Query)),
    );
    let rendered = expressions
        .iter()
        .map(|&e| format_node(tree, e))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("\nFROM {}", indent(&rendered.join("\n"))))
}

fn format_join_statement(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let keyword = tree
        .find(node, Tag::Kind(NodeKind::JoinKeyword), Some(Tag::Kind(NodeKind::Query)))
        .ok_or_else(|| {
            CanonError::new(
                ErrorKind::UnsupportedInput {
                    construct: "join without a join keyword".into(),
                },
                &tree.source_context(),
                tree.span(node),
            )
        })?;
    let expressions = expression_children(tree, node);
    let (target, criteria) = match expressions.as_slice() {
        &[target, criteria] => (target, criteria),
        other => {
            return Err(CanonError::new(
                ErrorKind::UnsupportedInput {
                    construct: format!("join with {} expressions", other.len()),
                },
                &tree.source_context(),
                tree.span(node),
            )
            .with_help("a join must have exactly a target and a criteria expression"))
        }
    };
    Ok(format!(
        "\n{} {} ON {}",
        tree.text(keyword).to_uppercase(),
        indent(&format_node(tree, target)?),
        indent(&format_node(tree, criteria)?),
    ))
}

fn format_order_by_statement(tree: &SyntaxTree, node: NodeId) -> Result<String, CanonError> {
    let body = tree
        .children(node)
        .iter()
        .copied()
        .filter(|&c| tree.kind(c) == NodeKind::OrderByExpression)
        .map(|e| default_format(tree, e))
        .collect::<Result<Vec<_>, _>>()?
        .concat();
    Ok(format!("\nORDER BY {}", indent(&body)))
}

fn expression_children(tree: &SyntaxTree, node: NodeId) -> Vec<NodeId> {
    tree.children(node)
        .iter()
        .copied()
        .filter(|&c| tree.kind(c) == NodeKind::Expression)
        .collect()
}

/// Indent continuation lines by two spaces, leaving the first line alone.
fn indent(value: &str) -> String {
    value.replace('\n', "\n  ")
}

/// Indent every line by two spaces, the first included.
fn eager_indent(value: &str) -> String {
    format!("  {}", indent(value))
}

fn quote_alias_if_needed(alias: &str) -> String {
    if NEEDS_QUOTING.is_match(alias) {
        format!("\"{}\"", alias)
    } else {
        alias.to_string()
    }
}
