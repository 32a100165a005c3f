//! Typed syntax tree for SQL query expressions.
//!
//! The tree is a flat arena of nodes addressed by [`NodeId`] handles. Every
//! node carries a [`Span`] into the single backing buffer owned by the tree;
//! a node's text is always `buffer[span.start..span.end]`. Whitespace,
//! punctuation, and keywords the parser does not reify stay behind as gap
//! text inside their parent's span, which is what lets the formatter
//! reconstruct any subtree verbatim.
//!
//! Structural mutation (pruning, detaching) only ever touches child lists,
//! never the buffer. Textual mutation lives in the `edit` submodule and is
//! responsible for keeping every span consistent with the buffer.

use serde::{Deserialize, Serialize};

use crate::errors::{CanonError, ErrorKind, SourceContext};

mod edit;
pub mod parser;

/// A half-open `[start, end)` byte range into the tree's backing buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// The closed set of node kinds the parser produces.
///
/// `Generic` marks structurally necessary but semantically empty output:
/// clause keywords, placeholder slots for absent optional constructs, and
/// literals the formatter only ever reproduces verbatim.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Generic,
    Query,
    SelectStatement,
    SelectExpression,
    FromStatement,
    FromExpression,
    JoinStatement,
    JoinKeyword,
    WhereStatement,
    OrderByStatement,
    OrderByExpression,
    LimitStatement,
    Expression,
    Operator,
    FieldRef,
    TablePart,
    Entity,
    QuotedEntity,
    Name,
    FieldGlob,
    Alias,
    Function,
}

impl NodeKind {
    pub fn is_statement(self) -> bool {
        matches!(
            self,
            NodeKind::SelectStatement
                | NodeKind::FromStatement
                | NodeKind::JoinStatement
                | NodeKind::WhereStatement
                | NodeKind::OrderByStatement
                | NodeKind::LimitStatement
        )
    }
}

/// Matcher used by tree queries.
///
/// Matching is polymorphic: `Any` covers every kind, `Statement` covers the
/// clause statement kinds, and `Kind(Entity)` also covers `QuotedEntity`.
/// Every other tag matches exactly its kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Tag {
    Any,
    Statement,
    Kind(NodeKind),
}

impl Tag {
    pub fn matches(self, kind: NodeKind) -> bool {
        match self {
            Tag::Any => true,
            Tag::Statement => kind.is_statement(),
            Tag::Kind(NodeKind::Entity) => {
                matches!(kind, NodeKind::Entity | NodeKind::QuotedEntity)
            }
            Tag::Kind(k) => kind == k,
        }
    }
}

/// Handle into a tree's node arena.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    span: Span,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A parsed query: one buffer, one arena of nodes, one root.
///
/// Detached nodes stay in the arena but become unreachable from the root;
/// queries and interval adjustment only ever walk attached nodes.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source_name: String,
    buffer: String,
    nodes: Vec<NodeData>,
    root: NodeId,
}

impl SyntaxTree {
    pub(crate) fn new(source_name: String, buffer: String) -> Self {
        let root = NodeData {
            kind: NodeKind::Query,
            span: Span::new(0, buffer.len()),
            parent: None,
            children: Vec::new(),
        };
        Self {
            source_name,
            buffer,
            nodes: vec![root],
            root: NodeId(0),
        }
    }

    pub(crate) fn push_node(&mut self, kind: NodeKind, span: Span, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            span,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.index()].children.push(id);
        id
    }

    pub(crate) fn set_end(&mut self, node: NodeId, end: usize) {
        self.nodes[node.index()].span.end = end;
    }

    pub(crate) fn span_mut(&mut self, node: NodeId) -> &mut Span {
        &mut self.nodes[node.index()].span
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut String {
        &mut self.buffer
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.nodes[node.index()].kind
    }

    pub fn span(&self, node: NodeId) -> Span {
        self.nodes[node.index()].span
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.index()].parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.index()].children
    }

    /// The node's materialized text: the buffer slice its span covers.
    pub fn text(&self, node: NodeId) -> &str {
        let span = self.span(node);
        &self.buffer[span.start..span.end]
    }

    /// Verbatim buffer slice, used by the formatter for gap text.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        &self.buffer[start..end]
    }

    /// Source context for diagnostics against the current buffer.
    pub fn source_context(&self) -> SourceContext {
        SourceContext::from_file(&self.source_name, &self.buffer)
    }

    // ------------------------------------------------------------------
    // Query engine
    // ------------------------------------------------------------------

    /// Pre-order depth-first search of `node`'s descendants for `tag`.
    ///
    /// The search recurses into every child, matching or not, except a
    /// child matching `skip`: that child and its whole subtree are left
    /// out entirely. A match takes precedence over `skip` when a node
    /// satisfies both. `node` itself is never part of the result.
    pub fn query(&self, node: NodeId, tag: Tag, skip: Option<Tag>) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect(node, tag, skip, &mut out);
        out
    }

    fn collect(&self, node: NodeId, tag: Tag, skip: Option<Tag>, out: &mut Vec<NodeId>) {
        for &child in self.children(node) {
            let kind = self.kind(child);
            if tag.matches(kind) {
                out.push(child);
                self.collect(child, tag, skip, out);
            } else if skip.is_some_and(|s| s.matches(kind)) {
                continue;
            } else {
                self.collect(child, tag, skip, out);
            }
        }
    }

    /// First descendant matching `tag`, or `None`.
    pub fn find(&self, node: NodeId, tag: Tag, skip: Option<Tag>) -> Option<NodeId> {
        self.query(node, tag, skip).into_iter().next()
    }

    /// Closest ancestor matching `tag`, or `None` (always `None` at the root).
    pub fn nearest(&self, node: NodeId, tag: Tag) -> Option<NodeId> {
        let mut current = self.parent(node);
        while let Some(ancestor) = current {
            if tag.matches(self.kind(ancestor)) {
                return Some(ancestor);
            }
            current = self.parent(ancestor);
        }
        None
    }

    // ------------------------------------------------------------------
    // Structural mutation
    // ------------------------------------------------------------------

    /// Detach `node` from its parent's child list. The node's buffer range
    /// is untouched; it simply stops being reachable. Detaching the root
    /// is an invalid operation.
    pub fn delete(&mut self, node: NodeId) -> Result<(), CanonError> {
        let parent = self.parent(node).ok_or_else(|| {
            CanonError::new(
                ErrorKind::InvalidOperation {
                    operation: "delete the root node".into(),
                },
                &self.source_context(),
                self.span(node),
            )
        })?;
        self.nodes[parent.index()].children.retain(|&c| c != node);
        Ok(())
    }

    /// A node is vanilla when it is generic, it is either nested under
    /// another generic node or covers no text, and all of its children
    /// (if any) are themselves vanilla.
    pub fn is_vanilla(&self, node: NodeId) -> bool {
        if self.kind(node) != NodeKind::Generic {
            return false;
        }
        let under_generic = self
            .parent(node)
            .is_some_and(|p| self.kind(p) == NodeKind::Generic);
        if !under_generic && !self.span(node).is_empty() {
            return false;
        }
        self.children(node).iter().all(|&c| self.is_vanilla(c))
    }

    /// Remove every vanilla descendant of `node`.
    ///
    /// Candidates are collected pre-order and processed in reverse so a
    /// parent's vanilla check sees children already removed in the same
    /// pass. Buffer and spans are never touched. Idempotent.
    pub fn prune(&mut self, node: NodeId) {
        let candidates = self.query(node, Tag::Kind(NodeKind::Generic), None);
        for &candidate in candidates.iter().rev() {
            if self.is_vanilla(candidate) {
                // Candidates are descendants, so they always have a parent.
                let _ = self.delete(candidate);
            }
        }
    }

    // ------------------------------------------------------------------
    // Select-expression naming
    // ------------------------------------------------------------------

    /// The first select statement of the query, if any.
    pub fn select_statement(&self) -> Option<NodeId> {
        self.find(self.root, Tag::Kind(NodeKind::SelectStatement), None)
    }

    /// All select expressions under the first select statement.
    pub fn select_expressions(&self) -> Vec<NodeId> {
        match self.select_statement() {
            Some(stmt) => self.query(stmt, Tag::Kind(NodeKind::SelectExpression), None),
            None => Vec::new(),
        }
    }

    /// The alias of a select or from expression, not looking into nested
    /// queries.
    pub fn alias_node(&self, node: NodeId) -> Option<NodeId> {
        self.find(
            node,
            Tag::Kind(NodeKind::Alias),
            Some(Tag::Kind(NodeKind::Query)),
        )
    }

    /// The output name of a select expression.
    ///
    /// An alias wins. Otherwise a lone function root names the column after
    /// the function, and a lone field reference after its last glob or
    /// plain name. Anything else is an anonymous `?column?`.
    pub fn output_name(&self, expr: NodeId) -> String {
        if let Some(alias) = self.alias_node(expr) {
            return self.text(alias).to_string();
        }
        let roots = self.expression_roots(expr);
        if roots.len() == 1 {
            match self.kind(roots[0]) {
                NodeKind::Function => {
                    if let Some(&callee) = self.children(roots[0]).first() {
                        return self.text(callee).to_string();
                    }
                }
                NodeKind::FieldRef => {
                    let named = self
                        .query(expr, Tag::Kind(NodeKind::FieldGlob), None)
                        .pop()
                        .or_else(|| self.query(expr, Tag::Kind(NodeKind::Name), None).pop());
                    if let Some(part) = named {
                        return self.text(part).to_string();
                    }
                }
                _ => {}
            }
        }
        "?column?".to_string()
    }

    /// The non-empty children of the expression wrapper of a select
    /// expression: the operand/operator sequence at its top level.
    fn expression_roots(&self, expr: NodeId) -> Vec<NodeId> {
        match self.children(expr).first() {
            Some(&wrapper) => self
                .children(wrapper)
                .iter()
                .copied()
                .filter(|&c| !self.span(c).is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Serializable dump of a subtree, for the `ast` CLI command.
    pub fn dump(&self, node: NodeId) -> AstDump {
        AstDump {
            kind: self.kind(node),
            start: self.span(node).start,
            end: self.span(node).end,
            text: self.text(node).to_string(),
            children: self
                .children(node)
                .iter()
                .map(|&c| self.dump(c))
                .collect(),
        }
    }
}

/// JSON-friendly view of a subtree.
#[derive(Debug, Serialize)]
pub struct AstDump {
    pub kind: NodeKind,
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub children: Vec<AstDump>,
}
