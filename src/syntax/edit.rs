//! In-place text substitution with interval reconciliation.
//!
//! A substitution scans one node's text for every occurrence of a pattern,
//! then applies the recorded edits to the shared buffer rightmost-first.
//! A splice only moves absolute positions strictly to the right of the
//! edited range, so every still-pending occurrence (all of them further
//! left) keeps a valid absolute range when its turn comes; one scan is
//! enough for the whole batch. After each splice the entire tree is
//! re-anchored from the root before the next edit is applied.

use regex::Regex;

use super::{NodeId, SyntaxTree};

/// One pending edit: the absolute buffer range to replace.
#[derive(Debug, Clone, Copy)]
struct Replacement {
    start: usize,
    end: usize,
}

impl SyntaxTree {
    /// Replace every occurrence of the literal `pattern` inside `node`'s
    /// text, keeping all intervals in the tree consistent with the mutated
    /// buffer. Zero occurrences is a no-op. The replacement may be empty
    /// (deletion) or longer than the match (insertion).
    pub fn substitute(&mut self, node: NodeId, pattern: &str, replacement: &str) {
        let matches = scan_literal(self.text(node), pattern);
        self.apply_replacements(node, &matches, replacement);
    }

    /// Like [`substitute`](Self::substitute), but matching a compiled
    /// regular expression. Empty-width matches are skipped.
    pub fn substitute_pattern(&mut self, node: NodeId, pattern: &Regex, replacement: &str) {
        let matches = scan_pattern(self.text(node), pattern);
        self.apply_replacements(node, &matches, replacement);
    }

    /// Absolute buffer offset of the first occurrence of `literal` inside
    /// `node`'s text.
    pub fn index_of(&self, node: NodeId, literal: &str) -> Option<usize> {
        self.text(node)
            .find(literal)
            .map(|offset| self.span(node).start + offset)
    }

    fn apply_replacements(&mut self, node: NodeId, local: &[(usize, usize)], replacement: &str) {
        let base = self.span(node).start;
        let root = self.root();
        let edits: Vec<Replacement> = local
            .iter()
            .map(|&(a, b)| Replacement {
                start: base + a,
                end: base + b,
            })
            .collect();
        for edit in edits.iter().rev() {
            let delta = replacement.len() as isize - (edit.end - edit.start) as isize;
            self.buffer_mut()
                .replace_range(edit.start..edit.end, replacement);
            adjust_intervals(self, root, edit.end, delta);
        }
    }
}

/// Re-anchor every attached node's interval after a splice that replaced
/// text ending (exclusively) at `idx`, changing the buffer length by
/// `delta`.
///
/// A node whose span the replaced range ends inside keeps its start and
/// grows or shrinks at the end, clamped so the span never inverts. A node
/// lying entirely at or after the edit end shifts whole. A node ending
/// before the replaced text is untouched. Recursion is unconditional: a
/// child's relation to the edit point is independent of its parent's.
pub(crate) fn adjust_intervals(tree: &mut SyntaxTree, node: NodeId, idx: usize, delta: isize) {
    let span = tree.span(node);
    if span.start < idx && idx <= span.end {
        let shifted = (span.end as isize + delta).max(span.start as isize) as usize;
        tree.span_mut(node).end = shifted;
    } else if span.start >= idx {
        let moved = tree.span_mut(node);
        moved.start = (moved.start as isize + delta) as usize;
        moved.end = (moved.end as isize + delta) as usize;
    }
    let children: Vec<NodeId> = tree.children(node).to_vec();
    for child in children {
        adjust_intervals(tree, child, idx, delta);
    }
}

/// Left-to-right, non-overlapping occurrences of a literal needle, as
/// local `[start, end)` ranges.
fn scan_literal(text: &str, pattern: &str) -> Vec<(usize, usize)> {
    let mut matches = Vec::new();
    if pattern.is_empty() {
        return matches;
    }
    let mut from = 0;
    while let Some(found) = text[from..].find(pattern) {
        let start = from + found;
        matches.push((start, start + pattern.len()));
        from = start + pattern.len();
    }
    matches
}

fn scan_pattern(text: &str, pattern: &Regex) -> Vec<(usize, usize)> {
    pattern
        .find_iter(text)
        .filter(|m| !m.is_empty())
        .map(|m| (m.start(), m.end()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceContext;
    use crate::syntax::{parser::parse, NodeKind, Tag};

    fn tree(sql: &str) -> SyntaxTree {
        parse(sql, SourceContext::from_file("test", sql)).expect("parse should succeed")
    }

    /// Every attached node's span must stay a well-formed window into the
    /// buffer.
    fn assert_spans_consistent(t: &SyntaxTree) {
        let mut stack = vec![t.root()];
        while let Some(node) = stack.pop() {
            let span = t.span(node);
            assert!(span.start <= span.end, "inverted span {:?}", span);
            assert!(span.end <= t.buffer().len(), "span {:?} past buffer", span);
            if let Some(parent) = t.parent(node) {
                let outer = t.span(parent);
                assert!(
                    outer.start <= span.start && span.end <= outer.end,
                    "child {:?} escapes parent {:?}",
                    span,
                    outer
                );
            }
            stack.extend(t.children(node).iter().copied());
        }
    }

    #[test]
    fn scan_finds_non_overlapping_occurrences() {
        assert_eq!(scan_literal("aaaa", "aa"), [(0, 2), (2, 4)]);
        assert_eq!(scan_literal("a b a", "a"), [(0, 1), (4, 5)]);
        assert!(scan_literal("abc", "").is_empty());
    }

    #[test]
    fn substitute_with_no_occurrence_is_a_no_op() {
        let mut t = tree("select v1 from t");
        let before = t.buffer().to_string();
        let root = t.root();
        t.substitute(root, "zzz", "yyy");
        assert_eq!(t.buffer(), before);
        assert_spans_consistent(&t);
    }

    #[test]
    fn shrinking_edit_shifts_following_nodes_left() {
        let mut t = tree("select v1 from table where v2 = '1'");
        let root = t.root();
        t.substitute(root, "table", "t");
        assert_eq!(t.buffer(), "select v1 from t where v2 = '1'");
        assert_spans_consistent(&t);
        let refs = t.query(root, Tag::Kind(NodeKind::FieldRef), None);
        let texts: Vec<&str> = refs.iter().map(|&n| t.text(n)).collect();
        assert_eq!(texts, ["v1", "t", "v2"]);
    }

    #[test]
    fn growing_edit_shifts_following_nodes_right() {
        let mut t = tree("select v1 from t");
        let root = t.root();
        t.substitute(root, "t", "very_long_table");
        // The scan is textual, so the `t` in the gap text `select` is
        // replaced along with the table reference.
        assert_eq!(t.buffer(), "selecvery_long_table v1 from very_long_table");
        assert_spans_consistent(&t);
    }

    #[test]
    fn substitute_on_a_leaf_touches_only_that_range() {
        let mut t = tree("select v1 from table where v2 = '1'");
        let root = t.root();
        let from_ref = t
            .query(root, Tag::Kind(NodeKind::FieldRef), None)
            .into_iter()
            .find(|&n| t.text(n) == "table")
            .expect("table ref");
        t.substitute(from_ref, "table", "foo");
        assert_eq!(t.buffer(), "select v1 from foo where v2 = '1'");
        assert_eq!(t.text(from_ref), "foo");
        assert_spans_consistent(&t);
        let v2 = t
            .query(root, Tag::Kind(NodeKind::FieldRef), None)
            .into_iter()
            .find(|&n| t.text(n) == "v2")
            .expect("v2 ref survives");
        assert_eq!(t.text(v2), "v2");
    }

    #[test]
    fn multiple_occurrences_apply_right_to_left() {
        let mut t = tree("select aa, aa from aa");
        let root = t.root();
        t.substitute(root, "aa", "bbb");
        assert_eq!(t.buffer(), "select bbb, bbb from bbb");
        assert_spans_consistent(&t);
        let names: Vec<String> = t
            .select_expressions()
            .iter()
            .map(|&e| t.output_name(e))
            .collect();
        assert_eq!(names, ["bbb", "bbb"]);
    }

    #[test]
    fn deletion_via_empty_replacement() {
        let mut t = tree("select v1 from table_old");
        let root = t.root();
        t.substitute(root, "_old", "");
        assert_eq!(t.buffer(), "select v1 from table");
        assert_spans_consistent(&t);
    }

    #[test]
    fn pattern_substitution_uses_the_same_reconciliation() {
        let mut t = tree("select v1, v2 from t");
        let root = t.root();
        let digits = Regex::new(r"v\d").expect("valid pattern");
        t.substitute_pattern(root, &digits, "col");
        assert_eq!(t.buffer(), "select col, col from t");
        assert_spans_consistent(&t);
    }

    #[test]
    fn index_of_reports_absolute_offsets() {
        let t = tree("select v1 from table");
        let root = t.root();
        assert_eq!(t.index_of(root, "table"), Some(15));
        assert_eq!(t.index_of(root, "zzz"), None);
    }
}
