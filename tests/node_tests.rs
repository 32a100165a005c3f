// Tree-level behavior: select-expression naming, pruning, substitution.

use sqlcanon::errors::SourceContext;
use sqlcanon::syntax::{parser::parse, NodeKind, SyntaxTree, Tag};

fn parse_query(sql: &str) -> SyntaxTree {
    parse(sql, SourceContext::from_file("test", sql)).expect("parse should succeed")
}

fn names_for(sql: &str) -> Vec<String> {
    let tree = parse_query(sql);
    tree.select_expressions()
        .iter()
        .map(|&e| tree.output_name(e))
        .collect()
}

/// Pre-order snapshot of the attached tree: kind plus covered range.
fn shape_of(tree: &SyntaxTree) -> Vec<(NodeKind, usize, usize)> {
    let mut out = Vec::new();
    let mut stack = vec![tree.root()];
    while let Some(node) = stack.pop() {
        let span = tree.span(node);
        out.push((tree.kind(node), span.start, span.end));
        for &child in tree.children(node).iter().rev() {
            stack.push(child);
        }
    }
    out
}

#[test]
fn returns_the_name_for_aliases() {
    assert_eq!(
        names_for(r#"SELECT field1 AS f1, field2 AS "field 2""#),
        ["f1", "field 2"]
    );
}

#[test]
fn infers_the_name_from_fields_when_no_alias_specified() {
    assert_eq!(names_for("SELECT table.field1, field2"), ["field1", "field2"]);
}

#[test]
fn returns_glob_for_expressions_selecting_from_glob() {
    assert_eq!(names_for("SELECT table.*, *"), ["*", "*"]);
}

#[test]
fn returns_placeholder_for_complex_expressions() {
    assert_eq!(
        names_for(
            r#"SELECT count(*) + 1, case when true then 3 else 2 end, "table"."field" + 5"#
        ),
        ["?column?", "?column?", "?column?"]
    );
}

#[test]
fn returns_quoted_fields_as_the_field() {
    assert_eq!(
        names_for(r#"SELECT "my table"."*_date", "boogie""#),
        ["*_date", "boogie"]
    );
}

#[test]
fn returns_the_function_name() {
    assert_eq!(names_for("SELECT count(*), min(field1)"), ["count", "min"]);
}

#[test]
fn prune_preserves_non_vanilla_nodes() {
    let mut tree = parse_query("SELECT * FROM table");
    let root = tree.root();
    tree.prune(root);
    assert_eq!(
        tree.query(root, Tag::Kind(NodeKind::FromExpression), None).len(),
        1
    );
}

#[test]
fn prune_removes_all_vanilla_nodes() {
    let mut tree = parse_query("SELECT * FROM table WHERE (value = '1')");
    let root = tree.root();
    let vanilla_before = tree
        .query(root, Tag::Any, None)
        .into_iter()
        .filter(|&n| tree.is_vanilla(n))
        .count();
    assert!(vanilla_before > 0, "the raw tree carries vanilla nodes");

    tree.prune(root);
    let vanilla_after = tree
        .query(root, Tag::Any, None)
        .into_iter()
        .filter(|&n| tree.is_vanilla(n))
        .count();
    assert_eq!(vanilla_after, 0);
}

#[test]
fn prune_is_idempotent() {
    let mut tree = parse_query("SELECT v1 AS s, v2 FROM t WHERE (v2 = '1') LIMIT 3");
    let root = tree.root();
    tree.prune(root);
    let once = shape_of(&tree);
    tree.prune(root);
    assert_eq!(shape_of(&tree), once);
}

#[test]
fn substitution_on_a_pruned_tree_preserves_unrelated_nodes() {
    let mut tree = parse_query("SELECT * FROM table WHERE (filter_field = '1')");
    let root = tree.root();
    tree.prune(root);
    tree.substitute(root, "table", "foo");

    let last_ref = tree
        .query(root, Tag::Kind(NodeKind::FieldRef), None)
        .pop()
        .expect("field refs survive the edit");
    assert_eq!(tree.text(last_ref), "filter_field");
}

#[test]
fn substitution_keeps_every_interval_consistent() {
    let mut tree = parse_query("select v1 as s, v2 from table where (table.v2 = '1')");
    let root = tree.root();
    tree.prune(root);
    tree.substitute(root, "table", "a_much_longer_table");
    tree.substitute(root, "v2", "v");

    assert_eq!(
        tree.buffer(),
        "select v1 as s, v from a_much_longer_table where (a_much_longer_table.v = '1')"
    );
    let refs: Vec<&str> = tree
        .query(root, Tag::Kind(NodeKind::FieldRef), None)
        .iter()
        .map(|&n| tree.text(n))
        .collect();
    assert_eq!(refs, ["v1", "v", "a_much_longer_table", "a_much_longer_table.v"]);

    // Spans stay well-formed and nested for every attached node.
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let span = tree.span(node);
        assert!(span.start <= span.end && span.end <= tree.buffer().len());
        if let Some(parent) = tree.parent(node) {
            let outer = tree.span(parent);
            assert!(outer.start <= span.start && span.end <= outer.end);
        }
        stack.extend(tree.children(node).iter().copied());
    }
}

#[test]
fn alias_text_reads_back_without_quotes() {
    let tree = parse_query(r#"SELECT field2 AS "field 2""#);
    let alias = tree
        .find(tree.root(), Tag::Kind(NodeKind::Alias), None)
        .expect("alias node");
    assert_eq!(tree.text(alias), "field 2");
}
