// Canonical formatting: keyword casing, one clause per line, indentation.

use sqlcanon::errors::SourceContext;
use sqlcanon::formatter;
use sqlcanon::syntax::{parser::parse, NodeKind, SyntaxTree, Tag};

fn parse_query(sql: &str) -> SyntaxTree {
    parse(sql, SourceContext::from_file("test", sql)).expect("parse should succeed")
}

fn parse_pruned(sql: &str) -> SyntaxTree {
    let mut tree = parse_query(sql);
    let root = tree.root();
    tree.prune(root);
    tree
}

#[test]
fn capitalizes_keywords_putting_each_statement_on_its_own_line() {
    let tree = parse_pruned(
        "select v1 as s, v2 from table left join a on b = c where (table.v2 = '1') order by v2 limit 5",
    );
    let formatted = formatter::format(&tree).expect("format should succeed");
    assert_eq!(
        formatted,
        "SELECT\n  v1 AS s,\n  v2\nFROM table\nLEFT JOIN a ON b = c\nWHERE (table.v2 = '1')\nORDER BY v2\nLIMIT 5\n"
    );
}

#[test]
fn indents_subqueries() {
    let tree = parse_query("select v1 from (select v2, v3 from a) b");
    let formatted = formatter::format(&tree).expect("format should succeed");
    assert_eq!(
        formatted,
        "SELECT\n  v1\nFROM (\n  SELECT\n    v2,\n    v3\n  FROM a) b\n"
    );
}

#[test]
fn pruning_does_not_change_the_rendering() {
    let sql = "select v1 as s, v2 from table left join a on b = c where (table.v2 = '1') order by v2 limit 5";
    let raw = formatter::format(&parse_query(sql)).expect("format raw");
    let pruned = formatter::format(&parse_pruned(sql)).expect("format pruned");
    assert_eq!(raw, pruned);
}

#[test]
fn quotes_aliases_that_need_it() {
    let tree = parse_pruned(r#"select field1 as f1, field2 as "field 2""#);
    let formatted = formatter::format(&tree).expect("format should succeed");
    assert_eq!(formatted, "SELECT\n  field1 AS f1,\n  field2 AS \"field 2\"\n");
}

#[test]
fn renders_multiple_joins_each_on_their_own_line() {
    let tree = parse_pruned("select v1 from t join a on x = y inner join b on p = q");
    let formatted = formatter::format(&tree).expect("format should succeed");
    assert_eq!(
        formatted,
        "SELECT\n  v1\nFROM t\nJOIN a ON x = y\nINNER JOIN b ON p = q\n"
    );
}

#[test]
fn preserves_order_by_direction_verbatim() {
    let tree = parse_pruned("select v1 from t order by v1 desc");
    let formatted = formatter::format(&tree).expect("format should succeed");
    assert_eq!(formatted, "SELECT\n  v1\nFROM t\nORDER BY v1 desc\n");
}

#[test]
fn edit_then_format_reflects_the_new_text() {
    let mut tree = parse_pruned("select v1 from table where v2 = '1'");
    let root = tree.root();
    let table_ref = tree
        .query(root, Tag::Kind(NodeKind::FieldRef), None)
        .into_iter()
        .find(|&n| tree.text(n) == "table")
        .expect("table reference");
    tree.substitute(table_ref, "table", "foo");

    let formatted = formatter::format(&tree).expect("format should succeed");
    assert_eq!(formatted, "SELECT\n  v1\nFROM foo\nWHERE v2 = '1'\n");
}

#[test]
fn format_is_stable_under_extra_whitespace() {
    let tree = parse_pruned("  select   v1   from   t  ");
    let formatted = formatter::format(&tree).expect("format should succeed");
    assert_eq!(formatted, "SELECT\n  v1\nFROM t\n");
}
