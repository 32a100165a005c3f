//! Recursive-descent parser for the SQL query subset.
//!
//! The parser is purely syntactic: it produces the typed tree the rest of
//! the crate operates on and does no semantic checking. Only constructs the
//! formatter or name inference care about become nodes; keywords,
//! whitespace, and punctuation stay behind as gap text inside their
//! parent's span. Absent optional constructs (a missing alias) leave a
//! zero-width generic placeholder, which is what the pruning pass removes.

use crate::errors::{CanonError, ErrorKind, SourceContext};

use super::{NodeId, NodeKind, Span, SyntaxTree};

/// Words that terminate an expression and can never start an operand or
/// serve as a bare alias.
const RESERVED: &[&str] = &[
    "select", "from", "where", "join", "left", "right", "inner", "outer", "full", "cross", "on",
    "order", "by", "limit", "as", "and", "or", "like", "case", "when", "then", "else", "end",
    "asc", "desc",
];

/// Parse SQL query text into a syntax tree over its own copy of `source`.
pub fn parse(source: &str, context: SourceContext) -> Result<SyntaxTree, CanonError> {
    let tree = SyntaxTree::new(context.name.clone(), source.to_string());
    let mut parser = Parser {
        src: source,
        pos: 0,
        tree,
        context,
    };
    let root = parser.tree.root();
    parser.parse_query_clauses(root)?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.unexpected("end of input"));
    }
    Ok(parser.tree)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    tree: SyntaxTree,
    context: SourceContext,
}

enum PartLex {
    Word(Span),
    Quoted { outer: Span, inner: Span },
    Glob(Span),
}

impl PartLex {
    fn outer(&self) -> Span {
        match self {
            PartLex::Word(span) | PartLex::Glob(span) => *span,
            PartLex::Quoted { outer, .. } => *outer,
        }
    }
}

impl<'a> Parser<'a> {
    // ------------------------------------------------------------------
    // Cursor primitives
    // ------------------------------------------------------------------

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Span of the identifier-shaped word at the cursor, if any, without
    /// consuming it.
    fn peek_word(&self) -> Option<Span> {
        let first = self.peek()?;
        if !(first.is_ascii_alphabetic() || first == '_') {
            return None;
        }
        let mut end = self.src.len();
        for (i, c) in self.src[self.pos..].char_indices() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                end = self.pos + i;
                break;
            }
        }
        Some(Span::new(self.pos, end))
    }

    fn word_text(&self, span: Span) -> &str {
        &self.src[span.start..span.end]
    }

    fn peek_keyword(&self) -> Option<String> {
        self.peek_word()
            .map(|s| self.word_text(s).to_ascii_lowercase())
    }

    fn eat_keyword(&mut self, keyword: &str) -> Option<Span> {
        let span = self.peek_word()?;
        if self.word_text(span).eq_ignore_ascii_case(keyword) {
            self.pos = span.end;
            Some(span)
        } else {
            None
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<Span, CanonError> {
        self.eat_keyword(keyword)
            .ok_or_else(|| self.unexpected(&format!("`{}`", keyword.to_uppercase())))
    }

    fn unexpected(&self, expected: &str) -> CanonError {
        if let Some(span) = self.peek_word() {
            return CanonError::new(
                ErrorKind::UnexpectedToken {
                    expected: expected.into(),
                    found: self.word_text(span).into(),
                },
                &self.context,
                span,
            );
        }
        match self.peek() {
            Some(c) => CanonError::new(
                ErrorKind::UnexpectedToken {
                    expected: expected.into(),
                    found: c.to_string(),
                },
                &self.context,
                Span::new(self.pos, self.pos + c.len_utf8()),
            ),
            None => CanonError::new(
                ErrorKind::UnexpectedEnd {
                    expected: expected.into(),
                },
                &self.context,
                Span::new(self.pos, self.pos),
            ),
        }
    }

    // ------------------------------------------------------------------
    // Clauses
    // ------------------------------------------------------------------

    /// A query body: a select statement followed by any run of clause
    /// statements. Stops (without consuming) at the first token that does
    /// not open a clause, so callers decide what legally follows.
    fn parse_query_clauses(&mut self, query: NodeId) -> Result<(), CanonError> {
        self.skip_ws();
        self.parse_select_statement(query)?;
        loop {
            let mark = self.pos;
            self.skip_ws();
            let Some(keyword) = self.peek_keyword() else {
                self.pos = mark;
                break;
            };
            match keyword.as_str() {
                "from" => self.parse_from_statement(query)?,
                "where" => self.parse_where_statement(query)?,
                "order" => self.parse_order_by_statement(query)?,
                "limit" => self.parse_limit_statement(query)?,
                "join" | "left" | "right" | "inner" | "outer" | "full" | "cross" => {
                    self.parse_join_statement(query)?
                }
                _ => {
                    self.pos = mark;
                    break;
                }
            };
        }
        Ok(())
    }

    fn parse_select_statement(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let keyword = self.expect_keyword("select")?;
        let stmt = self
            .tree
            .push_node(NodeKind::SelectStatement, Span::new(keyword.start, keyword.start), parent);
        loop {
            self.skip_ws();
            self.parse_select_expression(stmt)?;
            let mark = self.pos;
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
            } else {
                self.pos = mark;
                break;
            }
        }
        self.tree.set_end(stmt, self.pos);
        Ok(stmt)
    }

    fn parse_select_expression(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let node = self
            .tree
            .push_node(NodeKind::SelectExpression, Span::new(self.pos, self.pos), parent);
        self.parse_expression(node)?;
        let mark = self.pos;
        self.skip_ws();
        if self.eat_keyword("as").is_some() {
            self.skip_ws();
            self.parse_alias(node)?;
        } else {
            self.pos = mark;
            self.tree
                .push_node(NodeKind::Generic, Span::new(self.pos, self.pos), node);
        }
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    /// An alias name. Quoted aliases span only the inner text; the quotes
    /// stay gap text, so the alias node reads back without them.
    fn parse_alias(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        if self.peek() == Some('"') {
            let open = self.pos;
            self.bump();
            match self.src[self.pos..].find('"') {
                Some(offset) => {
                    let inner = Span::new(self.pos, self.pos + offset);
                    self.pos = inner.end + 1;
                    Ok(self.tree.push_node(NodeKind::Alias, inner, parent))
                }
                None => Err(CanonError::new(
                    ErrorKind::UnterminatedLiteral {
                        literal_type: "quoted alias".into(),
                    },
                    &self.context,
                    Span::new(open, self.src.len()),
                )),
            }
        } else {
            let span = self.peek_word().ok_or_else(|| self.unexpected("an alias"))?;
            self.pos = span.end;
            Ok(self.tree.push_node(NodeKind::Alias, span, parent))
        }
    }

    fn parse_from_statement(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let keyword = self.expect_keyword("from")?;
        let stmt = self
            .tree
            .push_node(NodeKind::FromStatement, Span::new(keyword.start, keyword.start), parent);
        loop {
            self.skip_ws();
            self.parse_from_expression(stmt)?;
            let mark = self.pos;
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
            } else {
                self.pos = mark;
                break;
            }
        }
        self.tree.set_end(stmt, self.pos);
        Ok(stmt)
    }

    fn parse_from_expression(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let node = self
            .tree
            .push_node(NodeKind::FromExpression, Span::new(self.pos, self.pos), parent);
        if self.peek() == Some('(') {
            self.bump();
            self.skip_ws();
            self.parse_subquery(node)?;
            self.skip_ws();
            if self.peek() == Some(')') {
                self.bump();
            } else {
                return Err(self.unexpected("`)`"));
            }
        } else {
            self.parse_field_ref(node)?;
        }
        let mark = self.pos;
        self.skip_ws();
        if self.eat_keyword("as").is_some() {
            self.skip_ws();
            self.parse_alias(node)?;
        } else if self.peek() == Some('"') {
            self.parse_alias(node)?;
        } else if let Some(span) = self.peek_word() {
            let word = self.word_text(span).to_ascii_lowercase();
            if RESERVED.contains(&word.as_str()) {
                self.pos = mark;
                self.tree
                    .push_node(NodeKind::Generic, Span::new(self.pos, self.pos), node);
            } else {
                self.pos = span.end;
                self.tree.push_node(NodeKind::Alias, span, node);
            }
        } else {
            self.pos = mark;
            self.tree
                .push_node(NodeKind::Generic, Span::new(self.pos, self.pos), node);
        }
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    /// A nested query body. The caller owns the surrounding parentheses;
    /// the query node spans only `select ... <last clause>`.
    fn parse_subquery(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let node = self
            .tree
            .push_node(NodeKind::Query, Span::new(self.pos, self.pos), parent);
        self.parse_query_clauses(node)?;
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    fn parse_join_statement(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let start = self.pos;
        let first = self
            .peek_word()
            .ok_or_else(|| self.unexpected("a join keyword"))?;
        let first_word = self.word_text(first).to_ascii_lowercase();
        self.pos = first.end;
        if first_word != "join" {
            if matches!(first_word.as_str(), "left" | "right" | "full") {
                let mark = self.pos;
                self.skip_ws();
                if self.eat_keyword("outer").is_none() {
                    self.pos = mark;
                }
            } else if !matches!(first_word.as_str(), "inner" | "cross") {
                return Err(self.unexpected("a join keyword"));
            }
            self.skip_ws();
            self.expect_keyword("join")?;
        }
        let keyword_span = Span::new(start, self.pos);
        let stmt = self
            .tree
            .push_node(NodeKind::JoinStatement, Span::new(start, start), parent);
        self.tree.push_node(NodeKind::JoinKeyword, keyword_span, stmt);
        self.skip_ws();
        self.parse_expression(stmt)?;
        self.skip_ws();
        self.expect_keyword("on")?;
        self.skip_ws();
        self.parse_expression(stmt)?;
        self.tree.set_end(stmt, self.pos);
        Ok(stmt)
    }

    fn parse_where_statement(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let keyword = self.expect_keyword("where")?;
        let stmt = self
            .tree
            .push_node(NodeKind::WhereStatement, Span::new(keyword.start, keyword.start), parent);
        self.skip_ws();
        self.parse_expression(stmt)?;
        self.tree.set_end(stmt, self.pos);
        Ok(stmt)
    }

    fn parse_order_by_statement(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let keyword = self.expect_keyword("order")?;
        self.skip_ws();
        if self.eat_keyword("by").is_none() {
            return Err(CanonError::new(
                ErrorKind::MalformedClause {
                    clause: "ORDER BY".into(),
                },
                &self.context,
                Span::new(keyword.start, self.pos),
            )
            .with_help("ORDER must be followed by BY"));
        }
        let stmt = self
            .tree
            .push_node(NodeKind::OrderByStatement, Span::new(keyword.start, keyword.start), parent);
        loop {
            self.skip_ws();
            self.parse_order_by_expression(stmt)?;
            let mark = self.pos;
            self.skip_ws();
            if self.peek() == Some(',') {
                self.bump();
            } else {
                self.pos = mark;
                break;
            }
        }
        self.tree.set_end(stmt, self.pos);
        Ok(stmt)
    }

    fn parse_order_by_expression(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let node = self
            .tree
            .push_node(NodeKind::OrderByExpression, Span::new(self.pos, self.pos), parent);
        self.parse_expression(node)?;
        let mark = self.pos;
        self.skip_ws();
        if let Some(span) = self.peek_word() {
            let word = self.word_text(span).to_ascii_lowercase();
            if word == "asc" || word == "desc" {
                self.pos = span.end;
                self.tree.push_node(NodeKind::Generic, span, node);
            } else {
                self.pos = mark;
            }
        } else {
            self.pos = mark;
        }
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    /// Children past the keyword carry the verbatim remainder of the
    /// clause, which is how the formatter reproduces ` N`.
    fn parse_limit_statement(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let keyword = self.expect_keyword("limit")?;
        let stmt = self
            .tree
            .push_node(NodeKind::LimitStatement, Span::new(keyword.start, keyword.start), parent);
        self.tree.push_node(NodeKind::Generic, keyword, stmt);
        let ws_start = self.pos;
        self.skip_ws();
        if ws_start < self.pos {
            self.tree
                .push_node(NodeKind::Generic, Span::new(ws_start, self.pos), stmt);
        }
        match self.peek() {
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
                self.tree
                    .push_node(NodeKind::Generic, Span::new(start, self.pos), stmt);
            }
            _ => return Err(self.unexpected("a limit count")),
        }
        self.tree.set_end(stmt, self.pos);
        Ok(stmt)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    /// An expression wrapper node over an `operand (operator operand)*`
    /// sequence.
    fn parse_expression(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let node = self
            .tree
            .push_node(NodeKind::Expression, Span::new(self.pos, self.pos), parent);
        self.parse_operand_sequence(node)?;
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    fn parse_operand_sequence(&mut self, node: NodeId) -> Result<(), CanonError> {
        self.parse_operand(node)?;
        loop {
            let mark = self.pos;
            self.skip_ws();
            match self.lex_operator() {
                Some(op) => {
                    self.tree.push_node(NodeKind::Operator, op, node);
                    self.skip_ws();
                    self.parse_operand(node)?;
                }
                None => {
                    self.pos = mark;
                    break;
                }
            }
        }
        Ok(())
    }

    fn lex_operator(&mut self) -> Option<Span> {
        let start = self.pos;
        let rest = &self.src[self.pos..];
        for symbol in ["<=", ">=", "<>", "!=", "||"] {
            if rest.starts_with(symbol) {
                self.pos += symbol.len();
                return Some(Span::new(start, self.pos));
            }
        }
        if let Some(c) = self.peek() {
            if matches!(c, '=' | '<' | '>' | '+' | '-' | '*' | '/' | '%') {
                self.bump();
                return Some(Span::new(start, self.pos));
            }
        }
        if let Some(span) = self.peek_word() {
            let word = self.word_text(span).to_ascii_lowercase();
            if matches!(word.as_str(), "and" | "or" | "like") {
                self.pos = span.end;
                return Some(span);
            }
        }
        None
    }

    fn parse_operand(&mut self, parent: NodeId) -> Result<(), CanonError> {
        match self.peek() {
            Some('(') => {
                self.parse_paren_expression(parent)?;
            }
            Some('\'') => {
                self.parse_string_literal(parent)?;
            }
            Some('"') | Some('*') => {
                self.parse_field_ref(parent)?;
            }
            Some(c) if c.is_ascii_digit() => {
                self.parse_number_literal(parent);
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let span = match self.peek_word() {
                    Some(span) => span,
                    None => return Err(self.unexpected("an expression")),
                };
                let word = self.word_text(span).to_ascii_lowercase();
                if word == "case" {
                    self.parse_case_expression(parent)?;
                } else if RESERVED.contains(&word.as_str()) {
                    return Err(self.unexpected("an expression"));
                } else if self.src[span.end..].starts_with('(') {
                    self.parse_function(parent, span)?;
                } else {
                    self.parse_field_ref(parent)?;
                }
            }
            _ => return Err(self.unexpected("an expression")),
        }
        Ok(())
    }

    /// A parenthesized group: either a nested query or an inlined operand
    /// sequence. The node spans the parentheses; the inner items are its
    /// children, so the parens themselves are reproduced as gap text.
    fn parse_paren_expression(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let start = self.pos;
        let node = self
            .tree
            .push_node(NodeKind::Expression, Span::new(start, start), parent);
        self.bump();
        self.skip_ws();
        if self.peek_keyword().as_deref() == Some("select") {
            self.parse_subquery(node)?;
        } else {
            self.parse_operand_sequence(node)?;
        }
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
        } else {
            return Err(self.unexpected("`)`"));
        }
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    fn parse_string_literal(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let start = self.pos;
        self.bump();
        match self.src[self.pos..].find('\'') {
            Some(offset) => {
                self.pos += offset + 1;
                Ok(self
                    .tree
                    .push_node(NodeKind::Generic, Span::new(start, self.pos), parent))
            }
            None => Err(CanonError::new(
                ErrorKind::UnterminatedLiteral {
                    literal_type: "string literal".into(),
                },
                &self.context,
                Span::new(start, self.src.len()),
            )),
        }
    }

    fn parse_number_literal(&mut self, parent: NodeId) -> NodeId {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        self.tree
            .push_node(NodeKind::Generic, Span::new(start, self.pos), parent)
    }

    /// `CASE ... END`, kept as one opaque generic node. The scan tracks
    /// nesting and skips string literals so an `END` inside a string does
    /// not close the expression.
    fn parse_case_expression(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let start = self.pos;
        self.expect_keyword("case")?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => {
                    return Err(CanonError::new(
                        ErrorKind::UnexpectedEnd {
                            expected: "`END`".into(),
                        },
                        &self.context,
                        Span::new(start, self.pos),
                    ))
                }
                Some('\'') => {
                    self.parse_string_scan()?;
                }
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    if let Some(span) = self.peek_word() {
                        let word = self.word_text(span).to_ascii_lowercase();
                        self.pos = span.end;
                        if word == "case" {
                            depth += 1;
                        } else if word == "end" {
                            depth -= 1;
                        }
                    } else {
                        self.bump();
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        Ok(self
            .tree
            .push_node(NodeKind::Generic, Span::new(start, self.pos), parent))
    }

    /// Advance past a string literal without creating a node.
    fn parse_string_scan(&mut self) -> Result<(), CanonError> {
        let start = self.pos;
        self.bump();
        match self.src[self.pos..].find('\'') {
            Some(offset) => {
                self.pos += offset + 1;
                Ok(())
            }
            None => Err(CanonError::new(
                ErrorKind::UnterminatedLiteral {
                    literal_type: "string literal".into(),
                },
                &self.context,
                Span::new(start, self.src.len()),
            )),
        }
    }

    fn parse_function(&mut self, parent: NodeId, name: Span) -> Result<NodeId, CanonError> {
        let node = self
            .tree
            .push_node(NodeKind::Function, Span::new(name.start, name.start), parent);
        self.tree.push_node(NodeKind::Name, name, node);
        self.pos = name.end;
        self.bump();
        self.skip_ws();
        if self.peek() != Some(')') {
            loop {
                self.parse_expression(node)?;
                let mark = self.pos;
                self.skip_ws();
                if self.peek() == Some(',') {
                    self.bump();
                    self.skip_ws();
                } else {
                    self.pos = mark;
                    break;
                }
            }
        }
        self.skip_ws();
        if self.peek() == Some(')') {
            self.bump();
        } else {
            return Err(self.unexpected("`)`"));
        }
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    /// A possibly dotted field reference: every part before a dot becomes
    /// a table part, the final part an entity or glob. The dots are gaps.
    fn parse_field_ref(&mut self, parent: NodeId) -> Result<NodeId, CanonError> {
        let start = self.pos;
        let node = self
            .tree
            .push_node(NodeKind::FieldRef, Span::new(start, start), parent);
        loop {
            let part = self.lex_field_part()?;
            let is_glob = matches!(part, PartLex::Glob(_));
            if !is_glob && self.peek() == Some('.') {
                let table = self
                    .tree
                    .push_node(NodeKind::TablePart, part.outer(), node);
                self.push_entity(table, part);
                self.bump();
                continue;
            }
            match part {
                PartLex::Glob(span) => {
                    self.tree.push_node(NodeKind::FieldGlob, span, node);
                }
                other => self.push_entity(node, other),
            }
            break;
        }
        self.tree.set_end(node, self.pos);
        Ok(node)
    }

    fn lex_field_part(&mut self) -> Result<PartLex, CanonError> {
        match self.peek() {
            Some('"') => {
                let open = self.pos;
                self.bump();
                match self.src[self.pos..].find('"') {
                    Some(offset) => {
                        let inner = Span::new(self.pos, self.pos + offset);
                        self.pos = inner.end + 1;
                        Ok(PartLex::Quoted {
                            outer: Span::new(open, self.pos),
                            inner,
                        })
                    }
                    None => Err(CanonError::new(
                        ErrorKind::UnterminatedLiteral {
                            literal_type: "quoted identifier".into(),
                        },
                        &self.context,
                        Span::new(open, self.src.len()),
                    )),
                }
            }
            Some('*') => {
                let start = self.pos;
                self.bump();
                Ok(PartLex::Glob(Span::new(start, self.pos)))
            }
            _ => {
                let span = self
                    .peek_word()
                    .ok_or_else(|| self.unexpected("an identifier"))?;
                self.pos = span.end;
                Ok(PartLex::Word(span))
            }
        }
    }

    fn push_entity(&mut self, parent: NodeId, part: PartLex) {
        match part {
            PartLex::Word(span) => {
                let entity = self.tree.push_node(NodeKind::Entity, span, parent);
                self.tree.push_node(NodeKind::Name, span, entity);
            }
            PartLex::Quoted { outer, inner } => {
                let entity = self.tree.push_node(NodeKind::QuotedEntity, outer, parent);
                self.tree.push_node(NodeKind::Name, inner, entity);
            }
            PartLex::Glob(span) => {
                self.tree.push_node(NodeKind::FieldGlob, span, parent);
            }
        }
    }
}
