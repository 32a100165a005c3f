//! Unified error handling for sqlcanon.
//!
//! Every failure in the parse / prune / edit / format pipeline is a
//! [`CanonError`]: an [`ErrorKind`] describing what went wrong, a named
//! source with a primary span describing where, and a stable error code.
//! Errors render through `miette` so the CLI shows labeled source excerpts.

use std::fmt;
use std::sync::Arc;

use miette::{Diagnostic, LabeledSpan, NamedSource, SourceCode, SourceSpan};
use thiserror::Error;

use crate::syntax::Span;

/// Shared, render-ready source handle for diagnostics.
pub type SourceArc = Arc<NamedSource<String>>;

/// Source context for error reporting: the display name and the full text
/// the spans of a tree refer to.
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real input content.
    pub fn from_file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Convert to a `NamedSource` for use with miette error reporting.
    pub fn to_named_source(&self) -> SourceArc {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

/// Convert a tree [`Span`] into a miette [`SourceSpan`].
pub fn to_source_span(span: Span) -> SourceSpan {
    (span.start, span.len()).into()
}

/// All error kinds as a clean enum - no duplicate fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Parse errors - structural and syntactic issues
    #[error("expected {expected}, found `{found}`")]
    UnexpectedToken { expected: String, found: String },
    #[error("unexpected end of input while looking for {expected}")]
    UnexpectedEnd { expected: String },
    #[error("unterminated {literal_type}")]
    UnterminatedLiteral { literal_type: String },
    #[error("malformed {clause} clause")]
    MalformedClause { clause: String },

    // Tree mutation errors
    #[error("invalid operation: {operation}")]
    InvalidOperation { operation: String },

    // Formatter errors
    #[error("unsupported input: {construct}")]
    UnsupportedInput { construct: String },
}

/// The single error type: what went wrong, where, and how it is reported.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct CanonError {
    pub kind: ErrorKind,
    named_source: SourceArc,
    span: SourceSpan,
    help: Option<String>,
}

impl CanonError {
    pub fn new(kind: ErrorKind, context: &SourceContext, span: Span) -> Self {
        Self {
            kind,
            named_source: context.to_named_source(),
            span: to_source_span(span),
            help: None,
        }
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Stable code for this error, grouped by pipeline stage.
    pub fn code_str(&self) -> &'static str {
        match self.kind {
            ErrorKind::UnexpectedToken { .. }
            | ErrorKind::UnexpectedEnd { .. }
            | ErrorKind::UnterminatedLiteral { .. }
            | ErrorKind::MalformedClause { .. } => "sqlcanon::parse",
            ErrorKind::InvalidOperation { .. } => "sqlcanon::tree",
            ErrorKind::UnsupportedInput { .. } => "sqlcanon::format",
        }
    }

    fn label(&self) -> &'static str {
        match self.kind {
            ErrorKind::UnexpectedToken { .. } => "unexpected token here",
            ErrorKind::UnexpectedEnd { .. } => "input ends here",
            ErrorKind::UnterminatedLiteral { .. } => "literal starts here",
            ErrorKind::MalformedClause { .. } => "in this clause",
            ErrorKind::InvalidOperation { .. } => "requested here",
            ErrorKind::UnsupportedInput { .. } => "this construct",
        }
    }
}

impl Diagnostic for CanonError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code_str()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.help
            .as_ref()
            .map(|h| Box::new(h.clone()) as Box<dyn fmt::Display>)
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(self.named_source.as_ref())
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_with_span(
            Some(self.label().to_string()),
            self.span,
        ))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_follow_pipeline_stage() {
        let ctx = SourceContext::from_file("test", "select");
        let parse_err = CanonError::new(
            ErrorKind::UnexpectedEnd {
                expected: "an expression".into(),
            },
            &ctx,
            Span { start: 6, end: 6 },
        );
        assert_eq!(parse_err.code_str(), "sqlcanon::parse");

        let tree_err = CanonError::new(
            ErrorKind::InvalidOperation {
                operation: "delete the root node".into(),
            },
            &ctx,
            Span { start: 0, end: 6 },
        );
        assert_eq!(tree_err.code_str(), "sqlcanon::tree");
    }

    #[test]
    fn messages_name_the_offending_token() {
        let kind = ErrorKind::UnexpectedToken {
            expected: "an expression".into(),
            found: "from".into(),
        };
        assert_eq!(kind.to_string(), "expected an expression, found `from`");
    }
}
