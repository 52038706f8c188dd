//! # Parser
//!
//! Drives compiled [`ParserTables`] over input text.
//!
//! ## Overview
//!
//! The parser is a classic LR pushdown automaton: it asks the
//! [`Lexer`](crate::lexer::Lexer) for one token at a time in the current
//! state, shifts, reduces and finally accepts. Extras such as whitespace
//! and comments are pushed without changing the state and end up inside the
//! smallest node that spans them.
//!
//! Parsing never fails. When the lookahead has no action the parser picks
//! the cheapest of three repairs:
//!
//! 1. insert a missing token, if that lets the lookahead through;
//! 2. wrap the top of the stack into an `ERROR` node, down to a state that
//!    accepts the lookahead;
//! 3. skip the lookahead into an `ERROR` node.
//!
//! Whatever happens, the leaves of the resulting tree cover the input
//! exactly.
//!
//! ## Usage
//!
//! ```rust
//! use sprig::grammar::{dsl::*, GrammarBuilder};
//! use sprig::parser::{ParseOptions, Parser};
//! use std::sync::Arc;
//!
//! let tables = GrammarBuilder::new("sum")
//!     .rule("sum", sep1(sym("number"), string("+")))
//!     .rule("number", pattern("[0-9]+"))
//!     .build()
//!     .compile()
//!     .unwrap();
//! let parser = Parser::new(Arc::new(tables))
//!     .with_options(ParseOptions::default().with_max_errors(8));
//!
//! let tree = parser.parse("1 + 2 + + 3");
//! assert!(tree.has_error());
//! assert_eq!(tree.len(), 11);
//! ```

mod engine;
mod parallel;
mod recovery;
mod stack;

pub use parallel::{BatchResult, ParseBatch};

use crate::error::EditError;
use crate::incremental::reuse::ReuseCursor;
use crate::incremental::Edit;
use crate::lexer::{ExternalScanner, Lexer};
use crate::syntax::SyntaxTree;
use crate::tables::ParserTables;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Default bound on error recoveries per parse
pub const DEFAULT_MAX_ERRORS: usize = 1 << 12;

/// Per-parse settings
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// After this many recoveries the rest of the input becomes one error node.
    pub max_errors: usize,

    /// Setting the flag makes the running parse stop at the next token; the
    /// unparsed rest of the input ends up in an error node.
    pub cancellation: Option<Arc<AtomicBool>>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_errors: DEFAULT_MAX_ERRORS,
            cancellation: None,
        }
    }
}

impl ParseOptions {
    #[must_use]
    pub const fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(flag);
        self
    }
}

/// A parser for one grammar.
///
/// Cheap to clone; the tables and the scanner are shared.
#[derive(Clone)]
pub struct Parser {
    tables: Arc<ParserTables>,
    scanner: Option<Arc<dyn ExternalScanner>>,
    options: ParseOptions,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("grammar", &self.tables.name())
            .field("scanner", &self.scanner.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl Parser {
    #[must_use]
    pub fn new(tables: Arc<ParserTables>) -> Self {
        Self {
            tables,
            scanner: None,
            options: ParseOptions::default(),
        }
    }

    /// Recognises the grammar's external tokens with `scanner`.
    #[must_use]
    pub fn with_scanner(mut self, scanner: impl ExternalScanner + 'static) -> Self {
        self.scanner = Some(Arc::new(scanner));
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn tables(&self) -> &Arc<ParserTables> {
        &self.tables
    }

    #[must_use]
    pub const fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parses `text` from scratch.
    ///
    /// Node offsets are 32-bit; see [`TextSize`](crate::syntax::TextSize)
    /// for what happens to text past 4 GiB.
    #[instrument(skip_all, fields(grammar = self.tables.name(), len = text.as_ref().len()))]
    pub fn parse(&self, text: impl AsRef<[u8]>) -> SyntaxTree {
        self.run(text.as_ref(), None)
    }

    /// Parses `new_text`, reusing the subtrees of `old_tree` that `edit`
    /// left intact.
    ///
    /// # Errors
    ///
    /// Fails if `edit` does not match the lengths of the old and new text,
    /// or if `old_tree` was produced with different tables.
    #[instrument(
        skip_all,
        fields(
            grammar = self.tables.name(),
            start = edit.start_byte,
            old_end = edit.old_end_byte,
            new_end = edit.new_end_byte
        )
    )]
    pub fn reparse(
        &self,
        old_tree: &SyntaxTree,
        edit: &Edit,
        new_text: impl AsRef<[u8]>,
    ) -> Result<SyntaxTree, EditError> {
        let new_text = new_text.as_ref();
        if !Arc::ptr_eq(old_tree.tables(), &self.tables) && **old_tree.tables() != *self.tables {
            return Err(EditError::ForeignTree);
        }
        let old_len = old_tree.green().text_len().to_usize();
        edit.validate(old_len, new_text.len())?;

        let tree = self.run(new_text, Some(ReuseCursor::new(old_tree.green(), *edit)));
        debug!(
            reused_nodes = tree.stats().reused_nodes,
            reused_bytes = tree.stats().reused_bytes,
            tokens_lexed = tree.stats().tokens_lexed,
            "reparsed"
        );
        Ok(tree)
    }

    fn run(&self, text: &[u8], reuse: Option<ReuseCursor>) -> SyntaxTree {
        let mut lexer = Lexer::new(&self.tables, text);
        if let Some(scanner) = &self.scanner {
            lexer = lexer.with_scanner(scanner.as_ref());
        }
        if let Some(flag) = &self.options.cancellation {
            lexer = lexer.with_cancellation(flag);
        }
        let (root, stats) =
            engine::Engine::new(&self.tables, lexer, reuse, self.options.max_errors).run();
        SyntaxTree::new(root, Arc::clone(&self.tables), stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{dsl::*, GrammarBuilder};
    use std::sync::atomic::Ordering;

    fn arithmetic() -> Parser {
        let tables = GrammarBuilder::new("arith")
            .rule(
                "expr",
                choice([
                    prec_left(1, seq([field("left", sym("expr")), string("+"), field("right", sym("expr"))])),
                    prec_left(1, seq([field("left", sym("expr")), string("-"), field("right", sym("expr"))])),
                    prec_left(2, seq([field("left", sym("expr")), string("*"), field("right", sym("expr"))])),
                    seq([string("("), sym("expr"), string(")")]),
                    sym("number"),
                ]),
            )
            .rule("number", pattern("[0-9]+"))
            .build()
            .compile()
            .unwrap();
        Parser::new(Arc::new(tables))
    }

    #[test]
    fn test_left_associativity() {
        let tree = arithmetic().parse("1+2+3");
        assert!(!tree.has_error());
        assert_eq!(
            tree.to_sexp(),
            "(expr left: (expr left: (expr (number)) right: (expr (number))) right: (expr (number)))"
        );
    }

    #[test]
    fn test_precedence() {
        let tree = arithmetic().parse("1+2*3");
        assert_eq!(
            tree.to_sexp(),
            "(expr left: (expr (number)) right: (expr left: (expr (number)) right: (expr (number))))"
        );
    }

    #[test]
    fn test_whitespace_is_extra_and_covered() {
        let tree = arithmetic().parse("  1 +\n 2  ");
        let root = tree.root_node();
        assert_eq!(root.range().to_range(), 0..10);
        assert!(root.children().next().unwrap().is_extra());
        assert!(root.children().last().unwrap().is_extra());
        assert!(!tree.has_error());
    }

    #[test]
    fn test_missing_operand_is_inserted() {
        let tree = arithmetic().parse("1+");
        assert_eq!(
            tree.to_sexp(),
            "(expr left: (expr (number)) right: (expr (MISSING number)))"
        );
        assert_eq!(tree.stats().error_count, 1);
    }

    #[test]
    fn test_unexpected_token_is_skipped() {
        let tree = arithmetic().parse("1)");
        assert!(tree.has_error());
        assert_eq!(tree.to_sexp(), "(expr (number) (ERROR))");
    }

    #[test]
    fn test_empty_input() {
        let tree = arithmetic().parse("");
        assert!(tree.root_node().is_error());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.to_sexp(), "(ERROR)");
    }

    #[test]
    fn test_error_limit_swallows_rest() {
        let parser = arithmetic().with_options(ParseOptions::default().with_max_errors(0));
        let tree = parser.parse("1 ) 2 + 3");
        assert!(tree.root_node().is_error());
        assert_eq!(tree.len(), 9);
        let mut end = 0;
        for leaf in tree.leaves() {
            assert_eq!(leaf.start_byte(), end);
            end = leaf.end_byte();
        }
        assert_eq!(end, 9);
    }

    #[test]
    fn test_cancelled_parse_is_marked() {
        let flag = Arc::new(AtomicBool::new(false));
        flag.store(true, Ordering::Relaxed);
        let parser = arithmetic().with_options(ParseOptions::default().with_cancellation(flag));
        let tree = parser.parse("1 + 2");
        assert!(tree.stats().cancelled);
        assert!(tree.has_error());
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_reparse_rejects_foreign_tree() {
        let parser = arithmetic();
        let other = Parser::new(Arc::new(
            GrammarBuilder::new("other")
                .rule("start", string("x"))
                .build()
                .compile()
                .unwrap(),
        ));
        let tree = other.parse("x");
        assert_eq!(
            parser.reparse(&tree, &Edit::new(0, 1, 1), "1").unwrap_err(),
            EditError::ForeignTree
        );
    }
}
