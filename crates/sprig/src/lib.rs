//! # Sprig
//!
//! An incremental LR parser generator.
//!
//! ## Overview
//!
//! Sprig turns a declarative grammar into parse tables and uses them to
//! build concrete syntax trees. It provides:
//!
//! - **Grammar model**: rules written with a combinator DSL or loaded from JSON
//! - **Table compiler**: LR(1) or LALR(1) tables with precedence-based conflict resolution
//! - **Context-aware lexing**: one byte DFA, filtered by the tokens each parse state accepts
//! - **Error tolerance**: every input yields a tree, with `ERROR` and missing nodes where needed
//! - **Incremental re-parsing**: unchanged subtrees of the previous tree are reused after an edit
//!
//! ## Quick Start
//!
//! ```rust
//! use sprig::grammar::{dsl::*, GrammarBuilder};
//! use std::sync::Arc;
//!
//! // 1. Describe the language
//! let grammar = GrammarBuilder::new("arith")
//!     .rule(
//!         "expr",
//!         choice([
//!             prec_left(1, seq([field("left", sym("expr")), string("+"), field("right", sym("expr"))])),
//!             sym("number"),
//!         ]),
//!     )
//!     .rule("number", pattern("[0-9]+"))
//!     .build();
//!
//! // 2. Compile it once; the tables are immutable and can be shared between threads
//! let tables = Arc::new(sprig::compile(&grammar.load().unwrap()).unwrap());
//!
//! // 3. Parse
//! let tree = sprig::parse(&tables, "1 + 2 + 3");
//! assert!(!tree.has_error());
//! let root = tree.root_node();
//! assert_eq!(root.kind_name(), "expr");
//! assert_eq!(root.child_by_field_name("right").unwrap().start_byte(), 8);
//!
//! // 4. Edit and re-parse
//! let edit = sprig::Edit::new(4, 5, 5);
//! let new = sprig::reparse(&tables, &tree, &edit, "1 + 2 - 3").unwrap();
//! assert!(new.has_error());
//! ```
//!
//! ## Modules
//!
//! - [`grammar`] - Grammar DSL, JSON source and the resolved grammar model
//! - [`compile`] - Table compiler and its options
//! - [`tables`] - Compiled parse tables and their serialized form
//! - [`lexer`] - Context-aware lexer and external scanners
//! - [`parser`] - Table-driven parser with error recovery
//! - [`syntax`] - Syntax trees and node handles
//! - [`incremental`] - Edits and incremental re-parsing
//! - [`error`] - Error types

pub mod compile;
pub mod error;
pub mod grammar;
pub mod incremental;
pub mod lexer;
pub mod parser;
pub mod syntax;
pub mod tables;

use std::sync::Arc;

pub(crate) type HashMap<K, V> = hashbrown::HashMap<K, V, ahash::RandomState>;

// Re-export commonly used types
pub use compile::{CompileOptions, TableKind};
pub use error::{CompileError, EditError, GrammarError, GrammarWarning, TableError};
pub use grammar::{Grammar, GrammarBuilder, GrammarModel};
pub use incremental::{reparse, Edit, ReparseStats};
pub use lexer::{next_token, ExternalScanner, LexResult, Token};
pub use parser::{ParseOptions, Parser};
pub use syntax::{ParseStats, SyntaxNode, SyntaxTree, TextRange, TextSize};
pub use tables::ParserTables;

/// Loads a grammar from its JSON source and resolves it.
///
/// # Errors
///
/// Returns a [`GrammarError`] for malformed JSON, an unsupported format
/// version, or an unresolvable grammar.
pub fn load(source: &str) -> Result<GrammarModel, GrammarError> {
    Grammar::from_json(source)?.load()
}

/// Compiles a resolved grammar with default [`CompileOptions`].
///
/// # Errors
///
/// See [`compile::compile_model`].
pub fn compile(model: &GrammarModel) -> Result<ParserTables, CompileError> {
    compile::compile_model(model, &CompileOptions::default())
}

/// Parses `text` with default [`ParseOptions`].
///
/// Parsing is total: the tree always covers the whole input, with errors
/// recorded as nodes.
#[must_use]
pub fn parse(tables: &Arc<ParserTables>, text: impl AsRef<[u8]>) -> SyntaxTree {
    Parser::new(Arc::clone(tables)).parse(text)
}
