//! # Syntax Trees
//!
//! Parse results come in two layers.
//!
//! - [`GreenNode`]: immutable, position-free and reference counted. The
//!   parser builds these, and the incremental re-parser shares them between
//!   the old and the new tree.
//! - [`SyntaxTree`] / [`SyntaxNode`]: an arena over one green tree with
//!   absolute ranges, parent links and field labels. Hidden rules are
//!   flattened away here.
//!
//! ## Usage
//!
//! ```rust
//! use sprig::grammar::{dsl::*, GrammarBuilder};
//! use std::sync::Arc;
//!
//! let tables = GrammarBuilder::new("greeting")
//!     .rule("greeting", seq([string("hello"), sym("name")]))
//!     .rule("name", pattern("[a-z]+"))
//!     .build()
//!     .compile()
//!     .unwrap();
//! let source = b"hello world";
//! let tree = sprig::parse(&Arc::new(tables), source);
//!
//! let name = tree.root_node().named_children().next().unwrap();
//! assert_eq!(name.utf8_text(source), Some("world"));
//! assert_eq!(tree.to_sexp(), "(greeting (name))");
//! ```

mod green;
mod node;
mod pretty;
mod text;
mod tree;

pub use green::{GreenNode, NodeFlags};
pub use node::SyntaxNode;
pub use text::{TextRange, TextSize};
pub use tree::{NodeId, ParseStats, SyntaxTree};

pub(crate) use green::LeafContext;
