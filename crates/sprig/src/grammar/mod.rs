//! # Grammar Module
//!
//! Declarative grammar definitions and their resolved model.
//!
//! ## Overview
//!
//! A grammar is written either with the combinator DSL in [`dsl`] or as
//! JSON source (see [`Grammar::from_json`]). Either way it is a list of
//! named rules whose bodies are [`Expr`] trees; the first rule is the start
//! rule. Loading the grammar produces a [`GrammarModel`]:
//!
//! - rule references are resolved to [`Symbol`]s
//! - rules whose body is a single token become named tokens
//! - inline strings and patterns become anonymous tokens, deduplicated by content
//! - precedence annotations attach to the enclosing alternative
//! - unreachable and unproductive rules are reported as warnings
//!
//! ## Usage
//!
//! ```rust
//! use sprig::grammar::{dsl::*, GrammarBuilder};
//!
//! let grammar = GrammarBuilder::new("sum")
//!     .rule(
//!         "expr",
//!         choice([
//!             prec_left(1, seq([sym("expr"), string("+"), sym("expr")])),
//!             sym("number"),
//!         ]),
//!     )
//!     .rule("number", pattern("[0-9]+"))
//!     .build();
//!
//! let model = grammar.load().expect("grammar is valid");
//! assert_eq!(model.rules().len(), 1);
//! assert_eq!(model.tokens().len(), 3);
//! ```

mod builder;
mod expr;
mod model;
mod precedence;
mod source;
pub mod validate;

pub use builder::{Grammar, GrammarBuilder, DEFAULT_EXTRA_PATTERN};
pub use expr::{dsl, Expr};
pub use model::{
    Alternative, ExternalDef, ExternalId, GrammarModel, Item, Rule, RuleId, Symbol, TokenDef,
    TokenId, TokenPattern,
};
pub use precedence::{Associativity, Precedence};
pub use source::GRAMMAR_FORMAT_VERSION;
