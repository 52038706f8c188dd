//! # Error Types
//!
//! Errors for each stage of the pipeline.
//!
//! ## Overview
//!
//! Loading a grammar, compiling it to tables, decoding a table artifact and
//! applying an edit are the only fallible operations. Parsing itself never
//! fails: malformed input becomes ERROR and MISSING nodes in the tree.
//!
//! - [`GrammarError`]: the grammar source is malformed or inconsistent
//! - [`GrammarWarning`]: non-fatal findings collected while loading
//! - [`CompileError`]: the grammar cannot be turned into deterministic tables
//! - [`TableError`]: a serialized table artifact cannot be decoded
//! - [`EditError`]: an edit description does not fit the tree it is applied to
//!
//! ## Diagnostics Support
//!
//! With the `diagnostics` feature every error type derives
//! `miette::Diagnostic` with a stable error code.

pub mod suggest;

use compact_str::CompactString;
use std::fmt;
use thiserror::Error;

#[cfg(feature = "diagnostics")]
use miette::Diagnostic;

/// Errors raised while loading or validating a grammar
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum GrammarError {
    #[error("grammar source is malformed: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::syntax)))]
    Syntax { message: String },

    #[error("grammar could not be written as JSON: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::encode)))]
    Encode { message: String },

    #[error("unsupported grammar format version {found} (this build reads version {supported})")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::format_version)))]
    UnsupportedFormatVersion { found: u32, supported: u32 },

    #[error("grammar `{name}` defines no rules")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty)))]
    EmptyGrammar { name: CompactString },

    #[error("rule `{name}` is defined more than once")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::duplicate_rule)))]
    DuplicateRule { name: CompactString },

    #[error("rule `{rule}` references undefined symbol `{symbol}`{}", suggestion_note(.suggestion))]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::undefined_symbol)))]
    UndefinedSymbol {
        rule: CompactString,
        symbol: CompactString,
        suggestion: Option<CompactString>,
    },

    #[error("rule `{rule}` contains a choice without alternatives")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::empty_choice)))]
    EmptyChoice { rule: CompactString },

    #[error("token in rule `{rule}` references symbol `{symbol}`; tokens may only contain strings and patterns")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::symbol_in_token)))]
    SymbolInToken {
        rule: CompactString,
        symbol: CompactString,
    },

    #[error("invalid extra: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::invalid_extra)))]
    InvalidExtra { reason: String },

    #[error("invalid external token `{name}`: {reason}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(grammar::invalid_external)))]
    InvalidExternal { name: CompactString, reason: String },
}

fn suggestion_note(suggestion: &Option<CompactString>) -> String {
    suggestion
        .as_ref()
        .map(|name| format!(" (did you mean `{name}`?)"))
        .unwrap_or_default()
}

/// Non-fatal findings reported alongside a loaded grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarWarning {
    /// The rule cannot be reached from the start rule
    UnreachableRule { rule: CompactString },
    /// Every alternative of the rule recurses without end, so it derives no finite text
    UnproductiveRule { rule: CompactString },
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreachableRule { rule } => {
                write!(f, "rule `{rule}` is unreachable from the start rule")
            }
            Self::UnproductiveRule { rule } => {
                write!(f, "rule `{rule}` cannot derive any finite text")
            }
        }
    }
}

/// Errors raised while compiling a grammar into parse tables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum CompileError {
    #[error(transparent)]
    #[cfg_attr(feature = "diagnostics", diagnostic(transparent))]
    Grammar(#[from] GrammarError),

    #[error("token `{token}` matches the empty string")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::empty_token)))]
    EmptyToken { token: CompactString },

    #[error("token `{token}` has an invalid pattern: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::invalid_pattern)))]
    InvalidPattern {
        token: CompactString,
        message: String,
    },

    #[error("token `{token}` uses unsupported pattern syntax: {construct}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::unsupported_pattern)))]
    UnsupportedPattern {
        token: CompactString,
        construct: &'static str,
    },

    #[error("unresolvable reduce/reduce conflict between `{first}` and `{second}` on lookahead `{lookahead}`")]
    #[cfg_attr(
        feature = "diagnostics",
        diagnostic(
            code(compile::reduce_conflict),
            help("add a precedence annotation to one of the rules or restructure the grammar")
        )
    )]
    ReduceConflict {
        first: CompactString,
        second: CompactString,
        lookahead: CompactString,
    },

    #[error("rule `{rule}` expands into more than {limit} productions")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::too_many_productions)))]
    TooManyProductions { rule: CompactString, limit: usize },

    #[error("parse automaton exceeds the limit of {limit} states")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::too_many_states)))]
    TooManyStates { limit: usize },

    #[error("grammar needs {count} symbols, more than the table format can address")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(compile::too_many_symbols)))]
    TooManySymbols { count: usize },
}

/// Errors raised while decoding a serialized table artifact
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum TableError {
    #[error("data is not a parse table artifact")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(tables::not_an_artifact)))]
    NotAnArtifact,

    #[error("table artifact has format version {found}, this build reads version {supported}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(tables::incompatible_version)))]
    IncompatibleVersion { found: u32, supported: u32 },

    #[error("table artifact is malformed: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(tables::malformed)))]
    Malformed { message: String },

    #[error("tables could not be written: {message}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(tables::encode)))]
    Encode { message: String },
}

/// Errors raised when an edit does not describe a valid change to a tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "diagnostics", derive(Diagnostic))]
pub enum EditError {
    #[error("edit range is inverted: start {start} is after end {end}")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(edit::inverted_range)))]
    InvertedRange { start: usize, end: usize },

    #[error("edit ends at byte {old_end} but the old text is only {len} bytes long")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(edit::out_of_bounds)))]
    OutOfBounds { old_end: usize, len: usize },

    #[error("edit implies a new text of {expected} bytes but {actual} bytes were given")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(edit::length_mismatch)))]
    LengthMismatch { expected: usize, actual: usize },

    #[error("the previous tree was produced from different parse tables")]
    #[cfg_attr(feature = "diagnostics", diagnostic(code(edit::foreign_tree)))]
    ForeignTree,
}
