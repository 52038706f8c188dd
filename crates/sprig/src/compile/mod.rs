//! # Table Compiler
//!
//! Turns a [`GrammarModel`] into [`ParserTables`].
//!
//! ## Overview
//!
//! Compilation runs in stages:
//!
//! 1. **Flattening**: choices and optionals are multiplied out into plain
//!    productions, repetitions become hidden left-recursive rules.
//! 2. **Analysis**: nullable flags and FIRST sets.
//! 3. **Automaton**: LR(1) item sets, merged by core in LALR mode.
//! 4. **Tables**: actions and gotos, with conflicts settled by precedence,
//!    associativity and declaration order.
//! 5. **Lexer**: every token pattern is compiled into a single byte DFA.
//!
//! ## Usage
//!
//! ```rust
//! use sprig::compile::{compile_model, CompileOptions, TableKind};
//! use sprig::grammar::{dsl::*, GrammarBuilder};
//!
//! let grammar = GrammarBuilder::new("list")
//!     .rule("list", repeat1(sym("word")))
//!     .rule("word", pattern("[a-z]+"))
//!     .build();
//! let model = grammar.load().unwrap();
//!
//! let options = CompileOptions::default().with_table_kind(TableKind::Canonical);
//! let tables = compile_model(&model, &options).unwrap();
//! assert!(tables.state_count() > 0);
//! ```

mod analysis;
mod automaton;
mod conflict;
mod flatten;
mod lexical;
mod table;

use crate::error::CompileError;
use crate::grammar::{Grammar, GrammarModel};
use crate::tables::{ParserTables, SymbolId};
use tracing::instrument;

/// Default bound on the number of parser states
pub const DEFAULT_MAX_STATES: usize = 1 << 16;

/// How parser states are built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableKind {
    /// Merge LR(1) states with equal cores (smaller tables, same power for most grammars)
    #[default]
    Lalr,
    /// Keep every distinct LR(1) state
    Canonical,
}

/// Configuration for [`compile_model`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub table_kind: TableKind,

    /// Compilation fails with [`CompileError::TooManyStates`] beyond this
    pub max_states: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            table_kind: TableKind::Lalr,
            max_states: DEFAULT_MAX_STATES,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub const fn with_table_kind(mut self, table_kind: TableKind) -> Self {
        self.table_kind = table_kind;
        self
    }

    #[must_use]
    pub const fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states;
        self
    }
}

/// Compiles a resolved grammar into parse tables.
///
/// # Errors
///
/// Fails when a token pattern is invalid or matches the empty string, when
/// two reductions of different rules collide with equal priority, or when a
/// size limit is exceeded.
#[instrument(skip_all, fields(grammar = model.name(), kind = ?options.table_kind))]
pub fn compile_model(
    model: &GrammarModel,
    options: &CompileOptions,
) -> Result<ParserTables, CompileError> {
    let lexer = lexical::build_token_dfa(model.tokens())?;

    let grammar = flatten::flatten(model)?;
    let terminal_count =
        SymbolId::FIRST_TOKEN as usize + model.tokens().len() + model.externals().len();
    let symbol_count = terminal_count + grammar.nonterminals.len();
    if symbol_count > u16::MAX as usize {
        return Err(CompileError::TooManySymbols {
            count: symbol_count,
        });
    }

    let first = analysis::FirstSets::compute(&grammar, terminal_count);
    let automaton = automaton::build(&grammar, &first, options.table_kind, options.max_states)?;

    table::TableAssembler {
        model,
        grammar: &grammar,
        automaton: &automaton,
    }
    .assemble(lexer)
}

impl Grammar {
    /// Resolves and compiles the grammar with default options.
    ///
    /// # Errors
    ///
    /// Returns the first grammar or compilation error.
    pub fn compile(&self) -> Result<ParserTables, CompileError> {
        self.compile_with(&CompileOptions::default())
    }

    /// Resolves and compiles the grammar.
    ///
    /// # Errors
    ///
    /// Returns the first grammar or compilation error.
    pub fn compile_with(&self, options: &CompileOptions) -> Result<ParserTables, CompileError> {
        let model = self.load()?;
        compile_model(&model, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{dsl::*, GrammarBuilder};
    use crate::tables::{Action, ConflictKind, ConflictResolution, ResolutionReason, StateId};

    fn compile(builder: GrammarBuilder) -> Result<ParserTables, CompileError> {
        let model = builder.build().load()?;
        compile_model(&model, &CompileOptions::default())
    }

    fn arithmetic() -> GrammarBuilder {
        GrammarBuilder::new("arith").rule(
            "expr",
            choice([
                prec_left(1, seq([sym("expr"), string("+"), sym("expr")])),
                prec_left(2, seq([sym("expr"), string("*"), sym("expr")])),
                sym("number"),
            ]),
        )
        .rule("number", pattern("[0-9]+"))
    }

    #[test]
    fn test_symbol_layout() {
        let tables = compile(arithmetic()).unwrap();
        assert_eq!(tables.symbol_name(SymbolId::END), "end");
        assert_eq!(tables.symbol_name(SymbolId::ERROR), "ERROR");
        assert_eq!(tables.symbol_name(tables.start_symbol()), "expr");
        assert!(tables.symbol_for_name("number", true).is_some());
        assert!(tables.symbol_for_name("+", false).is_some());
        assert_eq!(tables.nonterminal_count(), 1);
    }

    #[test]
    fn test_precedence_conflicts_are_recorded() {
        let tables = compile(arithmetic()).unwrap();
        assert!(!tables.conflicts().is_empty());
        assert!(tables
            .conflicts()
            .iter()
            .all(|conflict| conflict.kind == ConflictKind::ShiftReduce));
        assert!(tables.conflicts().iter().any(|conflict| {
            conflict.reason == ResolutionReason::Associativity
                && matches!(conflict.resolution, ConflictResolution::Reduce(_))
        }));
    }

    #[test]
    fn test_start_state_shifts_number() {
        let tables = compile(arithmetic()).unwrap();
        let number = tables.symbol_for_name("number", true).unwrap();
        assert!(matches!(
            tables.action(StateId::START, number),
            Action::Shift(_)
        ));
        assert_eq!(tables.action(StateId::START, SymbolId::END), Action::Error);
        assert!(tables.goto(StateId::START, tables.start_symbol()).is_some());
    }

    #[test]
    fn test_dangling_else_prefers_shift() {
        let grammar = GrammarBuilder::new("stmt")
            .rule(
                "stmt",
                choice([
                    seq([string("if"), sym("stmt"), optional(seq([string("else"), sym("stmt")]))]),
                    string("x"),
                ]),
            );
        let tables = compile(grammar).unwrap();
        let conflict = tables
            .conflicts()
            .iter()
            .find(|conflict| conflict.reason == ResolutionReason::PreferShift)
            .unwrap();
        assert_eq!(conflict.resolution, ConflictResolution::Shift);
        assert_eq!(tables.symbol_name(conflict.lookahead), "else");
    }

    #[test]
    fn test_unresolvable_reduce_conflict() {
        let grammar = GrammarBuilder::new("ambiguous")
            .rule("start", choice([sym("a"), sym("b")]))
            .rule("a", sym("word"))
            .rule("b", sym("word"))
            .rule("word", pattern("[a-z]+"));
        let error = compile(grammar).unwrap_err();
        assert_eq!(
            error,
            CompileError::ReduceConflict {
                first: "a".into(),
                second: "b".into(),
                lookahead: "end of input".into(),
            }
        );
    }

    #[test]
    fn test_empty_token_rejected() {
        let grammar = GrammarBuilder::new("empty")
            .rule("start", sym("maybe"))
            .rule("maybe", pattern("a*"));
        assert_eq!(
            compile(grammar).unwrap_err(),
            CompileError::EmptyToken {
                token: "maybe".into()
            }
        );
    }

    #[test]
    fn test_nonassoc_makes_chain_an_error() {
        let grammar = GrammarBuilder::new("cmp")
            .rule(
                "expr",
                choice([
                    prec_nonassoc(1, seq([sym("expr"), string("<"), sym("expr")])),
                    string("n"),
                ]),
            );
        let tables = compile(grammar).unwrap();
        assert!(tables.conflicts().iter().any(|conflict| {
            conflict.resolution == ConflictResolution::Error
                && conflict.reason == ResolutionReason::Associativity
        }));
    }

    #[test]
    fn test_state_limit_option() {
        let model = arithmetic().build().load().unwrap();
        let options = CompileOptions::default().with_max_states(3);
        assert_eq!(
            compile_model(&model, &options).unwrap_err(),
            CompileError::TooManyStates { limit: 3 }
        );
    }
}
