//! # Lexer Module
//!
//! Context-aware tokenization driven by the compiled tables.
//!
//! ## Overview
//!
//! The lexer is asked for one token at a time, together with the parse
//! state the parser is in. It then tries, in order:
//!
//! 1. the [`ExternalScanner`], if the state accepts any external token;
//! 2. the longest match among tokens valid in that state (extras are
//!    always valid), ties broken by lexical precedence and declaration order;
//! 3. the longest match among all tokens, so the parser can report it;
//! 4. a single-character `ERROR` token.
//!
//! Lexing never fails. Every token records how far the lexer looked ahead,
//! which the incremental re-parser uses to decide what can be reused.
//!
//! ## Usage
//!
//! ```rust
//! use sprig::grammar::{dsl::*, GrammarBuilder};
//! use sprig::lexer::{LexResult, Lexer};
//! use sprig::tables::StateId;
//!
//! let tables = GrammarBuilder::new("words")
//!     .rule("words", repeat(sym("word")))
//!     .rule("word", pattern("[a-z]+"))
//!     .build()
//!     .compile()
//!     .unwrap();
//!
//! let lexer = Lexer::new(&tables, b"hello world");
//! let LexResult::Token(token, next) = lexer.next_token(0, StateId::START) else {
//!     panic!("expected a token");
//! };
//! assert_eq!(tables.symbol_name(token.symbol), "word");
//! assert_eq!(next, 5);
//! ```

mod dfa;
mod external;
mod token;

pub(crate) use dfa::{ByteTransition, DfaState};
pub use dfa::{DfaMatch, TokenDfa};
pub use external::{ExternalScanner, ScanCursor, ValidExternals};
pub use token::{LexResult, Token};

use crate::syntax::TextRange;
use crate::tables::{Action, ParserTables, StateId, SymbolId};
use std::sync::atomic::{AtomicBool, Ordering};

/// Byte width of the UTF-8 scalar at `position`, or 1 for an invalid byte.
pub(crate) fn scalar_len(text: &[u8], position: usize) -> Option<usize> {
    let first = *text.get(position)?;
    let width = match first {
        0x00..=0x7F => 1,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF7 => 4,
        _ => return Some(1),
    };
    let end = (position + width).min(text.len());
    Some(match std::str::from_utf8(&text[position..end]) {
        Ok(scalar) if scalar.len() == width => width,
        _ => 1,
    })
}

/// Tokenizer over one input, bound to a set of tables
#[derive(Clone, Copy)]
pub struct Lexer<'a> {
    tables: &'a ParserTables,
    text: &'a [u8],
    scanner: Option<&'a dyn ExternalScanner>,
    cancellation: Option<&'a AtomicBool>,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("grammar", &self.tables.name())
            .field("len", &self.text.len())
            .field("scanner", &self.scanner.is_some())
            .finish()
    }
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub const fn new(tables: &'a ParserTables, text: &'a [u8]) -> Self {
        Self {
            tables,
            text,
            scanner: None,
            cancellation: None,
        }
    }

    #[must_use]
    pub const fn with_scanner(mut self, scanner: &'a dyn ExternalScanner) -> Self {
        self.scanner = Some(scanner);
        self
    }

    /// Once `flag` is set, the lexer reports the end of input.
    #[must_use]
    pub const fn with_cancellation(mut self, flag: &'a AtomicBool) -> Self {
        self.cancellation = Some(flag);
        self
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    #[must_use]
    pub const fn text(&self) -> &'a [u8] {
        self.text
    }

    fn is_valid(&self, state: StateId, symbol: SymbolId) -> bool {
        self.tables.is_extra(symbol) || self.tables.action(state, symbol) != Action::Error
    }

    /// Lexes the token starting at `position`, using the tokens `state` accepts.
    #[must_use]
    pub fn next_token(&self, position: usize, state: StateId) -> LexResult {
        if self.is_cancelled() || position >= self.text.len() {
            return LexResult::EndOfInput;
        }

        let mut examined_end = position;
        let mut looked_behind = false;
        let token = |symbol: SymbolId, end: usize, examined_end: usize, looked_behind: bool| {
            let token = Token {
                symbol,
                range: TextRange::from_offsets(position, end),
                lex_state: state,
                examined_end,
                looked_behind,
            };
            LexResult::Token(token, end)
        };

        if let Some(scan) = self.scan_external(position, state) {
            examined_end = scan.examined_end;
            looked_behind = scan.looked_behind;
            if let Some((symbol, end)) = scan.found {
                return token(symbol, end, examined_end, looked_behind);
            }
        }

        let dfa = self.tables.lexer();
        let valid = dfa.longest_match(self.text, position, |symbol| self.is_valid(state, symbol));
        examined_end = examined_end.max(valid.examined_end);
        if let Some((symbol, end)) = valid.token {
            return token(symbol, end, examined_end, looked_behind);
        }

        let any = dfa.longest_match(self.text, position, |_| true);
        examined_end = examined_end.max(any.examined_end);
        if let Some((symbol, end)) = any.token {
            return token(symbol, end, examined_end, looked_behind);
        }

        let width = scalar_len(self.text, position).unwrap_or(1);
        token(
            SymbolId::ERROR,
            position + width,
            examined_end.max(position + width),
            looked_behind,
        )
    }

    fn valid_externals(&self, state: StateId) -> ValidExternals {
        ValidExternals::from_flags((0..self.tables.external_count()).map(|index| {
            self.tables
                .external_symbol(index)
                .is_some_and(|symbol| self.tables.action(state, symbol) != Action::Error)
        }))
    }

    /// Runs the scanner if the state accepts an external token.
    fn scan_external(&self, position: usize, state: StateId) -> Option<ExternalScan> {
        let scanner = self.scanner?;
        let valid = self.valid_externals(state);
        if !valid.any() {
            return None;
        }
        let mut cursor = ScanCursor::new(self.text, position);
        let found = scanner.scan(&mut cursor, &valid).and_then(|index| {
            let end = cursor.token_end().min(self.text.len());
            if !valid.contains(index) || end <= position {
                tracing::trace!(index, position, "ignoring external scanner result");
                return None;
            }
            Some((self.tables.external_symbol(index)?, end))
        });
        Some(ExternalScan {
            found,
            examined_end: cursor.examined_end(),
            looked_behind: cursor.looked_behind(),
        })
    }
}

/// What a scanner run produced, and what it read to decide
struct ExternalScan {
    found: Option<(SymbolId, usize)>,
    examined_end: usize,
    looked_behind: bool,
}

/// Lexes one token of `text` at `position` in the start state.
#[must_use]
pub fn next_token(text: &[u8], position: usize, tables: &ParserTables) -> LexResult {
    Lexer::new(tables, text).next_token(position, StateId::START)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{dsl::*, GrammarBuilder};

    fn sum_tables() -> ParserTables {
        GrammarBuilder::new("sum")
            .rule("sum", sep1(sym("number"), string("+")))
            .rule("number", pattern("[0-9]+"))
            .build()
            .compile()
            .unwrap()
    }

    fn lex_all(tables: &ParserTables, text: &str) -> Vec<(String, usize, usize)> {
        let mut position = 0;
        let mut tokens = Vec::new();
        while let LexResult::Token(token, next) = next_token(text.as_bytes(), position, tables) {
            tokens.push((
                tables.symbol_name(token.symbol).to_string(),
                token.start(),
                token.end(),
            ));
            position = next;
        }
        tokens
    }

    #[test]
    fn test_scalar_len() {
        assert_eq!(scalar_len(b"a", 0), Some(1));
        assert_eq!(scalar_len("é".as_bytes(), 0), Some(2));
        assert_eq!(scalar_len("€".as_bytes(), 0), Some(3));
        assert_eq!(scalar_len(&[0xE2, 0x82], 0), Some(1));
        assert_eq!(scalar_len(&[0xFF], 0), Some(1));
        assert_eq!(scalar_len(b"", 0), None);
    }

    #[test]
    fn test_tokens_and_extras() {
        let tables = sum_tables();
        let tokens = lex_all(&tables, "12 + 3");
        let names: Vec<_> = tokens.iter().map(|(name, _, _)| name.as_str()).collect();
        assert_eq!(names[0], "number");
        assert_eq!(tokens[0].1..tokens[0].2, 0..2);
        assert_eq!(names.len(), 5);
        assert_eq!(names[2], "+");
    }

    #[test]
    fn test_unknown_character_becomes_error_token() {
        let tables = sum_tables();
        let lexer = Lexer::new(&tables, "€1".as_bytes());
        let LexResult::Token(token, next) = lexer.next_token(0, StateId::START) else {
            panic!("expected a token");
        };
        assert!(token.is_error());
        assert_eq!(next, 3);
    }

    #[test]
    fn test_examined_end_covers_lookahead() {
        let tables = sum_tables();
        let lexer = Lexer::new(&tables, b"12+");
        let LexResult::Token(token, _) = lexer.next_token(0, StateId::START) else {
            panic!("expected a token");
        };
        assert_eq!(token.end(), 2);
        assert_eq!(token.examined_end, 3);

        let LexResult::Token(token, _) = lexer.next_token(2, StateId::START) else {
            panic!("expected a token");
        };
        assert_eq!(token.examined_end, 4);
    }

    #[test]
    fn test_end_of_input_and_cancellation() {
        let tables = sum_tables();
        assert_eq!(next_token(b"1", 1, &tables), LexResult::EndOfInput);

        let flag = AtomicBool::new(true);
        let lexer = Lexer::new(&tables, b"1").with_cancellation(&flag);
        assert!(lexer.is_cancelled());
        assert_eq!(lexer.next_token(0, StateId::START), LexResult::EndOfInput);
    }

    #[test]
    fn test_external_scanner_takes_priority() {
        let tables = GrammarBuilder::new("doc")
            .rule("doc", repeat(choice([sym("word"), sym("raw")])))
            .rule("word", pattern("[a-z%]+"))
            .externals(["raw"])
            .build()
            .compile()
            .unwrap();
        let scanner = |cursor: &mut ScanCursor<'_>, valid: &ValidExternals| {
            if !valid.contains(0) || cursor.lookahead() != Some('%') {
                return None;
            }
            while cursor.lookahead().is_some_and(|c| c != ' ') {
                cursor.advance();
            }
            Some(0_usize)
        };
        let lexer = Lexer::new(&tables, b"%abc def").with_scanner(&scanner);
        let LexResult::Token(token, next) = lexer.next_token(0, StateId::START) else {
            panic!("expected a token");
        };
        assert_eq!(tables.symbol_name(token.symbol), "raw");
        assert_eq!(next, 4);

        let LexResult::Token(token, _) = lexer.next_token(5, StateId::START) else {
            panic!("expected a token");
        };
        assert_eq!(tables.symbol_name(token.symbol), "word");
    }
}
