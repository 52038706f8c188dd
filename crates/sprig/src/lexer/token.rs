use crate::syntax::TextRange;
use crate::tables::{SymbolId, StateId};

/// A token produced by the lexer.
///
/// Besides its symbol and byte range, a token remembers the parse state it
/// was lexed in and how far the lexer looked to recognise it. Both decide
/// whether a subtree can be reused after an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub symbol: SymbolId,
    pub range: TextRange,
    /// Parse state whose valid-token set was used
    pub lex_state: StateId,
    /// One past the furthest byte inspected; `text.len() + 1` when the end of input was seen
    pub examined_end: usize,
    /// An external scanner read the byte before the token
    pub looked_behind: bool,
}

impl Token {
    #[must_use]
    pub fn start(&self) -> usize {
        self.range.start().to_usize()
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.range.end().to_usize()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.symbol == SymbolId::ERROR
    }
}

/// Result of [`Lexer::next_token`](super::Lexer::next_token)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexResult {
    /// A token and the position right after it
    Token(Token, usize),
    /// No input left, or lexing was cancelled
    EndOfInput,
}

impl LexResult {
    #[must_use]
    pub const fn token(&self) -> Option<&Token> {
        match self {
            Self::Token(token, _) => Some(token),
            Self::EndOfInput => None,
        }
    }
}
