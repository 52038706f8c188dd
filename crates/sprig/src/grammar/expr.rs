//! Grammar expressions and the combinator DSL used to write them.
//!
//! Symbols are referenced by name; names are resolved when the grammar is
//! loaded into a [`GrammarModel`](super::GrammarModel).
//!
//! ```rust
//! use sprig::grammar::dsl::*;
//!
//! let sum = prec_left(1, seq([field("left", sym("expr")), string("+"), field("right", sym("expr"))]));
//! let expr = choice([sum, sym("number")]);
//! # let _ = expr;
//! ```

use super::Precedence;
use compact_str::CompactString;

/// Grammar expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Matches nothing
    Blank,
    /// Literal text; becomes an anonymous token
    String(CompactString),
    /// Regular expression; becomes an anonymous token
    Pattern(CompactString),
    /// Reference to a rule, token rule or external token by name
    Symbol(CompactString),
    Seq(Vec<Expr>),
    Choice(Vec<Expr>),
    /// Zero or more repetitions
    Repeat(Box<Expr>),
    /// One or more repetitions
    Repeat1(Box<Expr>),
    /// Collapses the content into a single token
    Token(Box<Expr>),
    Prec {
        precedence: Precedence,
        content: Box<Expr>,
    },
    /// Labels the content with a field name on the enclosing node
    Field {
        name: CompactString,
        content: Box<Expr>,
    },
}

impl Expr {
    /// True when the expression can only describe a lexical token.
    #[must_use]
    pub fn is_lexical(&self) -> bool {
        matches!(self, Self::String(_) | Self::Pattern(_) | Self::Token(_))
    }
}

/// Combinator functions mirroring the usual grammar DSL.
pub mod dsl {
    use super::Expr;
    use crate::grammar::Precedence;
    use compact_str::CompactString;

    #[must_use]
    pub fn blank() -> Expr {
        Expr::Blank
    }

    #[must_use]
    pub fn string(text: impl Into<CompactString>) -> Expr {
        Expr::String(text.into())
    }

    #[must_use]
    pub fn pattern(regex: impl Into<CompactString>) -> Expr {
        Expr::Pattern(regex.into())
    }

    #[must_use]
    pub fn sym(name: impl Into<CompactString>) -> Expr {
        Expr::Symbol(name.into())
    }

    #[must_use]
    pub fn seq(items: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Seq(items.into_iter().collect())
    }

    #[must_use]
    pub fn choice(items: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Choice(items.into_iter().collect())
    }

    #[must_use]
    pub fn optional(content: Expr) -> Expr {
        Expr::Choice(vec![content, Expr::Blank])
    }

    #[must_use]
    pub fn repeat(content: Expr) -> Expr {
        Expr::Repeat(Box::new(content))
    }

    #[must_use]
    pub fn repeat1(content: Expr) -> Expr {
        Expr::Repeat1(Box::new(content))
    }

    #[must_use]
    pub fn token(content: Expr) -> Expr {
        Expr::Token(Box::new(content))
    }

    #[must_use]
    pub fn field(name: impl Into<CompactString>, content: Expr) -> Expr {
        Expr::Field {
            name: name.into(),
            content: Box::new(content),
        }
    }

    #[must_use]
    pub fn prec(level: i32, content: Expr) -> Expr {
        with_precedence(Precedence::new(level), content)
    }

    #[must_use]
    pub fn prec_left(level: i32, content: Expr) -> Expr {
        with_precedence(Precedence::left(level), content)
    }

    #[must_use]
    pub fn prec_right(level: i32, content: Expr) -> Expr {
        with_precedence(Precedence::right(level), content)
    }

    #[must_use]
    pub fn prec_nonassoc(level: i32, content: Expr) -> Expr {
        with_precedence(Precedence::non_assoc(level), content)
    }

    #[must_use]
    pub fn with_precedence(precedence: Precedence, content: Expr) -> Expr {
        Expr::Prec {
            precedence,
            content: Box::new(content),
        }
    }

    /// `item (separator item)*`
    #[must_use]
    pub fn sep1(item: Expr, separator: Expr) -> Expr {
        seq([item.clone(), repeat(seq([separator, item]))])
    }

    /// Optional `item (separator item)*`
    #[must_use]
    pub fn sep(item: Expr, separator: Expr) -> Expr {
        optional(sep1(item, separator))
    }
}

#[cfg(test)]
mod tests {
    use super::dsl::*;
    use super::*;

    #[test]
    fn test_optional_is_choice_with_blank() {
        assert_eq!(
            optional(sym("a")),
            Expr::Choice(vec![Expr::Symbol("a".into()), Expr::Blank])
        );
    }

    #[test]
    fn test_sep1_shape() {
        let list = sep1(sym("item"), string(","));
        let Expr::Seq(items) = list else {
            panic!("expected a sequence");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(items[1], Expr::Repeat(_)));
    }

    #[test]
    fn test_is_lexical() {
        assert!(string("+").is_lexical());
        assert!(pattern("[0-9]+").is_lexical());
        assert!(token(seq([string("a"), string("b")])).is_lexical());
        assert!(!seq([string("a")]).is_lexical());
        assert!(!sym("a").is_lexical());
    }
}
