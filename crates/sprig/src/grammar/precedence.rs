use serde::{Deserialize, Serialize};
use std::fmt;

/// Associativity attached to a precedence annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Associativity {
    Left,
    Right,
    /// Chaining the operator is a syntax error
    NonAssoc,
}

/// Precedence annotation on a rule alternative or a token
///
/// `assoc` is `None` for a plain `prec(n, ..)`, which orders alternatives
/// against each other but says nothing about how equal levels chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Precedence {
    pub level: i32,
    pub assoc: Option<Associativity>,
}

impl Precedence {
    #[must_use]
    pub const fn new(level: i32) -> Self {
        Self { level, assoc: None }
    }

    #[must_use]
    pub const fn left(level: i32) -> Self {
        Self {
            level,
            assoc: Some(Associativity::Left),
        }
    }

    #[must_use]
    pub const fn right(level: i32) -> Self {
        Self {
            level,
            assoc: Some(Associativity::Right),
        }
    }

    #[must_use]
    pub const fn non_assoc(level: i32) -> Self {
        Self {
            level,
            assoc: Some(Associativity::NonAssoc),
        }
    }
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.assoc {
            None => write!(f, "prec({})", self.level),
            Some(Associativity::Left) => write!(f, "prec.left({})", self.level),
            Some(Associativity::Right) => write!(f, "prec.right({})", self.level),
            Some(Associativity::NonAssoc) => write!(f, "prec.nonassoc({})", self.level),
        }
    }
}
