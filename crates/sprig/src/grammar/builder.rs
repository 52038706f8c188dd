use super::dsl;
use super::{Expr, GrammarModel};
use crate::error::GrammarError;
use compact_str::CompactString;

/// Declarative grammar definition
///
/// Rules reference each other by name. The first rule is the start rule.
/// Nothing is validated until the grammar is loaded with
/// [`GrammarModel::new`] or [`Grammar::load`].
///
/// # Example
///
/// ```rust
/// use sprig::grammar::{dsl::*, GrammarBuilder};
///
/// let grammar = GrammarBuilder::new("list")
///     .rule("list", repeat(sym("item")))
///     .rule("item", pattern("[a-z]+"))
///     .build();
/// let model = grammar.load().expect("valid grammar");
/// assert_eq!(model.start_rule().name, "list");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub name: CompactString,
    pub rules: Vec<(CompactString, Expr)>,
    /// Tokens allowed anywhere between other tokens
    pub extras: Vec<Expr>,
    /// Tokens produced by an external scanner
    pub externals: Vec<Expr>,
}

impl Grammar {
    /// Resolves names and validates the grammar.
    pub fn load(&self) -> Result<GrammarModel, GrammarError> {
        GrammarModel::new(self)
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&Expr> {
        self.rules
            .iter()
            .find(|(rule, _)| rule == name)
            .map(|(_, expr)| expr)
    }
}

/// Builder for [`Grammar`]
#[derive(Debug, Clone)]
pub struct GrammarBuilder {
    name: CompactString,
    rules: Vec<(CompactString, Expr)>,
    extras: Option<Vec<Expr>>,
    externals: Vec<Expr>,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            extras: None,
            externals: Vec::new(),
        }
    }

    /// Adds a rule. The first rule added is the start rule.
    #[must_use]
    pub fn rule(mut self, name: impl Into<CompactString>, expr: Expr) -> Self {
        self.rules.push((name.into(), expr));
        self
    }

    /// Replaces the default extras (a single whitespace pattern).
    #[must_use]
    pub fn extras(mut self, extras: impl IntoIterator<Item = Expr>) -> Self {
        self.extras = Some(extras.into_iter().collect());
        self
    }

    /// Declares external tokens by name.
    #[must_use]
    pub fn externals<S: Into<CompactString>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.externals
            .extend(names.into_iter().map(|name| Expr::Symbol(name.into())));
        self
    }

    #[must_use]
    pub fn build(self) -> Grammar {
        Grammar {
            name: self.name,
            rules: self.rules,
            extras: self
                .extras
                .unwrap_or_else(|| vec![dsl::pattern(DEFAULT_EXTRA_PATTERN)]),
            externals: self.externals,
        }
    }
}

/// Whitespace, skipped between tokens unless a grammar overrides its extras
pub const DEFAULT_EXTRA_PATTERN: &str = r"\s";
