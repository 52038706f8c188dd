use super::expr::Expr;
use super::{validate, Grammar, Precedence};
use crate::error::{suggest, GrammarError, GrammarWarning};
use crate::HashMap;
use compact_str::{format_compact, CompactString};
use serde::{Deserialize, Serialize};

/// Index of a syntactic rule in [`GrammarModel::rules`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub(crate) u32);

/// Index of a lexical token in [`GrammarModel::tokens`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub(crate) u32);

/// Index of an external token in [`GrammarModel::externals`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub(crate) u32);

macro_rules! impl_index {
    ($($ty:ident),*) => {$(
        impl $ty {
            #[must_use]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    )*};
}

impl_index!(RuleId, TokenId, ExternalId);

/// A resolved grammar symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Terminal(TokenId),
    Nonterminal(RuleId),
    External(ExternalId),
}

/// One element of an alternative
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Symbol(Symbol),
    /// Exactly one of the alternatives
    Choice(Vec<Alternative>),
    /// One of the alternatives, or nothing
    Optional(Vec<Alternative>),
    Repeat {
        alternatives: Vec<Alternative>,
        at_least_one: bool,
    },
    /// Labels every symbol the inner item produces
    Field { name: CompactString, item: Box<Item> },
}

/// One alternative of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub items: Vec<Item>,
    pub precedence: Option<Precedence>,
}

/// A syntactic rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub name: CompactString,
    /// Alternatives in declaration order
    pub alternatives: Vec<Alternative>,
    /// Hidden rules (names starting with `_`) are inlined into their parent in the tree
    pub hidden: bool,
}

/// Pattern of a lexical token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenPattern {
    Blank,
    Literal(CompactString),
    Regex(CompactString),
    Seq(Vec<TokenPattern>),
    Choice(Vec<TokenPattern>),
    Repeat {
        pattern: Box<TokenPattern>,
        at_least_one: bool,
    },
}

/// A lexical token in canonical declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDef {
    pub name: CompactString,
    pub pattern: TokenPattern,
    /// Named tokens come from token rules; literals and inline patterns are anonymous
    pub named: bool,
    pub hidden: bool,
    /// Lexical precedence from `token(prec(n, ..))`
    pub precedence: i32,
    /// Allowed anywhere between other tokens
    pub extra: bool,
}

/// A token produced by an external scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalDef {
    pub name: CompactString,
    pub named: bool,
    pub hidden: bool,
}

/// Fully resolved grammar
///
/// Produced by [`GrammarModel::new`] from a [`Grammar`]. Names are resolved,
/// token rules and inline literals are collected into one canonical token
/// list, and structural problems have been reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarModel {
    name: CompactString,
    rules: Vec<Rule>,
    tokens: Vec<TokenDef>,
    externals: Vec<ExternalDef>,
    extras: Vec<TokenId>,
    warnings: Vec<GrammarWarning>,
}

impl GrammarModel {
    /// Resolves and validates a grammar definition.
    pub fn new(grammar: &Grammar) -> Result<Self, GrammarError> {
        let mut model = Lowering::new(grammar)?.run()?;
        model.warnings = validate::check(&model);
        for warning in &model.warnings {
            tracing::warn!(grammar = %model.name, "{warning}");
        }
        Ok(model)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.index()]
    }

    /// The start rule, always the first rule of the grammar
    #[must_use]
    pub fn start_rule(&self) -> &Rule {
        &self.rules[0]
    }

    #[must_use]
    pub fn rule_id(&self, name: &str) -> Option<RuleId> {
        self.rules
            .iter()
            .position(|rule| rule.name == name)
            .map(|index| RuleId(index as u32))
    }

    #[must_use]
    pub fn tokens(&self) -> &[TokenDef] {
        &self.tokens
    }

    #[must_use]
    pub fn token(&self, id: TokenId) -> &TokenDef {
        &self.tokens[id.index()]
    }

    #[must_use]
    pub fn token_id(&self, name: &str) -> Option<TokenId> {
        self.tokens
            .iter()
            .position(|token| token.name == name)
            .map(|index| TokenId(index as u32))
    }

    #[must_use]
    pub fn externals(&self) -> &[ExternalDef] {
        &self.externals
    }

    #[must_use]
    pub fn extras(&self) -> &[TokenId] {
        &self.extras
    }

    #[must_use]
    pub fn warnings(&self) -> &[GrammarWarning] {
        &self.warnings
    }

    /// Rule reference graph used for reachability checks.
    #[must_use]
    pub fn rule_graph(&self) -> validate::RuleGraph {
        validate::RuleGraph::new(self)
    }
}

#[derive(Debug, Clone, Copy)]
enum NameKind {
    Rule(RuleId),
    /// Index of the token rule in the grammar definition
    TokenRule(usize),
    External(ExternalId),
}

/// Resolves a [`Grammar`] into a [`GrammarModel`].
struct Lowering<'g> {
    grammar: &'g Grammar,
    names: HashMap<&'g str, NameKind>,
    named_literals: HashMap<&'g str, usize>,
    external_literals: HashMap<&'g str, ExternalId>,
    token_rule_ids: HashMap<usize, TokenId>,
    anonymous: HashMap<(TokenPattern, i32), TokenId>,
    tokens: Vec<TokenDef>,
    externals: Vec<ExternalDef>,
    /// Rule currently being lowered, for error messages and token names
    current_rule: CompactString,
    inline_token_count: usize,
}

impl<'g> Lowering<'g> {
    fn new(grammar: &'g Grammar) -> Result<Self, GrammarError> {
        if grammar.rules.is_empty() {
            return Err(GrammarError::EmptyGrammar {
                name: grammar.name.clone(),
            });
        }

        let mut names = HashMap::default();
        let mut named_literals = HashMap::default();
        let mut rule_count = 0u32;
        for (index, (name, expr)) in grammar.rules.iter().enumerate() {
            // The start rule stays syntactic even when its body is a single token.
            let kind = if index > 0 && expr.is_lexical() {
                if let Expr::String(value) = expr {
                    named_literals.entry(value.as_str()).or_insert(index);
                }
                NameKind::TokenRule(index)
            } else {
                rule_count += 1;
                NameKind::Rule(RuleId(rule_count - 1))
            };
            if names.insert(name.as_str(), kind).is_some() {
                return Err(GrammarError::DuplicateRule { name: name.clone() });
            }
        }

        let mut externals = Vec::new();
        let mut external_literals = HashMap::default();
        for expr in &grammar.externals {
            let id = ExternalId(externals.len() as u32);
            match expr {
                Expr::Symbol(name) => {
                    if names.contains_key(name.as_str()) {
                        return Err(GrammarError::InvalidExternal {
                            name: name.clone(),
                            reason: "the name is also defined as a rule".into(),
                        });
                    }
                    names.insert(name.as_str(), NameKind::External(id));
                    externals.push(ExternalDef {
                        name: name.clone(),
                        named: true,
                        hidden: name.starts_with('_'),
                    });
                }
                Expr::String(value) => {
                    external_literals.insert(value.as_str(), id);
                    externals.push(ExternalDef {
                        name: value.clone(),
                        named: false,
                        hidden: false,
                    });
                }
                other => {
                    return Err(GrammarError::InvalidExternal {
                        name: format_compact!("{other:?}"),
                        reason: "externals must be symbol names or strings".into(),
                    });
                }
            }
        }

        Ok(Self {
            grammar,
            names,
            named_literals,
            external_literals,
            token_rule_ids: HashMap::default(),
            anonymous: HashMap::default(),
            tokens: Vec::new(),
            externals,
            current_rule: CompactString::default(),
            inline_token_count: 0,
        })
    }

    fn run(mut self) -> Result<GrammarModel, GrammarError> {
        let grammar = self.grammar;
        let mut rules = Vec::new();

        for (index, (name, expr)) in grammar.rules.iter().enumerate() {
            self.current_rule = name.clone();
            self.inline_token_count = 0;
            match self.names.get(name.as_str()).copied() {
                Some(NameKind::TokenRule(_)) => {
                    self.token_rule(index)?;
                }
                _ => {
                    let alternatives = self.lower_alternatives(expr)?;
                    rules.push(Rule {
                        name: name.clone(),
                        alternatives,
                        hidden: name.starts_with('_'),
                    });
                }
            }
        }

        let extras = self.lower_extras()?;

        Ok(GrammarModel {
            name: grammar.name.clone(),
            rules,
            tokens: self.tokens,
            externals: self.externals,
            extras,
            warnings: Vec::new(),
        })
    }

    fn lower_extras(&mut self) -> Result<Vec<TokenId>, GrammarError> {
        let mut extras = Vec::new();
        self.current_rule = "extra".into();
        self.inline_token_count = 0;

        let grammar = self.grammar;
        for expr in &grammar.extras {
            let id = match expr {
                Expr::Symbol(name) => match self.names.get(name.as_str()).copied() {
                    Some(NameKind::TokenRule(index)) => self.token_rule(index)?,
                    Some(_) => {
                        return Err(GrammarError::InvalidExtra {
                            reason: format!("`{name}` is not a token rule"),
                        })
                    }
                    None => {
                        return Err(GrammarError::InvalidExtra {
                            reason: format!("`{name}` is not defined"),
                        })
                    }
                },
                Expr::String(value) => match self.literal(value)? {
                    Symbol::Terminal(id) => id,
                    _ => {
                        return Err(GrammarError::InvalidExtra {
                            reason: format!("`{value}` is an external token"),
                        })
                    }
                },
                Expr::Pattern(_) | Expr::Token(_) => self.inline_token(expr)?,
                other => {
                    return Err(GrammarError::InvalidExtra {
                        reason: format!("extras must be tokens, found {other:?}"),
                    })
                }
            };
            self.tokens[id.index()].extra = true;
            if !extras.contains(&id) {
                extras.push(id);
            }
        }

        Ok(extras)
    }

    fn lower_alternatives(&mut self, expr: &Expr) -> Result<Vec<Alternative>, GrammarError> {
        match expr {
            Expr::Choice(members) => {
                if members.is_empty() {
                    return Err(self.empty_choice());
                }
                let mut alternatives = Vec::new();
                for member in members {
                    alternatives.extend(self.lower_alternatives(member)?);
                }
                Ok(alternatives)
            }
            Expr::Prec {
                precedence,
                content,
            } => {
                let mut alternatives = self.lower_alternatives(content)?;
                for alternative in &mut alternatives {
                    alternative.precedence.get_or_insert(*precedence);
                }
                Ok(alternatives)
            }
            _ => {
                let mut items = Vec::new();
                let mut precedence = None;
                self.lower_items(expr, &mut items, &mut precedence)?;
                Ok(vec![Alternative { items, precedence }])
            }
        }
    }

    fn lower_items(
        &mut self,
        expr: &Expr,
        items: &mut Vec<Item>,
        precedence: &mut Option<Precedence>,
    ) -> Result<(), GrammarError> {
        match expr {
            Expr::Blank => {}
            Expr::String(value) => items.push(Item::Symbol(self.literal(value)?)),
            Expr::Pattern(_) | Expr::Token(_) => {
                items.push(Item::Symbol(Symbol::Terminal(self.inline_token(expr)?)));
            }
            Expr::Symbol(name) => items.push(Item::Symbol(self.resolve(name)?)),
            Expr::Seq(members) => {
                for member in members {
                    self.lower_items(member, items, precedence)?;
                }
            }
            Expr::Choice(members) => {
                if members.is_empty() {
                    return Err(self.empty_choice());
                }
                let optional = members.iter().any(|member| *member == Expr::Blank);
                let mut alternatives = Vec::new();
                for member in members.iter().filter(|member| **member != Expr::Blank) {
                    alternatives.extend(self.lower_alternatives(member)?);
                }
                if alternatives.is_empty() {
                    return Ok(());
                }
                if optional {
                    items.push(Item::Optional(alternatives));
                } else if alternatives.len() == 1 && alternatives[0].precedence.is_none() {
                    let single = alternatives.remove(0);
                    items.extend(single.items);
                } else {
                    items.push(Item::Choice(alternatives));
                }
            }
            Expr::Repeat(content) | Expr::Repeat1(content) => {
                let alternatives = self.lower_alternatives(content)?;
                items.push(Item::Repeat {
                    alternatives,
                    at_least_one: matches!(expr, Expr::Repeat1(_)),
                });
            }
            Expr::Prec { .. } => {
                let mut alternatives = self.lower_alternatives(expr)?;
                if alternatives.len() == 1 {
                    let single = alternatives.remove(0);
                    if precedence.is_none() {
                        *precedence = single.precedence;
                    }
                    items.extend(single.items);
                } else {
                    items.push(Item::Choice(alternatives));
                }
            }
            Expr::Field { name, content } => {
                let start = items.len();
                self.lower_items(content, items, precedence)?;
                let labelled: Vec<Item> = items
                    .drain(start..)
                    .map(|item| Item::Field {
                        name: name.clone(),
                        item: Box::new(item),
                    })
                    .collect();
                items.extend(labelled);
            }
        }
        Ok(())
    }

    fn resolve(&mut self, name: &str) -> Result<Symbol, GrammarError> {
        match self.names.get(name).copied() {
            Some(NameKind::Rule(id)) => Ok(Symbol::Nonterminal(id)),
            Some(NameKind::TokenRule(index)) => Ok(Symbol::Terminal(self.token_rule(index)?)),
            Some(NameKind::External(id)) => Ok(Symbol::External(id)),
            None => {
                let candidates = self.names.keys().copied();
                Err(GrammarError::UndefinedSymbol {
                    rule: self.current_rule.clone(),
                    symbol: name.into(),
                    suggestion: suggest::did_you_mean(name, candidates).map(CompactString::from),
                })
            }
        }
    }

    fn literal(&mut self, value: &CompactString) -> Result<Symbol, GrammarError> {
        if let Some(id) = self.external_literals.get(value.as_str()) {
            return Ok(Symbol::External(*id));
        }
        if let Some(index) = self.named_literals.get(value.as_str()).copied() {
            return Ok(Symbol::Terminal(self.token_rule(index)?));
        }
        Ok(Symbol::Terminal(self.anonymous_token(
            TokenPattern::Literal(value.clone()),
            0,
            value.clone(),
            false,
        )))
    }

    /// Allocates the token for a pattern or `token(..)` written inside a rule.
    fn inline_token(&mut self, expr: &Expr) -> Result<TokenId, GrammarError> {
        let mut precedence = 0;
        let pattern = self.token_pattern(expr, &mut precedence)?;
        if let TokenPattern::Literal(value) = &pattern {
            if precedence == 0 {
                let value = value.clone();
                if let Symbol::Terminal(id) = self.literal(&value)? {
                    return Ok(id);
                }
            }
        }

        let key = (pattern, precedence);
        if let Some(id) = self.anonymous.get(&key) {
            return Ok(*id);
        }
        self.inline_token_count += 1;
        let name = format_compact!("{}_token{}", self.current_rule, self.inline_token_count);
        Ok(self.anonymous_token(key.0, key.1, name, true))
    }

    fn anonymous_token(
        &mut self,
        pattern: TokenPattern,
        precedence: i32,
        name: CompactString,
        hidden: bool,
    ) -> TokenId {
        let key = (pattern, precedence);
        if let Some(id) = self.anonymous.get(&key) {
            return *id;
        }
        let id = TokenId(self.tokens.len() as u32);
        self.tokens.push(TokenDef {
            name,
            pattern: key.0.clone(),
            named: false,
            hidden,
            precedence,
            extra: false,
        });
        self.anonymous.insert(key, id);
        id
    }

    fn token_rule(&mut self, index: usize) -> Result<TokenId, GrammarError> {
        if let Some(id) = self.token_rule_ids.get(&index) {
            return Ok(*id);
        }
        let grammar = self.grammar;
        let (name, expr) = &grammar.rules[index];
        let mut precedence = 0;
        let pattern = self.token_pattern(expr, &mut precedence)?;

        let id = TokenId(self.tokens.len() as u32);
        self.tokens.push(TokenDef {
            name: name.clone(),
            pattern,
            named: !name.starts_with('_'),
            hidden: name.starts_with('_'),
            precedence,
            extra: false,
        });
        self.token_rule_ids.insert(index, id);
        Ok(id)
    }

    fn token_pattern(
        &self,
        expr: &Expr,
        precedence: &mut i32,
    ) -> Result<TokenPattern, GrammarError> {
        let collect = |members: &[Expr], precedence: &mut i32| {
            members
                .iter()
                .map(|member| self.token_pattern(member, precedence))
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(match expr {
            Expr::Blank => TokenPattern::Blank,
            Expr::String(value) => TokenPattern::Literal(value.clone()),
            Expr::Pattern(regex) => TokenPattern::Regex(regex.clone()),
            Expr::Seq(members) => TokenPattern::Seq(collect(members, precedence)?),
            Expr::Choice(members) => TokenPattern::Choice(collect(members, precedence)?),
            Expr::Repeat(content) | Expr::Repeat1(content) => TokenPattern::Repeat {
                pattern: Box::new(self.token_pattern(content, precedence)?),
                at_least_one: matches!(expr, Expr::Repeat1(_)),
            },
            Expr::Token(content) | Expr::Field { content, .. } => {
                self.token_pattern(content, precedence)?
            }
            Expr::Prec {
                precedence: level,
                content,
            } => {
                *precedence = level.level;
                self.token_pattern(content, precedence)?
            }
            Expr::Symbol(symbol) => {
                return Err(GrammarError::SymbolInToken {
                    rule: self.current_rule.clone(),
                    symbol: symbol.clone(),
                })
            }
        })
    }

    fn empty_choice(&self) -> GrammarError {
        GrammarError::EmptyChoice {
            rule: self.current_rule.clone(),
        }
    }
}
