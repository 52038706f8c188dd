//! Expands the structured grammar model into plain productions.
//!
//! Choices and optionals are multiplied out into separate productions, in
//! declaration order, so a lower production index means an earlier alternative.
//! Repetitions become hidden left-recursive auxiliary rules so the automaton
//! stays deterministic and the stack depth stays constant for long lists.

use crate::error::CompileError;
use crate::grammar::{Alternative, GrammarModel, Item, Precedence, RuleId, Symbol};
use crate::tables::SymbolId;
use crate::HashMap;
use compact_str::{format_compact, CompactString};
use smallvec::{smallvec, SmallVec};

/// Symbol of the flattened grammar; terminals use table numbering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum FlatSymbol {
    Terminal(u16),
    Nonterminal(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Step {
    pub(crate) symbol: FlatSymbol,
    pub(crate) field: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Production {
    pub(crate) lhs: u32,
    pub(crate) steps: SmallVec<[Step; 4]>,
    pub(crate) precedence: Option<Precedence>,
    /// User rule the production was written in
    pub(crate) origin: RuleId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Nonterminal {
    pub(crate) name: CompactString,
    pub(crate) hidden: bool,
    pub(crate) auxiliary: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SyntaxGrammar {
    pub(crate) nonterminals: Vec<Nonterminal>,
    pub(crate) productions: Vec<Production>,
    /// Production indices per nonterminal
    pub(crate) by_lhs: Vec<Vec<u32>>,
    pub(crate) fields: Vec<CompactString>,
}

impl SyntaxGrammar {
    pub(crate) fn productions_of(&self, nonterminal: u32) -> &[u32] {
        &self.by_lhs[nonterminal as usize]
    }
}

fn flat_symbol(model: &GrammarModel, symbol: Symbol) -> FlatSymbol {
    match symbol {
        Symbol::Terminal(token) => {
            FlatSymbol::Terminal(SymbolId::FIRST_TOKEN + token.index() as u16)
        }
        Symbol::External(external) => FlatSymbol::Terminal(
            SymbolId::FIRST_TOKEN + (model.tokens().len() + external.index()) as u16,
        ),
        Symbol::Nonterminal(rule) => FlatSymbol::Nonterminal(rule.0),
    }
}

#[derive(Debug, Clone, Default)]
struct Expansion {
    steps: SmallVec<[Step; 4]>,
    precedence: Option<Precedence>,
}

/// Expansions of a single alternative beyond this are rejected
const MAX_EXPANSIONS: usize = 1 << 14;

struct Flattener<'m> {
    model: &'m GrammarModel,
    grammar: SyntaxGrammar,
    field_ids: HashMap<CompactString, u16>,
    repeat_counts: Vec<u32>,
}

pub(crate) fn flatten(model: &GrammarModel) -> Result<SyntaxGrammar, CompileError> {
    let mut flattener = Flattener {
        model,
        grammar: SyntaxGrammar::default(),
        field_ids: HashMap::default(),
        repeat_counts: vec![0; model.rules().len()],
    };

    for rule in model.rules() {
        flattener.add_nonterminal(rule.name.clone(), rule.hidden, false);
    }

    for (index, rule) in model.rules().iter().enumerate() {
        let origin = RuleId(index as u32);
        for alternative in &rule.alternatives {
            for expansion in flattener.expand_alternative(origin, alternative, None)? {
                flattener.push(index as u32, origin, expansion);
            }
        }
    }

    let mut grammar = flattener.grammar;
    grammar.by_lhs = vec![Vec::new(); grammar.nonterminals.len()];
    for (index, production) in grammar.productions.iter().enumerate() {
        grammar.by_lhs[production.lhs as usize].push(index as u32);
    }
    Ok(grammar)
}

impl Flattener<'_> {
    fn add_nonterminal(&mut self, name: CompactString, hidden: bool, auxiliary: bool) -> u32 {
        self.grammar.nonterminals.push(Nonterminal {
            name,
            hidden,
            auxiliary,
        });
        (self.grammar.nonterminals.len() - 1) as u32
    }

    fn push(&mut self, lhs: u32, origin: RuleId, expansion: Expansion) {
        self.grammar.productions.push(Production {
            lhs,
            steps: expansion.steps,
            precedence: expansion.precedence,
            origin,
        });
    }

    fn field_id(&mut self, name: &CompactString) -> u16 {
        if let Some(id) = self.field_ids.get(name) {
            return *id;
        }
        let id = self.grammar.fields.len() as u16;
        self.grammar.fields.push(name.clone());
        self.field_ids.insert(name.clone(), id);
        id
    }

    fn expand_alternative(
        &mut self,
        origin: RuleId,
        alternative: &Alternative,
        field: Option<u16>,
    ) -> Result<Vec<Expansion>, CompileError> {
        let mut expansions = self.expand_sequence(origin, &alternative.items, field)?;
        for expansion in &mut expansions {
            expansion.precedence = expansion.precedence.or(alternative.precedence);
        }
        Ok(expansions)
    }

    fn expand_sequence(
        &mut self,
        origin: RuleId,
        items: &[Item],
        field: Option<u16>,
    ) -> Result<Vec<Expansion>, CompileError> {
        let mut expansions = vec![Expansion::default()];
        for item in items {
            let options = self.expand_item(origin, item, field)?;
            if expansions.len() * options.len() > MAX_EXPANSIONS {
                return Err(CompileError::TooManyProductions {
                    rule: self.model.rule(origin).name.clone(),
                    limit: MAX_EXPANSIONS,
                });
            }
            let mut next = Vec::with_capacity(expansions.len() * options.len());
            for prefix in &expansions {
                for option in &options {
                    let mut combined = prefix.clone();
                    combined.steps.extend(option.steps.iter().copied());
                    combined.precedence = combined.precedence.or(option.precedence);
                    next.push(combined);
                }
            }
            expansions = next;
        }
        Ok(expansions)
    }

    fn expand_item(
        &mut self,
        origin: RuleId,
        item: &Item,
        field: Option<u16>,
    ) -> Result<Vec<Expansion>, CompileError> {
        Ok(match item {
            Item::Symbol(symbol) => vec![Expansion {
                steps: smallvec![Step {
                    symbol: flat_symbol(self.model, *symbol),
                    field,
                }],
                precedence: None,
            }],
            Item::Field { name, item } => {
                let id = self.field_id(name);
                self.expand_item(origin, item, Some(id))?
            }
            Item::Choice(alternatives) => {
                let mut expansions = Vec::new();
                for alternative in alternatives {
                    expansions.extend(self.expand_alternative(origin, alternative, field)?);
                }
                expansions
            }
            Item::Optional(alternatives) => {
                let mut expansions = Vec::new();
                for alternative in alternatives {
                    expansions.extend(self.expand_alternative(origin, alternative, field)?);
                }
                expansions.push(Expansion::default());
                expansions
            }
            Item::Repeat {
                alternatives,
                at_least_one,
            } => {
                let aux = self.repeat_rule(origin, alternatives, field)?;
                let once = Expansion {
                    steps: smallvec![Step {
                        symbol: FlatSymbol::Nonterminal(aux),
                        field: None,
                    }],
                    precedence: None,
                };
                if *at_least_one {
                    vec![once]
                } else {
                    vec![once, Expansion::default()]
                }
            }
        })
    }

    /// `aux := aux body | body` for every expansion of the repeated content.
    fn repeat_rule(
        &mut self,
        origin: RuleId,
        alternatives: &[Alternative],
        field: Option<u16>,
    ) -> Result<u32, CompileError> {
        let count = &mut self.repeat_counts[origin.index()];
        *count += 1;
        let name = format_compact!("{}_repeat{}", self.model.rule(origin).name, *count);
        let aux = self.add_nonterminal(name, true, true);

        let mut bodies = Vec::new();
        for alternative in alternatives {
            bodies.extend(self.expand_alternative(origin, alternative, field)?);
        }

        let recursive = Step {
            symbol: FlatSymbol::Nonterminal(aux),
            field: None,
        };
        for body in &bodies {
            if body.steps.is_empty() {
                continue;
            }
            let mut steps: SmallVec<[Step; 4]> = smallvec![recursive];
            steps.extend(body.steps.iter().copied());
            self.push(
                aux,
                origin,
                Expansion {
                    steps,
                    precedence: body.precedence,
                },
            );
        }
        for body in bodies {
            self.push(aux, origin, body);
        }
        Ok(aux)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{dsl::*, GrammarBuilder};

    fn steps(grammar: &SyntaxGrammar, production: usize) -> Vec<FlatSymbol> {
        grammar.productions[production]
            .steps
            .iter()
            .map(|step| step.symbol)
            .collect()
    }

    #[test]
    fn test_optional_multiplies_productions() {
        let model = GrammarBuilder::new("g")
            .rule("a", seq([string("x"), optional(string("y")), string("z")]))
            .extras([])
            .build()
            .load()
            .unwrap();
        let grammar = flatten(&model).unwrap();
        assert_eq!(grammar.productions.len(), 2);
        use FlatSymbol::Terminal as T;
        assert_eq!(steps(&grammar, 0), [T(2), T(3), T(4)]);
        assert_eq!(steps(&grammar, 1), [T(2), T(4)]);
        assert_eq!(grammar.productions_of(0), [0, 1]);
    }

    #[test]
    fn test_repeat_becomes_left_recursive_aux_rule() {
        let model = GrammarBuilder::new("g")
            .rule("list", repeat1(string("x")))
            .extras([])
            .build()
            .load()
            .unwrap();
        let grammar = flatten(&model).unwrap();
        assert_eq!(grammar.nonterminals.len(), 2);
        let aux = &grammar.nonterminals[1];
        assert_eq!(aux.name, "list_repeat1");
        assert!(aux.hidden && aux.auxiliary);

        use FlatSymbol::{Nonterminal as N, Terminal as T};
        assert_eq!(grammar.productions_of(1).len(), 2);
        let recursive = grammar.productions_of(1)[0] as usize;
        assert_eq!(steps(&grammar, recursive), [N(1), T(2)]);
        assert_eq!(grammar.productions_of(0).len(), 1);
    }

    #[test]
    fn test_fields_label_steps() {
        let model = GrammarBuilder::new("g")
            .rule(
                "pair",
                seq([field("key", sym("word")), string("="), field("value", sym("word"))]),
            )
            .rule("word", pattern("[a-z]+"))
            .build()
            .load()
            .unwrap();
        let grammar = flatten(&model).unwrap();
        assert_eq!(grammar.fields, ["key", "value"]);
        let fields: Vec<_> = grammar.productions[0]
            .steps
            .iter()
            .map(|step| step.field)
            .collect();
        assert_eq!(fields, [Some(0), None, Some(1)]);
    }

    #[test]
    fn test_alternative_precedence_carries_over() {
        let model = GrammarBuilder::new("g")
            .rule(
                "e",
                choice([
                    prec_left(2, seq([sym("e"), string("*"), sym("e")])),
                    prec_left(1, seq([sym("e"), string("+"), sym("e")])),
                    string("n"),
                ]),
            )
            .build()
            .load()
            .unwrap();
        let grammar = flatten(&model).unwrap();
        let levels: Vec<_> = grammar
            .productions
            .iter()
            .map(|production| production.precedence.map(|p| p.level))
            .collect();
        assert_eq!(levels, [Some(2), Some(1), None]);
    }
}
