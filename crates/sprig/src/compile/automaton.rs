//! LR(1) item sets and the transitions between them.
//!
//! States are discovered breadth-first from the augmented start item. In
//! LALR mode a successor whose item cores match an existing state is merged
//! into it, and the state is revisited whenever its lookaheads grow. In
//! canonical mode only identical item sets are shared.

use super::analysis::{FirstSets, TerminalSet};
use super::flatten::{FlatSymbol, Step, SyntaxGrammar};
use super::TableKind;
use crate::error::CompileError;
use crate::tables::SymbolId;
use crate::HashMap;
use std::collections::{btree_map::Entry, BTreeMap, VecDeque};

/// Production and dot position, without lookahead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ItemCore {
    pub(crate) production: u32,
    pub(crate) dot: u32,
}

pub(crate) type ItemSet = BTreeMap<ItemCore, TerminalSet>;

#[derive(Debug, Clone)]
pub(crate) struct LrState {
    /// Closed item set
    pub(crate) items: ItemSet,
    pub(crate) transitions: BTreeMap<FlatSymbol, u32>,
}

#[derive(Debug)]
pub(crate) struct Automaton {
    pub(crate) states: Vec<LrState>,
    /// Index of the synthetic `start' := start` production
    pub(crate) augmented: u32,
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum StateKey {
    Core(Vec<ItemCore>),
    Full(Vec<(ItemCore, TerminalSet)>),
}

/// Item closure over one grammar
#[derive(Clone, Copy)]
struct Closer<'g> {
    grammar: &'g SyntaxGrammar,
    first: &'g FirstSets,
    augmented: u32,
}

struct Builder {
    kind: TableKind,
    kernels: Vec<ItemSet>,
    transitions: Vec<BTreeMap<FlatSymbol, u32>>,
    keys: HashMap<StateKey, u32>,
}

static AUGMENTED_STEPS: [Step; 1] = [Step {
    symbol: FlatSymbol::Nonterminal(0),
    field: None,
}];

fn production_steps(grammar: &SyntaxGrammar, augmented: u32, production: u32) -> &[Step] {
    if production == augmented {
        &AUGMENTED_STEPS
    } else {
        &grammar.productions[production as usize].steps
    }
}

impl Automaton {
    pub(crate) fn steps<'a>(&self, grammar: &'a SyntaxGrammar, production: u32) -> &'a [Step] {
        production_steps(grammar, self.augmented, production)
    }
}

pub(crate) fn build(
    grammar: &SyntaxGrammar,
    first: &FirstSets,
    kind: TableKind,
    max_states: usize,
) -> Result<Automaton, CompileError> {
    let augmented = grammar.productions.len() as u32;
    let closer = Closer {
        grammar,
        first,
        augmented,
    };
    let mut builder = Builder {
        kind,
        kernels: Vec::new(),
        transitions: Vec::new(),
        keys: HashMap::default(),
    };

    let mut start = ItemSet::new();
    start.insert(
        ItemCore {
            production: augmented,
            dot: 0,
        },
        TerminalSet::with(first.terminal_count(), SymbolId::END.raw()),
    );
    builder.intern(start, max_states)?;

    let mut queue = VecDeque::from([0u32]);
    let mut queued = vec![true];
    while let Some(state) = queue.pop_front() {
        queued[state as usize] = false;
        let closure = closer.closure(&builder.kernels[state as usize]);

        for (symbol, kernel) in closer.successors(&closure) {
            let (target, changed) = builder.intern(kernel, max_states)?;
            builder.transitions[state as usize].insert(symbol, target);
            if queued.len() <= target as usize {
                queued.resize(target as usize + 1, false);
            }
            if changed && !queued[target as usize] {
                queued[target as usize] = true;
                queue.push_back(target);
            }
        }
    }

    let Builder {
        kernels,
        transitions,
        ..
    } = builder;
    let states: Vec<LrState> = kernels
        .iter()
        .zip(transitions)
        .map(|(kernel, transitions)| LrState {
            items: closer.closure(kernel),
            transitions,
        })
        .collect();
    tracing::debug!(states = states.len(), ?kind, "built parse automaton");
    Ok(Automaton { states, augmented })
}

impl<'g> Closer<'g> {
    fn steps(&self, production: u32) -> &'g [Step] {
        production_steps(self.grammar, self.augmented, production)
    }

    fn closure(&self, kernel: &ItemSet) -> ItemSet {
        let mut items = kernel.clone();
        let mut pending: Vec<ItemCore> = items.keys().copied().collect();

        while let Some(core) = pending.pop() {
            let steps = self.steps(core.production);
            let dot = core.dot as usize;
            let Some(Step {
                symbol: FlatSymbol::Nonterminal(nonterminal),
                ..
            }) = steps.get(dot)
            else {
                continue;
            };

            let mut lookahead = TerminalSet::new(self.first.terminal_count());
            if self.first.sequence_first(&steps[dot + 1..], &mut lookahead) {
                if let Some(inherited) = items.get(&core) {
                    lookahead.union_with(inherited);
                }
            }

            for &production in self.grammar.productions_of(*nonterminal) {
                let item = ItemCore { production, dot: 0 };
                match items.entry(item) {
                    Entry::Vacant(entry) => {
                        entry.insert(lookahead.clone());
                        pending.push(item);
                    }
                    Entry::Occupied(mut entry) => {
                        if entry.get_mut().union_with(&lookahead) {
                            pending.push(item);
                        }
                    }
                }
            }
        }
        items
    }

    /// Kernels reached by moving the dot over each symbol
    fn successors(&self, closure: &ItemSet) -> BTreeMap<FlatSymbol, ItemSet> {
        let mut successors: BTreeMap<FlatSymbol, ItemSet> = BTreeMap::new();
        for (core, lookahead) in closure {
            let Some(step) = self.steps(core.production).get(core.dot as usize) else {
                continue;
            };
            let advanced = ItemCore {
                production: core.production,
                dot: core.dot + 1,
            };
            successors
                .entry(step.symbol)
                .or_default()
                .entry(advanced)
                .or_insert_with(|| TerminalSet::new(self.first.terminal_count()))
                .union_with(lookahead);
        }
        successors
    }
}

impl Builder {
    /// Finds or creates the state for `kernel`; reports whether its items changed.
    fn intern(&mut self, kernel: ItemSet, max_states: usize) -> Result<(u32, bool), CompileError> {
        let key = match self.kind {
            TableKind::Lalr => StateKey::Core(kernel.keys().copied().collect()),
            TableKind::Canonical => StateKey::Full(
                kernel
                    .iter()
                    .map(|(core, lookahead)| (*core, lookahead.clone()))
                    .collect(),
            ),
        };

        if let Some(&state) = self.keys.get(&key) {
            let existing = &mut self.kernels[state as usize];
            let mut changed = false;
            for (core, lookahead) in kernel {
                if let Some(known) = existing.get_mut(&core) {
                    changed |= known.union_with(&lookahead);
                }
            }
            return Ok((state, changed));
        }

        if self.kernels.len() >= max_states {
            return Err(CompileError::TooManyStates { limit: max_states });
        }
        let state = self.kernels.len() as u32;
        self.kernels.push(kernel);
        self.transitions.push(BTreeMap::new());
        self.keys.insert(key, state);
        Ok((state, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::flatten::flatten;
    use crate::grammar::{dsl::*, GrammarBuilder, GrammarModel};

    fn automaton(model: &GrammarModel, kind: TableKind) -> (SyntaxGrammar, Automaton) {
        let grammar = flatten(model).unwrap();
        let terminals = 2 + model.tokens().len() + model.externals().len();
        let first = FirstSets::compute(&grammar, terminals);
        let automaton = build(&grammar, &first, kind, 10_000).unwrap();
        (grammar, automaton)
    }

    #[test]
    fn test_single_token_grammar() {
        let model = GrammarBuilder::new("g")
            .rule("a", string("x"))
            .extras([])
            .build()
            .load()
            .unwrap();
        let (_, automaton) = automaton(&model, TableKind::Lalr);
        // start, after `x`, after `a`
        assert_eq!(automaton.states.len(), 3);
        let start = &automaton.states[0];
        assert!(start.transitions.contains_key(&FlatSymbol::Terminal(2)));
        assert!(start.transitions.contains_key(&FlatSymbol::Nonterminal(0)));
    }

    #[test]
    fn test_closure_propagates_lookahead() {
        // s := a "y" ; a := "x"
        let model = GrammarBuilder::new("g")
            .rule("s", seq([sym("a"), string("y")]))
            .rule("a", string("x"))
            .extras([])
            .build()
            .load()
            .unwrap();
        let (grammar, automaton) = automaton(&model, TableKind::Lalr);
        let a_production = grammar.productions_of(1)[0];
        let item = ItemCore {
            production: a_production,
            dot: 0,
        };
        let lookahead = &automaton.states[0].items[&item];
        let y = model.token_id("y").map(|id| 2 + id.index() as u16).unwrap();
        assert_eq!(lookahead.iter().collect::<Vec<_>>(), [y]);
    }

    #[test]
    fn test_canonical_keeps_split_states() {
        // Classic grammar that is LR(1) but whose LALR merge joins lookaheads:
        // s := "a" e "c" | "a" f "d" | "b" e "d" | "b" f "c" ; e := "e" ; f := "e"
        let model = GrammarBuilder::new("g")
            .rule(
                "s",
                choice([
                    seq([string("a"), sym("e"), string("c")]),
                    seq([string("a"), sym("f"), string("d")]),
                    seq([string("b"), sym("e"), string("d")]),
                    seq([string("b"), sym("f"), string("c")]),
                ]),
            )
            .rule("e", string("e"))
            .rule("f", string("e"))
            .extras([])
            .build()
            .load()
            .unwrap();
        let (_, lalr) = automaton(&model, TableKind::Lalr);
        let (_, canonical) = automaton(&model, TableKind::Canonical);
        assert!(canonical.states.len() > lalr.states.len());
    }

    #[test]
    fn test_state_limit() {
        let model = GrammarBuilder::new("g")
            .rule("a", seq([string("x"), string("y"), string("z")]))
            .extras([])
            .build()
            .load()
            .unwrap();
        let grammar = flatten(&model).unwrap();
        let first = FirstSets::compute(&grammar, 2 + model.tokens().len());
        let error = build(&grammar, &first, TableKind::Lalr, 2).unwrap_err();
        assert_eq!(error, CompileError::TooManyStates { limit: 2 });
    }
}
