//! Choosing how to continue after a syntax error.
//!
//! The parser collects every repair that would let it consume the
//! offending token and picks the cheapest one. Everything here works on
//! copies of the stack's states, so trying a repair costs nothing.

use crate::tables::{Action, ParserTables, StateId, SymbolId};
use smallvec::SmallVec;

/// A way to get past a syntax error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Repair {
    /// Insert a zero-width token
    Insert(SymbolId),
    /// Wrap the top `depth` stack entries into an error node
    Pop(usize),
    /// Move the lookahead into an error node
    Skip,
}

/// Cost of a repair; compared field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Cost {
    pub(crate) skipped: u32,
    pub(crate) popped: u32,
    pub(crate) inserted: u32,
    pub(crate) tiebreak: u32,
}

impl Cost {
    pub(crate) const fn insert(order: u32) -> Self {
        Self {
            skipped: 0,
            popped: 0,
            inserted: 1,
            tiebreak: order,
        }
    }

    pub(crate) fn pop(depth: usize) -> Self {
        Self {
            skipped: 0,
            popped: u32::try_from(depth).unwrap_or(u32::MAX),
            inserted: 0,
            tiebreak: 0,
        }
    }

    pub(crate) const fn skip() -> Self {
        Self {
            skipped: 1,
            popped: 0,
            inserted: 0,
            tiebreak: 0,
        }
    }
}

/// The cheapest repair, or [`Repair::Skip`] if there is none.
pub(crate) fn choose(candidates: impl IntoIterator<Item = (Repair, Cost)>) -> Repair {
    candidates
        .into_iter()
        .min_by_key(|(_, cost)| *cost)
        .map_or(Repair::Skip, |(repair, _)| repair)
}

/// What happens to a terminal fed to a simulated stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Shifted,
    Accepted,
    Rejected,
}

/// A stack of states that shares its lower part with the real stack
struct Simulation<'s> {
    base: &'s [StateId],
    visible: usize,
    pushed: SmallVec<[StateId; 8]>,
}

impl<'s> Simulation<'s> {
    fn new(base: &'s [StateId]) -> Self {
        Self {
            base,
            visible: base.len(),
            pushed: SmallVec::new(),
        }
    }

    fn top(&self) -> Option<StateId> {
        self.pushed
            .last()
            .copied()
            .or_else(|| self.visible.checked_sub(1).map(|index| self.base[index]))
    }

    fn pop(&mut self, count: usize) -> bool {
        let from_pushed = count.min(self.pushed.len());
        self.pushed.truncate(self.pushed.len() - from_pushed);
        let rest = count - from_pushed;
        if rest >= self.visible {
            return false;
        }
        self.visible -= rest;
        true
    }

    fn feed(&mut self, tables: &ParserTables, terminal: SymbolId) -> Outcome {
        let limit = self.base.len() * 4 + 256;
        for _ in 0..limit {
            let Some(state) = self.top() else {
                return Outcome::Rejected;
            };
            match tables.action(state, terminal) {
                Action::Shift(next) => {
                    self.pushed.push(next);
                    return Outcome::Shifted;
                }
                Action::Accept => return Outcome::Accepted,
                Action::Error => return Outcome::Rejected,
                Action::Reduce(production) => {
                    let info = tables.production(production);
                    if !self.pop(info.child_count as usize) {
                        return Outcome::Rejected;
                    }
                    let Some(below) = self.top() else {
                        return Outcome::Rejected;
                    };
                    let Some(next) = tables.goto(below, info.lhs) else {
                        return Outcome::Rejected;
                    };
                    self.pushed.push(next);
                }
            }
        }
        Outcome::Rejected
    }
}

fn proceeds(outcome: Outcome) -> bool {
    matches!(outcome, Outcome::Shifted | Outcome::Accepted)
}

/// Whether `lookahead` can be consumed on a stack with these states.
pub(crate) fn accepts(tables: &ParserTables, states: &[StateId], lookahead: SymbolId) -> bool {
    proceeds(Simulation::new(states).feed(tables, lookahead))
}

/// Whether inserting `missing` lets `lookahead` be consumed afterwards.
pub(crate) fn accepts_after_insert(
    tables: &ParserTables,
    states: &[StateId],
    missing: SymbolId,
    lookahead: SymbolId,
) -> bool {
    let mut simulation = Simulation::new(states);
    simulation.feed(tables, missing) == Outcome::Shifted
        && proceeds(simulation.feed(tables, lookahead))
}
