//! Action and goto table assembly.

use super::automaton::{Automaton, ItemCore, LrState};
use super::conflict::{
    resolve_reduce_reduce, resolve_shift_reduce, Decision, ReducePriority, ShiftPriority,
};
use super::flatten::{FlatSymbol, SyntaxGrammar};
use crate::error::CompileError;
use crate::grammar::GrammarModel;
use crate::lexer::TokenDfa;
use crate::tables::{
    Action, ConflictKind, ConflictResolution, FieldId, ParserTables, ProductionId,
    ProductionInfo, ResolutionReason, ResolvedConflict, StateId, SymbolId, SymbolInfo,
    SymbolKind,
};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub(crate) struct TableAssembler<'a> {
    pub(crate) model: &'a GrammarModel,
    pub(crate) grammar: &'a SyntaxGrammar,
    pub(crate) automaton: &'a Automaton,
}

impl TableAssembler<'_> {
    fn terminal_count(&self) -> usize {
        SymbolId::FIRST_TOKEN as usize + self.model.tokens().len() + self.model.externals().len()
    }

    pub(crate) fn assemble(self, lexer: TokenDfa) -> Result<ParserTables, CompileError> {
        let terminal_count = self.terminal_count();
        let nonterminal_count = self.grammar.nonterminals.len();
        let state_count = self.automaton.states.len();

        let mut actions = vec![Action::Error; state_count * terminal_count];
        let mut gotos = vec![None; state_count * nonterminal_count];
        let mut conflicts = Vec::new();

        for (index, state) in self.automaton.states.iter().enumerate() {
            let row = &mut actions[index * terminal_count..(index + 1) * terminal_count];
            self.state_actions(StateId(index as u32), state, row, &mut conflicts)?;
            for (symbol, target) in &state.transitions {
                if let FlatSymbol::Nonterminal(nonterminal) = symbol {
                    gotos[index * nonterminal_count + *nonterminal as usize] =
                        Some(StateId(*target));
                }
            }
        }

        let productions = self
            .grammar
            .productions
            .iter()
            .map(|production| ProductionInfo {
                lhs: SymbolId((terminal_count + production.lhs as usize) as u16),
                child_count: production.steps.len() as u16,
                fields: production
                    .steps
                    .iter()
                    .map(|step| step.field.map(FieldId))
                    .collect(),
            })
            .collect();

        debug!(
            states = state_count,
            terminals = terminal_count,
            nonterminals = nonterminal_count,
            conflicts = conflicts.len(),
            "assembled parse tables"
        );

        Ok(ParserTables {
            name: self.model.name().into(),
            symbols: self.symbols(),
            terminal_count: terminal_count as u16,
            external_offset: (SymbolId::FIRST_TOKEN as usize + self.model.tokens().len()) as u16,
            external_count: self.model.externals().len() as u16,
            start_symbol: SymbolId(terminal_count as u16),
            fields: self.grammar.fields.clone(),
            productions,
            state_count: state_count as u32,
            actions,
            gotos,
            lexer,
            conflicts,
        })
    }

    fn symbols(&self) -> Vec<SymbolInfo> {
        let mut symbols = vec![
            SymbolInfo {
                name: "end".into(),
                kind: SymbolKind::End,
                named: false,
                visible: false,
                extra: false,
            },
            SymbolInfo {
                name: "ERROR".into(),
                kind: SymbolKind::Error,
                named: true,
                visible: true,
                extra: false,
            },
        ];
        symbols.extend(self.model.tokens().iter().map(|token| SymbolInfo {
            name: token.name.clone(),
            kind: SymbolKind::Token,
            named: token.named,
            visible: !token.hidden,
            extra: token.extra,
        }));
        symbols.extend(self.model.externals().iter().map(|external| SymbolInfo {
            name: external.name.clone(),
            kind: SymbolKind::External,
            named: external.named,
            visible: !external.hidden,
            extra: false,
        }));
        symbols.extend(self.grammar.nonterminals.iter().map(|nonterminal| SymbolInfo {
            name: nonterminal.name.clone(),
            kind: if nonterminal.auxiliary {
                SymbolKind::Auxiliary
            } else {
                SymbolKind::Nonterminal
            },
            named: true,
            visible: !nonterminal.hidden,
            extra: false,
        }));
        symbols
    }

    fn terminal_name(&self, terminal: u16) -> String {
        let index = terminal as usize;
        let tokens = self.model.tokens();
        match index {
            0 => "end of input".to_string(),
            1 => "ERROR".to_string(),
            _ if index - 2 < tokens.len() => tokens[index - 2].name.to_string(),
            _ => self
                .model
                .externals()
                .get(index - 2 - tokens.len())
                .map_or_else(|| format!("#{index}"), |external| external.name.to_string()),
        }
    }

    fn reduce_priority(&self, production: u32) -> ReducePriority {
        let info = &self.grammar.productions[production as usize];
        ReducePriority {
            level: info.precedence.map_or(0, |precedence| precedence.level),
            assoc: info.precedence.and_then(|precedence| precedence.assoc),
            explicit: info.precedence.is_some(),
            origin: info.origin,
            position: production,
        }
    }

    fn origin_name(&self, production: u32) -> compact_str::CompactString {
        let origin = self.grammar.productions[production as usize].origin;
        self.model.rule(origin).name.clone()
    }

    fn state_actions(
        &self,
        state_id: StateId,
        state: &LrState,
        row: &mut [Action],
        conflicts: &mut Vec<ResolvedConflict>,
    ) -> Result<(), CompileError> {
        let mut shifts: BTreeMap<u16, (StateId, ShiftPriority)> = BTreeMap::new();
        for (symbol, target) in &state.transitions {
            if let FlatSymbol::Terminal(terminal) = symbol {
                let priority = ShiftPriority {
                    min: i32::MAX,
                    max: i32::MIN,
                    explicit: false,
                };
                shifts.insert(*terminal, (StateId(*target), priority));
            }
        }

        let mut reduces: BTreeMap<u16, Vec<u32>> = BTreeMap::new();
        let mut accepts = false;
        for (core, lookahead) in &state.items {
            let steps = self.automaton.steps(self.grammar, core.production);
            match steps.get(core.dot as usize) {
                Some(step) => {
                    let FlatSymbol::Terminal(terminal) = step.symbol else {
                        continue;
                    };
                    if let Some((_, priority)) = shifts.get_mut(&terminal) {
                        let precedence = self.item_precedence(*core);
                        priority.min = priority.min.min(precedence.unwrap_or(0));
                        priority.max = priority.max.max(precedence.unwrap_or(0));
                        priority.explicit |= precedence.is_some();
                    }
                }
                None if core.production == self.automaton.augmented => accepts = true,
                None => {
                    for terminal in lookahead.iter() {
                        reduces.entry(terminal).or_default().push(core.production);
                    }
                }
            }
        }

        for terminal in 0..row.len() as u16 {
            let candidates = reduces.get(&terminal).map_or(&[][..], Vec::as_slice);

            if accepts && terminal == SymbolId::END.raw() {
                if let Some(&production) = candidates.first() {
                    return Err(CompileError::ReduceConflict {
                        first: self.model.start_rule().name.clone(),
                        second: self.origin_name(production),
                        lookahead: self.terminal_name(terminal).into(),
                    });
                }
                row[terminal as usize] = Action::Accept;
                continue;
            }

            let reduce = self.pick_reduce(state_id, terminal, candidates, conflicts)?;
            let shift = shifts.get(&terminal).copied();

            row[terminal as usize] = match (shift, reduce) {
                (None, None) => Action::Error,
                (Some((target, _)), None) => Action::Shift(target),
                (None, Some(production)) => Action::Reduce(ProductionId(production)),
                (Some((target, priority)), Some(production)) => {
                    let (decision, reason) =
                        resolve_shift_reduce(priority, self.reduce_priority(production));
                    let (action, resolution) = match decision {
                        Decision::Shift => (Action::Shift(target), ConflictResolution::Shift),
                        Decision::Reduce => (
                            Action::Reduce(ProductionId(production)),
                            ConflictResolution::Reduce(ProductionId(production)),
                        ),
                        Decision::Error => (Action::Error, ConflictResolution::Error),
                    };
                    let conflict = ResolvedConflict {
                        state: state_id,
                        lookahead: SymbolId(terminal),
                        kind: ConflictKind::ShiftReduce,
                        productions: candidates.iter().copied().map(ProductionId).collect(),
                        resolution,
                        reason,
                    };
                    if reason == ResolutionReason::PreferShift {
                        warn!(
                            rule = %self.origin_name(production),
                            lookahead = %self.terminal_name(terminal),
                            "shift/reduce conflict resolved by preferring shift"
                        );
                    } else {
                        debug!(%conflict, "resolved conflict");
                    }
                    conflicts.push(conflict);
                    action
                }
            };
        }
        Ok(())
    }

    /// Precedence of the production an item belongs to
    fn item_precedence(&self, core: ItemCore) -> Option<i32> {
        self.grammar
            .productions
            .get(core.production as usize)
            .and_then(|production| production.precedence)
            .map(|precedence| precedence.level)
    }

    /// Folds competing reductions into one, recording the decision.
    fn pick_reduce(
        &self,
        state_id: StateId,
        terminal: u16,
        candidates: &[u32],
        conflicts: &mut Vec<ResolvedConflict>,
    ) -> Result<Option<u32>, CompileError> {
        let Some((&first, rest)) = candidates.split_first() else {
            return Ok(None);
        };
        let mut winner = first;
        let mut reason = None;
        for &challenger in rest {
            match resolve_reduce_reduce(
                self.reduce_priority(winner),
                self.reduce_priority(challenger),
            ) {
                Some((keep, why)) => {
                    if !keep {
                        winner = challenger;
                    }
                    reason = Some(why);
                }
                None => {
                    return Err(CompileError::ReduceConflict {
                        first: self.origin_name(winner),
                        second: self.origin_name(challenger),
                        lookahead: self.terminal_name(terminal).into(),
                    })
                }
            }
        }

        if let Some(reason) = reason {
            let conflict = ResolvedConflict {
                state: state_id,
                lookahead: SymbolId(terminal),
                kind: ConflictKind::ReduceReduce,
                productions: candidates.iter().copied().map(ProductionId).collect(),
                resolution: ConflictResolution::Reduce(ProductionId(winner)),
                reason,
            };
            debug!(%conflict, "resolved conflict");
            conflicts.push(conflict);
        }
        Ok(Some(winner))
    }
}
