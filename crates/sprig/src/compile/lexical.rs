//! Token automaton construction.
//!
//! Every token pattern is compiled into one byte-level NFA (regular
//! expressions are parsed with `regex-syntax` and Unicode classes are
//! expanded into UTF-8 byte sequences), which subset construction turns into
//! the [`TokenDfa`] the lexer runs.

use crate::error::CompileError;
use crate::grammar::{TokenDef, TokenPattern};
use crate::lexer::{ByteTransition, DfaState, TokenDfa};
use crate::tables::SymbolId;
use crate::HashMap;
use regex_syntax::hir::{Class, Hir, HirKind};
use regex_syntax::utf8::Utf8Sequences;
use smallvec::SmallVec;

/// Counted repetitions are expanded into copies; larger counts are refused
const MAX_REPETITION: u32 = 256;

const MAX_DFA_STATES: usize = 1 << 16;

#[derive(Debug, Default)]
struct NfaState {
    transitions: Vec<(u8, u8, u32)>,
    epsilon: Vec<u32>,
    /// Token index accepted on reaching this state
    accept: Option<usize>,
}

#[derive(Debug)]
struct Nfa {
    states: Vec<NfaState>,
}

impl Nfa {
    fn new() -> Self {
        Self {
            states: vec![NfaState::default()],
        }
    }

    fn add_state(&mut self) -> u32 {
        self.states.push(NfaState::default());
        (self.states.len() - 1) as u32
    }

    fn epsilon(&mut self, from: u32, to: u32) {
        self.states[from as usize].epsilon.push(to);
    }

    fn range(&mut self, from: u32, start: u8, end: u8, to: u32) {
        self.states[from as usize].transitions.push((start, end, to));
    }

    /// Sorted set of states reachable through epsilon moves
    fn closure(&self, seeds: impl IntoIterator<Item = u32>) -> Vec<u32> {
        let mut seen = vec![false; self.states.len()];
        let mut stack: Vec<u32> = Vec::new();
        for seed in seeds {
            if !seen[seed as usize] {
                seen[seed as usize] = true;
                stack.push(seed);
            }
        }
        let mut set = Vec::new();
        while let Some(state) = stack.pop() {
            set.push(state);
            for &next in &self.states[state as usize].epsilon {
                if !seen[next as usize] {
                    seen[next as usize] = true;
                    stack.push(next);
                }
            }
        }
        set.sort_unstable();
        set
    }
}

/// Writes one token's patterns into the shared NFA
struct PatternCompiler<'a> {
    nfa: &'a mut Nfa,
    token: &'a TokenDef,
}

impl PatternCompiler<'_> {
    fn pattern(&mut self, pattern: &TokenPattern, start: u32, end: u32) -> Result<(), CompileError> {
        match pattern {
            TokenPattern::Blank => self.nfa.epsilon(start, end),
            TokenPattern::Literal(text) => self.bytes(text.as_bytes(), start, end),
            TokenPattern::Regex(source) => {
                let hir = regex_syntax::Parser::new()
                    .parse(source)
                    .map_err(|error| CompileError::InvalidPattern {
                        token: self.token.name.clone(),
                        message: error.to_string(),
                    })?;
                self.hir(&hir, start, end)?;
            }
            TokenPattern::Seq(members) => {
                let mut current = start;
                for (index, member) in members.iter().enumerate() {
                    let next = if index + 1 == members.len() {
                        end
                    } else {
                        self.nfa.add_state()
                    };
                    self.pattern(member, current, next)?;
                    current = next;
                }
                if members.is_empty() {
                    self.nfa.epsilon(start, end);
                }
            }
            TokenPattern::Choice(members) => {
                for member in members {
                    self.pattern(member, start, end)?;
                }
            }
            TokenPattern::Repeat {
                pattern,
                at_least_one,
            } => {
                let (inner_start, inner_end) = (self.nfa.add_state(), self.nfa.add_state());
                self.pattern(pattern, inner_start, inner_end)?;
                self.star(start, end, inner_start, inner_end, !at_least_one);
            }
        }
        Ok(())
    }

    /// `start -> inner -> end` with a loop back, optionally skippable
    fn star(&mut self, start: u32, end: u32, inner_start: u32, inner_end: u32, skippable: bool) {
        self.nfa.epsilon(start, inner_start);
        self.nfa.epsilon(inner_end, inner_start);
        self.nfa.epsilon(inner_end, end);
        if skippable {
            self.nfa.epsilon(start, end);
        }
    }

    fn bytes(&mut self, bytes: &[u8], start: u32, end: u32) {
        if bytes.is_empty() {
            self.nfa.epsilon(start, end);
            return;
        }
        let mut current = start;
        for (index, &byte) in bytes.iter().enumerate() {
            let next = if index + 1 == bytes.len() {
                end
            } else {
                self.nfa.add_state()
            };
            self.nfa.range(current, byte, byte, next);
            current = next;
        }
    }

    fn hir(&mut self, hir: &Hir, start: u32, end: u32) -> Result<(), CompileError> {
        match hir.kind() {
            HirKind::Empty => self.nfa.epsilon(start, end),
            HirKind::Literal(literal) => self.bytes(&literal.0, start, end),
            HirKind::Class(Class::Bytes(class)) => {
                for range in class.ranges() {
                    self.nfa.range(start, range.start(), range.end(), end);
                }
            }
            HirKind::Class(Class::Unicode(class)) => {
                for range in class.ranges() {
                    for sequence in Utf8Sequences::new(range.start(), range.end()) {
                        let ranges = sequence.as_slice();
                        let mut current = start;
                        for (index, byte_range) in ranges.iter().enumerate() {
                            let next = if index + 1 == ranges.len() {
                                end
                            } else {
                                self.nfa.add_state()
                            };
                            self.nfa.range(current, byte_range.start, byte_range.end, next);
                            current = next;
                        }
                    }
                }
            }
            HirKind::Look(_) => {
                return Err(CompileError::UnsupportedPattern {
                    token: self.token.name.clone(),
                    construct: "anchors and word boundaries",
                })
            }
            HirKind::Repetition(repetition) => {
                if repetition.min > MAX_REPETITION
                    || repetition.max.is_some_and(|max| max > MAX_REPETITION)
                {
                    return Err(CompileError::UnsupportedPattern {
                        token: self.token.name.clone(),
                        construct: "repetition counts above 256",
                    });
                }
                let mut current = start;
                for _ in 0..repetition.min {
                    let next = self.nfa.add_state();
                    self.hir(&repetition.sub, current, next)?;
                    current = next;
                }
                match repetition.max {
                    None => {
                        let (inner_start, inner_end) =
                            (self.nfa.add_state(), self.nfa.add_state());
                        self.hir(&repetition.sub, inner_start, inner_end)?;
                        self.star(current, end, inner_start, inner_end, true);
                    }
                    Some(max) => {
                        for _ in repetition.min..max {
                            let next = self.nfa.add_state();
                            self.hir(&repetition.sub, current, next)?;
                            self.nfa.epsilon(current, end);
                            current = next;
                        }
                        self.nfa.epsilon(current, end);
                    }
                }
            }
            HirKind::Capture(capture) => self.hir(&capture.sub, start, end)?,
            HirKind::Concat(members) => {
                let mut current = start;
                for (index, member) in members.iter().enumerate() {
                    let next = if index + 1 == members.len() {
                        end
                    } else {
                        self.nfa.add_state()
                    };
                    self.hir(member, current, next)?;
                    current = next;
                }
                if members.is_empty() {
                    self.nfa.epsilon(start, end);
                }
            }
            HirKind::Alternation(members) => {
                for member in members {
                    self.hir(member, start, end)?;
                }
            }
        }
        Ok(())
    }
}

/// Compiles `tokens` into one DFA; token `i` is reported as symbol `2 + i`.
pub(crate) fn build_token_dfa(tokens: &[TokenDef]) -> Result<TokenDfa, CompileError> {
    let mut nfa = Nfa::new();
    for (index, token) in tokens.iter().enumerate() {
        let (start, end) = (nfa.add_state(), nfa.add_state());
        nfa.epsilon(0, start);
        nfa.states[end as usize].accept = Some(index);
        PatternCompiler {
            nfa: &mut nfa,
            token,
        }
        .pattern(&token.pattern, start, end)?;

        if nfa.closure([start]).binary_search(&end).is_ok() {
            return Err(CompileError::EmptyToken {
                token: token.name.clone(),
            });
        }
    }

    let dfa = determinize(&nfa, tokens)?;
    tracing::debug!(
        tokens = tokens.len(),
        nfa_states = nfa.states.len(),
        dfa_states = dfa.state_count(),
        "built token automaton"
    );
    Ok(dfa)
}

fn determinize(nfa: &Nfa, tokens: &[TokenDef]) -> Result<TokenDfa, CompileError> {
    let mut sets: Vec<Vec<u32>> = vec![nfa.closure([0])];
    let mut ids: HashMap<Vec<u32>, u32> = HashMap::default();
    ids.insert(sets[0].clone(), 0);
    let mut states: Vec<DfaState> = Vec::new();

    let mut next = 0;
    while next < sets.len() {
        let set = sets[next].clone();
        next += 1;

        let mut targets: [Option<u32>; 256] = [None; 256];
        let mut previous: Option<(Vec<u32>, Option<u32>)> = None;
        for byte in 0..=255u8 {
            let mut moved: Vec<u32> = set
                .iter()
                .flat_map(|state| &nfa.states[*state as usize].transitions)
                .filter(|(start, end, _)| *start <= byte && byte <= *end)
                .map(|(_, _, target)| *target)
                .collect();
            moved.sort_unstable();
            moved.dedup();

            let target = match &previous {
                Some((raw, target)) if *raw == moved => *target,
                _ if moved.is_empty() => None,
                _ => {
                    let closed = nfa.closure(moved.iter().copied());
                    let id = match ids.get(&closed) {
                        Some(id) => *id,
                        None => {
                            if sets.len() >= MAX_DFA_STATES {
                                return Err(CompileError::TooManyStates {
                                    limit: MAX_DFA_STATES,
                                });
                            }
                            let id = sets.len() as u32;
                            ids.insert(closed.clone(), id);
                            sets.push(closed);
                            id
                        }
                    };
                    Some(id)
                }
            };
            targets[byte as usize] = target;
            previous = Some((moved, target));
        }

        let mut transitions = Vec::new();
        let mut byte = 0usize;
        while byte < 256 {
            let Some(target) = targets[byte] else {
                byte += 1;
                continue;
            };
            let start = byte;
            while byte + 1 < 256 && targets[byte + 1] == Some(target) {
                byte += 1;
            }
            transitions.push(ByteTransition {
                start: start as u8,
                end: byte as u8,
                target,
            });
            byte += 1;
        }

        let mut accepts: SmallVec<[usize; 2]> = set
            .iter()
            .filter_map(|state| nfa.states[*state as usize].accept)
            .collect();
        accepts.sort_unstable_by_key(|index| (std::cmp::Reverse(tokens[*index].precedence), *index));
        accepts.dedup();
        states.push(DfaState {
            transitions,
            accepts: accepts
                .into_iter()
                .map(|index| SymbolId(SymbolId::FIRST_TOKEN + index as u16))
                .collect(),
        });
    }
    Ok(TokenDfa::new(states))
}
