use crate::tables::SymbolId;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Byte-level DFA recognising every lexical token of a grammar
///
/// State 0 is the start state. Accepting states list the tokens they accept
/// best-first: higher lexical precedence, then earlier declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDfa {
    states: Vec<DfaState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DfaState {
    /// Disjoint byte ranges sorted by start, for binary search
    pub(crate) transitions: Vec<ByteTransition>,
    pub(crate) accepts: SmallVec<[SymbolId; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ByteTransition {
    pub(crate) start: u8,
    pub(crate) end: u8,
    pub(crate) target: u32,
}

/// Outcome of running the DFA from one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfaMatch {
    /// Best accepted token and the byte offset where it ends
    pub token: Option<(SymbolId, usize)>,
    /// One past the furthest byte inspected; `text.len() + 1` when the end of input was seen
    pub examined_end: usize,
}

impl TokenDfa {
    pub(crate) fn new(states: Vec<DfaState>) -> Self {
        Self { states }
    }

    #[must_use]
    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    /// Checks that transitions stay inside the automaton and that accepted
    /// symbols are terminals.
    pub(crate) fn check(&self, terminal_count: u16) -> Result<(), &'static str> {
        if self.states.is_empty() {
            return Err("token automaton has no start state");
        }
        for state in &self.states {
            if state
                .transitions
                .iter()
                .any(|transition| transition.target as usize >= self.states.len())
            {
                return Err("token automaton transition out of range");
            }
            if state.accepts.iter().any(|symbol| symbol.0 >= terminal_count) {
                return Err("token automaton accepts a non-terminal");
            }
        }
        Ok(())
    }

    fn next(&self, state: u32, byte: u8) -> Option<u32> {
        let transitions = &self.states[state as usize].transitions;
        let index = transitions.partition_point(|transition| transition.end < byte);
        transitions
            .get(index)
            .filter(|transition| transition.start <= byte)
            .map(|transition| transition.target)
    }

    /// Longest match at `start` among tokens for which `accept` holds.
    ///
    /// Keeps the longest accepted prefix; at equal length the accept list
    /// order decides.
    pub fn longest_match(
        &self,
        text: &[u8],
        start: usize,
        mut accept: impl FnMut(SymbolId) -> bool,
    ) -> DfaMatch {
        let mut state = 0u32;
        let mut position = start;
        let mut token = None;

        loop {
            let current = &self.states[state as usize];
            if position > start {
                if let Some(symbol) = current.accepts.iter().copied().find(|s| accept(*s)) {
                    token = Some((symbol, position));
                }
            }

            let Some(&byte) = text.get(position) else {
                return DfaMatch {
                    token,
                    examined_end: text.len() + 1,
                };
            };
            match self.next(state, byte) {
                Some(target) => {
                    state = target;
                    position += 1;
                }
                None => {
                    return DfaMatch {
                        token,
                        examined_end: position + 1,
                    };
                }
            }
        }
    }
}
