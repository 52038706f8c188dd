//! Nullable and FIRST sets over the flattened grammar.

use super::flatten::{FlatSymbol, Step, SyntaxGrammar};
use smallvec::{smallvec, SmallVec};

/// Fixed-width bit set over terminal indices
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct TerminalSet {
    words: SmallVec<[u64; 4]>,
}

impl TerminalSet {
    pub(crate) fn new(terminal_count: usize) -> Self {
        Self {
            words: smallvec![0; terminal_count.div_ceil(64).max(1)],
        }
    }

    pub(crate) fn with(terminal_count: usize, terminal: u16) -> Self {
        let mut set = Self::new(terminal_count);
        set.insert(terminal);
        set
    }

    /// Returns true when the terminal was not yet present.
    pub(crate) fn insert(&mut self, terminal: u16) -> bool {
        let (word, bit) = (terminal as usize / 64, terminal as usize % 64);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let before = self.words[word];
        self.words[word] |= 1 << bit;
        before != self.words[word]
    }

    pub(crate) fn contains(&self, terminal: u16) -> bool {
        let (word, bit) = (terminal as usize / 64, terminal as usize % 64);
        self.words.get(word).is_some_and(|w| w & (1 << bit) != 0)
    }

    /// Adds every member of `other`; returns true when anything was added.
    pub(crate) fn union_with(&mut self, other: &Self) -> bool {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            let merged = *mine | theirs;
            changed |= merged != *mine;
            *mine = merged;
        }
        changed
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.words.iter().enumerate().flat_map(|(index, word)| {
            (0..64)
                .filter(move |bit| word & (1u64 << bit) != 0)
                .map(move |bit| (index * 64 + bit) as u16)
        })
    }
}

/// Nullable flags and FIRST sets for every nonterminal
pub(crate) struct FirstSets {
    terminal_count: usize,
    nullable: Vec<bool>,
    first: Vec<TerminalSet>,
}

impl FirstSets {
    pub(crate) fn compute(grammar: &SyntaxGrammar, terminal_count: usize) -> Self {
        let count = grammar.nonterminals.len();
        let mut sets = Self {
            terminal_count,
            nullable: vec![false; count],
            first: vec![TerminalSet::new(terminal_count); count],
        };

        let mut changed = true;
        while changed {
            changed = false;
            for production in &grammar.productions {
                let lhs = production.lhs as usize;
                let mut first = TerminalSet::new(terminal_count);
                let nullable = sets.sequence_first(&production.steps, &mut first);
                changed |= sets.first[lhs].union_with(&first);
                if nullable && !sets.nullable[lhs] {
                    sets.nullable[lhs] = true;
                    changed = true;
                }
            }
        }
        sets
    }

    pub(crate) fn is_nullable(&self, nonterminal: u32) -> bool {
        self.nullable[nonterminal as usize]
    }

    pub(crate) fn first(&self, nonterminal: u32) -> &TerminalSet {
        &self.first[nonterminal as usize]
    }

    /// Adds FIRST(steps) to `out` and reports whether the whole sequence is nullable.
    pub(crate) fn sequence_first(&self, steps: &[Step], out: &mut TerminalSet) -> bool {
        for step in steps {
            match step.symbol {
                FlatSymbol::Terminal(terminal) => {
                    out.insert(terminal);
                    return false;
                }
                FlatSymbol::Nonterminal(nonterminal) => {
                    out.union_with(&self.first[nonterminal as usize]);
                    if !self.nullable[nonterminal as usize] {
                        return false;
                    }
                }
            }
        }
        true
    }

    pub(crate) const fn terminal_count(&self) -> usize {
        self.terminal_count
    }
}
