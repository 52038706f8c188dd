use crate::syntax::GreenNode;
use crate::tables::StateId;
use smallvec::SmallVec;
use std::sync::Arc;

/// One entry of the parse stack
#[derive(Debug, Clone)]
pub(crate) struct StackEntry {
    /// State after this entry was pushed
    pub(crate) state: StateId,
    /// `None` only for the bottom entry
    pub(crate) node: Option<Arc<GreenNode>>,
    /// Extras and error nodes sit on the stack without changing the state
    pub(crate) is_extra: bool,
    pub(crate) start: usize,
}

/// Entries removed by a reduction
#[derive(Debug, Default)]
pub(crate) struct Popped {
    /// The reduced entries, with the extras between them
    pub(crate) children: Vec<StackEntry>,
    /// Extras above the reduced entries; they go back on top of the new node
    pub(crate) trailing: Vec<StackEntry>,
}

impl StackEntry {
    pub(crate) fn is_error(&self) -> bool {
        self.node.as_ref().is_some_and(|node| node.is_error())
    }
}

impl Popped {
    pub(crate) fn start(&self, default: usize) -> usize {
        self.children
            .first()
            .or_else(|| self.trailing.first())
            .map_or(default, |entry| entry.start)
    }

    pub(crate) fn nodes(&self) -> Vec<Arc<GreenNode>> {
        self.children
            .iter()
            .filter_map(|entry| entry.node.clone())
            .collect()
    }
}

/// The parser's pushdown stack; the bottom entry is never popped.
#[derive(Debug)]
pub(crate) struct ParseStack {
    entries: Vec<StackEntry>,
}

impl ParseStack {
    pub(crate) fn new() -> Self {
        Self {
            entries: vec![StackEntry {
                state: StateId::START,
                node: None,
                is_extra: false,
                start: 0,
            }],
        }
    }

    pub(crate) fn top_state(&self) -> StateId {
        self.entries
            .last()
            .map_or(StateId::START, |entry| entry.state)
    }

    pub(crate) fn push(&mut self, state: StateId, node: Arc<GreenNode>, start: usize) {
        self.entries.push(StackEntry {
            state,
            node: Some(node),
            is_extra: false,
            start,
        });
    }

    pub(crate) fn push_extra(&mut self, node: Arc<GreenNode>, start: usize) {
        let state = self.top_state();
        self.entries.push(StackEntry {
            state,
            node: Some(node),
            is_extra: true,
            start,
        });
    }

    /// Puts extras back on top, in the state now on top.
    pub(crate) fn restore_extras(&mut self, extras: Vec<StackEntry>) {
        let state = self.top_state();
        self.entries
            .extend(extras.into_iter().map(|entry| StackEntry { state, ..entry }));
    }

    pub(crate) fn pop_trailing_extras(&mut self) -> Vec<StackEntry> {
        self.pop_extras_while(|_| true)
    }

    /// Pops trailing extras up to the first error node.
    pub(crate) fn pop_plain_extras(&mut self) -> Vec<StackEntry> {
        self.pop_extras_while(|entry| !entry.is_error())
    }

    fn pop_extras_while(&mut self, keep_going: impl Fn(&StackEntry) -> bool) -> Vec<StackEntry> {
        let mut extras = Vec::new();
        while self.entries.len() > 1
            && self
                .entries
                .last()
                .is_some_and(|entry| entry.is_extra && keep_going(entry))
        {
            extras.extend(self.entries.pop());
        }
        extras.reverse();
        extras
    }

    /// Pops `count` non-extra entries together with the extras between them.
    fn pop_entries(&mut self, count: usize) -> Vec<StackEntry> {
        let mut popped = Vec::new();
        let mut remaining = count;
        while remaining > 0 && self.entries.len() > 1 {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            if !entry.is_extra {
                remaining -= 1;
            }
            popped.push(entry);
        }
        popped.reverse();
        popped
    }

    pub(crate) fn pop_for_reduce(&mut self, child_count: usize) -> Popped {
        let trailing = self.pop_trailing_extras();
        let children = self.pop_entries(child_count);
        Popped { children, trailing }
    }

    /// Pops `depth` non-extra entries and every extra above them.
    pub(crate) fn pop_depth(&mut self, depth: usize) -> Vec<StackEntry> {
        let trailing = self.pop_trailing_extras();
        let mut popped = self.pop_entries(depth);
        popped.extend(trailing);
        popped
    }

    /// Pops the top entry if it is an error node pushed by recovery.
    pub(crate) fn pop_error(&mut self) -> Option<StackEntry> {
        let top = self.entries.last()?;
        if top.is_extra && top.is_error() && self.entries.len() > 1 {
            self.entries.pop()
        } else {
            None
        }
    }

    /// Whether the topmost entry, looking past whitespace and other plain
    /// extras, is an error node.
    pub(crate) fn top_is_error(&self) -> bool {
        self.entries
            .iter()
            .skip(1)
            .rev()
            .find(|entry| !entry.is_extra || entry.is_error())
            .is_some_and(|entry| entry.is_extra)
    }

    /// States of the non-extra entries, bottom first
    pub(crate) fn states(&self) -> SmallVec<[StateId; 32]> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_extra)
            .map(|entry| entry.state)
            .collect()
    }

    /// Whether anything other than extras has been pushed
    pub(crate) fn has_content(&self) -> bool {
        self.entries.iter().skip(1).any(|entry| !entry.is_extra)
    }

    /// Removes every entry above the bottom one.
    pub(crate) fn drain(&mut self) -> Vec<StackEntry> {
        self.entries.drain(1..).collect()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::{LeafContext, NodeFlags, TextSize};
    use crate::tables::SymbolId;

    fn leaf(symbol: u16, flags: NodeFlags) -> Arc<GreenNode> {
        GreenNode::leaf(
            SymbolId(symbol),
            TextSize::new(1),
            flags,
            LeafContext {
                parse_state: StateId::START,
                lex_state: StateId::START,
                lookahead_bytes: 0,
            },
        )
    }

    #[test]
    fn test_reduce_keeps_inner_extras_and_returns_trailing() {
        let mut stack = ParseStack::new();
        stack.push_extra(leaf(2, NodeFlags::EXTRA), 0);
        stack.push(StateId(1), leaf(3, NodeFlags::empty()), 1);
        stack.push_extra(leaf(2, NodeFlags::EXTRA), 2);
        stack.push(StateId(2), leaf(4, NodeFlags::empty()), 3);
        stack.push_extra(leaf(2, NodeFlags::EXTRA), 4);

        let popped = stack.pop_for_reduce(2);
        assert_eq!(popped.children.len(), 3);
        assert_eq!(popped.trailing.len(), 1);
        assert_eq!(popped.start(9), 1);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.top_state(), StateId::START);

        stack.push(StateId(5), leaf(9, NodeFlags::empty()), 1);
        stack.restore_extras(popped.trailing);
        assert_eq!(stack.top_state(), StateId(5));
        assert_eq!(stack.states().as_slice(), [StateId::START, StateId(5)]);
    }

    #[test]
    fn test_bottom_is_never_popped() {
        let mut stack = ParseStack::new();
        assert!(stack.pop_for_reduce(3).children.is_empty());
        assert!(stack.pop_error().is_none());
        assert!(!stack.has_content());
        assert!(stack.drain().is_empty());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_pop_error() {
        let mut stack = ParseStack::new();
        stack.push(StateId(1), leaf(3, NodeFlags::empty()), 0);
        stack.push_extra(leaf(1, NodeFlags::ERROR), 1);
        stack.push_extra(leaf(2, NodeFlags::EXTRA), 2);
        assert!(stack.top_is_error());
        assert_eq!(stack.pop_plain_extras().len(), 1);
        assert!(stack.pop_error().is_some());
        assert!(stack.pop_error().is_none());
        assert!(!stack.top_is_error());
        assert!(stack.has_content());
    }
}
