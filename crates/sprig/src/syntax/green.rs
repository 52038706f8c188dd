//! Immutable, shareable tree nodes.
//!
//! Green nodes know their length but not their position, so a subtree can
//! be shared between the trees of successive parses. Besides the shape they
//! carry what the incremental re-parser needs to decide reuse: the parse
//! state the node was built from, the lexer state of its first token, and
//! how far past its end the lexer looked while building it.

use crate::syntax::TextSize;
use crate::tables::{ProductionId, StateId, SymbolId};
use std::sync::Arc;

/// Per-node flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags(u8);

impl NodeFlags {
    pub const EXTRA: Self = Self(1);
    pub const ERROR: Self = Self(1 << 1);
    /// Zero-width token inserted by error recovery
    pub const MISSING: Self = Self(1 << 2);
    /// The subtree contains an error or missing node
    pub const HAS_ERROR: Self = Self(1 << 3);
    /// Built under conditions a later parse cannot reproduce; never reused
    pub const FRAGILE: Self = Self(1 << 4);
    /// Lexing the first token read the byte before the node
    pub const LOOKS_BEHIND: Self = Self(1 << 5);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for NodeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for NodeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Immutable, shareable syntax tree node
#[derive(Debug)]
pub struct GreenNode {
    symbol: SymbolId,
    flags: NodeFlags,
    text_len: TextSize,
    production: Option<ProductionId>,
    parse_state: StateId,
    lex_state: StateId,
    lex_state_after: StateId,
    lookahead_bytes: u32,
    children: Box<[Arc<GreenNode>]>,
}

/// Lexing context recorded on a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LeafContext {
    pub(crate) parse_state: StateId,
    pub(crate) lex_state: StateId,
    /// Bytes inspected past the end of the token
    pub(crate) lookahead_bytes: u32,
}

impl GreenNode {
    pub(crate) fn leaf(
        symbol: SymbolId,
        text_len: TextSize,
        flags: NodeFlags,
        context: LeafContext,
    ) -> Arc<Self> {
        let mut flags = flags;
        if flags.contains(NodeFlags::ERROR) || flags.contains(NodeFlags::MISSING) {
            flags |= NodeFlags::HAS_ERROR;
        }
        Arc::new(Self {
            symbol,
            flags,
            text_len,
            production: None,
            parse_state: context.parse_state,
            lex_state: context.lex_state,
            lex_state_after: context.lex_state,
            lookahead_bytes: context.lookahead_bytes,
            children: Box::default(),
        })
    }

    /// Builds an inner node; length and error state come from the children.
    ///
    /// `examined_end` is how far past the node's start the lexer looked
    /// while it was built, and `lex_state_after` is the state the following
    /// token was lexed in.
    pub(crate) fn branch(
        symbol: SymbolId,
        production: Option<ProductionId>,
        flags: NodeFlags,
        parse_state: StateId,
        children: Vec<Arc<Self>>,
        examined_end: usize,
        lex_state_after: StateId,
    ) -> Arc<Self> {
        let mut text_len = TextSize::zero();
        let mut flags = flags;
        let mut child_examined = 0usize;
        for child in &children {
            if text_len.raw() == 0 && child.flags.contains(NodeFlags::LOOKS_BEHIND) {
                flags |= NodeFlags::LOOKS_BEHIND;
            }
            child_examined = child_examined.max(text_len.to_usize() + child.examined_len());
            text_len += child.text_len;
            if child.flags.contains(NodeFlags::HAS_ERROR) {
                flags |= NodeFlags::HAS_ERROR;
            }
        }
        if flags.contains(NodeFlags::ERROR) {
            flags |= NodeFlags::HAS_ERROR;
        }
        let examined = examined_end.max(child_examined);
        let lookahead_bytes = examined.saturating_sub(text_len.to_usize());
        let lex_state = children.first().map_or(parse_state, |child| child.lex_state);

        Arc::new(Self {
            symbol,
            flags,
            text_len,
            production,
            parse_state,
            lex_state,
            lex_state_after,
            lookahead_bytes: u32::try_from(lookahead_bytes).unwrap_or(u32::MAX),
            children: children.into_boxed_slice(),
        })
    }

    #[must_use]
    pub const fn symbol(&self) -> SymbolId {
        self.symbol
    }

    #[must_use]
    pub const fn flags(&self) -> NodeFlags {
        self.flags
    }

    #[must_use]
    pub const fn text_len(&self) -> TextSize {
        self.text_len
    }

    #[must_use]
    pub const fn production(&self) -> Option<ProductionId> {
        self.production
    }

    #[must_use]
    pub fn children(&self) -> &[Arc<GreenNode>] {
        &self.children
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub const fn is_extra(&self) -> bool {
        self.flags.contains(NodeFlags::EXTRA)
    }

    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.flags.contains(NodeFlags::ERROR)
    }

    #[must_use]
    pub const fn is_missing(&self) -> bool {
        self.flags.contains(NodeFlags::MISSING)
    }

    #[must_use]
    pub const fn has_error(&self) -> bool {
        self.flags.contains(NodeFlags::HAS_ERROR)
    }

    #[must_use]
    pub const fn is_fragile(&self) -> bool {
        self.flags.contains(NodeFlags::FRAGILE)
    }

    /// State on the parse stack when the node's first token was consumed
    #[must_use]
    pub const fn parse_state(&self) -> StateId {
        self.parse_state
    }

    /// State whose valid tokens were used to lex the node's first token
    #[must_use]
    pub const fn lex_state(&self) -> StateId {
        self.lex_state
    }

    /// State the token after the node was lexed in
    #[must_use]
    pub const fn lex_state_after(&self) -> StateId {
        self.lex_state_after
    }

    /// Bytes from the node's start to one past the furthest byte examined
    #[must_use]
    pub fn examined_len(&self) -> usize {
        self.text_len.to_usize() + self.lookahead_bytes as usize
    }

    #[must_use]
    pub const fn looks_behind(&self) -> bool {
        self.flags.contains(NodeFlags::LOOKS_BEHIND)
    }

    /// Leftmost leaf of the subtree, the node itself for a leaf
    #[must_use]
    pub fn first_leaf(&self) -> &GreenNode {
        let mut node = self;
        while let Some(child) = node.children.first() {
            node = child;
        }
        node
    }

    /// Pre-order walk that never recurses, so degenerate trees cannot overflow the stack.
    pub fn descendants(self: &Arc<Self>) -> impl Iterator<Item = Arc<GreenNode>> {
        let mut stack = vec![Arc::clone(self)];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev().cloned());
            Some(node)
        })
    }

    /// Compares shape, symbols, lengths and error flags.
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        const COMPARED: [NodeFlags; 3] = [NodeFlags::EXTRA, NodeFlags::ERROR, NodeFlags::MISSING];
        let mut pending: Vec<(&Self, &Self)> = vec![(self, other)];
        while let Some((left, right)) = pending.pop() {
            if std::ptr::eq(left, right) {
                continue;
            }
            if left.symbol != right.symbol
                || left.text_len != right.text_len
                || left.production != right.production
                || left.children.len() != right.children.len()
                || COMPARED
                    .iter()
                    .any(|flag| left.flags.contains(*flag) != right.flags.contains(*flag))
            {
                return false;
            }
            pending.extend(
                left.children
                    .iter()
                    .zip(right.children.iter())
                    .map(|(l, r)| (&**l, &**r)),
            );
        }
        true
    }
}

impl Drop for GreenNode {
    fn drop(&mut self) {
        let mut stack: Vec<Arc<GreenNode>> = std::mem::take(&mut self.children).into_vec();
        while let Some(node) = stack.pop() {
            if let Some(mut node) = Arc::into_inner(node) {
                stack.extend(std::mem::take(&mut node.children).into_vec());
            }
        }
    }
}
