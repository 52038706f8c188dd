//! The LR driver loop.

use super::recovery::{self, Cost, Repair};
use super::stack::{ParseStack, StackEntry};
use crate::incremental::reuse::ReuseCursor;
use crate::lexer::{LexResult, Lexer, Token};
use crate::syntax::{GreenNode, LeafContext, NodeFlags, ParseStats, TextRange, TextSize};
use crate::tables::{Action, ParserTables, ProductionId, StateId, SymbolId};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, error, trace};

#[derive(Debug, Clone, Copy)]
struct Lookahead {
    token: Token,
    /// Inserted by error recovery; shifted as a zero-width token
    missing: bool,
}

impl Lookahead {
    const fn real(token: Token) -> Self {
        Self {
            token,
            missing: false,
        }
    }
}

pub(crate) struct Engine<'a> {
    tables: &'a ParserTables,
    lexer: Lexer<'a>,
    stack: ParseStack,
    reuse: Option<ReuseCursor>,
    max_errors: usize,
    stats: ParseStats,
    errors: usize,
    /// Lexer state to use instead of the stack's until the next non-extra
    /// token; set after a subtree was reused
    lex_override: Option<StateId>,
    /// Real lookahead held back while an inserted token is processed
    deferred: Option<Token>,
    last_insertion: Option<usize>,
    /// Between a recovery and the next shifted token, nodes are not reusable.
    in_recovery: bool,
}

impl<'a> Engine<'a> {
    pub(crate) fn new(
        tables: &'a ParserTables,
        lexer: Lexer<'a>,
        reuse: Option<ReuseCursor>,
        max_errors: usize,
    ) -> Self {
        Self {
            tables,
            lexer,
            stack: ParseStack::new(),
            reuse,
            max_errors,
            stats: ParseStats::default(),
            errors: 0,
            lex_override: None,
            deferred: None,
            last_insertion: None,
            in_recovery: false,
        }
    }

    fn text_len(&self) -> usize {
        self.lexer.text().len()
    }

    pub(crate) fn run(mut self) -> (Arc<GreenNode>, ParseStats) {
        let mut lookahead = self.lex(0);
        loop {
            if lookahead.token.symbol == SymbolId::END
                && lookahead.token.start() < self.text_len()
                && !self.stats.cancelled
            {
                self.cancel(lookahead.token.start());
            }

            let state = self.stack.top_state();
            match self.tables.action(state, lookahead.token.symbol) {
                Action::Shift(next) => {
                    if !lookahead.missing {
                        if let Some(position) = self.try_reuse(&lookahead.token) {
                            lookahead = self.lex(position);
                            continue;
                        }
                    }
                    self.shift(next, lookahead);
                    lookahead = match self.deferred.take() {
                        Some(token) => Lookahead::real(token),
                        None => self.lex(lookahead.token.end()),
                    };
                }
                Action::Reduce(production) => self.reduce(production, lookahead),
                Action::Accept => return self.accept(),
                Action::Error => match self.recover(lookahead) {
                    Some(next) => lookahead = next,
                    None => return self.finish_with_error(),
                },
            }
        }
    }

    fn lex(&mut self, position: usize) -> Lookahead {
        let state = self
            .lex_override
            .unwrap_or_else(|| self.stack.top_state());
        let token = match self.lexer.next_token(position, state) {
            LexResult::Token(token, _) => {
                self.stats.tokens_lexed += 1;
                token
            }
            LexResult::EndOfInput => Token {
                symbol: SymbolId::END,
                range: TextRange::empty(TextSize::of(position)),
                lex_state: state,
                examined_end: self.text_len() + 1,
                looked_behind: false,
            },
        };
        if token.symbol == SymbolId::END || !self.tables.is_extra(token.symbol) {
            self.lex_override = None;
        }
        Lookahead::real(token)
    }

    fn leaf(&self, token: &Token, flags: NodeFlags) -> Arc<GreenNode> {
        let mut flags = flags;
        if token.symbol == SymbolId::ERROR {
            flags |= NodeFlags::ERROR;
        }
        if token.looked_behind {
            flags |= NodeFlags::LOOKS_BEHIND;
        }
        GreenNode::leaf(
            token.symbol,
            TextSize::of(token.end() - token.start()),
            flags,
            LeafContext {
                parse_state: self.stack.top_state(),
                lex_state: token.lex_state,
                lookahead_bytes: u32::try_from(token.examined_end.saturating_sub(token.end()))
                    .unwrap_or(u32::MAX),
            },
        )
    }

    fn shift(&mut self, next: StateId, lookahead: Lookahead) {
        let flags = if lookahead.missing {
            NodeFlags::MISSING
        } else {
            NodeFlags::empty()
        };
        let leaf = self.leaf(&lookahead.token, flags);
        self.stack.push(next, leaf, lookahead.token.start());
        if !lookahead.missing {
            self.in_recovery = false;
        }
    }

    fn reduce(&mut self, production: ProductionId, lookahead: Lookahead) {
        let info = self.tables.production(production);
        let popped = self.stack.pop_for_reduce(info.child_count as usize);
        let below = self.stack.top_state();
        let start = popped.start(lookahead.token.start());
        let children = popped.nodes();

        let mut flags = NodeFlags::empty();
        if self.in_recovery || children.iter().any(|child| child.is_fragile()) {
            flags |= NodeFlags::FRAGILE;
        }
        let node = GreenNode::branch(
            info.lhs,
            Some(production),
            flags,
            below,
            children,
            lookahead.token.examined_end.saturating_sub(start),
            lookahead.token.lex_state,
        );

        let next = match self.tables.goto(below, info.lhs) {
            Some(next) => next,
            None => {
                error!(
                    state = below.index(),
                    symbol = self.tables.symbol_name(info.lhs),
                    "no goto entry after reduction"
                );
                below
            }
        };
        self.stack.push(next, node, start);
        self.stack.restore_extras(popped.trailing);
    }

    /// Pushes a subtree of the previous tree if one fits here, returning
    /// the position after it.
    fn try_reuse(&mut self, token: &Token) -> Option<usize> {
        if self.tables.is_extra(token.symbol) || token.is_error() {
            return None;
        }
        let state = self.stack.top_state();
        let start = token.start();
        let candidates = self.reuse.as_mut()?.candidates(start);
        for node in candidates {
            if node.parse_state() != state || node.lex_state() != token.lex_state {
                continue;
            }
            // the old first token must be the one the lexer just produced
            let first = node.first_leaf();
            if first.symbol() != token.symbol
                || first.text_len().to_usize() != token.end() - token.start()
            {
                continue;
            }
            let Some(next) = self.tables.goto(state, node.symbol()) else {
                continue;
            };
            let len = node.text_len().to_usize();
            trace!(
                symbol = self.tables.symbol_name(node.symbol()),
                start,
                len,
                "reusing subtree"
            );
            self.stats.reused_nodes += 1;
            self.stats.reused_bytes += len;
            self.lex_override = Some(node.lex_state_after());
            self.in_recovery = false;
            self.stack.push(next, node, start);
            return Some(start + len);
        }
        None
    }

    fn accept(mut self) -> (Arc<GreenNode>, ParseStats) {
        let mut symbol = self.tables.start_symbol();
        let mut production = None;
        let mut children = Vec::new();
        for entry in self.stack.drain() {
            let Some(node) = entry.node else {
                continue;
            };
            if entry.is_extra {
                children.push(node);
            } else {
                symbol = node.symbol();
                production = node.production();
                children.extend(node.children().iter().cloned());
            }
        }
        let root = GreenNode::branch(
            symbol,
            production,
            NodeFlags::FRAGILE,
            StateId::START,
            children,
            self.text_len() + 1,
            StateId::START,
        );
        (root, self.stats)
    }

    fn finish_with_error(mut self) -> (Arc<GreenNode>, ParseStats) {
        let children: Vec<_> = self
            .stack
            .drain()
            .into_iter()
            .filter_map(|entry| entry.node)
            .collect();
        debug!(children = children.len(), "wrapping unfinished parse into an error root");
        let root = GreenNode::branch(
            SymbolId::ERROR,
            None,
            NodeFlags::ERROR | NodeFlags::FRAGILE,
            StateId::START,
            children,
            self.text_len() + 1,
            StateId::START,
        );
        (root, self.stats)
    }

    /// Makes an error node of `entries` (and `token`, if any).
    fn error_node(
        &self,
        entries: Vec<StackEntry>,
        token: Option<&Token>,
        examined_end: usize,
        lex_state: StateId,
    ) -> (Arc<GreenNode>, usize) {
        let start = entries
            .first()
            .map(|entry| entry.start)
            .or_else(|| token.map(Token::start))
            .unwrap_or(0);
        let mut children: Vec<_> = entries.into_iter().filter_map(|entry| entry.node).collect();
        if let Some(token) = token {
            children.push(self.leaf(token, NodeFlags::empty()));
        }
        let node = GreenNode::branch(
            SymbolId::ERROR,
            None,
            NodeFlags::ERROR | NodeFlags::EXTRA | NodeFlags::FRAGILE,
            self.stack.top_state(),
            children,
            examined_end.saturating_sub(start),
            lex_state,
        );
        (node, start)
    }

    fn cancel(&mut self, position: usize) {
        debug!(position, "parse cancelled");
        self.stats.cancelled = true;
        self.in_recovery = true;
        let rest = Token {
            symbol: SymbolId::ERROR,
            range: TextRange::from_offsets(position, self.text_len()),
            lex_state: self.stack.top_state(),
            examined_end: self.text_len() + 1,
            looked_behind: false,
        };
        let (node, start) = self.error_node(Vec::new(), Some(&rest), rest.examined_end, rest.lex_state);
        self.stack.push_extra(node, start);
    }

    /// Handles a lookahead the current state has no action for. Returns the
    /// next lookahead, or `None` when the parse has to end with an error root.
    fn recover(&mut self, lookahead: Lookahead) -> Option<Lookahead> {
        let token = lookahead.token;
        if lookahead.missing {
            // Recovery only inserts tokens it has checked, so this is not expected.
            return Some(Lookahead::real(self.deferred.take()?));
        }
        if token.symbol != SymbolId::END && self.tables.is_extra(token.symbol) {
            let leaf = self.leaf(&token, NodeFlags::EXTRA);
            self.stack.push_extra(leaf, token.start());
            return Some(self.lex(token.end()));
        }
        if token.symbol == SymbolId::END && !self.stack.has_content() {
            return None;
        }

        self.in_recovery = true;
        let repair = self.choose_repair(&token);
        let merges = repair == Repair::Skip && self.stack.top_is_error();
        if !merges {
            self.errors += 1;
        }
        if self.errors > self.max_errors {
            debug!(limit = self.max_errors, position = token.start(), "error limit reached");
            self.swallow_rest(token);
            return None;
        }

        trace!(
            ?repair,
            position = token.start(),
            lookahead = self.tables.symbol_name(token.symbol),
            "recovering from syntax error"
        );
        match repair {
            Repair::Insert(symbol) => {
                self.last_insertion = Some(token.start());
                self.deferred = Some(token);
                Some(Lookahead {
                    token: Token {
                        symbol,
                        range: TextRange::empty(token.range.start()),
                        ..token
                    },
                    missing: true,
                })
            }
            Repair::Pop(depth) => {
                let entries = self.stack.pop_depth(depth);
                let (node, start) =
                    self.error_node(entries, None, token.examined_end, token.lex_state);
                self.stack.push_extra(node, start);
                Some(lookahead)
            }
            Repair::Skip => {
                if token.symbol == SymbolId::END {
                    return None;
                }
                self.skip(&token);
                Some(self.lex(token.end()))
            }
        }
    }

    fn choose_repair(&self, token: &Token) -> Repair {
        let states = self.stack.states();
        let mut candidates: SmallVec<[(Repair, Cost); 4]> = SmallVec::new();

        if self.last_insertion != Some(token.start()) {
            let top = self.stack.top_state();
            let insertion = self
                .tables
                .expected_symbols(top)
                .filter(|symbol| {
                    *symbol != SymbolId::END
                        && *symbol != SymbolId::ERROR
                        && !self.tables.is_extra(*symbol)
                })
                .enumerate()
                .find(|(_, symbol)| {
                    recovery::accepts_after_insert(self.tables, &states, *symbol, token.symbol)
                });
            if let Some((order, symbol)) = insertion {
                candidates.push((
                    Repair::Insert(symbol),
                    Cost::insert(u32::try_from(order).unwrap_or(u32::MAX)),
                ));
            }
        }

        if let Some(depth) = (1..states.len())
            .find(|depth| recovery::accepts(self.tables, &states[..states.len() - depth], token.symbol))
        {
            candidates.push((Repair::Pop(depth), Cost::pop(depth)));
        }

        if token.symbol != SymbolId::END {
            candidates.push((Repair::Skip, Cost::skip()));
        }
        recovery::choose(candidates)
    }

    /// Moves `token` into an error node, extending the one on top if the
    /// previous token was skipped too.
    fn skip(&mut self, token: &Token) {
        let trailing = self.stack.pop_plain_extras();
        let entries = match self.stack.pop_error() {
            Some(previous) => {
                let start = previous.start;
                let mut entries: Vec<StackEntry> = previous
                    .node
                    .iter()
                    .flat_map(|node| node.children().iter().cloned())
                    .map(|node| StackEntry {
                        state: previous.state,
                        node: Some(node),
                        is_extra: true,
                        start,
                    })
                    .collect();
                entries.extend(trailing);
                entries
            }
            None => {
                self.stack.restore_extras(trailing);
                Vec::new()
            }
        };
        let (node, start) = self.error_node(entries, Some(token), token.examined_end, token.lex_state);
        self.stack.push_extra(node, start);
    }

    /// Pushes everything from `token` to the end of the input as one error node.
    fn swallow_rest(&mut self, token: Token) {
        let len = self.text_len();
        if token.start() >= len {
            return;
        }
        let rest = Token {
            symbol: SymbolId::ERROR,
            range: TextRange::from_offsets(token.start(), len),
            ..token
        };
        let (node, start) = self.error_node(Vec::new(), Some(&rest), len + 1, token.lex_state);
        self.stack.push_extra(node, start);
    }
}
