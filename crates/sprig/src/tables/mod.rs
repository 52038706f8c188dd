//! # Parse Tables
//!
//! The compiled form of a grammar: action and goto tables, symbol metadata,
//! production shapes, the token DFA and a record of every conflict the
//! compiler resolved.
//!
//! ## Symbol numbering
//!
//! Terminals come first: `0` is the end of input, `1` is the ERROR symbol,
//! then the grammar's tokens in canonical order, then external tokens.
//! Nonterminals follow: user rules in declaration order, then the hidden
//! auxiliary rules generated for repetitions.
//!
//! ## Artifacts
//!
//! Tables are immutable once built and can be shared between threads behind
//! an `Arc`. [`ParserTables::to_bytes`] writes a versioned artifact that
//! [`ParserTables::from_bytes`] reads back into equal tables.

use crate::error::TableError;
use crate::lexer::TokenDfa;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the serialized table layout
pub const TABLES_FORMAT_VERSION: u32 = 1;

const ARTIFACT_FORMAT: &str = "sprig-tables";

/// Grammar symbol as numbered in the tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub(crate) u16);

impl SymbolId {
    /// End of input
    pub const END: Self = Self(0);
    /// Error nodes and unrecognised characters
    pub const ERROR: Self = Self(1);
    /// First grammar token
    pub(crate) const FIRST_TOKEN: u16 = 2;

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

/// Parser automaton state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub(crate) u32);

impl StateId {
    pub const START: Self = Self(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductionId(pub(crate) u32);

impl ProductionId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub(crate) u16);

impl FieldId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parser action for a state and terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Shift(StateId),
    Reduce(ProductionId),
    Accept,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    End,
    Error,
    Token,
    External,
    Nonterminal,
    /// Generated for a repetition
    Auxiliary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: CompactString,
    pub kind: SymbolKind,
    pub named: bool,
    /// Hidden nonterminals are inlined into their parent in the tree view
    pub visible: bool,
    pub extra: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionInfo {
    pub lhs: SymbolId,
    pub child_count: u16,
    /// Field label of each step
    pub fields: Vec<Option<FieldId>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

/// Which entry a conflict resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictResolution {
    Shift,
    Reduce(ProductionId),
    /// Non-associative operators: the lookahead is a syntax error
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionReason {
    Precedence,
    Associativity,
    /// Earlier alternative of the same rule
    DeclarationOrder,
    /// No annotation decided; shift was preferred
    PreferShift,
}

/// A conflict the compiler resolved, kept for inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedConflict {
    pub state: StateId,
    pub lookahead: SymbolId,
    pub kind: ConflictKind,
    pub productions: Vec<ProductionId>,
    pub resolution: ConflictResolution,
    pub reason: ResolutionReason,
}

/// Compiled parse tables for one grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserTables {
    pub(crate) name: CompactString,
    pub(crate) symbols: Vec<SymbolInfo>,
    pub(crate) terminal_count: u16,
    pub(crate) external_offset: u16,
    pub(crate) external_count: u16,
    pub(crate) start_symbol: SymbolId,
    pub(crate) fields: Vec<CompactString>,
    pub(crate) productions: Vec<ProductionInfo>,
    pub(crate) state_count: u32,
    /// `state_count * terminal_count` entries, row-major by state
    pub(crate) actions: Vec<Action>,
    /// `state_count * nonterminal_count` entries, row-major by state
    pub(crate) gotos: Vec<Option<StateId>>,
    pub(crate) lexer: TokenDfa,
    pub(crate) conflicts: Vec<ResolvedConflict>,
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format: &'a str,
    version: u32,
    tables: &'a ParserTables,
}

#[derive(Deserialize)]
struct ArtifactHeader {
    format: CompactString,
    version: u32,
}

#[derive(Deserialize)]
struct Artifact {
    tables: ParserTables,
}

impl ParserTables {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn state_count(&self) -> usize {
        self.state_count as usize
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub const fn terminal_count(&self) -> usize {
        self.terminal_count as usize
    }

    #[must_use]
    pub fn nonterminal_count(&self) -> usize {
        self.symbols.len().saturating_sub(self.terminal_count as usize)
    }

    /// The start rule's symbol, which labels the root of every successful parse
    #[must_use]
    pub const fn start_symbol(&self) -> SymbolId {
        self.start_symbol
    }

    #[must_use]
    pub fn symbols(&self) -> impl ExactSizeIterator<Item = SymbolId> + '_ {
        (0..self.symbols.len()).map(|index| SymbolId(index as u16))
    }

    #[must_use]
    pub fn symbol_info(&self, symbol: SymbolId) -> &SymbolInfo {
        &self.symbols[symbol.index()]
    }

    #[must_use]
    pub fn symbol_name(&self, symbol: SymbolId) -> &str {
        self.symbols
            .get(symbol.index())
            .map_or("<unknown>", |info| info.name.as_str())
    }

    /// Looks a symbol up by name, distinguishing named symbols from literals.
    #[must_use]
    pub fn symbol_for_name(&self, name: &str, named: bool) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|info| info.name == name && info.named == named)
            .map(|index| SymbolId(index as u16))
    }

    #[must_use]
    pub fn is_terminal(&self, symbol: SymbolId) -> bool {
        symbol.0 < self.terminal_count
    }

    #[must_use]
    pub fn is_named(&self, symbol: SymbolId) -> bool {
        self.symbols[symbol.index()].named
    }

    #[must_use]
    pub fn is_visible(&self, symbol: SymbolId) -> bool {
        self.symbols[symbol.index()].visible
    }

    #[must_use]
    pub fn is_extra(&self, symbol: SymbolId) -> bool {
        self.symbols[symbol.index()].extra
    }

    #[must_use]
    pub fn action(&self, state: StateId, terminal: SymbolId) -> Action {
        if terminal.0 >= self.terminal_count {
            return Action::Error;
        }
        let index = state.index() * self.terminal_count as usize + terminal.index();
        self.actions.get(index).copied().unwrap_or(Action::Error)
    }

    #[must_use]
    pub fn goto(&self, state: StateId, nonterminal: SymbolId) -> Option<StateId> {
        let column = nonterminal.0.checked_sub(self.terminal_count)? as usize;
        let index = state.index() * self.nonterminal_count() + column;
        self.gotos.get(index).copied().flatten()
    }

    /// Terminals with a non-error action in `state`
    pub fn expected_symbols(&self, state: StateId) -> impl Iterator<Item = SymbolId> + '_ {
        (0..self.terminal_count)
            .map(SymbolId)
            .filter(move |terminal| self.action(state, *terminal) != Action::Error)
    }

    #[must_use]
    pub fn production(&self, production: ProductionId) -> &ProductionInfo {
        &self.productions[production.index()]
    }

    #[must_use]
    pub fn production_count(&self) -> usize {
        self.productions.len()
    }

    #[must_use]
    pub fn field_name(&self, field: FieldId) -> &str {
        &self.fields[field.index()]
    }

    #[must_use]
    pub fn field_id(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|field| field == name)
            .map(|index| FieldId(index as u16))
    }

    #[must_use]
    pub const fn external_count(&self) -> usize {
        self.external_count as usize
    }

    /// Symbol of the external token with the given declaration index
    #[must_use]
    pub fn external_symbol(&self, index: usize) -> Option<SymbolId> {
        (index < self.external_count as usize).then(|| SymbolId(self.external_offset + index as u16))
    }

    /// Declaration index of an external token symbol
    #[must_use]
    pub fn external_index(&self, symbol: SymbolId) -> Option<usize> {
        let offset = symbol.0.checked_sub(self.external_offset)? as usize;
        (offset < self.external_count as usize).then_some(offset)
    }

    #[must_use]
    pub fn lexer(&self) -> &TokenDfa {
        &self.lexer
    }

    /// Every conflict resolved while building the tables
    #[must_use]
    pub fn conflicts(&self) -> &[ResolvedConflict] {
        &self.conflicts
    }

    /// Serializes the tables into a versioned artifact.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TableError> {
        let artifact = ArtifactRef {
            format: ARTIFACT_FORMAT,
            version: TABLES_FORMAT_VERSION,
            tables: self,
        };
        serde_json::to_vec(&artifact).map_err(|e| TableError::Encode {
            message: e.to_string(),
        })
    }

    /// Reads tables written by [`ParserTables::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TableError> {
        let header: ArtifactHeader =
            serde_json::from_slice(bytes).map_err(|_| TableError::NotAnArtifact)?;
        if header.format != ARTIFACT_FORMAT {
            return Err(TableError::NotAnArtifact);
        }
        if header.version != TABLES_FORMAT_VERSION {
            return Err(TableError::IncompatibleVersion {
                found: header.version,
                supported: TABLES_FORMAT_VERSION,
            });
        }

        let artifact: Artifact = serde_json::from_slice(bytes).map_err(|e| TableError::Malformed {
            message: e.to_string(),
        })?;
        artifact.tables.check_shape()?;
        Ok(artifact.tables)
    }

    /// Rejects tables whose ids point outside the tables they index.
    fn check_shape(&self) -> Result<(), TableError> {
        let malformed = |message: &str| TableError::Malformed {
            message: message.to_string(),
        };
        let states = self.state_count as usize;
        let terminals = self.terminal_count as usize;
        if states == 0 {
            return Err(malformed("no parse states"));
        }
        if terminals < SymbolId::FIRST_TOKEN as usize || self.symbols.len() < terminals {
            return Err(malformed("terminal count out of range"));
        }
        if self.symbols.len() > usize::from(u16::MAX) {
            return Err(malformed("too many symbols"));
        }
        let externals_end = usize::from(self.external_offset) + usize::from(self.external_count);
        if self.external_count > 0
            && (self.external_offset < SymbolId::FIRST_TOKEN || externals_end > terminals)
        {
            return Err(malformed("external tokens out of range"));
        }
        if self.actions.len() != states * terminals {
            return Err(malformed("action table size does not match state count"));
        }
        if self.gotos.len() != states * self.nonterminal_count() {
            return Err(malformed("goto table size does not match state count"));
        }
        if self.start_symbol.index() >= self.symbols.len() || self.is_terminal(self.start_symbol) {
            return Err(malformed("start symbol out of range"));
        }

        for action in &self.actions {
            match *action {
                Action::Shift(target) if target.index() >= states => {
                    return Err(malformed("shift target out of range"));
                }
                Action::Reduce(production) if production.index() >= self.productions.len() => {
                    return Err(malformed("reduced production out of range"));
                }
                _ => {}
            }
        }
        if self.gotos.iter().flatten().any(|target| target.index() >= states) {
            return Err(malformed("goto target out of range"));
        }

        for production in &self.productions {
            if production.lhs.index() >= self.symbols.len() || self.is_terminal(production.lhs) {
                return Err(malformed("production does not reduce to a nonterminal"));
            }
            if production.fields.len() != usize::from(production.child_count) {
                return Err(malformed("production field list does not match its length"));
            }
            if production
                .fields
                .iter()
                .flatten()
                .any(|field| field.index() >= self.fields.len())
            {
                return Err(malformed("field out of range"));
            }
        }

        self.lexer.check(self.terminal_count).map_err(malformed)
    }
}

impl fmt::Display for ResolvedConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} conflict in state {} on symbol {} resolved to {:?} by {:?}",
            self.kind, self.state.0, self.lookahead.0, self.resolution, self.reason
        )
    }
}
