//! # Incremental Parsing
//!
//! Re-parses edited text while taking over the subtrees of the previous
//! tree that the edit cannot have affected.
//!
//! ## Overview
//!
//! An [`Edit`] describes a single replacement of the byte range
//! `start_byte..old_end_byte` with new text ending at `new_end_byte`.
//! [`reparse`] runs a normal parse over the new text, but every time the
//! parser is about to shift a token it first asks whether the previous tree
//! had a subtree starting at the same place that
//!
//! - was built from the parser state the parser is in now,
//! - had its first token lexed in the same lexer state,
//! - contains no error and was not built during error recovery, and
//! - was built without the lexer looking at any byte inside the edit.
//!
//! Such a subtree is pushed whole. The result is the same tree a fresh
//! parse of the new text would produce; only the amount of work differs.
//!
//! ## Usage
//!
//! ```rust
//! use sprig::grammar::{dsl::*, GrammarBuilder};
//! use sprig::incremental::{reparse, Edit};
//! use std::sync::Arc;
//!
//! let tables = Arc::new(
//!     GrammarBuilder::new("words")
//!         .rule("words", repeat(sym("word")))
//!         .rule("word", pattern("[a-z]+"))
//!         .build()
//!         .compile()
//!         .unwrap(),
//! );
//! let old = sprig::parse(&tables, b"alpha beta gamma");
//!
//! // "beta" -> "delta"
//! let edit = Edit::new(6, 10, 11);
//! let new = reparse(&tables, &old, &edit, b"alpha delta gamma").unwrap();
//! assert!(new.structurally_eq(&sprig::parse(&tables, b"alpha delta gamma")));
//! ```

pub(crate) mod reuse;

use crate::error::EditError;
use crate::parser::Parser;
use crate::syntax::{ParseStats, SyntaxTree};
use crate::tables::ParserTables;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// Counters of a re-parse; see [`ParseStats::reused_nodes`] and
/// [`ParseStats::reused_bytes`].
pub type ReparseStats = ParseStats;

/// A single text replacement, in byte offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edit {
    pub start_byte: usize,
    /// End of the replaced range in the old text
    pub old_end_byte: usize,
    /// End of the inserted text in the new text
    pub new_end_byte: usize,
}

impl Edit {
    #[must_use]
    pub const fn new(start_byte: usize, old_end_byte: usize, new_end_byte: usize) -> Self {
        Self {
            start_byte,
            old_end_byte,
            new_end_byte,
        }
    }

    /// Replaces `range` of the old text with `inserted_len` bytes.
    ///
    /// The new end saturates at `usize::MAX`, which [`Edit::validate`] then rejects.
    #[must_use]
    pub const fn replace(range: Range<usize>, inserted_len: usize) -> Self {
        Self::new(range.start, range.end, range.start.saturating_add(inserted_len))
    }

    #[must_use]
    pub const fn insert(at: usize, len: usize) -> Self {
        Self::new(at, at, at.saturating_add(len))
    }

    #[must_use]
    pub const fn delete(range: Range<usize>) -> Self {
        Self::new(range.start, range.end, range.start)
    }

    /// Change in text length
    #[must_use]
    pub const fn delta(&self) -> isize {
        self.new_end_byte as isize - self.old_end_byte as isize
    }

    /// Checks the edit against the lengths of the old and new text.
    ///
    /// # Errors
    ///
    /// Returns an [`EditError`] when the ranges are inverted, the replaced
    /// range lies outside the old text, or the new text does not have the
    /// length the edit implies.
    pub fn validate(&self, old_len: usize, new_len: usize) -> Result<(), EditError> {
        if self.start_byte > self.old_end_byte {
            return Err(EditError::InvertedRange {
                start: self.start_byte,
                end: self.old_end_byte,
            });
        }
        if self.start_byte > self.new_end_byte {
            return Err(EditError::InvertedRange {
                start: self.start_byte,
                end: self.new_end_byte,
            });
        }
        if self.old_end_byte > old_len {
            return Err(EditError::OutOfBounds {
                old_end: self.old_end_byte,
                len: old_len,
            });
        }
        let expected = (old_len - self.old_end_byte)
            .checked_add(self.new_end_byte)
            .ok_or(EditError::LengthMismatch {
                expected: usize::MAX,
                actual: new_len,
            })?;
        if expected != new_len {
            return Err(EditError::LengthMismatch {
                expected,
                actual: new_len,
            });
        }
        Ok(())
    }

    /// Maps an offset in the old text that lies outside the replaced range.
    ///
    /// Offsets inside the range map to the end of the inserted text.
    #[must_use]
    pub const fn map_offset(&self, offset: usize) -> usize {
        if offset >= self.old_end_byte {
            offset - self.old_end_byte + self.new_end_byte
        } else if offset <= self.start_byte {
            offset
        } else {
            self.new_end_byte
        }
    }
}

/// Re-parses `new_text`, reusing what `old_tree` has in common with it.
///
/// `old_tree` may be the tree returned by the previous parse or its
/// [`edited`](SyntaxTree::edited) copy.
///
/// # Errors
///
/// Fails if `edit` does not match the lengths of the two texts, or if
/// `old_tree` was parsed with different tables.
pub fn reparse(
    tables: &Arc<ParserTables>,
    old_tree: &SyntaxTree,
    edit: &Edit,
    new_text: impl AsRef<[u8]>,
) -> Result<SyntaxTree, EditError> {
    Parser::new(Arc::clone(tables)).reparse(old_tree, edit, new_text)
}
