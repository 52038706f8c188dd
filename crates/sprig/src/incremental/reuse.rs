//! Walks the previous tree in step with the parser to find reusable subtrees.

use crate::incremental::Edit;
use crate::syntax::GreenNode;
use smallvec::SmallVec;
use std::sync::Arc;

/// Forward-only cursor over the subtrees of an old tree.
///
/// The parser only moves forward, so the cursor keeps a stack of subtrees
/// it has not yet passed, leftmost on top, and descends lazily until it
/// reaches the position asked for.
#[derive(Debug)]
pub(crate) struct ReuseCursor {
    edit: Edit,
    /// Old subtrees with their start offsets in the old text
    pending: Vec<(Arc<GreenNode>, usize)>,
}

impl ReuseCursor {
    pub(crate) fn new(root: &Arc<GreenNode>, edit: Edit) -> Self {
        Self {
            edit,
            pending: vec![(Arc::clone(root), 0)],
        }
    }

    /// Offset in the old text that holds the same byte as `position` in the new one
    fn old_offset(&self, position: usize) -> Option<usize> {
        if position < self.edit.start_byte {
            Some(position)
        } else if position >= self.edit.new_end_byte {
            Some(position - self.edit.new_end_byte + self.edit.old_end_byte)
        } else {
            None
        }
    }

    /// Subtrees starting at `position` of the new text that the edit did
    /// not affect, outermost first.
    pub(crate) fn candidates(&mut self, position: usize) -> SmallVec<[Arc<GreenNode>; 4]> {
        let mut found = SmallVec::new();
        let Some(target) = self.old_offset(position) else {
            return found;
        };

        while let Some((node, start)) = self.pending.last() {
            let start = *start;
            let end = start + node.text_len().to_usize();
            if end <= target {
                self.pending.pop();
            } else if start < target {
                let Some((node, _)) = self.pending.pop() else {
                    break;
                };
                let mut offset = start;
                let mut children: SmallVec<[(Arc<GreenNode>, usize); 8]> = SmallVec::new();
                for child in node.children() {
                    children.push((Arc::clone(child), offset));
                    offset += child.text_len().to_usize();
                }
                self.pending.extend(children.into_iter().rev());
            } else if start > target {
                break;
            } else {
                let mut current = Some(Arc::clone(node));
                while let Some(candidate) = current {
                    current = candidate.children().first().cloned();
                    if self.is_reusable(&candidate, start) {
                        found.push(candidate);
                    }
                }
                break;
            }
        }
        found
    }

    fn is_reusable(&self, node: &GreenNode, start: usize) -> bool {
        let examined_end = start + node.examined_len();
        node.production().is_some()
            && !node.is_leaf()
            && node.text_len().raw() > 0
            && !node.is_extra()
            && !node.is_error()
            && !node.has_error()
            && !node.is_fragile()
            && (examined_end <= self.edit.start_byte || self.follows_edit(node, start))
    }

    /// Whether the node lies after the edit, including any byte read
    /// before its start.
    fn follows_edit(&self, node: &GreenNode, start: usize) -> bool {
        if node.looks_behind() {
            start > self.edit.old_end_byte
        } else {
            start >= self.edit.old_end_byte
        }
    }
}
