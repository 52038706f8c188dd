use crate::incremental::Edit;
use crate::syntax::{GreenNode, SyntaxNode, TextRange, TextSize};
use crate::tables::{FieldId, ParserTables, SymbolId};
use std::fmt;
use std::sync::Arc;

/// Index of a node in a [`SyntaxTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const ROOT: Self = Self(0);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Counters gathered while producing a tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub tokens_lexed: usize,
    /// Subtrees taken over from the previous tree
    pub reused_nodes: usize,
    pub reused_bytes: usize,
    /// Error and missing nodes in the tree
    pub error_count: usize,
    /// The parse stopped early because its cancellation flag was set
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) green: Arc<GreenNode>,
    pub(crate) range: TextRange,
    pub(crate) parent: Option<NodeId>,
    pub(crate) first_child: u32,
    pub(crate) child_count: u32,
    pub(crate) field: Option<FieldId>,
    pub(crate) changed: bool,
}

/// A parsed document.
///
/// The tree is a flat arena over the shared green tree. Hidden rules are
/// inlined into their parents, so every node in the arena is either a
/// visible rule, an error node or a token. Children of a node are stored
/// contiguously in document order.
#[derive(Clone)]
pub struct SyntaxTree {
    tables: Arc<ParserTables>,
    nodes: Vec<NodeData>,
    stats: ParseStats,
}

impl SyntaxTree {
    pub(crate) fn new(root: Arc<GreenNode>, tables: Arc<ParserTables>, stats: ParseStats) -> Self {
        let mut nodes = vec![NodeData {
            range: TextRange::at(TextSize::zero(), root.text_len()),
            green: root,
            parent: None,
            first_child: 0,
            child_count: 0,
            field: None,
            changed: false,
        }];

        // Breadth-first, so the children of each node end up adjacent.
        let mut next = 0;
        while next < nodes.len() {
            let first_child = nodes.len();
            let green = Arc::clone(&nodes[next].green);
            let start = nodes[next].range.start();
            push_visible_children(&tables, &green, start, NodeId(next as u32), &mut nodes);
            nodes[next].first_child = first_child as u32;
            nodes[next].child_count = (nodes.len() - first_child) as u32;
            next += 1;
        }

        let error_count = nodes
            .iter()
            .filter(|node| node.green.is_error() || node.green.is_missing())
            .count();
        Self {
            tables,
            nodes,
            stats: ParseStats {
                error_count,
                ..stats
            },
        }
    }

    #[must_use]
    pub fn root_node(&self) -> SyntaxNode<'_> {
        SyntaxNode::new(self, NodeId::ROOT)
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<SyntaxNode<'_>> {
        (id.index() < self.nodes.len()).then(|| SyntaxNode::new(self, id))
    }

    #[must_use]
    pub fn green(&self) -> &Arc<GreenNode> {
        &self.nodes[0].green
    }

    #[must_use]
    pub fn tables(&self) -> &Arc<ParserTables> {
        &self.tables
    }

    #[must_use]
    pub const fn stats(&self) -> &ParseStats {
        &self.stats
    }

    /// Number of nodes in the arena
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the text the tree covers
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes[0].range.len().to_usize()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.nodes[0].green.has_error()
    }

    /// Leaves in document order; together they cover the text exactly.
    pub fn leaves(&self) -> impl Iterator<Item = SyntaxNode<'_>> + '_ {
        self.root_node()
            .descendants()
            .filter(|node| node.child_count() == 0)
    }

    /// Compares two trees node by node, ignoring parse states and edit marks.
    #[must_use]
    pub fn structurally_eq(&self, other: &Self) -> bool {
        self.nodes.len() == other.nodes.len()
            && self.nodes.iter().zip(&other.nodes).all(|(left, right)| {
                left.range == right.range
                    && left.parent == right.parent
                    && left.first_child == right.first_child
                    && left.child_count == right.child_count
                    && left.field == right.field
                    && left.green.symbol() == right.green.symbol()
                    && left.green.is_extra() == right.green.is_extra()
                    && left.green.is_error() == right.green.is_error()
                    && left.green.is_missing() == right.green.is_missing()
            })
    }

    /// Returns a copy whose node ranges follow `edit`.
    ///
    /// Nodes after the edit are shifted by the change in length, nodes that
    /// touch the edited range are stretched over it and marked changed. The
    /// shared green tree is not touched, so the result can still be handed
    /// to [`reparse`](crate::incremental::reparse).
    #[must_use]
    pub fn edited(&self, edit: &Edit) -> Self {
        let mut tree = self.clone();
        for node in &mut tree.nodes {
            let start = node.range.start().to_usize();
            let end = node.range.end().to_usize();
            if end < edit.start_byte || (end == edit.start_byte && start < end) {
                continue;
            }
            if start > edit.old_end_byte || (start == edit.old_end_byte && start > edit.start_byte) {
                node.range = TextRange::from_offsets(edit.map_offset(start), edit.map_offset(end));
                continue;
            }
            let new_start = if start <= edit.start_byte {
                start
            } else {
                edit.new_end_byte
            };
            let new_end = if end >= edit.old_end_byte {
                edit.map_offset(end)
            } else {
                edit.new_end_byte
            };
            node.range = TextRange::from_offsets(new_start, new_end.max(new_start));
            node.changed = true;
        }
        tree
    }

    /// S-expression of the named nodes, see [`SyntaxNode::to_sexp`].
    #[must_use]
    pub fn to_sexp(&self) -> String {
        self.root_node().to_sexp()
    }

    pub(crate) fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.index()]
    }

    pub(crate) fn symbol_name(&self, symbol: SymbolId) -> &str {
        self.tables.symbol_name(symbol)
    }
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("grammar", &self.tables.name())
            .field("len", &self.len())
            .field("nodes", &self.nodes.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Appends the children of `green` as seen in the public tree, looking
/// through hidden rules.
fn push_visible_children(
    tables: &ParserTables,
    green: &Arc<GreenNode>,
    start: TextSize,
    parent: NodeId,
    out: &mut Vec<NodeData>,
) {
    struct Frame {
        node: Arc<GreenNode>,
        index: usize,
        step: usize,
        inherited: Option<FieldId>,
    }

    let mut offset = start;
    let mut stack = vec![Frame {
        node: Arc::clone(green),
        index: 0,
        step: 0,
        inherited: None,
    }];
    while let Some(frame) = stack.last_mut() {
        let Some(child) = frame.node.children().get(frame.index).cloned() else {
            stack.pop();
            continue;
        };
        frame.index += 1;

        let mut field = None;
        if !child.is_extra() {
            field = frame
                .node
                .production()
                .and_then(|production| {
                    tables
                        .production(production)
                        .fields
                        .get(frame.step)
                        .copied()
                        .flatten()
                })
                .or(frame.inherited);
            frame.step += 1;
        }

        let symbol = child.symbol();
        let kept = child.is_error()
            || child.is_missing()
            || tables.is_terminal(symbol)
            || tables.is_visible(symbol);
        if kept {
            out.push(NodeData {
                range: TextRange::at(offset, child.text_len()),
                green: child,
                parent: Some(parent),
                first_child: 0,
                child_count: 0,
                field,
                changed: false,
            });
            offset += out[out.len() - 1].green.text_len();
        } else {
            stack.push(Frame {
                node: child,
                index: 0,
                step: 0,
                inherited: field,
            });
        }
    }
}
