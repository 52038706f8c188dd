use crate::syntax::tree::{NodeData, NodeId, SyntaxTree};
use crate::syntax::{GreenNode, TextRange};
use crate::tables::SymbolId;
use std::fmt;
use std::sync::Arc;

/// Handle to a node of a [`SyntaxTree`]
#[derive(Clone, Copy)]
pub struct SyntaxNode<'t> {
    tree: &'t SyntaxTree,
    id: NodeId,
}

impl<'t> SyntaxNode<'t> {
    pub(crate) const fn new(tree: &'t SyntaxTree, id: NodeId) -> Self {
        Self { tree, id }
    }

    fn data(&self) -> &'t NodeData {
        self.tree.data(self.id)
    }

    fn at(&self, index: u32) -> Self {
        Self::new(self.tree, NodeId(index))
    }

    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    #[must_use]
    pub const fn tree(&self) -> &'t SyntaxTree {
        self.tree
    }

    #[must_use]
    pub fn green(&self) -> &'t Arc<GreenNode> {
        &self.data().green
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> SymbolId {
        self.data().green.symbol()
    }

    #[must_use]
    pub fn kind_name(&self) -> &'t str {
        self.tree.symbol_name(self.kind())
    }

    /// Rules and named tokens are named; literal tokens are not.
    ///
    /// Characters the lexer could not recognise are anonymous as well, they
    /// only show up inside an error node.
    #[must_use]
    pub fn is_named(&self) -> bool {
        let green = &self.data().green;
        let symbol = green.symbol();
        if symbol == SymbolId::ERROR {
            return !(green.is_leaf() && green.text_len().raw() > 0);
        }
        let tables = self.tree.tables();
        tables.is_named(symbol) && tables.is_visible(symbol)
    }

    #[must_use]
    pub fn is_extra(&self) -> bool {
        self.data().green.is_extra()
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.data().green.is_error()
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        self.data().green.is_missing()
    }

    #[must_use]
    pub fn has_error(&self) -> bool {
        self.data().green.has_error()
    }

    /// Set on nodes that touch the range of an [`Edit`](crate::incremental::Edit)
    /// applied with [`SyntaxTree::edited`].
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.data().changed
    }

    #[inline]
    #[must_use]
    pub fn range(&self) -> TextRange {
        self.data().range
    }

    #[must_use]
    pub fn start_byte(&self) -> usize {
        self.range().start().to_usize()
    }

    #[must_use]
    pub fn end_byte(&self) -> usize {
        self.range().end().to_usize()
    }

    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.data().parent.map(|parent| Self::new(self.tree, parent))
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.data().child_count as usize
    }

    #[must_use]
    pub fn child(&self, index: usize) -> Option<Self> {
        let data = self.data();
        (index < data.child_count as usize).then(|| self.at(data.first_child + index as u32))
    }

    pub fn children(
        &self,
    ) -> impl DoubleEndedIterator<Item = SyntaxNode<'t>> + ExactSizeIterator + 't {
        let tree = self.tree;
        let data = self.data();
        (data.first_child..data.first_child + data.child_count)
            .map(move |index| Self::new(tree, NodeId(index)))
    }

    pub fn named_children(&self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        self.children().filter(SyntaxNode::is_named)
    }

    #[must_use]
    pub fn named_child_count(&self) -> usize {
        self.named_children().count()
    }

    #[must_use]
    pub fn first_child(&self) -> Option<Self> {
        self.child(0)
    }

    #[must_use]
    pub fn last_child(&self) -> Option<Self> {
        self.child_count().checked_sub(1).and_then(|last| self.child(last))
    }

    /// First child labelled `name`
    #[must_use]
    pub fn child_by_field_name(&self, name: &str) -> Option<Self> {
        self.children_by_field_name(name).next()
    }

    pub fn children_by_field_name(&self, name: &str) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        let field = self.tree.tables().field_id(name);
        self.children()
            .filter(move |child| field.is_some() && child.data().field == field)
    }

    /// Field label this node carries in its parent
    #[must_use]
    pub fn field_name(&self) -> Option<&'t str> {
        let field = self.data().field?;
        Some(self.tree.tables().field_name(field))
    }

    #[must_use]
    pub fn next_sibling(&self) -> Option<Self> {
        let parent = self.parent()?;
        let last = parent.data().first_child + parent.data().child_count;
        (self.id.0 + 1 < last).then(|| self.at(self.id.0 + 1))
    }

    #[must_use]
    pub fn prev_sibling(&self) -> Option<Self> {
        let parent = self.parent()?;
        (self.id.0 > parent.data().first_child).then(|| self.at(self.id.0 - 1))
    }

    #[must_use]
    pub fn next_named_sibling(&self) -> Option<Self> {
        let mut sibling = self.next_sibling();
        while let Some(node) = sibling {
            if node.is_named() {
                return Some(node);
            }
            sibling = node.next_sibling();
        }
        None
    }

    /// The node and everything below it, in document order
    pub fn descendants(&self) -> impl Iterator<Item = SyntaxNode<'t>> + 't {
        let mut stack = vec![*self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children().rev());
            Some(node)
        })
    }

    /// Smallest node whose range contains `start..end`
    #[must_use]
    pub fn descendant_for_byte_range(&self, start: usize, end: usize) -> Option<Self> {
        let target = TextRange::from_offsets(start, end.max(start));
        if !self.range().contains_range(target) {
            return None;
        }
        let mut node = *self;
        'descend: loop {
            for child in node.children() {
                let range = child.range();
                let fits = if target.is_empty() {
                    range.start() <= target.start() && target.start() < range.end()
                } else {
                    range.contains_range(target)
                };
                if fits {
                    node = child;
                    continue 'descend;
                }
            }
            return Some(node);
        }
    }

    /// The node's bytes in `source`, the text the tree was parsed from
    #[must_use]
    pub fn text<'s>(&self, source: &'s [u8]) -> Option<&'s [u8]> {
        source.get(self.range().to_range())
    }

    #[must_use]
    pub fn utf8_text<'s>(&self, source: &'s [u8]) -> Option<&'s str> {
        self.text(source)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    /// Renders the named nodes below this one as an S-expression.
    ///
    /// Fields are written as `name: (child)`, tokens inserted by error
    /// recovery as `(MISSING kind)`.
    #[must_use]
    pub fn to_sexp(&self) -> String {
        super::pretty::to_sexp(*self)
    }
}

impl PartialEq for SyntaxNode<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.tree, other.tree) && self.id == other.id
    }
}

impl Eq for SyntaxNode<'_> {}

impl fmt::Debug for SyntaxNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.kind_name(), self.range())
    }
}

#[cfg(test)]
mod tests {
    use crate::grammar::{dsl::*, GrammarBuilder};
    use crate::parser::Parser;
    use std::sync::Arc;

    fn parser() -> Parser {
        let tables = GrammarBuilder::new("call")
            .rule(
                "call",
                seq([
                    field("function", sym("name")),
                    string("("),
                    optional(field("argument", sym("name"))),
                    string(")"),
                ]),
            )
            .rule("name", pattern("[a-z]+"))
            .build()
            .compile()
            .unwrap();
        Parser::new(Arc::new(tables))
    }

    #[test]
    fn test_navigation() {
        let tree = parser().parse(b"f(x)");
        let root = tree.root_node();
        assert_eq!(root.child_count(), 4);
        assert_eq!(root.named_child_count(), 2);
        let open = root.child(1).unwrap();
        assert_eq!(open.kind_name(), "(");
        assert!(!open.is_named());
        assert_eq!(open.parent(), Some(root));
        assert_eq!(open.prev_sibling(), root.first_child());
        assert_eq!(open.next_named_sibling().unwrap().kind_name(), "name");
        assert_eq!(root.last_child().unwrap().kind_name(), ")");
        assert!(root.last_child().unwrap().next_sibling().is_none());
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_fields_and_text() {
        let source = b"run(job)";
        let tree = parser().parse(source);
        let root = tree.root_node();
        let function = root.child_by_field_name("function").unwrap();
        assert_eq!(function.utf8_text(source), Some("run"));
        assert_eq!(function.field_name(), Some("function"));
        let argument = root.child_by_field_name("argument").unwrap();
        assert_eq!(argument.utf8_text(source), Some("job"));
        assert!(root.child_by_field_name("body").is_none());
        assert!(root.child(1).unwrap().field_name().is_none());
    }

    #[test]
    fn test_descendant_for_byte_range() {
        let tree = parser().parse(b"run(job)");
        let root = tree.root_node();
        let node = root.descendant_for_byte_range(5, 6).unwrap();
        assert_eq!(node.kind_name(), "name");
        assert_eq!(node.start_byte(), 4);
        assert_eq!(root.descendant_for_byte_range(2, 5), Some(root));
        assert!(root.descendant_for_byte_range(3, 40).is_none());
    }

    #[test]
    fn test_descendants_in_document_order() {
        let tree = parser().parse(b"f(x)");
        let kinds: Vec<_> = tree
            .root_node()
            .descendants()
            .map(|node| node.kind_name())
            .collect();
        assert_eq!(kinds, ["call", "name", "(", "name", ")"]);
    }
}
