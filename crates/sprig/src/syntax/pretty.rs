//! S-expression rendering of syntax trees.
//!
//! Only named nodes are printed, plus tokens inserted by error recovery,
//! which is enough to compare trees in tests without caring about
//! punctuation or whitespace:
//!
//! ```text
//! (expr left: (expr (number)) right: (expr (MISSING number)))
//! ```

use crate::syntax::SyntaxNode;
use std::fmt::Write;

enum Step<'t> {
    Open(SyntaxNode<'t>),
    Close,
}

pub(crate) fn to_sexp(root: SyntaxNode<'_>) -> String {
    let mut out = String::new();
    let mut stack = vec![Step::Open(root)];
    while let Some(step) = stack.pop() {
        let node = match step {
            Step::Close => {
                out.push(')');
                continue;
            }
            Step::Open(node) => node,
        };
        if !out.is_empty() {
            out.push(' ');
        }
        if node != root {
            if let Some(field) = node.field_name() {
                let _ = write!(out, "{field}: ");
            }
        }
        if node.is_missing() {
            if node.is_named() {
                let _ = write!(out, "(MISSING {})", node.kind_name());
            } else {
                let _ = write!(out, "(MISSING {:?})", node.kind_name());
            }
            continue;
        }
        out.push('(');
        out.push_str(node.kind_name());
        stack.push(Step::Close);
        stack.extend(
            node.children()
                .rev()
                .filter(|child| child.is_named() || child.is_missing())
                .map(Step::Open),
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use crate::grammar::{dsl::*, GrammarBuilder};
    use crate::parser::Parser;
    use std::sync::Arc;

    fn parser() -> Parser {
        let tables = GrammarBuilder::new("assign")
            .rule(
                "assignment",
                seq([field("target", sym("name")), string("="), field("value", sym("number"))]),
            )
            .rule("name", pattern("[a-z]+"))
            .rule("number", pattern("[0-9]+"))
            .build()
            .compile()
            .unwrap();
        Parser::new(Arc::new(tables))
    }

    #[test]
    fn test_fields_are_prefixed() {
        let tree = parser().parse(b"x = 1");
        assert_eq!(tree.to_sexp(), "(assignment target: (name) value: (number))");
    }

    #[test]
    fn test_missing_token_is_printed() {
        let tree = parser().parse(b"x =");
        assert_eq!(
            tree.to_sexp(),
            "(assignment target: (name) value: (MISSING number))"
        );
        let tree = parser().parse(b"x 1");
        assert_eq!(
            tree.to_sexp(),
            "(assignment target: (name) (MISSING \"=\") value: (number))"
        );
    }

    #[test]
    fn test_deep_tree_renders() {
        let tables = GrammarBuilder::new("nest")
            .rule("list", seq([string("("), optional(sym("list")), string(")")]))
            .build()
            .compile()
            .unwrap();
        let depth = 20_000;
        let text = format!("{}{}", "(".repeat(depth), ")".repeat(depth));
        let tree = Parser::new(Arc::new(tables)).parse(text.as_bytes());
        let sexp = tree.to_sexp();
        assert_eq!(sexp.matches("(list").count(), depth);
    }
}
