//! Grammars and input strategies shared by the integration tests.

#![allow(dead_code)]

use proptest::prelude::*;
use sprig::grammar::{dsl::*, GrammarBuilder};
use sprig::{Edit, ParserTables, SyntaxTree};
use std::sync::{Arc, OnceLock};

pub const RESCOMP_GRAMMAR: &str = include_str!("../../grammars/rescomp.json");
pub const ARITHMETIC_GRAMMAR: &str = include_str!("../../grammars/arithmetic.json");

fn compiled(cell: &'static OnceLock<Arc<ParserTables>>, source: &str) -> Arc<ParserTables> {
    Arc::clone(cell.get_or_init(|| {
        let model = sprig::load(source).expect("grammar loads");
        Arc::new(sprig::compile(&model).expect("grammar compiles"))
    }))
}

pub fn rescomp() -> Arc<ParserTables> {
    static TABLES: OnceLock<Arc<ParserTables>> = OnceLock::new();
    compiled(&TABLES, RESCOMP_GRAMMAR)
}

pub fn arithmetic() -> Arc<ParserTables> {
    static TABLES: OnceLock<Arc<ParserTables>> = OnceLock::new();
    compiled(&TABLES, ARITHMETIC_GRAMMAR)
}

/// `expr := expr '+' expr | NUMBER`, left associative
pub fn sum() -> Arc<ParserTables> {
    let tables = GrammarBuilder::new("sum")
        .rule(
            "expr",
            choice([
                prec_left(
                    1,
                    seq([
                        field("left", sym("expr")),
                        choice([string("+"), string("-")]),
                        field("right", sym("expr")),
                    ]),
                ),
                sym("number"),
            ]),
        )
        .rule("number", pattern("[0-9]+"))
        .build()
        .compile()
        .expect("sum grammar compiles");
    Arc::new(tables)
}

/// Assignments terminated by `;`, for recovery tests
pub fn statements() -> Arc<ParserTables> {
    let tables = GrammarBuilder::new("statements")
        .rule("program", repeat(sym("assignment")))
        .rule(
            "assignment",
            seq([
                field("target", sym("identifier")),
                string("="),
                field("value", sym("_expression")),
                string(";"),
            ]),
        )
        .rule(
            "_expression",
            choice([sym("identifier"), sym("number"), sym("sum")]),
        )
        .rule(
            "sum",
            prec_left(1, seq([sym("_expression"), string("+"), sym("_expression")])),
        )
        .rule("identifier", pattern("[a-z]+"))
        .rule("number", pattern("[0-9]+"))
        .build()
        .compile()
        .expect("statements grammar compiles");
    Arc::new(tables)
}

/// Checks that the leaves of `tree` cover `0..len` without gaps or overlaps.
pub fn assert_leaves_tile(tree: &SyntaxTree, len: usize) {
    let mut position = 0;
    for leaf in tree.leaves() {
        assert_eq!(leaf.start_byte(), position, "gap or overlap at {leaf:?}");
        position = leaf.end_byte();
    }
    assert_eq!(position, len);
    assert_eq!(tree.len(), len);
}

/// Applies `edit` with `replacement` as the inserted text.
pub fn apply_edit(text: &[u8], edit: &Edit, replacement: &[u8]) -> Vec<u8> {
    let mut edited = Vec::with_capacity(text.len() + replacement.len());
    edited.extend_from_slice(&text[..edit.start_byte]);
    edited.extend_from_slice(replacement);
    edited.extend_from_slice(&text[edit.old_end_byte..]);
    edited
}

/// Arbitrary bytes, including invalid UTF-8
pub fn arbitrary_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..96)
}

/// Well-formed arithmetic expressions
pub fn arithmetic_source() -> impl Strategy<Value = String> {
    let leaf = prop_oneof![
        "[0-9]{1,3}",
        "[a-z]{1,4}",
    ];
    leaf.prop_recursive(6, 48, 2, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(vec!["+", "-", "*", "/"]), inner.clone(), " {0,2}")
                .prop_map(|(left, op, right, space)| format!("{left}{space}{op}{space}{right}")),
            inner.prop_map(|inner| format!("({inner})")),
        ]
    })
}

/// Arithmetic fragments in any order, mostly malformed
pub fn arithmetic_soup() -> impl Strategy<Value = String> + Clone {
    let fragment = prop::sample::select(vec![
        "1", "42", "x", "+", "-", "*", "/", "(", ")", " ", "\n", "#", "é",
    ]);
    prop::collection::vec(fragment, 0..24).prop_map(|parts| parts.concat())
}

/// A text and an edit inside it, with the replacement drawn from `replacement`
pub fn edited_text(
    text: impl Strategy<Value = String>,
    replacement: impl Strategy<Value = String> + Clone,
) -> impl Strategy<Value = (String, Edit, String)> {
    text.prop_flat_map(move |text| {
        let len = text.len();
        (Just(text), 0..=len, 0..=len, replacement.clone())
    })
    .prop_map(|(text, a, b, replacement)| {
        let (start, old_end) = (a.min(b), a.max(b));
        let edit = Edit::new(start, old_end, start + replacement.len());
        (text, edit, replacement)
    })
}
