//! End-to-end parsing with grammars loaded from source

mod common;

use sprig::parser::{ParseBatch, ParseOptions};
use sprig::Parser;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[test]
fn test_sum_is_left_associative() {
    let tables = common::sum();
    let tree = sprig::parse(&tables, "1+2+3");
    assert!(!tree.has_error());
    let root = tree.root_node();
    assert_eq!(root.range().to_range(), 0..5);

    let left = root.child_by_field_name("left").unwrap();
    let right = root.child_by_field_name("right").unwrap();
    assert_eq!(left.range().to_range(), 0..3);
    assert_eq!(right.range().to_range(), 4..5);
    assert_eq!(
        left.child_by_field_name("right").unwrap().utf8_text(b"1+2+3"),
        Some("2")
    );
}

#[test]
fn test_rescomp_bitmap_statement() {
    let tables = common::rescomp();
    let source = br#"BITMAP logo "gfx/logo.png" BEST"#;
    let tree = sprig::parse(&tables, source);
    assert!(!tree.has_error());
    assert_eq!(
        tree.to_sexp(),
        "(source_file (bitmap_expression name: (identifier) path: (string_literal) compression: (bitmap_compression)))"
    );

    let statement = tree.root_node().named_children().next().unwrap();
    let text = |field: &str| statement.child_by_field_name(field).unwrap().utf8_text(source);
    assert_eq!(text("name"), Some("logo"));
    assert_eq!(text("path"), Some("\"gfx/logo.png\""));
    assert_eq!(text("compression"), Some("BEST"));
}

#[test]
fn test_rescomp_several_statements() {
    let tables = common::rescomp();
    let source = "BITMAP title \"a.png\"\nBITMAP font \"fonts/b.png\" -1\n\nBITMAP x_2 \"c\\\"d\" NONE\n";
    let tree = sprig::parse(&tables, source);
    assert!(!tree.has_error());
    assert_eq!(tree.len(), source.len());

    let statements: Vec<_> = tree.root_node().named_children().collect();
    assert_eq!(statements.len(), 3);
    assert!(statements[0].child_by_field_name("compression").is_none());
    assert_eq!(
        statements[1]
            .child_by_field_name("compression")
            .unwrap()
            .utf8_text(source.as_bytes()),
        Some("-1")
    );
    assert_eq!(
        statements[2]
            .child_by_field_name("path")
            .unwrap()
            .utf8_text(source.as_bytes()),
        Some("\"c\\\"d\"")
    );
}

#[test]
fn test_keyword_text_is_an_identifier_where_only_identifiers_fit() {
    let tables = common::rescomp();
    let source = b"BITMAP BITMAP \"x\"";
    let tree = sprig::parse(&tables, source);
    assert!(!tree.has_error());
    let statement = tree.root_node().child(0).unwrap();
    let name = statement.child_by_field_name("name").unwrap();
    assert_eq!(name.kind_name(), "identifier");
    assert_eq!(name.utf8_text(source), Some("BITMAP"));
}

#[test]
fn test_rescomp_empty_file() {
    let tree = sprig::parse(&common::rescomp(), "");
    assert!(!tree.has_error());
    assert_eq!(tree.to_sexp(), "(source_file)");
}

#[test]
fn test_arithmetic_precedence_and_fields() {
    let tables = common::arithmetic();
    let source = "1 + 2 * 3";
    let tree = sprig::parse(&tables, source);
    assert_eq!(
        tree.to_sexp(),
        "(expression left: (expression (number)) right: (expression left: (expression (number)) right: (expression (number))))"
    );
    let operator = tree.root_node().child_by_field_name("operator").unwrap();
    assert!(!operator.is_named());
    assert_eq!(operator.utf8_text(source.as_bytes()), Some("+"));
}

#[test]
fn test_arithmetic_parentheses() {
    let tables = common::arithmetic();
    let tree = sprig::parse(&tables, "a * (b + 1)");
    assert!(!tree.has_error());
    assert_eq!(
        tree.to_sexp(),
        "(expression left: (expression (identifier)) right: (expression (expression left: (expression (identifier)) right: (expression (number)))))"
    );
}

#[test]
fn test_minus_is_left_associative_with_plus() {
    let tables = common::arithmetic();
    let source = b"8 - 2 + 1";
    let tree = sprig::parse(&tables, source);
    let left = tree.root_node().child_by_field_name("left").unwrap();
    assert_eq!(left.utf8_text(source), Some("8 - 2"));
}

#[test]
fn test_unrecognized_bytes_stay_in_the_tree() {
    let tables = common::arithmetic();
    let source: &[u8] = &[b'1', b' ', 0xFF, 0xFE, b'+', b'2'];
    let tree = sprig::parse(&tables, source);
    assert!(tree.has_error());
    common::assert_leaves_tile(&tree, source.len());
    let errors: Vec<_> = tree
        .leaves()
        .filter(|leaf| leaf.is_error())
        .map(|leaf| leaf.range().to_range())
        .collect();
    assert_eq!(errors, [2..3, 3..4]);
}

#[test]
fn test_parse_is_idempotent() {
    let tables = common::rescomp();
    let source = "BITMAP a \"b\" BITMAP \"oops\" BITMAP c \"d\" LZ4W";
    let first = sprig::parse(&tables, source);
    let second = sprig::parse(&tables, source);
    assert!(first.structurally_eq(&second));
    assert_eq!(first.to_sexp(), second.to_sexp());
}

#[test]
fn test_stats_count_tokens() {
    let tables = common::sum();
    let tree = sprig::parse(&tables, "1 + 2");
    let stats = tree.stats();
    assert_eq!(stats.tokens_lexed, 5);
    assert_eq!(stats.reused_nodes, 0);
    assert_eq!(stats.error_count, 0);
    assert!(!stats.cancelled);
}

#[test]
fn test_parser_options_are_kept() {
    let flag = Arc::new(AtomicBool::new(false));
    let parser = Parser::new(common::sum()).with_options(
        ParseOptions::default()
            .with_max_errors(3)
            .with_cancellation(Arc::clone(&flag)),
    );
    assert_eq!(parser.options().max_errors, 3);
    let tree = parser.parse("1+1");
    assert!(!tree.stats().cancelled);
    assert!(!tree.has_error());
}

#[test]
fn test_batch_matches_single_parses() {
    let parser = Parser::new(common::rescomp());
    let sources = [
        "BITMAP a \"x\"",
        "BITMAP b \"y\" FAST",
        "BITMAP",
        "",
        "BITMAP c \"z\" 2 BITMAP d \"w\"",
    ];
    let batch = sources
        .iter()
        .enumerate()
        .fold(ParseBatch::new(), |batch, (index, source)| {
            batch.with(format!("res{index}.res"), *source)
        });
    assert_eq!(batch.len(), sources.len());

    let results = parser.parse_batch(&batch);
    assert_eq!(results.len(), sources.len());
    for (result, source) in results.iter().zip(sources) {
        assert!(result.tree.structurally_eq(&parser.parse(source)));
    }
    assert!(results[2].tree.has_error());
    assert!(!results[4].tree.has_error());
}
