//! Incremental re-parsing example
//!
//! Simulates an editor session on an arithmetic expression: each keystroke
//! becomes an [`Edit`], and the tree is re-parsed from the previous one.
//! The output shows how much of the old tree was reused and compares the
//! time against a full parse.

use sprig::{Edit, Parser, SyntaxTree};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

const GRAMMAR: &str = include_str!("../grammars/arithmetic.json");

/// Applies `edit` to `text`, inserting `replacement`.
fn apply(text: &str, edit: &Edit, replacement: &str) -> String {
    let mut edited = String::with_capacity(text.len() + replacement.len());
    edited.push_str(&text[..edit.start_byte]);
    edited.push_str(replacement);
    edited.push_str(&text[edit.old_end_byte..]);
    edited
}

fn report(step: &str, text: &str, tree: &SyntaxTree) {
    let stats = tree.stats();
    println!("{step:<24} {text:?}");
    println!(
        "{:<24} reused {} nodes ({} bytes), lexed {} tokens, {} errors",
        "",
        stats.reused_nodes,
        stats.reused_bytes,
        stats.tokens_lexed,
        stats.error_count
    );
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sprig=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let tables = Arc::new(sprig::compile(&sprig::load(GRAMMAR)?)?);
    let parser = Parser::new(tables);

    let mut text = String::from("total * (price + tax) - discount");
    let mut tree = parser.parse(&text);
    report("initial parse", &text, &tree);

    // typing a new term character by character passes through broken states
    const TYPED: &str = " / 100";
    let end = text.len();
    for (offset, typed) in TYPED.char_indices().map(|(i, c)| (i, &TYPED[i..i + c.len_utf8()])) {
        let edit = Edit::insert(end + offset, typed.len());
        text = apply(&text, &edit, typed);
        tree = parser.reparse(&tree, &edit, &text)?;
        report(&format!("type {typed:?}"), &text, &tree);
    }

    // replace a word in the middle
    let start = text.find("tax").ok_or("sample text changed")?;
    let edit = Edit::replace(start..start + 3, "shipping".len());
    text = apply(&text, &edit, "shipping");

    let started = Instant::now();
    let reparsed = parser.reparse(&tree, &edit, &text)?;
    let incremental = started.elapsed();

    let started = Instant::now();
    let fresh = parser.parse(&text);
    let full = started.elapsed();

    report("rename tax", &text, &reparsed);
    println!("\nincremental: {incremental:?}, full: {full:?}");
    println!("same tree: {}", reparsed.structurally_eq(&fresh));
    println!("{}", reparsed.to_sexp());
    Ok(())
}
