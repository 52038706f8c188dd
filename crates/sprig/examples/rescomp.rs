//! Resource script parsing example
//!
//! Parses a resource script (`BITMAP name "path" compression` statements)
//! with the bundled rescomp grammar and lists what it declares. Pass a file
//! path to parse it instead of the built-in sample; set `RUST_LOG=sprig=debug`
//! to see what the parser does.
//!
//! ```text
//! cargo run --example rescomp -- sprites.res
//! ```

use sprig::{Parser, SyntaxNode};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const GRAMMAR: &str = include_str!("../grammars/rescomp.json");

const SAMPLE: &str = r#"BITMAP player "gfx/player.png" APLIB
BITMAP enemy  "gfx/enemy \"v2\".png" LZ4W
BITMAP tiles  "gfx/tiles.png"
BITMAP "gfx/missing_name.png" BEST
BITMAP font   "gfx/font.png" -1
"#;

fn field_text<'s>(node: &SyntaxNode<'_>, field: &str, source: &'s [u8]) -> &'s str {
    node.child_by_field_name(field)
        .filter(|child| !child.is_missing())
        .and_then(|child| child.utf8_text(source))
        .unwrap_or("-")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sprig=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let source = match std::env::args().nth(1) {
        Some(path) => std::fs::read_to_string(path)?,
        None => SAMPLE.to_owned(),
    };

    let model = sprig::load(GRAMMAR)?;
    for warning in model.warnings() {
        eprintln!("warning: {warning}");
    }
    let tables = Arc::new(sprig::compile(&model)?);
    println!(
        "compiled {}: {} states, {} symbols",
        tables.name(),
        tables.state_count(),
        tables.symbol_count()
    );

    let parser = Parser::new(tables);
    let tree = parser.parse(&source);
    let bytes = source.as_bytes();

    println!("\n{:<10} {:<28} {}", "name", "path", "compression");
    for statement in tree.root_node().named_children() {
        if statement.is_error() {
            continue;
        }
        println!(
            "{:<10} {:<28} {}",
            field_text(&statement, "name", bytes),
            field_text(&statement, "path", bytes),
            field_text(&statement, "compression", bytes),
        );
    }

    if tree.has_error() {
        println!("\nproblems:");
        for node in tree.root_node().descendants() {
            if node.is_missing() {
                println!("  {}: missing {}", node.start_byte(), node.kind_name());
            } else if node.is_error() {
                let text = String::from_utf8_lossy(&bytes[node.start_byte()..node.end_byte()]);
                println!("  {}..{}: unexpected {:?}", node.start_byte(), node.end_byte(), text);
            }
        }
    }

    let stats = tree.stats();
    println!(
        "\n{} tokens, {} errors\n{}",
        stats.tokens_lexed,
        stats.error_count,
        tree.to_sexp()
    );
    Ok(())
}
