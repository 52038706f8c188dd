//! Table compilation and the serialized table artifact

mod common;

use sprig::compile::{compile_model, CompileOptions, TableKind};
use sprig::grammar::{dsl::*, GrammarBuilder};
use sprig::tables::{ConflictKind, ConflictResolution, ParserTables, TABLES_FORMAT_VERSION};
use sprig::{CompileError, TableError};
use std::sync::Arc;

#[test]
fn test_artifact_round_trips_byte_for_byte() {
    for tables in [common::rescomp(), common::arithmetic(), common::statements()] {
        let bytes = tables.to_bytes().unwrap();
        let loaded = ParserTables::from_bytes(&bytes).unwrap();
        assert_eq!(loaded, *tables);
        assert_eq!(loaded.to_bytes().unwrap(), bytes);
    }
}

#[test]
fn test_loaded_tables_parse_the_same() {
    let tables = common::rescomp();
    let loaded = Arc::new(ParserTables::from_bytes(&tables.to_bytes().unwrap()).unwrap());
    let source = "BITMAP sprite \"sprites/player.png\" APLIB\nBITMAP broken";
    let tree = sprig::parse(&tables, source);
    let reloaded = sprig::parse(&loaded, source);
    assert!(tree.structurally_eq(&reloaded));
    assert_eq!(tree.to_sexp(), reloaded.to_sexp());
}

#[test]
fn test_incompatible_artifact_version_is_rejected() {
    let bytes = common::sum().to_bytes().unwrap();
    let mut artifact: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    artifact["version"] = serde_json::json!(TABLES_FORMAT_VERSION + 1);
    let bytes = serde_json::to_vec(&artifact).unwrap();
    assert_eq!(
        ParserTables::from_bytes(&bytes).unwrap_err(),
        TableError::IncompatibleVersion {
            found: TABLES_FORMAT_VERSION + 1,
            supported: TABLES_FORMAT_VERSION,
        }
    );
}

#[test]
fn test_foreign_data_is_rejected() {
    assert_eq!(
        ParserTables::from_bytes(b"not json").unwrap_err(),
        TableError::NotAnArtifact
    );
    assert_eq!(
        ParserTables::from_bytes(br#"{"format": "other", "version": 1}"#).unwrap_err(),
        TableError::NotAnArtifact
    );

    let bytes = common::sum().to_bytes().unwrap();
    let mut artifact: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    artifact["tables"]["actions"] = serde_json::json!([]);
    let bytes = serde_json::to_vec(&artifact).unwrap();
    assert!(matches!(
        ParserTables::from_bytes(&bytes).unwrap_err(),
        TableError::Malformed { .. }
    ));
}

/// Rewrites the serialized `sum` tables and returns what loading them reports.
fn load_altered(alter: impl FnOnce(&mut serde_json::Value)) -> TableError {
    let bytes = common::sum().to_bytes().unwrap();
    let mut artifact: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    alter(&mut artifact["tables"]);
    let bytes = serde_json::to_vec(&artifact).unwrap();
    ParserTables::from_bytes(&bytes).unwrap_err()
}

fn each_action(tables: &mut serde_json::Value, kind: &str, value: u64) {
    for action in tables["actions"].as_array_mut().unwrap() {
        if let Some(target) = action.get_mut(kind) {
            *target = serde_json::json!(value);
        }
    }
}

fn assert_malformed(error: TableError, expected: &str) {
    match error {
        TableError::Malformed { message } => assert!(message.contains(expected), "{message}"),
        other => panic!("expected a malformed artifact, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_reductions_are_rejected() {
    let error = load_altered(|tables| each_action(tables, "Reduce", 9999));
    assert_malformed(error, "reduced production out of range");
}

#[test]
fn test_out_of_range_shifts_and_gotos_are_rejected() {
    let error = load_altered(|tables| each_action(tables, "Shift", 9999));
    assert_malformed(error, "shift target out of range");

    let error = load_altered(|tables| {
        for target in tables["gotos"].as_array_mut().unwrap() {
            if !target.is_null() {
                *target = serde_json::json!(9999);
            }
        }
    });
    assert_malformed(error, "goto target out of range");
}

#[test]
fn test_productions_must_reduce_to_nonterminals() {
    let error = load_altered(|tables| tables["productions"][0]["lhs"] = serde_json::json!(2));
    assert_malformed(error, "production does not reduce to a nonterminal");

    let error = load_altered(|tables| tables["productions"][0]["fields"] = serde_json::json!([]));
    assert_malformed(error, "production field list does not match its length");
}

#[test]
fn test_bad_symbol_layout_is_rejected() {
    let error = load_altered(|tables| tables["external_count"] = serde_json::json!(40));
    assert_malformed(error, "external tokens out of range");

    let error = load_altered(|tables| tables["start_symbol"] = serde_json::json!(0));
    assert_malformed(error, "start symbol out of range");
}

#[test]
fn test_bad_token_automaton_is_rejected() {
    let error = load_altered(|tables| {
        for state in tables["lexer"]["states"].as_array_mut().unwrap() {
            for transition in state["transitions"].as_array_mut().unwrap() {
                transition["target"] = serde_json::json!(9999);
            }
        }
    });
    assert_malformed(error, "token automaton transition out of range");

    let error = load_altered(|tables| {
        let nonterminal = tables["terminal_count"].clone();
        for state in tables["lexer"]["states"].as_array_mut().unwrap() {
            if let Some(accepts) = state["accepts"].as_array_mut() {
                if !accepts.is_empty() {
                    accepts[0] = nonterminal.clone();
                }
            }
        }
    });
    assert_malformed(error, "token automaton accepts a non-terminal");

    let error = load_altered(|tables| tables["lexer"]["states"] = serde_json::json!([]));
    assert_malformed(error, "token automaton has no start state");
}

#[test]
fn test_compilation_is_deterministic() {
    let model = sprig::load(common::RESCOMP_GRAMMAR).unwrap();
    let first = sprig::compile(&model).unwrap();
    let second = sprig::compile(&model).unwrap();
    assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
}

#[test]
fn test_canonical_and_lalr_tables_agree() {
    let model = sprig::load(common::ARITHMETIC_GRAMMAR).unwrap();
    let lalr = Arc::new(compile_model(&model, &CompileOptions::default()).unwrap());
    let canonical = Arc::new(
        compile_model(
            &model,
            &CompileOptions::default().with_table_kind(TableKind::Canonical),
        )
        .unwrap(),
    );
    assert!(canonical.state_count() >= lalr.state_count());

    for source in ["1", "a * (b + 1) / 2", "((x))", "1 - 2 - 3 * 4"] {
        let left = sprig::parse(&lalr, source);
        let right = sprig::parse(&canonical, source);
        assert!(!left.has_error());
        assert_eq!(left.to_sexp(), right.to_sexp(), "{source}");
    }
}

#[test]
fn test_resolved_conflicts_are_recorded() {
    let tables = common::arithmetic();
    let conflicts = tables.conflicts();
    assert!(!conflicts.is_empty());
    assert!(conflicts
        .iter()
        .all(|conflict| conflict.kind == ConflictKind::ShiftReduce));

    let star = tables.symbol_for_name("*", false).unwrap();
    let plus = tables.symbol_for_name("+", false).unwrap();
    assert!(conflicts.iter().any(|conflict| {
        conflict.lookahead == star && conflict.resolution == ConflictResolution::Shift
    }));
    assert!(conflicts.iter().any(|conflict| {
        conflict.lookahead == plus && matches!(conflict.resolution, ConflictResolution::Reduce(_))
    }));
}

#[test]
fn test_empty_matching_token_is_rejected() {
    let result = GrammarBuilder::new("empty")
        .rule("list", repeat1(sym("item")))
        .rule("item", choice([string("x"), sym("spaces")]))
        .rule("spaces", pattern(" *"))
        .build()
        .compile();
    assert_eq!(
        result.unwrap_err(),
        CompileError::EmptyToken {
            token: "spaces".into()
        }
    );
}

#[test]
fn test_reduce_conflict_names_both_rules() {
    let result = GrammarBuilder::new("ambiguous")
        .rule("statement", seq([choice([sym("call"), sym("index")]), string(";")]))
        .rule("call", sym("name"))
        .rule("index", sym("name"))
        .rule("name", pattern("[a-z]+"))
        .build()
        .compile();
    match result {
        Err(CompileError::ReduceConflict {
            first,
            second,
            lookahead,
        }) => {
            let mut rules = [first.as_str(), second.as_str()];
            rules.sort_unstable();
            assert_eq!(rules, ["call", "index"]);
            assert_eq!(lookahead, ";");
        }
        other => panic!("expected a reduce conflict, got {other:?}"),
    }
}

#[test]
fn test_invalid_pattern_is_reported() {
    let result = GrammarBuilder::new("bad")
        .rule("start", sym("word"))
        .rule("word", pattern("[a-z"))
        .build()
        .compile();
    assert!(matches!(
        result.unwrap_err(),
        CompileError::InvalidPattern { token, .. } if token == "word"
    ));
}

#[test]
fn test_symbol_metadata() {
    let tables = common::rescomp();
    let identifier = tables.symbol_for_name("identifier", true).unwrap();
    assert!(tables.is_terminal(identifier));
    assert!(tables.is_named(identifier));
    assert!(tables.is_visible(identifier));

    let bitmap = tables.symbol_for_name("BITMAP", false).unwrap();
    assert!(!tables.is_named(bitmap));

    let statement = tables.symbol_for_name("_statement", true).unwrap();
    assert!(!tables.is_terminal(statement));
    assert!(!tables.is_visible(statement));
    assert_eq!(tables.symbol_name(tables.start_symbol()), "source_file");
    assert!(tables.field_id("compression").is_some());
    assert!(tables.field_id("left").is_none());
}
