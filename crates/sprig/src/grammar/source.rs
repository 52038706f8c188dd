//! JSON grammar source format.
//!
//! The format follows the widely used `grammar.json` layout: a `name`, an
//! ordered `rules` object whose first entry is the start rule, optional
//! `extras` and `externals` arrays, and rule bodies tagged by `type`:
//!
//! ```json
//! {
//!   "name": "sum",
//!   "rules": {
//!     "expr": {"type": "CHOICE", "members": [
//!       {"type": "PREC_LEFT", "value": 1, "content": {"type": "SEQ", "members": [
//!         {"type": "SYMBOL", "name": "expr"},
//!         {"type": "STRING", "value": "+"},
//!         {"type": "SYMBOL", "name": "expr"}]}},
//!       {"type": "SYMBOL", "name": "number"}]},
//!     "number": {"type": "PATTERN", "value": "[0-9]+"}
//!   }
//! }
//! ```

use super::{Associativity, Expr, Grammar, GrammarBuilder, Precedence};
use crate::error::GrammarError;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Grammar source format version this build reads and writes
pub const GRAMMAR_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct GrammarJson {
    name: CompactString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    format_version: Option<u32>,
    rules: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extras: Option<Vec<RuleJson>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    externals: Vec<RuleJson>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum RuleJson {
    Blank,
    String {
        value: CompactString,
    },
    Pattern {
        value: CompactString,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flags: Option<CompactString>,
    },
    Symbol {
        name: CompactString,
    },
    Seq {
        members: Vec<RuleJson>,
    },
    Choice {
        members: Vec<RuleJson>,
    },
    Repeat {
        content: Box<RuleJson>,
    },
    Repeat1 {
        content: Box<RuleJson>,
    },
    Token {
        content: Box<RuleJson>,
    },
    Prec {
        value: i32,
        content: Box<RuleJson>,
    },
    PrecLeft {
        value: i32,
        content: Box<RuleJson>,
    },
    PrecRight {
        value: i32,
        content: Box<RuleJson>,
    },
    PrecNonassoc {
        value: i32,
        content: Box<RuleJson>,
    },
    Field {
        name: CompactString,
        content: Box<RuleJson>,
    },
}

impl RuleJson {
    fn into_expr(self) -> Expr {
        let boxed = |content: Box<Self>| Box::new(content.into_expr());
        let prec = |precedence: Precedence, content: Box<Self>| Expr::Prec {
            precedence,
            content: Box::new(content.into_expr()),
        };

        match self {
            Self::Blank => Expr::Blank,
            Self::String { value } => Expr::String(value),
            Self::Pattern { value, flags } => match flags {
                Some(flags) if flags.contains('i') => Expr::Pattern(format!("(?i:{value})").into()),
                _ => Expr::Pattern(value),
            },
            Self::Symbol { name } => Expr::Symbol(name),
            Self::Seq { members } => Expr::Seq(members.into_iter().map(Self::into_expr).collect()),
            Self::Choice { members } => {
                Expr::Choice(members.into_iter().map(Self::into_expr).collect())
            }
            Self::Repeat { content } => Expr::Repeat(boxed(content)),
            Self::Repeat1 { content } => Expr::Repeat1(boxed(content)),
            Self::Token { content } => Expr::Token(boxed(content)),
            Self::Prec { value, content } => prec(Precedence::new(value), content),
            Self::PrecLeft { value, content } => prec(Precedence::left(value), content),
            Self::PrecRight { value, content } => prec(Precedence::right(value), content),
            Self::PrecNonassoc { value, content } => prec(Precedence::non_assoc(value), content),
            Self::Field { name, content } => Expr::Field {
                name,
                content: boxed(content),
            },
        }
    }

    fn from_expr(expr: &Expr) -> Self {
        let boxed = |content: &Expr| Box::new(Self::from_expr(content));
        match expr {
            Expr::Blank => Self::Blank,
            Expr::String(value) => Self::String {
                value: value.clone(),
            },
            Expr::Pattern(value) => Self::Pattern {
                value: value.clone(),
                flags: None,
            },
            Expr::Symbol(name) => Self::Symbol { name: name.clone() },
            Expr::Seq(members) => Self::Seq {
                members: members.iter().map(Self::from_expr).collect(),
            },
            Expr::Choice(members) => Self::Choice {
                members: members.iter().map(Self::from_expr).collect(),
            },
            Expr::Repeat(content) => Self::Repeat {
                content: boxed(content),
            },
            Expr::Repeat1(content) => Self::Repeat1 {
                content: boxed(content),
            },
            Expr::Token(content) => Self::Token {
                content: boxed(content),
            },
            Expr::Prec {
                precedence,
                content,
            } => {
                let value = precedence.level;
                let content = boxed(content);
                match precedence.assoc {
                    None => Self::Prec { value, content },
                    Some(Associativity::Left) => Self::PrecLeft { value, content },
                    Some(Associativity::Right) => Self::PrecRight { value, content },
                    Some(Associativity::NonAssoc) => Self::PrecNonassoc { value, content },
                }
            }
            Expr::Field { name, content } => Self::Field {
                name: name.clone(),
                content: boxed(content),
            },
        }
    }
}

fn syntax_error(err: &serde_json::Error) -> GrammarError {
    GrammarError::Syntax {
        message: err.to_string(),
    }
}

impl Grammar {
    /// Parses a grammar from its JSON source.
    ///
    /// Only the shape of the document is checked here; symbol resolution
    /// happens in [`Grammar::load`].
    pub fn from_json(source: &str) -> Result<Self, GrammarError> {
        let document: GrammarJson = serde_json::from_str(source).map_err(|e| syntax_error(&e))?;

        if let Some(found) = document.format_version {
            if found != GRAMMAR_FORMAT_VERSION {
                return Err(GrammarError::UnsupportedFormatVersion {
                    found,
                    supported: GRAMMAR_FORMAT_VERSION,
                });
            }
        }

        let mut builder = GrammarBuilder::new(document.name);
        for (name, body) in document.rules {
            let rule: RuleJson = serde_json::from_value(body).map_err(|e| GrammarError::Syntax {
                message: format!("rule `{name}`: {e}"),
            })?;
            builder = builder.rule(name, rule.into_expr());
        }
        if let Some(extras) = document.extras {
            builder = builder.extras(extras.into_iter().map(RuleJson::into_expr));
        }

        let mut grammar = builder.build();
        grammar.externals = document
            .externals
            .into_iter()
            .map(RuleJson::into_expr)
            .collect();
        Ok(grammar)
    }

    /// Renders the grammar as JSON source that [`Grammar::from_json`] reads back.
    pub fn to_json(&self) -> Result<String, GrammarError> {
        let encode_error = |e: serde_json::Error| GrammarError::Encode {
            message: e.to_string(),
        };
        let mut rules = serde_json::Map::new();
        for (name, expr) in &self.rules {
            let body = serde_json::to_value(RuleJson::from_expr(expr)).map_err(encode_error)?;
            rules.insert(name.to_string(), body);
        }

        let document = GrammarJson {
            name: self.name.clone(),
            format_version: Some(GRAMMAR_FORMAT_VERSION),
            rules,
            extras: Some(self.extras.iter().map(RuleJson::from_expr).collect()),
            externals: self.externals.iter().map(RuleJson::from_expr).collect(),
        };
        serde_json::to_string_pretty(&document).map_err(encode_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::dsl::*;

    const SUM: &str = r#"{
        "name": "sum",
        "rules": {
            "expr": {"type": "CHOICE", "members": [
                {"type": "PREC_LEFT", "value": 1, "content": {"type": "SEQ", "members": [
                    {"type": "FIELD", "name": "left", "content": {"type": "SYMBOL", "name": "expr"}},
                    {"type": "STRING", "value": "+"},
                    {"type": "SYMBOL", "name": "expr"}]}},
                {"type": "SYMBOL", "name": "number"}]},
            "number": {"type": "PATTERN", "value": "[0-9]+"}
        }
    }"#;

    #[test]
    fn test_from_json_reads_rules_in_order() {
        let grammar = Grammar::from_json(SUM).unwrap();
        assert_eq!(grammar.name, "sum");
        assert_eq!(grammar.rules[0].0, "expr");
        assert_eq!(grammar.rules[1].1, pattern("[0-9]+"));
        assert_eq!(grammar.extras, vec![pattern(r"\s")]);
    }

    #[test]
    fn test_from_json_reads_precedence_and_fields() {
        let grammar = Grammar::from_json(SUM).unwrap();
        let expected = choice([
            prec_left(
                1,
                seq([field("left", sym("expr")), string("+"), sym("expr")]),
            ),
            sym("number"),
        ]);
        assert_eq!(grammar.rules[0].1, expected);
    }

    #[test]
    fn test_json_round_trip() {
        let grammar = Grammar::from_json(SUM).unwrap();
        let again = Grammar::from_json(&grammar.to_json().unwrap()).unwrap();
        assert_eq!(grammar, again);
    }

    #[test]
    fn test_case_insensitive_pattern_flag() {
        let source = r#"{"name": "g", "rules": {"kw": {"type": "PATTERN", "value": "select", "flags": "i"}}}"#;
        let grammar = Grammar::from_json(source).unwrap();
        assert_eq!(grammar.rules[0].1, pattern("(?i:select)"));
    }

    #[test]
    fn test_rejects_unknown_rule_type() {
        let source = r#"{"name": "g", "rules": {"a": {"type": "ALIAS", "value": "b"}}}"#;
        assert!(matches!(
            Grammar::from_json(source),
            Err(GrammarError::Syntax { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_document() {
        assert!(matches!(
            Grammar::from_json("{\"name\": "),
            Err(GrammarError::Syntax { .. })
        ));
    }

    #[test]
    fn test_rejects_future_format_version() {
        let source = r#"{"name": "g", "format_version": 99, "rules": {}}"#;
        assert_eq!(
            Grammar::from_json(source),
            Err(GrammarError::UnsupportedFormatVersion {
                found: 99,
                supported: GRAMMAR_FORMAT_VERSION
            })
        );
    }

    #[test]
    fn test_explicit_empty_extras() {
        let source = r#"{"name": "g", "extras": [], "externals": [{"type": "SYMBOL", "name": "indent"}],
            "rules": {"a": {"type": "STRING", "value": "x"}}}"#;
        let grammar = Grammar::from_json(source).unwrap();
        assert!(grammar.extras.is_empty());
        assert_eq!(grammar.externals, vec![sym("indent")]);
    }
}
