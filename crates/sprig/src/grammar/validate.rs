use super::model::{Alternative, GrammarModel, Item, RuleId, Symbol};
use crate::error::GrammarWarning;
use smallvec::SmallVec;

/// Which rules each rule references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGraph {
    edges: Vec<SmallVec<[RuleId; 4]>>,
}

impl RuleGraph {
    #[must_use]
    pub fn new(model: &GrammarModel) -> Self {
        let edges = model
            .rules()
            .iter()
            .map(|rule| {
                let mut targets = SmallVec::new();
                for alternative in &rule.alternatives {
                    collect_references(alternative, &mut targets);
                }
                targets
            })
            .collect();
        Self { edges }
    }

    /// Rules referenced directly by `rule`, in first-reference order
    #[must_use]
    pub fn references(&self, rule: RuleId) -> &[RuleId] {
        &self.edges[rule.index()]
    }

    /// `reachable[i]` is true when rule `i` can be reached from `start`.
    #[must_use]
    pub fn reachable_from(&self, start: RuleId) -> Vec<bool> {
        let mut reachable = vec![false; self.edges.len()];
        let mut stack = vec![start];
        while let Some(rule) = stack.pop() {
            if std::mem::replace(&mut reachable[rule.index()], true) {
                continue;
            }
            stack.extend(
                self.references(rule)
                    .iter()
                    .copied()
                    .filter(|target| !reachable[target.index()]),
            );
        }
        reachable
    }
}

fn collect_references(alternative: &Alternative, targets: &mut SmallVec<[RuleId; 4]>) {
    for item in &alternative.items {
        collect_item_references(item, targets);
    }
}

fn collect_item_references(item: &Item, targets: &mut SmallVec<[RuleId; 4]>) {
    match item {
        Item::Symbol(Symbol::Nonterminal(rule)) => {
            if !targets.contains(rule) {
                targets.push(*rule);
            }
        }
        Item::Symbol(_) => {}
        Item::Choice(alternatives)
        | Item::Optional(alternatives)
        | Item::Repeat { alternatives, .. } => {
            for alternative in alternatives {
                collect_references(alternative, targets);
            }
        }
        Item::Field { item, .. } => collect_item_references(item, targets),
    }
}

/// Collects non-fatal findings about a resolved grammar.
pub(crate) fn check(model: &GrammarModel) -> Vec<GrammarWarning> {
    let mut warnings = Vec::new();

    let reachable = model.rule_graph().reachable_from(RuleId(0));
    for (rule, reached) in model.rules().iter().zip(&reachable) {
        if !reached {
            warnings.push(GrammarWarning::UnreachableRule {
                rule: rule.name.clone(),
            });
        }
    }

    let productive = productive_rules(model);
    for (rule, productive) in model.rules().iter().zip(&productive) {
        if !productive {
            warnings.push(GrammarWarning::UnproductiveRule {
                rule: rule.name.clone(),
            });
        }
    }

    warnings
}

/// Fixpoint over "some alternative derives a finite string".
fn productive_rules(model: &GrammarModel) -> Vec<bool> {
    let mut productive = vec![false; model.rules().len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (index, rule) in model.rules().iter().enumerate() {
            if productive[index] {
                continue;
            }
            if rule
                .alternatives
                .iter()
                .any(|alternative| alternative_productive(alternative, &productive))
            {
                productive[index] = true;
                changed = true;
            }
        }
    }
    productive
}

fn alternative_productive(alternative: &Alternative, productive: &[bool]) -> bool {
    alternative
        .items
        .iter()
        .all(|item| item_productive(item, productive))
}

fn item_productive(item: &Item, productive: &[bool]) -> bool {
    match item {
        Item::Symbol(Symbol::Nonterminal(rule)) => productive[rule.index()],
        Item::Symbol(_) | Item::Optional(_) => true,
        Item::Repeat {
            at_least_one: false,
            ..
        } => true,
        Item::Choice(alternatives)
        | Item::Repeat {
            alternatives,
            at_least_one: true,
        } => alternatives
            .iter()
            .any(|alternative| alternative_productive(alternative, productive)),
        Item::Field { item, .. } => item_productive(item, productive),
    }
}
