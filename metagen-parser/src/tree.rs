//! Decision trees over rule right-hand sides.
//!
//! All rules of one nonterminal are merged into a tree keyed by
//! `(symbol, occurrence)`: productions sharing a prefix share the tree path
//! for it. Each node may carry the unique rule that ends here and the
//! unique rule whose head is a repetition; both at once, or duplicates of
//! either, are grammar errors.

use tracing::debug;

use crate::error::GrammarError;
use crate::grammar::{Grammar, Rule, Symbol, SymbolKey};

/// One node of a decision tree. Rule indices refer to the slice the tree
/// was built from.
#[derive(Debug, Default)]
pub struct DecisionTree {
    /// Rule whose right-hand side is exhausted at this node.
    pub end_rule: Option<usize>,
    /// Rule whose head at this node is a [`Symbol::Repeat`].
    pub repeat_rule: Option<usize>,
    /// Children keyed by the recognizer at their head, in first-seen order.
    pub children: Vec<((SymbolKey, usize), DecisionTree)>,
}

/// Build the decision tree for one nonterminal's rules.
pub fn decision_tree(
    g: &Grammar,
    nt: crate::ast::NtId,
    rules: &[&Rule],
) -> Result<DecisionTree, GrammarError> {
    debug!(nt = %g.nt(nt).name, rules = rules.len(), "building decision tree");
    let items: Vec<(usize, &[(Symbol, usize)])> = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| (index, rule.indexed_rhs.as_slice()))
        .collect();
    build(g, nt, 0, items)
}

fn build(
    g: &Grammar,
    nt: crate::ast::NtId,
    depth: usize,
    items: Vec<(usize, &[(Symbol, usize)])>,
) -> Result<DecisionTree, GrammarError> {
    let mut node = DecisionTree::default();
    let mut grouped: Vec<((SymbolKey, usize), Vec<(usize, &[(Symbol, usize)])>)> = Vec::new();

    for (rule_index, prod) in items {
        match prod.first() {
            None => {
                if node.end_rule.replace(rule_index).is_some() {
                    return Err(GrammarError::AmbiguousEndRule {
                        nt: g.nt(nt).name.clone(),
                        depth,
                    });
                }
            }
            Some((Symbol::Repeat { .. }, _)) => {
                if node.repeat_rule.replace(rule_index).is_some() {
                    return Err(GrammarError::AmbiguousRepeatRule {
                        nt: g.nt(nt).name.clone(),
                        depth,
                    });
                }
            }
            Some((symbol, occurrence)) => {
                let key = (symbol.key(), *occurrence);
                match grouped.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, bucket)) => bucket.push((rule_index, &prod[1..])),
                    None => grouped.push((key, vec![(rule_index, &prod[1..])])),
                }
            }
        }
    }

    if node.end_rule.is_some() && node.repeat_rule.is_some() {
        return Err(GrammarError::EndRepeatConflict {
            nt: g.nt(nt).name.clone(),
            depth,
        });
    }

    for (key, bucket) in grouped {
        node.children.push((key, build(g, nt, depth + 1, bucket)?));
    }
    Ok(node)
}
