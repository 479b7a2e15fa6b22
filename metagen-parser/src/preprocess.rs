//! Grammar preprocessing: the rule rewrites that make the grammar
//! parseable by recursive descent.
//!
//! Two passes run before emission. Immediate left recursion is eliminated
//! by introducing a primed companion nonterminal and turning the recursive
//! productions into a fold loop; epsilon productions are eliminated by
//! duplicating every rule that mentions a nullable nonterminal, once per
//! droppable subset, substituting the epsilon's construction into the AST
//! action at the dropped occurrence. A final transitive-closure check
//! rejects any left recursion the rewrite cannot reach.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use itertools::Itertools;
use tracing::debug;

use crate::ast::{AstGen, NtId};
use crate::error::GrammarError;
use crate::grammar::{Grammar, Rule, Symbol, SymbolKey};

/// Run all preprocessing passes in order.
pub fn preprocess(g: &mut Grammar) -> Result<(), GrammarError> {
    resolve_left_recursion(g);
    remove_epsilon_rules(g);
    check_left_recursion(g)
}

/// Rewrite every immediately left-recursive nonterminal `A`:
///
/// ```text
///   A ::= A x | y        A  ::= A' x | A'
///                  =>    A' ::= y
/// ```
///
/// The `A' x` production is the loop body; the parser emitter turns it
/// into a label/goto fold. AST actions referring to the leading `A` are
/// redirected to `A'`.
pub fn resolve_left_recursion(g: &mut Grammar) {
    let recursive: Vec<NtId> = g
        .lhs_list()
        .into_iter()
        .filter(|&lhs| {
            g.rules_for(lhs)
                .iter()
                .any(|r| matches!(r.rhs.first(), Some(Symbol::Nt(id)) if *id == lhs))
        })
        .collect();

    for lhs in recursive {
        let prime_name = format!("{}__prime", g.nt(lhs).name);
        debug!(nt = %g.nt(lhs).name, prime = %prime_name, "rewriting immediate left recursion");
        let error_description = g.nt(lhs).error_description.clone();
        let fail_handler = g.nt(lhs).fail_handler.clone();
        let prime = g.nonterminal(&prime_name, &error_description);
        g.nt_mut(prime).fail_handler = fail_handler;
        g.nt_mut(lhs).primed = Some(prime);

        let mut extracted = Vec::new();
        let rules = g.rules_mut();
        let mut i = 0;
        while i < rules.len() {
            if rules[i].lhs == lhs {
                extracted.push(rules.remove(i));
            } else {
                i += 1;
            }
        }

        for rule in extracted {
            if matches!(rule.rhs.first(), Some(Symbol::Nt(id)) if *id == lhs) {
                let mut rhs = rule.rhs;
                rhs[0] = Symbol::Nt(prime);
                let astgen = rule.astgen.subst((lhs, 0), &AstGen::NtRef(prime, 0));
                g.push_rule(lhs, rhs, astgen, true);
            } else {
                g.push_rule(prime, rule.rhs, rule.astgen, false);
            }
        }

        // Defer to the primed nonterminal when no recursive production
        // matches.
        g.push_rule(lhs, vec![Symbol::Nt(prime)], AstGen::NtRef(prime, 0), false);
    }
}

/// Delete empty productions and fold their AST actions into every rule
/// that mentions the now-nullable nonterminal: one extra rule per
/// droppable subset of nullable occurrences, with kept occurrences
/// renumbered so the AST action's references stay valid.
pub fn remove_epsilon_rules(g: &mut Grammar) {
    let mut epsilon: HashMap<NtId, AstGen> = HashMap::new();
    {
        let rules = g.rules_mut();
        let mut i = 0;
        while i < rules.len() {
            if rules[i].rhs.is_empty() {
                let rule = rules.remove(i);
                epsilon.insert(rule.lhs, rule.astgen);
            } else {
                i += 1;
            }
        }
    }
    if epsilon.is_empty() {
        return;
    }

    let snapshot: Vec<Rule> = g.rules().to_vec();
    for rule in snapshot {
        let nullable: Vec<(usize, NtId, usize)> = rule
            .indexed_rhs
            .iter()
            .enumerate()
            .filter_map(|(pos, (sym, occ))| match sym {
                Symbol::Nt(id) if epsilon.contains_key(id) => Some((pos, *id, *occ)),
                _ => None,
            })
            .collect();
        if nullable.is_empty() {
            continue;
        }
        debug!(
            nt = %g.nt(rule.lhs).name,
            nullable = nullable.len(),
            "expanding nullable occurrences"
        );

        for mask in 1u32..(1 << nullable.len()) {
            let dropped: HashSet<usize> = nullable
                .iter()
                .enumerate()
                .filter(|(bit, _)| mask & (1 << *bit) != 0)
                .map(|(_, (pos, _, _))| *pos)
                .collect();

            let new_rhs: Vec<Symbol> = rule
                .rhs
                .iter()
                .enumerate()
                .filter(|(pos, _)| !dropped.contains(pos))
                .map(|(_, sym)| *sym)
                .collect();

            // One simultaneous substitution: dropped occurrences become the
            // epsilon's construction, kept occurrences of the same
            // nonterminal slide down to their new indices.
            let mut map: HashMap<(NtId, usize), AstGen> = HashMap::new();
            for (pos, nt, occ) in &nullable {
                if dropped.contains(pos) {
                    map.insert((*nt, *occ), epsilon[nt].clone());
                }
            }
            let mut new_counts: HashMap<SymbolKey, usize> = HashMap::new();
            for (pos, (sym, old_occ)) in rule.indexed_rhs.iter().enumerate() {
                if dropped.contains(&pos) {
                    continue;
                }
                let entry = new_counts.entry(sym.key()).or_insert(0);
                let new_occ = *entry;
                *entry += 1;
                if let Symbol::Nt(id) = sym {
                    if new_occ != *old_occ {
                        map.insert((*id, *old_occ), AstGen::NtRef(*id, new_occ));
                    }
                }
            }

            let new_astgen = rule.astgen.subst_nt_refs(&map);
            g.push_rule(rule.lhs, new_rhs, new_astgen, rule.self_recursive);
        }
    }
}

/// Reject any nonterminal that can still reach itself through the
/// "first right-hand-side nonterminal" relation.
pub fn check_left_recursion(g: &Grammar) -> Result<(), GrammarError> {
    let mut heads: BTreeMap<NtId, BTreeSet<NtId>> = BTreeMap::new();
    for rule in g.rules() {
        if let Some(Symbol::Nt(first)) = rule.rhs.first() {
            heads.entry(rule.lhs).or_default().insert(*first);
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        let frozen = heads.clone();
        for reachable in heads.values_mut() {
            for nt in reachable.clone() {
                if let Some(transitive) = frozen.get(&nt) {
                    for sub in transitive {
                        changed |= reachable.insert(*sub);
                    }
                }
            }
        }
    }

    let cycles: Vec<String> = heads
        .iter()
        .filter(|(nt, reachable)| reachable.contains(nt))
        .map(|(nt, reachable)| {
            format!(
                "{} in {{{}}}",
                g.nt(*nt).name,
                reachable.iter().map(|id| g.nt(*id).name.as_str()).join(", ")
            )
        })
        .collect();

    if cycles.is_empty() {
        Ok(())
    } else {
        Err(GrammarError::LeftRecursion {
            cycles: cycles.join("; "),
        })
    }
}
