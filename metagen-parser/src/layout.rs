//! AST tag and attribute-flag packing.
//!
//! Every AST node stores its type tag and its attribute flags in one
//! 16-bit word: the tag in the low bits, one flag bit per attribute above
//! them. The tag width is the bit length of the total node-type count;
//! whatever remains holds the flags. Value-node tags are assigned before
//! non-value tags so `AST_VALUE_MAX` can separate the two ranges.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{AstGen, BUILTIN_PREFIX, FLAG_PREFIX, NODE_PREFIX};
use crate::error::GrammarError;
use crate::grammar::Grammar;

/// Width of the packed tag-and-flags word.
pub const NODE_WORD_BITS: u32 = 16;

/// Token id the first symbolic token is numbered with.
pub const FIRST_TOKEN_ID: u32 = 0x102;

/// The computed numbering of tags, flags, values, and builtins.
#[derive(Debug)]
pub struct AstLayout {
    /// `(name, value)` defines in emission order: `AST_ILLEGAL`,
    /// `AST_NODE_MASK`, the value tags, `AST_VALUE_MAX`, then the
    /// non-value tags.
    pub node_defines: Vec<(String, u16)>,
    /// Mask selecting the tag bits of the packed word.
    pub node_mask: u16,
    /// Bits used by the tag.
    pub tag_bits: u32,
    /// Bits left for attribute flags.
    pub flag_bits: u32,
    /// `(field, c_type)` members of the value union, sorted by field.
    pub value_union: Vec<(String, String)>,
    /// `(getter, field)` pairs for the value accessors, sorted by getter.
    pub value_getters: Vec<(String, String)>,
    /// `(flag define, mask)` in attribute registration order.
    pub flags: Vec<(String, u16)>,
    /// `(builtin define, id)` in sorted name order, ids descending from −1.
    pub builtins: Vec<(String, i64)>,
}

fn add_unique(
    map: &mut BTreeMap<String, String>,
    key: &str,
    value: &str,
) -> Result<(), GrammarError> {
    match map.get(key) {
        Some(existing) if existing != value => Err(GrammarError::InconsistentTypes {
            varname: key.to_owned(),
            first: existing.clone(),
            second: value.to_owned(),
        }),
        Some(_) => Ok(()),
        None => {
            map.insert(key.to_owned(), value.to_owned());
            Ok(())
        }
    }
}

/// Compute the layout from the (preprocessed) grammar.
pub fn compute_layout(g: &Grammar) -> Result<AstLayout, GrammarError> {
    let mut values: BTreeMap<String, String> = BTreeMap::new();
    let mut getters: BTreeMap<String, String> = BTreeMap::new();
    getters.insert("ID".to_owned(), "ident".to_owned());

    let mut value_tags: BTreeSet<String> = BTreeSet::new();
    let mut nonvalue_tags: BTreeSet<String> = BTreeSet::new();
    let mut builtin_names: BTreeSet<String> = BTreeSet::new();

    for rule in g.rules() {
        for node in rule.astgen.self_and_sub() {
            let value_info = g.astgen_value_node(node);
            if let Some((c_type, field)) = &value_info {
                add_unique(&mut values, field, c_type)?;
                if !matches!(node, AstGen::Builtin(_)) {
                    let getter = g
                        .astgen_ast_name(node)
                        .unwrap_or_else(|| field.to_uppercase());
                    add_unique(&mut getters, &getter, field)?;
                }
            }

            if let Some(full) = g.astgen_ast_full_name(node) {
                if value_info.is_some() {
                    value_tags.insert(full);
                } else {
                    nonvalue_tags.insert(full);
                }
            }

            if let Some(builtin) = node.builtin_name() {
                builtin_names.insert(format!("{BUILTIN_PREFIX}{builtin}"));
            }
        }
    }

    for name in g.extra_builtins() {
        builtin_names.insert(format!("{BUILTIN_PREFIX}{name}"));
    }
    for name in g.extra_node_types() {
        nonvalue_tags.insert(format!("{NODE_PREFIX}{name}"));
    }

    // Tag width from the total node-type count: constructed nodes, one
    // value node per terminal, plus the identifier and illegal tags.
    let total = g.cons_names().len() + g.terms().count() + 2;
    let tag_bits = usize::BITS - total.leading_zeros();
    let flag_bits = NODE_WORD_BITS - tag_bits;
    let node_mask = (0xffffu32 >> flag_bits) as u16;

    let attrs = g.attrs();
    if (flag_bits as usize) < attrs.len() {
        return Err(GrammarError::FlagBitsExhausted {
            need: attrs.len(),
            have: flag_bits as usize,
        });
    }

    let flags = attrs
        .iter()
        .enumerate()
        .map(|(index, name)| {
            let bit = tag_bits + index as u32;
            (format!("{FLAG_PREFIX}{name}"), 1u16 << bit)
        })
        .collect();

    let mut node_defines = Vec::new();
    let mut counter: u16 = 0;
    node_defines.push(("AST_ILLEGAL".to_owned(), counter));
    counter += 1;
    node_defines.push(("AST_NODE_MASK".to_owned(), node_mask));
    for tag in &value_tags {
        node_defines.push((tag.clone(), counter));
        counter += 1;
    }
    node_defines.push(("AST_VALUE_MAX".to_owned(), counter - 1));
    for tag in &nonvalue_tags {
        node_defines.push((tag.clone(), counter));
        counter += 1;
    }

    let builtins = builtin_names
        .iter()
        .enumerate()
        .map(|(index, name)| (name.clone(), -1 - index as i64))
        .collect();

    Ok(AstLayout {
        node_defines,
        node_mask,
        tag_bits,
        flag_bits,
        value_union: values.into_iter().collect(),
        value_getters: getters.into_iter().collect(),
        flags,
        builtins,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Symbol;

    fn sample_grammar() -> Grammar {
        let mut g = Grammar::new();
        let int_t = g.terminal("INT", "num", "signed long int");
        g.term_mut(int_t).format_string = "%li".to_owned();
        let valexpr = g.nonterminal("valexpr", "value");
        let expr = g.nonterminal("expr", "expression");
        let plus = g.literal("+");
        g.add_rule(valexpr, vec![Symbol::Term(int_t)], AstGen::TermRef(int_t))
            .unwrap();
        g.add_rule(
            expr,
            vec![Symbol::Nt(valexpr), Symbol::Term(plus), Symbol::Nt(valexpr)],
            AstGen::cons(
                "FUNAPP",
                vec![
                    AstGen::Builtin("ADD".to_owned()),
                    AstGen::cons(
                        "ACTUALS",
                        vec![AstGen::NtRef(valexpr, 0), AstGen::NtRef(valexpr, 1)],
                    ),
                ],
            ),
        )
        .unwrap();
        g.add_rule(expr, vec![Symbol::Nt(valexpr)], AstGen::NtRef(valexpr, 0))
            .unwrap();
        g
    }

    #[test]
    fn value_tags_precede_nonvalue_tags() {
        let g = sample_grammar();
        let layout = compute_layout(&g).unwrap();
        let names: Vec<&str> = layout.node_defines.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "AST_ILLEGAL",
                "AST_NODE_MASK",
                "AST_VALUE_ID",
                "AST_VALUE_INT",
                "AST_VALUE_MAX",
                "AST_NODE_ACTUALS",
                "AST_NODE_FUNAPP",
            ]
        );
        let by_name: BTreeMap<&str, u16> = layout
            .node_defines
            .iter()
            .map(|(n, v)| (n.as_str(), *v))
            .collect();
        assert_eq!(by_name["AST_ILLEGAL"], 0);
        assert_eq!(by_name["AST_VALUE_ID"], 1);
        assert_eq!(by_name["AST_VALUE_INT"], 2);
        assert_eq!(by_name["AST_VALUE_MAX"], 2);
        assert_eq!(by_name["AST_NODE_ACTUALS"], 3);
    }

    #[test]
    fn mask_and_flags_partition_the_word() {
        let g = sample_grammar();
        let layout = compute_layout(&g).unwrap();
        // 2 cons names + 2 terminals + 2 = 6 node types -> 3 tag bits.
        assert_eq!(layout.tag_bits, 3);
        assert_eq!(layout.flag_bits, 13);
        assert_eq!(layout.node_mask, 0x0007);
    }

    #[test]
    fn builtin_ids_descend_from_minus_one() {
        let mut g = sample_grammar();
        g.register_builtin("SELF");
        let layout = compute_layout(&g).unwrap();
        let names: Vec<&str> = layout.builtins.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["BUILTIN_OP_ADD", "BUILTIN_OP_SELF"]);
        let ids: Vec<i64> = layout.builtins.iter().map(|(_, id)| *id).collect();
        assert_eq!(ids, vec![-1, -2]);
    }

    #[test]
    fn too_many_attributes_exhaust_the_flag_bits() {
        let mut g = sample_grammar();
        for i in 0..14 {
            g.attribute(&format!("A{i}"));
        }
        let err = compute_layout(&g).unwrap_err();
        assert!(matches!(
            err,
            GrammarError::FlagBitsExhausted { need: 14, have: 13 }
        ));
    }
}
