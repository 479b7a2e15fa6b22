//! `unparser.c`: switch arms printing AST tags, flags, builtin names, and
//! value nodes.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use metagen_emit::TemplateFile;

use crate::ast::{AstGen, NODE_PREFIX};
use crate::emit::EmitOptions;
use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::term::TermId;

fn fputs_case(tag: &str, text: &str) -> String {
    format!("\tcase {tag}:\n\t\tfputs(\"{text}\", file);\n\t\tbreak;")
}

/// Emit the `unparser.c` artifact.
pub fn emit_unparser(g: &Grammar, opts: &EmitOptions) -> Result<String, GrammarError> {
    let template = TemplateFile::load(&opts.template_dir.join("unparser.template.c"))?;

    // Tag name by full tag, split into value and non-value nodes; builtins
    // by name. Only constructions that reserve their own tag participate;
    // builtin references share AST_VALUE_ID and are printed by id instead.
    let mut value_terms: BTreeMap<String, TermId> = BTreeMap::new();
    let mut tags: BTreeMap<String, String> = BTreeMap::new();
    let mut builtins: BTreeSet<String> = BTreeSet::new();

    for rule in g.rules() {
        for node in rule.astgen.self_and_sub() {
            if node.has_ast_representation() || matches!(node, AstGen::TermRef(_)) {
                if let (Some(full), Some(name)) =
                    (g.astgen_ast_full_name(node), g.astgen_ast_name(node))
                {
                    tags.insert(full.clone(), name);
                    if let AstGen::TermRef(id) = node {
                        if g.astgen_value_node(node).is_some() {
                            value_terms.insert(full, *id);
                        }
                    }
                }
            }
            if let Some(name) = node.builtin_name() {
                builtins.insert(name.to_owned());
            }
        }
    }

    let print_tags = g
        .extra_node_types()
        .iter()
        .map(|name| fputs_case(&format!("{NODE_PREFIX}{name}"), name))
        .chain(tags.iter().map(|(full, name)| fputs_case(full, name)))
        .join("\n");

    let print_flags = g
        .attrs()
        .iter()
        .sorted()
        .map(|name| format!("\tif (ty & AST_FLAG_{name}) fputs(\"#{name}\", file);"))
        .join("\n");

    let print_ids = builtins
        .iter()
        .map(|name| fputs_case(&format!("BUILTIN_OP_{name}"), name))
        .join("\n");

    let print_vnodes = value_terms
        .iter()
        .map(|(full, id)| {
            let term = g.term(*id);
            format!(
                "\tcase {full}:\n\t\tfprintf(file, \"{}\", node->v.{});\n\t\tbreak;",
                term.format_string,
                term.varname.as_deref().unwrap_or_default()
            )
        })
        .join("\n");

    Ok(template.render(&[
        ("PRINT_TAGS", print_tags),
        ("PRINT_FLAGS", print_flags),
        ("PRINT_IDS", print_ids),
        ("PRINT_VNODES", print_vnodes),
    ])?)
}
