//! `ast.h`: node tags, attribute flags, the value union, and builtin ids.

use itertools::Itertools;
use metagen_emit::TemplateFile;

use crate::emit::EmitOptions;
use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::layout::compute_layout;

fn pad_to(name: &str, width: usize) -> String {
    let padding = width.saturating_sub(name.len());
    " ".repeat(padding)
}

/// Emit the `ast.h` artifact.
pub fn emit_ast_header(g: &Grammar, opts: &EmitOptions) -> Result<String, GrammarError> {
    let template = TemplateFile::load(&opts.template_dir.join("ast.template.h"))?;
    let layout = compute_layout(g)?;

    let tag_width = layout
        .node_defines
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    let node_types = layout
        .node_defines
        .iter()
        .map(|(name, value)| format!("#define {name}{} 0x{value:02x}", pad_to(name, tag_width)))
        .join("\n");

    let getters = layout
        .value_getters
        .iter()
        .map(|(getter, field)| {
            format!("#define AV_{getter}(n) (((ast_value_node_t *)(n))->v.{field})")
        })
        .join("\n");

    let flag_width = layout
        .flags
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    let flags = layout
        .flags
        .iter()
        .map(|(name, mask)| format!("#define {name}{} 0x{mask:04x}", pad_to(name, flag_width)))
        .join("\n");

    let union_members = layout
        .value_union
        .iter()
        .map(|(field, c_type)| format!("\t{c_type} {field};"))
        .join("\n");

    let builtin_width = layout
        .builtins
        .iter()
        .map(|(name, _)| name.len())
        .max()
        .unwrap_or(0);
    let builtins = layout
        .builtins
        .iter()
        .map(|(name, id)| format!("#define {name}{} {id}", pad_to(name, builtin_width)))
        .join("\n")
        + &format!("\n\n#define BUILTIN_OPS_NR {}\n", layout.builtins.len());

    Ok(template.render(&[
        ("NODE_TYPES", node_types),
        ("AV_VALUE_GETTERS", getters),
        ("AV_FLAGS", flags),
        ("VALUE_UNION", union_members),
        ("BUILTIN_IDS", builtins),
    ])?)
}
