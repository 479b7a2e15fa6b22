//! `parser.h`: token numbering, the `yylval` layout, and the exported
//! parser prototypes.

use std::collections::BTreeMap;

use itertools::Itertools;
use metagen_emit::TemplateFile;
use tracing::debug;

use crate::emit::EmitOptions;
use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::layout::FIRST_TOKEN_ID;

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

/// Render one `yylval` member, folding pointer stars into the field name.
fn union_member(field: &str, c_type: &str) -> String {
    let mut ty = c_type.trim_end().to_owned();
    let mut name = field.to_owned();
    while ty.ends_with('*') {
        ty.pop();
        ty.truncate(ty.trim_end().len());
        name.insert(0, '*');
    }
    format!("\t{ty} {name};")
}

/// Two-line parse-function prototype, `static` unless exported.
pub(crate) fn rule_prototype(g: &Grammar, nt: crate::ast::NtId, trail: &str) -> Result<String, GrammarError> {
    let storage = g
        .nt_storage(nt)
        .ok_or_else(|| GrammarError::UnresolvedStorage {
            nt: g.nt(nt).name.clone(),
        })?;
    let prefix = if g.is_exported(nt) { "" } else { "static " };
    Ok(format!(
        "{prefix}int\n{}({storage} *result){trail}",
        g.nt(nt).parse_fn()
    ))
}

/// Emit the `parser.h` artifact.
pub fn emit_parser_header(g: &Grammar, opts: &EmitOptions) -> Result<String, GrammarError> {
    let template = TemplateFile::load(&opts.template_dir.join("parser.template.h"))?;

    // Shared yylval layout; the parser's own node slot comes first.
    let mut values: BTreeMap<String, String> = BTreeMap::new();
    values.insert("node".to_owned(), "ast_node_t*".to_owned());

    let mut terms: Vec<&crate::term::Term> = g.terms().map(|(_, t)| t).collect();
    terms.sort_by(|a, b| a.token_id.cmp(&b.token_id));

    let mut tokens = Vec::new();
    let mut next = FIRST_TOKEN_ID;
    for term in terms {
        if let (Some(var), Some(ty)) = (&term.varname, &term.c_type) {
            add_unique(&mut values, var, ty)?;
        }
        if term.has_symbolic_token_id() {
            tokens.push(format!("{} = 0x{next:x}", term.token_id));
            next += 1;
        }
    }
    debug!(tokens = tokens.len(), "numbered symbolic tokens");

    let token_text = tokens.iter().map(|t| format!("\t{t}")).join(",\n") + "\n";
    let value_text = values
        .iter()
        .map(|(field, ty)| union_member(field, ty))
        .join("\n")
        + "\n";
    let decl_text = g
        .exported()
        .iter()
        .map(|nt| rule_prototype(g, *nt, ";"))
        .collect::<Result<Vec<_>, _>>()?
        .join("\n");

    Ok(template.render(&[
        ("TOKENS", token_text),
        ("VALUES", value_text),
        ("PARSER_DECLS", decl_text),
    ])?)
}
