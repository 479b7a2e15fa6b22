//! `lexer.l`: one flex rule per terminal regexp.

use itertools::Itertools;
use metagen_emit::TemplateFile;

use crate::emit::EmitOptions;
use crate::error::GrammarError;
use crate::grammar::Grammar;
use crate::term::Term;

fn flex_rule(term: &Term, pattern: &crate::term::Regexp) -> String {
    let mut body = String::new();
    if let (Some(action), Some(var)) = (&pattern.action, &term.varname) {
        body.push_str(&format!("\tyylval.{var} = {action};\n"));
    }
    body.push_str(&format!("\treturn {};\n", term.token_id));
    format!("{} {{\n{body}}}\n", pattern.pattern)
}

/// Emit the `lexer.l` artifact. Terminals are ordered by ascending
/// priority, so literal keywords precede the identifier rule that would
/// otherwise swallow them.
pub fn emit_lexer(g: &Grammar, opts: &EmitOptions) -> Result<String, GrammarError> {
    let template = TemplateFile::load(&opts.template_dir.join("lexer.template.l"))?;

    let mut terms: Vec<&Term> = g.terms().map(|(_, t)| t).collect();
    terms.sort_by_key(|t| t.priority);

    let rules = terms
        .iter()
        .flat_map(|term| term.regexps.iter().map(|re| flex_rule(term, re)))
        .join("\n");

    Ok(template.render(&[("RULES", rules + "\n")])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_rules_assign_yylval() {
        let mut g = Grammar::new();
        let int_t = g.terminal("INT", "num", "signed long int");
        g.term_mut(int_t)
            .add_regexp("{DIGIT}+", Some("strtol(yytext, NULL, 10)"), None);
        let rule = flex_rule(g.term(int_t), &g.term(int_t).regexps[0]);
        assert_eq!(
            rule,
            "{DIGIT}+ {\n\tyylval.num = strtol(yytext, NULL, 10);\n\treturn T__INT;\n}\n"
        );
    }

    #[test]
    fn literals_sort_before_identifiers() {
        let mut g = Grammar::new();
        let id = g.terminal("NAME", "str", "char *");
        g.term_mut(id).priority = 10;
        g.term_mut(id)
            .add_regexp("{IDENTIFIER}", Some("mk_unique_string(yytext)"), None);
        g.literal("while");

        let mut terms: Vec<&Term> = g.terms().map(|(_, t)| t).collect();
        terms.sort_by_key(|t| t.priority);
        assert_eq!(terms[0].token_id, "T_L_WHILE");
        assert_eq!(terms[1].token_id, "T__NAME");
    }
}
