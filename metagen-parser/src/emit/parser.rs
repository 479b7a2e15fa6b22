//! `parser.c`: the recursive-descent parser.
//!
//! Every nonterminal becomes a function returning 0/1 with an out-parameter
//! for its result storage. The function body walks the nonterminal's
//! decision tree: terminals recognize by consuming a token, nonterminals by
//! calling their parse function, chained with `else if` so branches stay
//! exclusive. Where no branch matches, the walker either pushes consumed
//! terminals back and jumps to the failure label, or reports a syntax error
//! when a nonterminal on the path makes backtracking impossible. Rules
//! rewritten for left recursion fold through a label/goto loop.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use itertools::Itertools;
use metagen_emit::{cline, CWriter, TemplateFile};
use tracing::debug;

use crate::ast::NtId;
use crate::emit::decls::rule_prototype;
use crate::emit::EmitOptions;
use crate::error::GrammarError;
use crate::grammar::{Grammar, Rule, Symbol, SymbolKey};
use crate::preprocess::check_left_recursion;
use crate::tree::{decision_tree, DecisionTree};

/// Emit the `parser.c` artifact.
pub fn emit_parser_source(g: &Grammar, opts: &EmitOptions) -> Result<String, GrammarError> {
    let template = TemplateFile::load(&opts.template_dir.join("parser.template.c"))?;
    Ok(template.render(&[
        ("VALUE_TOKEN_DECODING", value_token_decoding(g)),
        ("PARSING", build_parse_rules(g, opts)?),
    ])?)
}

/// Switch arms turning a just-accepted value token into its value node.
fn value_token_decoding(g: &Grammar) -> String {
    let mut cases: BTreeSet<(String, String, String)> = BTreeSet::new();
    for rule in g.rules() {
        for node in rule.astgen.self_and_sub() {
            if let crate::ast::AstGen::TermRef(id) = node {
                let term = g.term(*id);
                if term.has_symbolic_token_id() {
                    if let Some((_, field)) = term.value_node() {
                        cases.insert((term.token_id.clone(), term.ast_full_name(), field));
                    }
                }
            }
        }
    }
    cases
        .iter()
        .map(|(token, tag, field)| {
            format!(
                "\tcase {token}:\n\t\t*node_ptr = SETLINE(value_node_alloc_generic({tag}, (ast_value_union_t) {{ .{field} = yylval.{field} }}));\n\t\tbreak;"
            )
        })
        .join("\n")
}

/// All parse-function prototypes followed by their definitions.
fn build_parse_rules(g: &Grammar, opts: &EmitOptions) -> Result<String, GrammarError> {
    check_left_recursion(g)?;

    let mut w = CWriter::new();
    let lhs_list = g.lhs_list();
    for &lhs in &lhs_list {
        w.raw_line(rule_prototype(g, lhs, ";")?);
    }
    w.blank();
    for &lhs in &lhs_list {
        debug!(nt = %g.nt(lhs).name, "emitting parse function");
        emit_nt_function(g, lhs, opts, &mut w)?;
    }
    Ok(w.finish())
}

struct FnCtx<'g> {
    g: &'g Grammar,
    lhs: NtId,
    rules: Vec<&'g Rule>,
    env: BTreeMap<(SymbolKey, usize), String>,
    var_symbol: HashMap<String, Symbol>,
    fail_label: String,
    loop_label: String,
    trace: bool,
}

impl<'g> FnCtx<'g> {
    fn trace_line(&self, w: &mut CWriter, message: &str) {
        if self.trace {
            cline!(w, "fprintf(stderr, \"{message}\\n\");");
        }
    }

    fn var_for(&self, key: &SymbolKey, index: usize) -> Option<&String> {
        self.env.get(&(*key, index))
    }

    /// `accept(...)` / `parse_...(...)` condition for a keyed recognizer.
    fn recognizer(&self, key: &SymbolKey, index: usize) -> String {
        let var = self.var_for(key, index);
        let var_ref = var.map(|v| format!("&{v}")).unwrap_or_else(|| "NULL".to_owned());
        match key {
            SymbolKey::Term(id) => format!("accept({}, {var_ref})", self.g.term(*id).token_id),
            SymbolKey::Nt(id) => format!("{}({var_ref})", self.g.nt(*id).parse_fn()),
            SymbolKey::Repeat => unreachable!("repeats never key a decision branch"),
        }
    }

    fn push_back(&self, key: &SymbolKey, index: usize) -> String {
        match key {
            SymbolKey::Term(id) => {
                let var = self
                    .var_for(key, index)
                    .cloned()
                    .unwrap_or_else(|| "NULL".to_owned());
                format!("push_back({}, {var});", self.g.term(*id).token_id)
            }
            _ => unreachable!("only terminals are pushed back"),
        }
    }

    fn key_error_description(&self, key: &SymbolKey) -> String {
        match key {
            SymbolKey::Term(id) => self.g.term(*id).error_description().to_owned(),
            SymbolKey::Nt(id) => self.g.nt(*id).error_description.clone(),
            SymbolKey::Repeat => String::new(),
        }
    }

    fn rule_display(&self, rule: &Rule) -> String {
        format!(
            "{} ::= {}",
            self.g.nt(rule.lhs).name,
            rule.rhs.iter().map(|s| self.g.symbol_display(s)).join(" ")
        )
    }

    fn gen(
        &self,
        node: &DecisionTree,
        w: &mut CWriter,
        path: &mut Vec<(SymbolKey, usize)>,
    ) -> Result<(), GrammarError> {
        let mut open = false;
        for ((key, index), subtree) in &node.children {
            let prefix = if open { "} else " } else { "" };
            cline!(w, "{prefix}if ({}) {{", self.recognizer(key, *index));
            if matches!(key, SymbolKey::Nt(id) if self.g.nt(self.lhs).primed == Some(*id)) {
                w.raw_line(format!("{}:", self.loop_label));
            }
            path.push((*key, *index));
            w.indent();
            self.gen(subtree, w, path)?;
            w.dedent();
            path.pop();
            open = true;
        }

        if !node.children.is_empty() && node.end_rule.is_none() && node.repeat_rule.is_none() {
            // No shorter rule applies here, so a miss is an error or a
            // backtrack. Backtracking is only sound over terminals.
            w.line("} else {");
            w.indent();
            let only_terminals = path.iter().all(|(k, _)| matches!(k, SymbolKey::Term(_)));
            if only_terminals {
                for (key, index) in path.iter() {
                    w.line(self.push_back(key, *index));
                }
            } else {
                let expected = node
                    .children
                    .iter()
                    .map(|((key, _), _)| self.key_error_description(key))
                    .join(" or ");
                let after = path
                    .last()
                    .map(|(key, _)| self.key_error_description(key))
                    .unwrap_or_default();
                cline!(
                    w,
                    "parse_error(\"Syntax error in {}: expected {expected} after {after}\");",
                    self.g.nt(self.lhs).error_description
                );
            }
            cline!(w, "goto {};", self.fail_label);
            w.dedent();
            w.line("}");
        } else if open {
            w.line("}");
        }

        if let Some(index) = node.repeat_rule {
            self.emit_repeat(self.rules[index], w)?;
        }
        if let Some(index) = node.end_rule {
            self.emit_end_rule(self.rules[index], w, path)?;
        }
        Ok(())
    }

    /// The vector loop of a repetition rule, then the rule's construction.
    fn emit_repeat(&self, rule: &Rule, w: &mut CWriter) -> Result<(), GrammarError> {
        let Symbol::Repeat { nt, separator } = rule.rhs[0] else {
            unreachable!("repeat rules start with a Repeat symbol");
        };
        let vector = self
            .var_for(&SymbolKey::Repeat, 0)
            .cloned()
            .unwrap_or_else(|| "NULL".to_owned());

        w.line("ast_node_t *tmp_0;");
        cline!(w, "while ({}(&tmp_0)) {{", self.g.nt(nt).parse_fn());
        w.indented(|w| {
            cline!(w, "add_to_vector(&{vector}, tmp_0);");
            if let Some(sep) = separator {
                cline!(w, "if (!accept({}, NULL)) {{", self.g.term(sep).token_id);
                w.indented(|w| w.line("break;"));
                w.line("}");
            }
        });
        w.line("}");

        let mut lookup = |key: &SymbolKey, index: usize| -> Result<String, GrammarError> {
            self.var_for(key, index)
                .cloned()
                .ok_or_else(|| GrammarError::UnboundReference {
                    nt: self.g.nt(self.lhs).name.clone(),
                    symbol: format!("{key:?}"),
                    index,
                })
        };
        let expr = self.g.astgen_emit(&rule.astgen, &mut lookup)?;
        cline!(w, "*result = {expr};");
        self.trace_line(w, &format!("Matched {}", self.rule_display(rule)));
        w.line("return 1;");
        Ok(())
    }

    /// Build the AST at an end-of-rule leaf: each bound variable moves into
    /// the construction on first use and clones on reuse; leftovers are
    /// freed. Rewritten left-recursive rules feed the result back through
    /// the loop label instead of returning.
    fn emit_end_rule(
        &self,
        rule: &Rule,
        w: &mut CWriter,
        path: &[(SymbolKey, usize)],
    ) -> Result<(), GrammarError> {
        let bound: Vec<String> = path
            .iter()
            .filter_map(|key| self.env.get(key).cloned())
            .collect();
        let bound_set: BTreeSet<String> = bound.iter().cloned().collect();
        let mut consumed: BTreeSet<String> = BTreeSet::new();

        let mut lookup = |key: &SymbolKey, index: usize| -> Result<String, GrammarError> {
            let var = self.var_for(key, index).ok_or_else(|| {
                GrammarError::UnboundReference {
                    nt: self.g.nt(self.lhs).name.clone(),
                    symbol: format!("{key:?}"),
                    index,
                }
            })?;
            if !bound_set.contains(var) {
                return Err(GrammarError::UnboundReference {
                    nt: self.g.nt(self.lhs).name.clone(),
                    symbol: format!("{key:?}"),
                    index,
                });
            }
            if consumed.insert(var.clone()) {
                Ok(var.clone())
            } else {
                Ok(self.g.symbol_clone_expr(&self.var_symbol[var], var))
            }
        };
        let expr = self.g.astgen_emit(&rule.astgen, &mut lookup)?;
        cline!(w, "*result = {expr};");

        for var in &bound {
            if !consumed.contains(var) {
                if let Some(stmt) = self.g.symbol_free_stmt(&self.var_symbol[var], var) {
                    w.line(stmt);
                }
            }
        }

        if let Some(prime) = self.g.nt(self.lhs).primed {
            if path.len() > 1 {
                let prime_var = self
                    .var_for(&SymbolKey::Nt(prime), 0)
                    .cloned()
                    .unwrap_or_else(|| "NULL".to_owned());
                cline!(w, "{prime_var} = *result;");
                self.trace_line(
                    w,
                    &format!("Repeating left-recursive {}", self.rule_display(rule)),
                );
                cline!(w, "goto {};", self.loop_label);
                return Ok(());
            }
        }

        self.trace_line(w, &format!("Matched {}", self.rule_display(rule)));
        w.line("return 1;");
        Ok(())
    }
}

fn emit_nt_function(
    g: &Grammar,
    lhs: NtId,
    opts: &EmitOptions,
    w: &mut CWriter,
) -> Result<(), GrammarError> {
    let rules = g.rules_for(lhs);
    let tree = decision_tree(g, lhs, &rules)?;
    let fn_name = g.nt(lhs).parse_fn();

    w.raw_line(rule_prototype(g, lhs, "")?);
    w.raw_line("{");
    w.indent();

    if opts.trace {
        cline!(w, "fprintf(stderr, \"Trying {}\\n\");", g.nt(lhs).name);
    }

    // Zero-initialize one slot per (symbol, occurrence) used by any rule,
    // so branches reached out of order still have defined storage.
    let mut env: BTreeMap<(SymbolKey, usize), String> = BTreeMap::new();
    let mut var_symbol: HashMap<String, Symbol> = HashMap::new();
    for rule in &rules {
        for (sym, occ) in &rule.indexed_rhs {
            let key = (sym.key(), *occ);
            if env.contains_key(&key) {
                continue;
            }
            let (Some(storage), Some(init)) =
                (g.symbol_storage(sym), g.symbol_storage_init(sym))
            else {
                continue;
            };
            let name = format!("v_{}_{}", g.symbol_display(sym), occ);
            cline!(w, "{storage} {name} = {init};");
            var_symbol.insert(name.clone(), *sym);
            env.insert(key, name);
        }
    }

    let ctx = FnCtx {
        g,
        lhs,
        rules,
        env,
        var_symbol,
        fail_label: format!("{fn_name}_fail"),
        loop_label: format!("{fn_name}_loop"),
        trace: opts.trace,
    };

    let mut path = Vec::new();
    ctx.gen(&tree, w, &mut path)?;

    w.dedent();
    w.raw_line(format!("{}:", ctx.fail_label));
    w.indent();
    if let Some(token) = &g.nt(lhs).fail_handler {
        cline!(w, "clear_parse_error({token});");
        cline!(w, "return {fn_name}(result);");
    } else {
        ctx.trace_line(w, &format!("failed {}", g.nt(lhs).name));
        w.line("return 0;");
    }
    w.dedent();
    w.raw_line("}");
    w.blank();
    w.blank();
    Ok(())
}
