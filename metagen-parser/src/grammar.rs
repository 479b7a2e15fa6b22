//! The grammar compilation context.
//!
//! One [`Grammar`] value owns every registry the generators read: the
//! terminal and nonterminal arenas, the rule list, interned literal
//! terminals, and the attribute/constructor/builtin name registries.
//! Everything is built during declaration, mutated only by the
//! preprocessing passes, and read-only during emission. All registries are
//! insertion-ordered or sorted so emitted text is deterministic.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::ast::{AstGen, NtId, BUILTIN_PREFIX, FLAG_PREFIX, NODE_PREFIX};
use crate::error::GrammarError;
use crate::term::{escape_literal, literal_name, Term, TermId};

/// A nonterminal.
#[derive(Debug, Clone)]
pub struct NtData {
    /// Grammar-level name; also names the parse function.
    pub name: String,
    /// Human-readable description for syntax errors.
    pub error_description: String,
    /// Token id to skip to when a parse of this nonterminal fails, if
    /// error recovery is configured.
    pub fail_handler: Option<String>,
    /// Companion nonterminal introduced by left-recursion elimination.
    pub primed: Option<NtId>,
}

impl NtData {
    /// Name of the emitted parse function.
    pub fn parse_fn(&self) -> String {
        format!("parse_{}", self.name)
    }
}

/// One element of a rule's right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// A terminal.
    Term(TermId),
    /// A nonterminal.
    Nt(NtId),
    /// Zero or more occurrences of a nonterminal, optionally separated.
    Repeat {
        /// The repeated nonterminal.
        nt: NtId,
        /// Separator terminal between items.
        separator: Option<TermId>,
    },
}

/// Occurrence-counting identity of a symbol: terminals by token identity,
/// nonterminals by name identity, and all repeats alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymbolKey {
    /// A terminal.
    Term(TermId),
    /// A nonterminal.
    Nt(NtId),
    /// Any repeat.
    Repeat,
}

impl Symbol {
    /// The occurrence-counting key of this symbol.
    pub fn key(&self) -> SymbolKey {
        match self {
            Symbol::Term(id) => SymbolKey::Term(*id),
            Symbol::Nt(id) => SymbolKey::Nt(*id),
            Symbol::Repeat { .. } => SymbolKey::Repeat,
        }
    }
}

/// A production rule with its AST construction.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Left-hand-side nonterminal.
    pub lhs: NtId,
    /// Right-hand side, in recognition order.
    pub rhs: Vec<Symbol>,
    /// AST construction applied when the rule completes.
    pub astgen: AstGen,
    /// Marked on the loop body of a rewritten left-recursive rule.
    pub self_recursive: bool,
    /// `rhs` annotated with per-key occurrence indices; the single source
    /// of truth for variable binding and decision-tree keys.
    pub indexed_rhs: Vec<(Symbol, usize)>,
}

fn index_rhs(rhs: &[Symbol]) -> Vec<(Symbol, usize)> {
    let mut counts: HashMap<SymbolKey, usize> = HashMap::new();
    rhs.iter()
        .map(|sym| {
            let n = counts.entry(sym.key()).or_insert(0);
            let index = *n;
            *n += 1;
            (*sym, index)
        })
        .collect()
}

/// The compilation context.
#[derive(Debug, Default)]
pub struct Grammar {
    terms: Vec<Term>,
    nts: Vec<NtData>,
    rules: Vec<Rule>,
    literals: HashMap<String, TermId>,
    used_literal_names: HashSet<String>,
    cons_names: BTreeSet<String>,
    attrs: Vec<String>,
    extra_builtins: BTreeSet<String>,
    extra_node_types: BTreeSet<String>,
    exported: Vec<NtId>,
}

impl Grammar {
    /// Empty grammar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a named terminal carrying a value.
    pub fn terminal(&mut self, name: &str, varname: &str, c_type: &str) -> TermId {
        let id = TermId(self.terms.len());
        self.terms.push(Term::named(name, varname, c_type));
        id
    }

    /// Intern a literal terminal (keyword or punctuation). Single
    /// characters identify themselves by their character literal; longer
    /// literals get a derived symbolic name.
    pub fn literal(&mut self, literal: &str) -> TermId {
        if let Some(id) = self.literals.get(literal) {
            return *id;
        }
        let (name, token_id) = if literal.chars().count() == 1 {
            (None, format!("'{literal}'"))
        } else {
            let name = literal_name(literal, &mut self.used_literal_names);
            let token_id = format!("T_L_{name}");
            (Some(name), token_id)
        };
        let mut term = Term {
            name,
            varname: None,
            c_type: None,
            token_id,
            regexps: Vec::new(),
            priority: -1,
            format_string: "ERROR".to_owned(),
            is_stringterm: true,
            error_name: Some(format!("'{literal}'")),
        };
        term.add_regexp(&escape_literal(literal), None, None);
        let id = TermId(self.terms.len());
        self.terms.push(term);
        self.literals.insert(literal.to_owned(), id);
        id
    }

    /// Declare a nonterminal.
    pub fn nonterminal(&mut self, name: &str, error_description: &str) -> NtId {
        let id = NtId(self.nts.len());
        self.nts.push(NtData {
            name: name.to_owned(),
            error_description: error_description.to_owned(),
            fail_handler: None,
            primed: None,
        });
        id
    }

    /// Register an attribute and return its construction.
    pub fn attribute(&mut self, name: &str) -> AstGen {
        if !self.attrs.iter().any(|a| a == name) {
            self.attrs.push(name.to_owned());
        }
        AstGen::Attr(name.to_owned())
    }

    /// Register a builtin that participates in numbering without appearing
    /// in any rule.
    pub fn register_builtin(&mut self, name: &str) {
        self.extra_builtins.insert(name.to_owned());
    }

    /// Register a non-value node type that participates in numbering
    /// without appearing in any rule.
    pub fn register_node_type(&mut self, name: &str) {
        self.extra_node_types.insert(name.to_owned());
    }

    /// Mark a nonterminal's parse function as part of the public parser
    /// interface.
    pub fn export(&mut self, nt: NtId) {
        self.exported.push(nt);
    }

    /// Add a rule.
    pub fn add_rule(
        &mut self,
        lhs: NtId,
        rhs: Vec<Symbol>,
        astgen: AstGen,
    ) -> Result<(), GrammarError> {
        if matches!(astgen, AstGen::Repetition(_))
            && !(rhs.len() == 1 && matches!(rhs[0], Symbol::Repeat { .. }))
        {
            return Err(GrammarError::RepetitionWithoutRepeat {
                nt: self.nt(lhs).name.clone(),
            });
        }

        // All rules of one nonterminal must agree on their result storage;
        // a storage not yet resolvable counts as a wildcard.
        if let Some(first) = self.rules.iter().find(|r| r.lhs == lhs) {
            let a = self.astgen_storage(&first.astgen);
            let b = self.astgen_storage(&astgen);
            if let (Some(a), Some(b)) = (a, b) {
                if a != b {
                    return Err(GrammarError::StorageMismatch {
                        nt: self.nt(lhs).name.clone(),
                        first: a.to_owned(),
                        second: b.to_owned(),
                    });
                }
            }
        }

        self.register_astgen_names(&astgen);
        self.rules.push(Rule {
            lhs,
            rhs: rhs.clone(),
            astgen,
            self_recursive: false,
            indexed_rhs: index_rhs(&rhs),
        });
        Ok(())
    }

    pub(crate) fn push_rule(&mut self, lhs: NtId, rhs: Vec<Symbol>, astgen: AstGen, self_recursive: bool) {
        self.register_astgen_names(&astgen);
        self.rules.push(Rule {
            lhs,
            rhs: rhs.clone(),
            astgen,
            self_recursive,
            indexed_rhs: index_rhs(&rhs),
        });
    }

    fn register_astgen_names(&mut self, astgen: &AstGen) {
        let mut names = Vec::new();
        let mut attrs = Vec::new();
        for node in astgen.self_and_sub() {
            match node {
                AstGen::Cons { name, .. } | AstGen::Repetition(name) => names.push(name.clone()),
                AstGen::Attr(name) => attrs.push(name.clone()),
                _ => {}
            }
        }
        self.cons_names.extend(names);
        for attr in attrs {
            if !self.attrs.iter().any(|a| *a == attr) {
                self.attrs.push(attr);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries.

    /// Terminal by id.
    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id.0]
    }

    /// Mutable terminal access, for declaration-time configuration.
    pub fn term_mut(&mut self, id: TermId) -> &mut Term {
        &mut self.terms[id.0]
    }

    /// Nonterminal by id.
    pub fn nt(&self, id: NtId) -> &NtData {
        &self.nts[id.0]
    }

    /// Mutable nonterminal access.
    pub fn nt_mut(&mut self, id: NtId) -> &mut NtData {
        &mut self.nts[id.0]
    }

    /// All terminals in declaration order.
    pub fn terms(&self) -> impl Iterator<Item = (TermId, &Term)> {
        self.terms.iter().enumerate().map(|(i, t)| (TermId(i), t))
    }

    /// All nonterminals in declaration order.
    pub fn nts(&self) -> impl Iterator<Item = (NtId, &NtData)> {
        self.nts.iter().enumerate().map(|(i, n)| (NtId(i), n))
    }

    /// The rule list, in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub(crate) fn rules_mut(&mut self) -> &mut Vec<Rule> {
        &mut self.rules
    }

    /// Rules for one nonterminal, preserving list order.
    pub fn rules_for(&self, nt: NtId) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.lhs == nt).collect()
    }

    /// Nonterminals that have at least one rule, in declaration order.
    pub fn lhs_list(&self) -> Vec<NtId> {
        self.nts()
            .map(|(id, _)| id)
            .filter(|id| self.rules.iter().any(|r| r.lhs == *id))
            .collect()
    }

    /// Whether a nonterminal's parse function is public.
    pub fn is_exported(&self, nt: NtId) -> bool {
        self.exported.contains(&nt)
    }

    /// Exported nonterminals in export order.
    pub fn exported(&self) -> &[NtId] {
        &self.exported
    }

    /// Registered constructor names.
    pub fn cons_names(&self) -> &BTreeSet<String> {
        &self.cons_names
    }

    /// Registered attributes, in registration order.
    pub fn attrs(&self) -> &[String] {
        &self.attrs
    }

    /// Builtins registered outside any rule.
    pub fn extra_builtins(&self) -> &BTreeSet<String> {
        &self.extra_builtins
    }

    /// Non-value node types registered outside any rule.
    pub fn extra_node_types(&self) -> &BTreeSet<String> {
        &self.extra_node_types
    }

    // ------------------------------------------------------------------
    // Storage resolution.

    /// Result storage of a parsed nonterminal: that of its first rule.
    pub fn nt_storage(&self, nt: NtId) -> Option<&'static str> {
        let first = self.rules.iter().find(|r| r.lhs == nt)?;
        self.astgen_storage(&first.astgen)
    }

    /// Initializer matching [`Grammar::nt_storage`].
    pub fn nt_storage_init(&self, nt: NtId) -> Option<&'static str> {
        let first = self.rules.iter().find(|r| r.lhs == nt)?;
        self.astgen_storage_init(&first.astgen)
    }

    /// Result storage of a construction.
    pub fn astgen_storage(&self, a: &AstGen) -> Option<&'static str> {
        match a {
            AstGen::Null
            | AstGen::Cons { .. }
            | AstGen::Builtin(_)
            | AstGen::Update { .. }
            | AstGen::AddAttribute { .. }
            | AstGen::Repetition(_) => Some("ast_node_t *"),
            AstGen::NoAttr | AstGen::Attr(_) => Some("unsigned int"),
            AstGen::TermRef(id) => self.term(*id).result_storage(),
            AstGen::NtRef(id, _) => self.nt_storage(*id),
        }
    }

    /// Zero value matching [`Grammar::astgen_storage`].
    pub fn astgen_storage_init(&self, a: &AstGen) -> Option<&'static str> {
        match a {
            AstGen::NoAttr | AstGen::Attr(_) => Some("0"),
            AstGen::TermRef(_) => Some("NULL"),
            AstGen::NtRef(id, _) => self.nt_storage_init(*id),
            _ => Some("NULL"),
        }
    }

    /// Result storage of a right-hand-side symbol.
    pub fn symbol_storage(&self, sym: &Symbol) -> Option<&'static str> {
        match sym {
            Symbol::Term(id) => self.term(*id).result_storage(),
            Symbol::Nt(id) => self.nt_storage(*id),
            Symbol::Repeat { .. } => Some("node_vector_t"),
        }
    }

    /// Initializer matching [`Grammar::symbol_storage`].
    pub fn symbol_storage_init(&self, sym: &Symbol) -> Option<&'static str> {
        match sym {
            Symbol::Term(_) => Some("NULL"),
            Symbol::Nt(id) => self.nt_storage_init(*id),
            Symbol::Repeat { .. } => Some("make_vector()"),
        }
    }

    /// Display name of a symbol, used for variable naming.
    pub fn symbol_display(&self, sym: &Symbol) -> String {
        match sym {
            Symbol::Term(id) => self.term(*id).display().to_owned(),
            Symbol::Nt(id) => self.nt(*id).name.clone(),
            Symbol::Repeat { nt, .. } => format!("repeat_{}", self.nt(*nt).name),
        }
    }

    /// Error-message name of a symbol.
    pub fn symbol_error_description(&self, sym: &Symbol) -> String {
        match sym {
            Symbol::Term(id) => self.term(*id).error_description().to_owned(),
            Symbol::Nt(id) => self.nt(*id).error_description.clone(),
            Symbol::Repeat { nt, .. } => self.nt(*nt).error_description.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Construction emission.

    /// Fold a construction into the C expression building its AST value.
    /// `lookup` resolves `(symbol, occurrence)` references to C
    /// expressions (a variable name, or a clone of one).
    pub fn astgen_emit(
        &self,
        a: &AstGen,
        lookup: &mut dyn FnMut(&SymbolKey, usize) -> Result<String, GrammarError>,
    ) -> Result<String, GrammarError> {
        Ok(match a {
            AstGen::Null => "NULL".to_owned(),
            AstGen::NoAttr => "0".to_owned(),
            AstGen::Attr(name) => format!("{FLAG_PREFIX}{name}"),
            AstGen::Cons { name, children } => {
                let mut args = String::new();
                for child in children {
                    args.push_str(", ");
                    args.push_str(&self.astgen_emit(child, lookup)?);
                }
                format!(
                    "SETLINE(ast_node_alloc_generic({NODE_PREFIX}{name}, {}{args}))",
                    children.len()
                )
            }
            AstGen::Builtin(name) => format!(
                "SETLINE(value_node_alloc_generic(AST_VALUE_ID, (ast_value_union_t) {{ .ident = {BUILTIN_PREFIX}{name} }}))"
            ),
            AstGen::Update { base, index, value } => format!(
                "node_update({}, {index}, {})",
                self.astgen_emit(base, lookup)?,
                self.astgen_emit(value, lookup)?
            ),
            AstGen::AddAttribute { base, attr } => format!(
                "node_add_attribute({}, {})",
                self.astgen_emit(base, lookup)?,
                self.astgen_emit(attr, lookup)?
            ),
            AstGen::Repetition(name) => format!(
                "vector_to_node({NODE_PREFIX}{name}, &{})",
                lookup(&SymbolKey::Repeat, 0)?
            ),
            AstGen::TermRef(id) => lookup(&SymbolKey::Term(*id), 0)?,
            AstGen::NtRef(id, index) => lookup(&SymbolKey::Nt(*id), *index)?,
        })
    }

    /// Statement deallocating a bound-but-unused parse result of this
    /// construction, if one is needed.
    pub fn astgen_free_stmt(&self, a: &AstGen, var: &str) -> Option<String> {
        match a {
            AstGen::Null
            | AstGen::NoAttr
            | AstGen::Cons { .. }
            | AstGen::Update { .. }
            | AstGen::AddAttribute { .. }
            | AstGen::Repetition(_) => Some(format!("ast_node_free({var}, 1);")),
            AstGen::Attr(_) | AstGen::Builtin(_) | AstGen::TermRef(_) => None,
            AstGen::NtRef(id, _) => {
                let first = self.rules.iter().find(|r| r.lhs == *id)?;
                self.astgen_free_stmt(&first.astgen, var)
            }
        }
    }

    /// Expression cloning a parse result referenced more than once.
    /// Attribute words copy by value.
    pub fn astgen_clone_expr(&self, a: &AstGen, var: &str) -> String {
        match a {
            AstGen::Null
            | AstGen::Cons { .. }
            | AstGen::Builtin(_)
            | AstGen::Update { .. }
            | AstGen::AddAttribute { .. }
            | AstGen::Repetition(_) => format!("ast_node_clone({var})"),
            AstGen::NoAttr | AstGen::Attr(_) | AstGen::TermRef(_) => var.to_owned(),
            AstGen::NtRef(id, _) => match self.rules.iter().find(|r| r.lhs == *id) {
                Some(first) => self.astgen_clone_expr(&first.astgen, var),
                None => var.to_owned(),
            },
        }
    }

    /// Free statement for a bound right-hand-side symbol.
    pub fn symbol_free_stmt(&self, sym: &Symbol, var: &str) -> Option<String> {
        match sym {
            Symbol::Nt(id) => {
                let first = self.rules.iter().find(|r| r.lhs == *id)?;
                self.astgen_free_stmt(&first.astgen, var)
            }
            Symbol::Term(_) | Symbol::Repeat { .. } => None,
        }
    }

    /// Clone expression for a bound right-hand-side symbol referenced
    /// again.
    pub fn symbol_clone_expr(&self, sym: &Symbol, var: &str) -> String {
        match sym {
            Symbol::Nt(id) => self.astgen_clone_expr(&AstGen::NtRef(*id, 0), var),
            Symbol::Term(_) | Symbol::Repeat { .. } => var.to_owned(),
        }
    }

    // ------------------------------------------------------------------
    // Construction name queries.

    /// AST tag base name of a construction, if it reserves one.
    pub fn astgen_ast_name(&self, a: &AstGen) -> Option<String> {
        match a {
            AstGen::Cons { name, .. } | AstGen::Repetition(name) => Some(name.clone()),
            AstGen::Builtin(_) => Some("ID".to_owned()),
            AstGen::TermRef(id) => Some(self.term(*id).ast_name()),
            _ => None,
        }
    }

    /// Full AST tag of a construction, if it reserves one.
    pub fn astgen_ast_full_name(&self, a: &AstGen) -> Option<String> {
        match a {
            AstGen::Cons { name, .. } | AstGen::Repetition(name) => {
                Some(format!("{NODE_PREFIX}{name}"))
            }
            AstGen::Builtin(_) => Some("AST_VALUE_ID".to_owned()),
            AstGen::TermRef(id) => Some(self.term(*id).ast_full_name()),
            _ => None,
        }
    }

    /// `(c_type, field)` of a construction's value node, if it has one.
    pub fn astgen_value_node(&self, a: &AstGen) -> Option<(String, String)> {
        match a {
            AstGen::TermRef(id) => self.term(*id).value_node(),
            AstGen::Builtin(_) => Some(("int".to_owned(), "ident".to_owned())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_are_interned_by_spelling() {
        let mut g = Grammar::new();
        let a = g.literal("(");
        let b = g.literal("(");
        let c = g.literal(")");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(g.term(a).token_id, "'('");
        assert!(g.term(a).is_stringterm);
        assert_eq!(g.term(a).priority, -1);
    }

    #[test]
    fn multi_character_literals_get_symbolic_ids() {
        let mut g = Grammar::new();
        let id = g.literal(":=");
        assert_eq!(g.term(id).token_id, "T_L_COLONEQ");
        assert_eq!(g.term(id).error_description(), "':='");
    }

    #[test]
    fn indexed_rhs_counts_per_key() {
        let mut g = Grammar::new();
        let expr = g.nonterminal("expr", "expression");
        let plus = g.literal("+");
        g.add_rule(
            expr,
            vec![Symbol::Nt(expr), Symbol::Term(plus), Symbol::Nt(expr)],
            AstGen::cons(
                "PAIR",
                vec![AstGen::NtRef(expr, 0), AstGen::NtRef(expr, 1)],
            ),
        )
        .unwrap();
        let rule = &g.rules()[0];
        let indices: Vec<usize> = rule.indexed_rhs.iter().map(|(_, i)| *i).collect();
        assert_eq!(indices, vec![0, 0, 1]);
    }

    #[test]
    fn storage_disagreement_is_fatal() {
        let mut g = Grammar::new();
        let ty = g.nonterminal("ty", "type specifier");
        let var = g.literal("var");
        let attr = g.attribute("VAR");
        g.add_rule(ty, vec![Symbol::Term(var)], attr).unwrap();
        let int_kw = g.literal("int");
        let err = g
            .add_rule(
                ty,
                vec![Symbol::Term(int_kw)],
                AstGen::cons("TY", vec![]),
            )
            .unwrap_err();
        assert!(matches!(err, GrammarError::StorageMismatch { .. }));
    }

    #[test]
    fn repetition_requires_lone_repeat() {
        let mut g = Grammar::new();
        let stmt = g.nonterminal("stmt", "statement");
        let block = g.nonterminal("block", "block");
        let err = g
            .add_rule(
                block,
                vec![Symbol::Nt(stmt)],
                AstGen::Repetition("BLOCK".to_owned()),
            )
            .unwrap_err();
        assert!(matches!(err, GrammarError::RepetitionWithoutRepeat { .. }));

        g.add_rule(
            block,
            vec![Symbol::Repeat {
                nt: stmt,
                separator: None,
            }],
            AstGen::Repetition("BLOCK".to_owned()),
        )
        .unwrap();
    }

    #[test]
    fn nt_storage_follows_first_rule() {
        let mut g = Grammar::new();
        let maybe_const = g.nonterminal("maybe_const", "optional const specifier");
        let attr = g.attribute("CONST");
        g.add_rule(maybe_const, vec![], AstGen::NoAttr).unwrap();
        let const_kw = g.literal("const");
        g.add_rule(maybe_const, vec![Symbol::Term(const_kw)], attr)
            .unwrap();
        assert_eq!(g.nt_storage(maybe_const), Some("unsigned int"));
        assert_eq!(g.nt_storage_init(maybe_const), Some("0"));
    }
}
