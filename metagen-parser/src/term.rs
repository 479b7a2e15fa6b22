//! Terminal symbols.
//!
//! A terminal couples a token identity with the lexer rules that produce it.
//! Named terminals carry a `yylval` variable and C type; literal terminals
//! (from keywords and punctuation in rule bodies) are interned on demand,
//! single characters identifying themselves by their character literal.

/// Index of a terminal in the grammar's term arena. Terminal identity is
/// token identity: the arena interns literals, so equal token ids mean equal
/// ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TermId(pub usize);

/// One lexer rule of a terminal.
#[derive(Debug, Clone)]
pub struct Regexp {
    /// Flex pattern.
    pub pattern: String,
    /// Expression computing `yylval` from `yytext`, if the token carries a
    /// value.
    pub action: Option<String>,
    /// Optional AST flag name recording the surface spelling (e.g. hex
    /// literals). Kept for unparsing; the lexer does not use it yet.
    pub flag: Option<String>,
}

/// A terminal symbol.
#[derive(Debug, Clone)]
pub struct Term {
    /// Symbolic name; `None` for literal single-character tokens.
    pub name: Option<String>,
    /// `yylval` field carrying this token's value.
    pub varname: Option<String>,
    /// C type of the value, if any.
    pub c_type: Option<String>,
    /// Token identifier: `T__<name>`, `T_L_<name>`, or a C character
    /// literal.
    pub token_id: String,
    /// Lexer rules, emitted in order.
    pub regexps: Vec<Regexp>,
    /// Lexer emission priority, ascending. String terminals sit at −1 so
    /// keywords beat overlapping identifier rules.
    pub priority: i32,
    /// Printf format used when unparsing the token's value node.
    pub format_string: String,
    /// Whether this terminal was interned from a literal.
    pub is_stringterm: bool,
    /// Human-readable name for syntax errors.
    pub error_name: Option<String>,
}

impl Term {
    pub(crate) fn named(name: &str, varname: &str, c_type: &str) -> Self {
        Self {
            name: Some(name.to_owned()),
            varname: Some(varname.to_owned()),
            c_type: Some(c_type.to_owned()),
            token_id: format!("T__{name}"),
            regexps: Vec::new(),
            priority: 0,
            format_string: "ERROR".to_owned(),
            is_stringterm: false,
            error_name: None,
        }
    }

    /// Add one lexer rule.
    pub fn add_regexp(&mut self, pattern: &str, action: Option<&str>, flag: Option<&str>) {
        self.regexps.push(Regexp {
            pattern: pattern.to_owned(),
            action: action.map(str::to_owned),
            flag: flag.map(str::to_owned),
        });
    }

    /// Whether the token is identified by a symbolic id rather than a
    /// character literal.
    pub fn has_symbolic_token_id(&self) -> bool {
        self.name.is_some()
    }

    /// Display name: the symbolic name, or the token id for literal
    /// single-character tokens.
    pub fn display(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.token_id)
    }

    /// Name used in "expected …" syntax errors.
    pub fn error_description(&self) -> &str {
        if self.name.is_none() {
            return &self.token_id;
        }
        self.error_name.as_deref().unwrap_or(self.display())
    }

    /// AST tag base name.
    pub fn ast_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .varname
                .as_deref()
                .unwrap_or_default()
                .to_uppercase(),
        }
    }

    /// Full AST tag of the token's value node.
    pub fn ast_full_name(&self) -> String {
        format!("{}{}", crate::ast::VALUE_PREFIX, self.ast_name())
    }

    /// `(c_type, field)` of the value this token carries, if any.
    pub fn value_node(&self) -> Option<(String, String)> {
        match (&self.c_type, &self.varname) {
            (Some(ty), Some(var)) => Some((ty.clone(), var.clone())),
            _ => None,
        }
    }

    /// Result storage of a parsed occurrence; string terminals carry
    /// nothing.
    pub fn result_storage(&self) -> Option<&'static str> {
        if self.is_stringterm {
            None
        } else {
            Some("ast_node_t *")
        }
    }
}

/// Characters that must be escaped inside a quoted flex pattern.
const FLEX_ESCAPES: &str = "()*+.|[]?'\\";

/// Quote a literal for use as a flex pattern.
pub(crate) fn escape_literal(literal: &str) -> String {
    let mut out = String::with_capacity(literal.len() + 2);
    out.push('"');
    for c in literal.chars() {
        if FLEX_ESCAPES.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Derive the symbolic name of a multi-character literal terminal:
/// punctuation maps to mnemonic words, everything else keeps its uppercase
/// form, and collisions get a numeric suffix.
pub(crate) fn literal_name(literal: &str, used: &mut std::collections::HashSet<String>) -> String {
    let mut name = String::new();
    for c in literal.to_uppercase().chars() {
        match c {
            '>' => name.push_str("GT"),
            '<' => name.push_str("LT"),
            '=' => name.push_str("EQ"),
            '!' => name.push_str("BANG"),
            '*' => name.push_str("STAR"),
            '+' => name.push_str("PLUS"),
            '-' => name.push_str("DASH"),
            '/' => name.push_str("SLASH"),
            '&' => name.push_str("AMP"),
            '#' => name.push_str("HASH"),
            '%' => name.push_str("PERCENT"),
            '@' => name.push_str("AT"),
            ',' => name.push_str("COMMA"),
            '~' => name.push_str("TILDE"),
            ':' => name.push_str("COLON"),
            ';' => name.push_str("SEMICOLON"),
            '.' => name.push_str("PERIOD"),
            '?' => name.push_str("QMARK"),
            c if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' => name.push(c),
            _ => {}
        }
    }
    if name.is_empty() {
        name.push('X');
    }
    if used.contains(&name) {
        let mut i = 0;
        while used.contains(&format!("{name}{i}")) {
            i += 1;
        }
        name = format!("{name}{i}");
    }
    used.insert(name.clone());
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn escapes_flex_metacharacters() {
        assert_eq!(escape_literal(":="), "\":=\"");
        assert_eq!(escape_literal("("), "\"\\(\"");
        assert_eq!(escape_literal("*"), "\"\\*\"");
    }

    #[test]
    fn punctuation_maps_to_mnemonics() {
        let mut used = HashSet::new();
        assert_eq!(literal_name(":=", &mut used), "COLONEQ");
        assert_eq!(literal_name("<=", &mut used), "LTEQ");
        assert_eq!(literal_name("while", &mut used), "WHILE");
    }

    #[test]
    fn collisions_get_numeric_suffixes() {
        let mut used = HashSet::new();
        assert_eq!(literal_name("==", &mut used), "EQEQ");
        assert_eq!(literal_name("=G=", &mut used), "EQGEQ");
        // A second spelling collapsing to the same mnemonic gets a suffix.
        assert_eq!(literal_name("==", &mut used), "EQEQ0");
    }
}
