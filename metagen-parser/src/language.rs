//! The toy-language grammar.
//!
//! This is the declarative table everything else is generated from:
//! terminals with their lexer rules, nonterminals with their error
//! descriptions, and productions paired with their AST constructions.
//!
//! Known limitations of the generated parser: indirect left recursion is
//! rejected rather than rewritten, and backtracking is bounded to terminal
//! prefixes, so sub-rules must not force disambiguation across
//! nonterminal boundaries.

use crate::ast::{AstGen, NtId};
use crate::error::GrammarError;
use crate::grammar::{Grammar, Symbol};

fn nt(id: NtId) -> Symbol {
    Symbol::Nt(id)
}

fn r(id: NtId, index: usize) -> AstGen {
    AstGen::NtRef(id, index)
}

fn builtin(name: &str) -> AstGen {
    AstGen::Builtin(name.to_owned())
}

/// `FUNAPP(f, ACTUALS(args…))`: every operator application in the AST is a
/// function application of a builtin.
fn ast_funapp(f: AstGen, args: Vec<AstGen>) -> AstGen {
    AstGen::cons("FUNAPP", vec![f, AstGen::cons("ACTUALS", args)])
}

fn ast_not(value: AstGen) -> AstGen {
    ast_funapp(builtin("NOT"), vec![value])
}

/// Build the complete grammar, ready for preprocessing.
pub fn language_grammar() -> Result<Grammar, GrammarError> {
    let mut g = Grammar::new();

    // ------------------------------------------------------------------
    // Terminals.

    let real = g.terminal("REAL", "real", "double");
    {
        let t = g.term_mut(real);
        t.error_name = Some("real number".to_owned());
        t.format_string = "%f".to_owned();
        t.add_regexp(
            "((({DIGIT}*\".\"{DIGIT}+)|({DIGIT}+\".\"))([eE][+-]?{DIGIT}+)?)|({DIGIT}+[eE][+-]?{DIGIT}+)",
            Some("strtod(yytext, NULL)"),
            None,
        );
        t.add_regexp(
            "0x(({HEXDIGIT}*\".\"{HEXDIGIT}+)|({HEXDIGIT}+\".\"))([pP][+-]?{DIGIT}+)",
            Some("strtod(yytext, NULL)"),
            Some("HEX_REPR"),
        );
    }

    let int_t = g.terminal("INT", "num", "signed long int");
    {
        let t = g.term_mut(int_t);
        t.error_name = Some("integer".to_owned());
        t.format_string = "%li".to_owned();
        t.add_regexp("0x{HEXDIGIT}+", Some("strtol(yytext + 2, NULL, 16)"), Some("HEX_REPR"));
        t.add_regexp("{DIGIT}+", Some("strtol(yytext, NULL, 10)"), None);
    }

    let string_t = g.terminal("STRING", "str", "char *");
    {
        let t = g.term_mut(string_t);
        t.error_name = Some("string".to_owned());
        t.format_string = "\\\"%s\\\"".to_owned();
        t.add_regexp("\\\"(\\\\.|[^\\\"\\\\])*\\\"", Some("unescape_string(yytext)"), None);
    }

    let id_t = g.terminal("NAME", "str", "char *");
    {
        let t = g.term_mut(id_t);
        t.priority = 10;
        t.error_name = Some("identifier".to_owned());
        t.format_string = "%s".to_owned();
        t.add_regexp("{IDENTIFIER}", Some("mk_unique_string(yytext)"), None);
    }

    let id = AstGen::TermRef(id_t);

    // ------------------------------------------------------------------
    // Nonterminals.

    let program = g.nonterminal("program", "program");
    let block = g.nonterminal("block", "block");
    let iblock = g.nonterminal("iblock", "inner block");
    let stmt = g.nonterminal("stmt", "statement");
    let maybe_const = g.nonterminal("maybe_const", "optional const specifier");
    let expr = g.nonterminal("expr", "expression");
    let expr0 = g.nonterminal("expr0", "expression");
    let expr1 = g.nonterminal("expr1", "expression");
    let expr2 = g.nonterminal("expr2", "expression");
    let refexpr = g.nonterminal("refexpr", "reference expression");
    let valexpr = g.nonterminal("valexpr", "value");
    let ty = g.nonterminal("ty", "type specifier");
    let formal = g.nonterminal("formal", "formal argument");
    let formals_x = g.nonterminal("formal_list_x", "formal argument list");
    let formals = g.nonterminal("formal_list", "formal argument list");
    let actuals_x = g.nonterminal("actual_list_x", "function parameters");
    let actuals = g.nonterminal("actual_list", "function parameters");
    let opt_else = g.nonterminal("opt_else", "optional 'else' branch");
    let opt_init = g.nonterminal("opt_init", "optional variable initialisation");
    let arrayval = g.nonterminal("arrayval", "array value");
    let arrayitems = g.nonterminal("arrayitems", "array items");

    // ------------------------------------------------------------------
    // Rules.

    g.add_rule(program, vec![nt(iblock)], r(iblock, 0))?;

    let lbrace = g.literal("{");
    let rbrace = g.literal("}");
    g.add_rule(
        block,
        vec![Symbol::Term(lbrace), nt(iblock), Symbol::Term(rbrace)],
        r(iblock, 0),
    )?;
    g.add_rule(
        iblock,
        vec![Symbol::Repeat {
            nt: stmt,
            separator: None,
        }],
        AstGen::Repetition("BLOCK".to_owned()),
    )?;

    for (keyword, attr) in [("var", "VAR"), ("obj", "OBJ"), ("int", "INT"), ("real", "REAL")] {
        let kw = g.literal(keyword);
        let attr = g.attribute(attr);
        g.add_rule(ty, vec![Symbol::Term(kw)], attr)?;
    }

    g.add_rule(maybe_const, vec![], AstGen::NoAttr)?;
    let const_kw = g.literal("const");
    let const_attr = g.attribute("CONST");
    g.add_rule(maybe_const, vec![Symbol::Term(const_kw)], const_attr)?;

    // A variable declaration is a VARDECL node carrying the name and the
    // initializer slot, with the type and constness as attributes.
    let vardecl = AstGen::add_attribute(
        AstGen::add_attribute(
            AstGen::cons("VARDECL", vec![id.clone(), AstGen::Null]),
            r(ty, 0),
        ),
        r(maybe_const, 0),
    );

    g.add_rule(
        formal,
        vec![nt(maybe_const), nt(ty), Symbol::Term(id_t)],
        vardecl.clone(),
    )?;
    let comma = g.literal(",");
    g.add_rule(
        formals_x,
        vec![Symbol::Repeat {
            nt: formal,
            separator: Some(comma),
        }],
        AstGen::Repetition("FORMALS".to_owned()),
    )?;
    let lparen = g.literal("(");
    let rparen = g.literal(")");
    g.add_rule(
        formals,
        vec![Symbol::Term(lparen), nt(formals_x), Symbol::Term(rparen)],
        r(formals_x, 0),
    )?;

    g.add_rule(
        actuals_x,
        vec![Symbol::Repeat {
            nt: expr,
            separator: Some(comma),
        }],
        AstGen::Repetition("ACTUALS".to_owned()),
    )?;
    g.add_rule(
        actuals,
        vec![Symbol::Term(lparen), nt(actuals_x), Symbol::Term(rparen)],
        r(actuals_x, 0),
    )?;

    g.add_rule(opt_else, vec![], AstGen::Null)?;
    let else_kw = g.literal("else");
    g.add_rule(opt_else, vec![Symbol::Term(else_kw), nt(stmt)], r(stmt, 0))?;

    g.add_rule(opt_init, vec![], AstGen::Null)?;
    let eq = g.literal("=");
    g.add_rule(opt_init, vec![Symbol::Term(eq), nt(expr)], r(expr, 0))?;

    let semi = g.literal(";");
    g.add_rule(
        stmt,
        vec![
            nt(maybe_const),
            nt(ty),
            Symbol::Term(id_t),
            nt(opt_init),
            Symbol::Term(semi),
        ],
        AstGen::update(vardecl.clone(), 1, r(opt_init, 0)),
    )?;
    // Constness of function definitions is rejected during semantic
    // analysis, not here.
    g.add_rule(
        stmt,
        vec![
            nt(maybe_const),
            nt(ty),
            Symbol::Term(id_t),
            nt(formals),
            nt(block),
        ],
        AstGen::add_attribute(
            AstGen::add_attribute(
                AstGen::cons("FUNDEF", vec![id.clone(), r(formals, 0), r(block, 0)]),
                r(ty, 0),
            ),
            r(maybe_const, 0),
        ),
    )?;
    let class_kw = g.literal("class");
    g.add_rule(
        stmt,
        vec![Symbol::Term(class_kw), Symbol::Term(id_t), nt(formals), nt(block)],
        AstGen::cons(
            "CLASSDEF",
            vec![id.clone(), r(formals, 0), r(block, 0), AstGen::Null],
        ),
    )?;
    let assign = g.literal(":=");
    g.add_rule(
        stmt,
        vec![nt(expr), Symbol::Term(assign), nt(expr), Symbol::Term(semi)],
        AstGen::cons("ASSIGN", vec![r(expr, 0), r(expr, 1)]),
    )?;
    g.add_rule(stmt, vec![Symbol::Term(semi)], AstGen::cons("SKIP", vec![]))?;
    g.add_rule(stmt, vec![nt(expr), Symbol::Term(semi)], r(expr, 0))?;
    g.add_rule(stmt, vec![nt(block)], r(block, 0))?;
    let if_kw = g.literal("if");
    g.add_rule(
        stmt,
        vec![Symbol::Term(if_kw), nt(expr), nt(stmt), nt(opt_else)],
        AstGen::cons("IF", vec![r(expr, 0), r(stmt, 0), r(opt_else, 0)]),
    )?;
    let while_kw = g.literal("while");
    g.add_rule(
        stmt,
        vec![
            Symbol::Term(while_kw),
            Symbol::Term(lparen),
            nt(expr),
            Symbol::Term(rparen),
            nt(stmt),
        ],
        AstGen::cons("WHILE", vec![r(expr, 0), r(stmt, 0)]),
    )?;
    let do_kw = g.literal("do");
    g.add_rule(
        stmt,
        vec![
            Symbol::Term(do_kw),
            nt(stmt),
            Symbol::Term(while_kw),
            nt(expr),
            Symbol::Term(semi),
        ],
        AstGen::cons(
            "BLOCK",
            vec![
                r(stmt, 0),
                AstGen::cons("WHILE", vec![r(expr, 0), r(stmt, 0)]),
            ],
        ),
    )?;
    let break_kw = g.literal("break");
    g.add_rule(
        stmt,
        vec![Symbol::Term(break_kw), Symbol::Term(semi)],
        AstGen::cons("BREAK", vec![]),
    )?;
    let continue_kw = g.literal("continue");
    g.add_rule(
        stmt,
        vec![Symbol::Term(continue_kw), Symbol::Term(semi)],
        AstGen::cons("CONTINUE", vec![]),
    )?;
    let return_kw = g.literal("return");
    g.add_rule(
        stmt,
        vec![Symbol::Term(return_kw), Symbol::Term(semi)],
        AstGen::cons("RETURN", vec![AstGen::Null]),
    )?;
    g.add_rule(
        stmt,
        vec![Symbol::Term(return_kw), nt(expr), Symbol::Term(semi)],
        AstGen::cons("RETURN", vec![r(expr, 0)]),
    )?;

    g.add_rule(expr, vec![nt(expr0)], r(expr0, 0))?;
    let not_kw = g.literal("not");
    g.add_rule(
        expr,
        vec![Symbol::Term(not_kw), nt(expr0)],
        ast_not(r(expr0, 0)),
    )?;

    let comparisons: [(&str, fn(NtId) -> AstGen); 6] = [
        ("==", |e| ast_funapp(builtin("TEST_EQ"), vec![r(e, 0), r(e, 1)])),
        ("!=", |e| {
            ast_not(ast_funapp(builtin("TEST_EQ"), vec![r(e, 0), r(e, 1)]))
        }),
        ("<", |e| ast_funapp(builtin("TEST_LT"), vec![r(e, 0), r(e, 1)])),
        ("<=", |e| ast_funapp(builtin("TEST_LE"), vec![r(e, 0), r(e, 1)])),
        (">", |e| ast_funapp(builtin("TEST_LT"), vec![r(e, 1), r(e, 0)])),
        (">=", |e| ast_funapp(builtin("TEST_LE"), vec![r(e, 1), r(e, 0)])),
    ];
    for (op, make) in comparisons {
        let op_t = g.literal(op);
        g.add_rule(
            expr0,
            vec![nt(expr1), Symbol::Term(op_t), nt(expr1)],
            make(expr1),
        )?;
    }
    let is_kw = g.literal("is");
    g.add_rule(
        expr0,
        vec![nt(expr1), Symbol::Term(is_kw), Symbol::Term(id_t)],
        AstGen::cons("ISINSTANCE", vec![r(expr1, 0), id.clone()]),
    )?;
    g.add_rule(
        expr0,
        vec![nt(expr1), Symbol::Term(is_kw), nt(ty)],
        AstGen::cons("ISPRIMTY", vec![r(expr1, 0), r(ty, 0)]),
    )?;
    g.add_rule(expr0, vec![nt(expr1)], r(expr1, 0))?;

    for (op, name) in [("+", "ADD"), ("-", "SUB")] {
        let op_t = g.literal(op);
        g.add_rule(
            expr1,
            vec![nt(expr1), Symbol::Term(op_t), nt(expr2)],
            ast_funapp(builtin(name), vec![r(expr1, 0), r(expr2, 0)]),
        )?;
    }
    g.add_rule(expr1, vec![nt(expr2)], r(expr2, 0))?;

    for (op, name) in [("*", "MUL"), ("/", "DIV")] {
        let op_t = g.literal(op);
        g.add_rule(
            expr2,
            vec![nt(expr2), Symbol::Term(op_t), nt(refexpr)],
            ast_funapp(builtin(name), vec![r(expr2, 0), r(refexpr, 0)]),
        )?;
    }
    g.add_rule(expr2, vec![nt(refexpr)], r(refexpr, 0))?;

    g.add_rule(refexpr, vec![nt(valexpr)], r(valexpr, 0))?;
    let dot = g.literal(".");
    g.add_rule(
        refexpr,
        vec![nt(refexpr), Symbol::Term(dot), Symbol::Term(id_t)],
        AstGen::cons("MEMBER", vec![r(refexpr, 0), id.clone()]),
    )?;
    g.add_rule(
        refexpr,
        vec![nt(refexpr), nt(actuals)],
        AstGen::cons("FUNAPP", vec![r(refexpr, 0), r(actuals, 0)]),
    )?;
    let lbracket = g.literal("[");
    let rbracket = g.literal("]");
    g.add_rule(
        refexpr,
        vec![
            nt(refexpr),
            Symbol::Term(lbracket),
            nt(expr),
            Symbol::Term(rbracket),
        ],
        AstGen::cons("ARRAYSUB", vec![r(refexpr, 0), r(expr, 0)]),
    )?;

    g.add_rule(
        arrayitems,
        vec![Symbol::Repeat {
            nt: expr,
            separator: Some(comma),
        }],
        AstGen::Repetition("ARRAYLIST".to_owned()),
    )?;

    g.add_rule(
        arrayval,
        vec![Symbol::Term(lbracket), nt(arrayitems), Symbol::Term(rbracket)],
        AstGen::cons("ARRAYVAL", vec![r(arrayitems, 0), AstGen::Null]),
    )?;
    // The fill form `[items / count]`; rejecting extra items is semantic
    // analysis' job.
    let slash = g.literal("/");
    g.add_rule(
        arrayval,
        vec![
            Symbol::Term(lbracket),
            nt(arrayitems),
            Symbol::Term(slash),
            nt(expr),
            Symbol::Term(rbracket),
        ],
        AstGen::cons("ARRAYVAL", vec![r(arrayitems, 0), r(expr, 0)]),
    )?;

    g.add_rule(valexpr, vec![nt(arrayval)], r(arrayval, 0))?;
    g.add_rule(valexpr, vec![Symbol::Term(int_t)], AstGen::TermRef(int_t))?;
    g.add_rule(
        valexpr,
        vec![Symbol::Term(string_t)],
        AstGen::TermRef(string_t),
    )?;
    g.add_rule(valexpr, vec![Symbol::Term(real)], AstGen::TermRef(real))?;
    g.add_rule(valexpr, vec![Symbol::Term(id_t)], id)?;
    g.add_rule(
        valexpr,
        vec![Symbol::Term(lparen), nt(expr), Symbol::Term(rparen)],
        r(expr, 0),
    )?;

    // ------------------------------------------------------------------
    // Registrations outside the rules.

    for name in ["CONVERT", "SELF", "ALLOCATE"] {
        g.register_builtin(name);
    }
    for name in ["METHODAPP", "NEWCLASS"] {
        g.register_node_type(name);
    }
    g.attribute("LVALUE");
    g.attribute("DECL");

    g.export(expr);
    g.export(stmt);
    g.export(program);

    Ok(g)
}
