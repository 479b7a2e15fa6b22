//! End-to-end artifact tests: build the language grammar, preprocess it,
//! and emit every artifact against fixture templates.

use std::fs;
use std::path::PathBuf;

use metagen_parser::{emit_artifact, language_grammar, preprocess, Artifact, EmitOptions};
use rstest::rstest;

const PARSER_TEMPLATE_H: &str = "\
#ifndef PARSER_H
#define PARSER_H

enum tokens {
$$TOKENS$$
};

typedef union {
$$VALUES$$
} yylval_t;

$$PARSER_DECLS$$

#endif
";

const LEXER_TEMPLATE_L: &str = "\
%%
$$RULES$$
%%
";

const AST_TEMPLATE_H: &str = "\
#ifndef AST_H
#define AST_H

$$NODE_TYPES$$

$$AV_FLAGS$$

$$AV_VALUE_GETTERS$$

typedef union {
$$VALUE_UNION$$
} ast_value_union_t;

$$BUILTIN_IDS$$

#endif
";

const PARSER_TEMPLATE_C: &str = "\
#include \"parser.h\"

static void
decode_value_token(int token, ast_node_t **node_ptr)
{
	switch (token) {
$$VALUE_TOKEN_DECODING$$
	}
}

$$PARSING$$
";

const UNPARSER_TEMPLATE_C: &str = "\
#include \"ast.h\"

static void
print_tag(FILE *file, int ty)
{
	switch (ty) {
$$PRINT_TAGS$$
	}
$$PRINT_FLAGS$$
}

static void
print_builtin(FILE *file, int id)
{
	switch (id) {
$$PRINT_IDS$$
	}
}

static void
print_vnode(FILE *file, ast_value_node_t *node)
{
	switch (node->type) {
$$PRINT_VNODES$$
	}
}
";

fn template_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("metagen-parser-fixtures-{}", std::process::id()));
    fs::create_dir_all(&dir).expect("create fixture dir");
    for (name, text) in [
        ("parser.template.h", PARSER_TEMPLATE_H),
        ("lexer.template.l", LEXER_TEMPLATE_L),
        ("ast.template.h", AST_TEMPLATE_H),
        ("parser.template.c", PARSER_TEMPLATE_C),
        ("unparser.template.c", UNPARSER_TEMPLATE_C),
    ] {
        fs::write(dir.join(name), text).expect("write fixture template");
    }
    dir
}

fn emit(artifact: Artifact) -> String {
    let mut g = language_grammar().expect("grammar builds");
    preprocess(&mut g).expect("grammar preprocesses");
    let opts = EmitOptions {
        template_dir: template_dir(),
        trace: false,
    };
    emit_artifact(&g, artifact, &opts).expect("artifact emits")
}

#[test]
fn parser_header_numbers_tokens_and_exports_entry_points() {
    let text = emit(Artifact::ParserHeader);

    // Symbolic tokens start at 0x102; literal single-char tokens get none.
    assert!(text.contains("T__INT = 0x"));
    assert!(text.contains("T_L_COLONEQ = 0x"));
    assert!(!text.contains("'(' = 0x"));
    let first = text
        .lines()
        .find(|l| l.trim_start().starts_with("T_"))
        .unwrap();
    assert!(first.contains("= 0x102"));

    // The value union covers every lexer variable plus the node slot.
    assert!(text.contains("\tast_node_t *node;"));
    assert!(text.contains("\tsigned long int num;"));
    assert!(text.contains("\tchar *str;"));
    assert!(text.contains("\tdouble real;"));

    // Only the exported nonterminals appear, and without `static`.
    assert!(text.contains("int\nparse_expr(ast_node_t * *result);"));
    assert!(text.contains("int\nparse_stmt(ast_node_t * *result);"));
    assert!(text.contains("int\nparse_program(ast_node_t * *result);"));
    assert!(!text.contains("parse_valexpr(ast_node_t * *result);"));
}

#[test]
fn lexer_orders_keywords_before_identifiers() {
    let text = emit(Artifact::Lexer);

    let while_rule = text.find("\"while\" {").expect("keyword rule");
    let ident_rule = text.find("{IDENTIFIER} {").expect("identifier rule");
    assert!(while_rule < ident_rule);

    assert!(text.contains("\tyylval.num = strtol(yytext, NULL, 10);\n\treturn T__INT;"));
    assert!(text.contains("\tyylval.str = mk_unique_string(yytext);\n\treturn T__NAME;"));
    assert!(text.contains("\treturn T_L_WHILE;"));
    assert!(text.contains("\"\\(\" {"));
}

#[test]
fn ast_header_packs_tags_and_flags() {
    let text = emit(Artifact::AstHeader);

    assert!(text.contains("#define AST_ILLEGAL"));
    assert!(text.contains("0x00"));
    // 20 constructors + 40 terminals + 2 -> 6 tag bits, 10 flag bits.
    assert!(text.contains("#define AST_NODE_MASK"));
    assert!(text.contains("0x3f"));

    // Value tags sit below AST_VALUE_MAX, constructed tags above.
    let value_max = text.find("#define AST_VALUE_MAX").unwrap();
    let value_int = text.find("#define AST_VALUE_INT").unwrap();
    let node_funapp = text.find("#define AST_NODE_FUNAPP").unwrap();
    assert!(value_int < value_max);
    assert!(value_max < node_funapp);

    // Flags start right above the tag bits.
    assert!(text.contains("#define AST_FLAG_VAR"));
    assert!(text.contains("0x0040"));
    assert!(text.contains("#define AST_FLAG_DECL"));
    assert!(text.contains("0x1000"));

    // Extra node types participate in numbering.
    assert!(text.contains("#define AST_NODE_METHODAPP"));

    // Builtins count down from -1, including the rule-independent ones.
    assert!(text.contains("#define BUILTIN_OP_ADD"));
    assert!(text.contains(" -1"));
    assert!(text.contains("#define BUILTIN_OP_SELF"));
    assert!(text.contains("#define BUILTIN_OPS_NR 11"));

    assert!(text.contains("#define AV_ID(n) (((ast_value_node_t *)(n))->v.ident)"));
    assert!(text.contains("#define AV_INT(n) (((ast_value_node_t *)(n))->v.num)"));
    assert!(text.contains("\tint ident;"));
}

#[test]
fn parser_source_folds_left_recursion_and_decodes_values() {
    let text = emit(Artifact::Parser);

    // Value tokens decode into value nodes.
    assert!(text.contains("\tcase T__INT:"));
    assert!(text.contains(
        "value_node_alloc_generic(AST_VALUE_INT, (ast_value_union_t) { .num = yylval.num })"
    ));

    // `1 + 2 * 3`: the additive layer folds through its loop label,
    // building FUNAPP(ADD, ACTUALS(lhs, rhs)) from the accumulated lhs.
    assert!(text.contains("parse_expr1_loop:"));
    assert!(text.contains("goto parse_expr1_loop;"));
    assert!(text.contains("BUILTIN_OP_ADD"));
    assert!(text.contains("AST_NODE_ACTUALS, 2, v_expr1__prime_0, v_expr2_0"));
    // The multiplicative layer binds tighter with its own loop.
    assert!(text.contains("parse_expr2_loop:"));
    assert!(text.contains("BUILTIN_OP_MUL"));

    // Statement parsing backtracks over pure-terminal prefixes and
    // reports errors after nonterminals.
    assert!(text.contains("push_back("));
    assert!(text.contains("parse_error(\"Syntax error in"));

    // Repetitions drive the vector loop.
    assert!(text.contains("while (parse_stmt(&tmp_0)) {"));
    assert!(text.contains("add_to_vector(&v_repeat_stmt_0, tmp_0);"));
    assert!(text.contains("*result = vector_to_node(AST_NODE_BLOCK, &v_repeat_stmt_0);"));

    // The nullable const prefix was eliminated rather than parsed.
    assert!(!text.contains("parse_maybe_const(NULL)"));
    assert!(text.contains("if (parse_ty(&v_ty_0)) {"));
}

#[test]
fn unparser_prints_tags_flags_ids_and_values() {
    let text = emit(Artifact::Unparser);

    assert!(text.contains("\tcase AST_NODE_FUNAPP:\n\t\tfputs(\"FUNAPP\", file);"));
    assert!(text.contains("\tcase AST_NODE_METHODAPP:\n\t\tfputs(\"METHODAPP\", file);"));
    assert!(text.contains("\tcase AST_VALUE_INT:\n\t\tfprintf(file, \"%li\", node->v.num);"));
    assert!(text.contains("\tcase AST_VALUE_STRING:\n\t\tfprintf(file, \"\\\"%s\\\"\", node->v.str);"));
    assert!(text.contains("\tif (ty & AST_FLAG_CONST) fputs(\"#CONST\", file);"));
    assert!(text.contains("\tcase BUILTIN_OP_NOT:\n\t\tfputs(\"NOT\", file);"));
    // Builtins print by id, never as tags of their own.
    assert!(!text.contains("\tcase AST_VALUE_ID:\n\t\tfputs"));
}

#[rstest]
#[case(Artifact::ParserHeader)]
#[case(Artifact::Lexer)]
#[case(Artifact::AstHeader)]
#[case(Artifact::Parser)]
#[case(Artifact::Unparser)]
fn emission_is_deterministic(#[case] artifact: Artifact) {
    assert_eq!(emit(artifact), emit(artifact), "{artifact} must be stable");
}
