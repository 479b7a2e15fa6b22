//! The five emitted artifacts.
//!
//! Each artifact pairs one template file with one emission routine; the
//! routines here walk the preprocessed grammar and produce the hole
//! substitutions.

use std::path::PathBuf;

use strum::{Display, EnumIter, EnumString};

use crate::error::GrammarError;
use crate::grammar::Grammar;

pub mod ast_header;
pub mod decls;
pub mod lexer;
pub mod parser;
pub mod unparser;

/// Emission configuration.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Directory the `*.template.*` files are read from.
    pub template_dir: PathBuf,
    /// Generate stderr tracing in the emitted parser.
    pub trace: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("."),
            trace: false,
        }
    }
}

/// The artifacts the parser generator can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum Artifact {
    /// Token ids, `yylval` layout, and exported parser prototypes.
    #[strum(serialize = "parser.h")]
    ParserHeader,
    /// The lexer specification.
    #[strum(serialize = "lexer.l")]
    Lexer,
    /// AST node tags, flags, value union, and builtin ids.
    #[strum(serialize = "ast.h")]
    AstHeader,
    /// The recursive-descent parser.
    #[strum(serialize = "parser.c")]
    Parser,
    /// The AST printer.
    #[strum(serialize = "unparser.c")]
    Unparser,
}

/// Emit one artifact from the preprocessed grammar.
pub fn emit_artifact(
    g: &Grammar,
    artifact: Artifact,
    opts: &EmitOptions,
) -> Result<String, GrammarError> {
    match artifact {
        Artifact::ParserHeader => decls::emit_parser_header(g, opts),
        Artifact::Lexer => lexer::emit_lexer(g, opts),
        Artifact::AstHeader => ast_header::emit_ast_header(g, opts),
        Artifact::Parser => parser::emit_parser_source(g, opts),
        Artifact::Unparser => unparser::emit_unparser(g, opts),
    }
}
