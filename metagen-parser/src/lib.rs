//! Generator for the toy language's lexer, parser, and AST definitions.
//!
//! The input is the declarative grammar in [`language`]: terminals with
//! their lexer rules, nonterminals, productions paired with
//! AST-construction expressions, and repetition forms. After preprocessing
//! (left-recursion and epsilon elimination), five C artifacts are emitted
//! by plugging generated fragments into template files: the parser header,
//! the lexer specification, the AST type header, the recursive-descent
//! parser, and the AST unparser.

#![warn(missing_docs)]

pub mod ast;
pub mod emit;
pub mod error;
pub mod grammar;
pub mod language;
pub mod layout;
pub mod preprocess;
pub mod term;
pub mod tree;

pub use ast::{AstGen, NtId};
pub use emit::{emit_artifact, Artifact, EmitOptions};
pub use error::GrammarError;
pub use grammar::{Grammar, NtData, Rule, Symbol, SymbolKey};
pub use language::language_grammar;
pub use layout::{compute_layout, AstLayout};
pub use preprocess::preprocess;
pub use term::{Term, TermId};
pub use tree::{decision_tree, DecisionTree};
