//! Shared emission layer for the metagen code generators.
//!
//! Both generators assemble C source as plain text: the instruction-set
//! generator by direct concatenation, the parser generator by plugging
//! fragments into template files with `$$NAME$$` hole markers. This crate
//! holds the pieces common to both: the indented writer, the template
//! engine, and the error type their failures surface through.

#![warn(missing_docs)]

mod error;
mod template;
mod writer;

pub use error::EmitError;
pub use template::{TemplateFile, GENERATED_BANNER};
pub use writer::CWriter;
