//! Generator for the C machine-code emitter and disassembler.
//!
//! The input is the declarative instruction table in [`isa`]: one entry per
//! mnemonic, each a machine-code byte template plus typed argument specs
//! that pin argument bits to bit ranges within those bytes. From that single
//! table this crate generates both directions of the translation as C
//! source: `emit_*` functions that assemble instructions into a buffer, and
//! a `disassemble_one` function that recognizes and prints them.

#![warn(missing_docs)]

pub mod arg;
pub mod bits;
pub mod check;
pub mod disasm;
pub mod emit;
pub mod insn;
pub mod isa;

pub use arg::{ArgSpec, DisasmFragment, ImmSpec, PcRelSpec, RegSpec};
pub use bits::{BitPattern, PREFIX_BYTE};
pub use check::{validate, IsaError};
pub use emit::{emit_code, emit_headers};
pub use insn::{Alternatives, Insn, InsnDef, NamedArg};
pub use isa::instruction_set;
