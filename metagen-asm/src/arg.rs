//! Typed instruction arguments and their per-byte encoding queries.
//!
//! Every argument answers the same four questions for each byte offset of
//! its instruction: does it own the byte outright (exclusive region), which
//! bits does it contribute there (builder), which bits does it *not* dictate
//! (mask-out), and how is it recovered and printed by the disassembler.
//! The encoder and disassembler emitters are written entirely against these
//! queries.

use itertools::Itertools;
use metagen_emit::{cline, CWriter};

use crate::bits::BitPattern;

/// Printf fragments contributed by one argument to the disassembler's
/// output statement.
#[derive(Debug, Default, Clone)]
pub struct DisasmFragment {
    /// Format-string pieces, joined with `", "` by the caller.
    pub formats: Vec<String>,
    /// Argument expressions matching `formats` one for one.
    pub args: Vec<String>,
}

/// A register operand scattered across one or more bit runs.
#[derive(Debug, Clone)]
pub struct RegSpec {
    // lsb-first, each with the bit position of its run within the value
    placed: Vec<(BitPattern, u32)>,
}

impl RegSpec {
    /// Build from patterns given msb-first, the order encoding tables are
    /// written in. The low-order value bits land in the last pattern.
    pub fn new(patterns: Vec<BitPattern>) -> Self {
        let mut placed = Vec::with_capacity(patterns.len());
        let mut offset = 0;
        for pattern in patterns.into_iter().rev() {
            placed.push((pattern, offset));
            offset += u32::from(pattern.width);
        }
        Self { placed }
    }

    fn builder_at(&self, name: &str, offset: i32) -> Option<String> {
        let parts: Vec<String> = self
            .placed
            .iter()
            .filter(|(p, _)| p.byte == offset)
            .map(|(p, bit_offset)| p.extract(name, *bit_offset))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }

    fn mask_out_at(&self, offset: i32) -> u8 {
        self.placed
            .iter()
            .filter(|(p, _)| p.byte == offset)
            .fold(0xff, |mask, (p, _)| mask & p.mask_out())
    }

    /// OR-chain recombining the value from the data bytes. Runs whose byte
    /// lands before the start of the buffer (prefix byte of a prefixless
    /// encoding) are skipped.
    fn decode_expr(&self, data: &str, shift: i32) -> String {
        self.placed
            .iter()
            .filter(|(p, _)| p.byte + shift >= 0)
            .map(|(p, bit_offset)| {
                let byte_expr = format!("{data}[{}]", p.byte + shift);
                format!("({} << {bit_offset})", p.decode(&byte_expr))
            })
            .join(" | ")
    }

    fn emit_disassemble(&self, name: &str, data: &str, shift: i32, w: &mut CWriter) -> DisasmFragment {
        cline!(w, "int {name} = {};", self.decode_expr(data, shift));
        DisasmFragment {
            formats: vec!["%s".to_owned()],
            args: vec![format!("register_names[{name}].mips")],
        }
    }
}

/// An immediate operand occupying a contiguous byte range.
#[derive(Debug, Clone)]
pub struct ImmSpec {
    /// C type of the operand.
    pub c_type: &'static str,
    /// Printf format used by the disassembler.
    pub format: &'static str,
    /// First byte of the operand's region.
    pub byte: i32,
    /// Region length in bytes.
    pub len: u32,
}

/// A PC-relative jump target. The encoder records a fixup site instead of
/// writing the displacement.
#[derive(Debug, Clone)]
pub struct PcRelSpec {
    /// First byte of the displacement field.
    pub byte: i32,
    /// Displacement width in bytes.
    pub width: u32,
    /// Displacement bias from the instruction start; the fixup resolver in
    /// the buffer runtime accounts for it via the recorded base position.
    pub delta: i32,
}

/// The argument sum type.
#[derive(Debug, Clone)]
pub enum ArgSpec {
    /// Register operand.
    Reg(RegSpec),
    /// One register value fanned out into several disjoint encodings.
    Joint(Vec<RegSpec>),
    /// Immediate operand with an exclusive byte region.
    Imm(ImmSpec),
    /// PC-relative displacement with an exclusive byte region.
    PcRelative(PcRelSpec),
    /// Operand fixed to a literal: neither encoded nor decoded, but still
    /// printed by the disassembler with the literal in place of a value.
    Disabled {
        /// The argument being pinned.
        inner: Box<ArgSpec>,
        /// Literal shown by the disassembler.
        shown: String,
    },
}

impl ArgSpec {
    /// Generic operand class used to derive argument names. Disabled
    /// arguments take no part in naming.
    pub fn generic_name(&self) -> Option<&'static str> {
        match self {
            ArgSpec::Reg(_) | ArgSpec::Joint(_) => Some("r"),
            ArgSpec::Imm(_) => Some("imm"),
            ArgSpec::PcRelative(_) => Some("label"),
            ArgSpec::Disabled { .. } => None,
        }
    }

    /// C parameter type in the emitted encoder signature.
    pub fn c_type(&self) -> &'static str {
        match self {
            ArgSpec::Reg(_) | ArgSpec::Joint(_) => "int",
            ArgSpec::Imm(imm) => imm.c_type,
            ArgSpec::PcRelative(_) => "relative_jump_label_t *",
            ArgSpec::Disabled { .. } => "",
        }
    }

    /// Whether this argument is pinned to a literal.
    pub fn is_disabled(&self) -> bool {
        matches!(self, ArgSpec::Disabled { .. })
    }

    /// Closed byte range this argument owns outright, if any.
    pub fn exclusive_region(&self) -> Option<(i32, i32)> {
        match self {
            ArgSpec::Imm(imm) => Some((imm.byte, imm.byte + imm.len as i32 - 1)),
            ArgSpec::PcRelative(pc) => Some((pc.byte, pc.byte + pc.width as i32 - 1)),
            _ => None,
        }
    }

    /// Whether `offset` falls inside the exclusive region.
    pub fn in_exclusive_region(&self, offset: i32) -> bool {
        self.exclusive_region()
            .is_some_and(|(lo, hi)| offset >= lo && offset <= hi)
    }

    /// C expression for the bits this argument contributes at `offset`,
    /// if any.
    pub fn builder_at(&self, name: &str, offset: i32) -> Option<String> {
        match self {
            ArgSpec::Reg(reg) => reg.builder_at(name, offset),
            ArgSpec::Joint(subs) => {
                let parts: Vec<String> = subs
                    .iter()
                    .filter_map(|sub| sub.builder_at(name, offset))
                    .map(|b| format!("({b})"))
                    .collect();
                if parts.is_empty() {
                    None
                } else {
                    Some(parts.join(" | "))
                }
            }
            ArgSpec::Imm(_) | ArgSpec::PcRelative(_) | ArgSpec::Disabled { .. } => None,
        }
    }

    /// Byte mask of the bits at `offset` this argument does NOT dictate.
    pub fn mask_out_at(&self, offset: i32) -> u8 {
        match self {
            ArgSpec::Reg(reg) => reg.mask_out_at(offset),
            ArgSpec::Joint(subs) => subs.iter().fold(0xff, |m, sub| m & sub.mask_out_at(offset)),
            ArgSpec::Imm(_) | ArgSpec::PcRelative(_) => {
                if self.in_exclusive_region(offset) {
                    0x00
                } else {
                    0xff
                }
            }
            ArgSpec::Disabled { .. } => 0xff,
        }
    }

    /// Emit the encoder statements that fill this argument's exclusive
    /// region. No-op for arguments without one.
    pub fn emit_copy_to_region(&self, name: &str, data: &str, w: &mut CWriter) {
        match self {
            ArgSpec::Imm(imm) => {
                cline!(w, "memcpy({data} + {}, &{name}, {});", imm.byte, imm.len);
            }
            ArgSpec::PcRelative(pc) => {
                cline!(w, "{name}->label_position = {data} + {};", pc.byte);
                cline!(w, "{name}->base_position = {data} + machine_code_len;");
            }
            _ => {}
        }
    }

    /// Emit the disassembler statements recovering this argument and return
    /// its printf fragments. `shift` relocates template byte offsets into
    /// `data` indices (+1 when a prefix byte is present, 0 otherwise).
    pub fn emit_disassemble(
        &self,
        name: &str,
        data: &str,
        shift: i32,
        w: &mut CWriter,
    ) -> DisasmFragment {
        match self {
            ArgSpec::Reg(reg) => reg.emit_disassemble(name, data, shift, w),
            ArgSpec::Joint(subs) => subs[0].emit_disassemble(name, data, shift, w),
            ArgSpec::Imm(imm) => {
                if imm.byte + shift < 0 {
                    return DisasmFragment::default();
                }
                cline!(w, "{} {name};", imm.c_type);
                cline!(w, "memcpy(&{name}, {data} + {}, {});", imm.byte + shift, imm.len);
                DisasmFragment {
                    formats: vec![imm.format.to_owned()],
                    args: vec![name.to_owned()],
                }
            }
            ArgSpec::PcRelative(pc) => {
                if pc.byte + shift < 0 {
                    return DisasmFragment::default();
                }
                cline!(w, "int relative_{name};");
                cline!(w, "memcpy(&relative_{name}, {data} + {}, {});", pc.byte + shift, pc.width);
                cline!(
                    w,
                    "unsigned char *{name} = {data} + relative_{name} + machine_code_len;"
                );
                DisasmFragment {
                    formats: vec!["%p".to_owned()],
                    args: vec![name.to_owned()],
                }
            }
            ArgSpec::Disabled { inner, shown } => {
                // Declarations go to a sink: only the printed form survives.
                let mut sink = CWriter::new();
                inner.emit_disassemble(shown, data, shift, &mut sink)
            }
        }
    }
}
