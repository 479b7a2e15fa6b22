//! Disassembler emission.
//!
//! For every encoding of every mnemonic a recognizer block is emitted: a
//! length guard plus one masked comparison per template byte, where each
//! byte's mask is the AND of every argument's mask-out at that offset. A
//! byte fully owned by arguments (mask 0) is skipped; a byte owned by the
//! template alone (mask 0xff) compares directly. Instructions with an
//! optional prefix get two recognizer blocks sharing the argument-printing
//! logic under a byte-offset shift.

use itertools::Itertools;
use metagen_emit::{cline, CWriter};

use crate::insn::{Insn, InsnDef};

/// Emit the doc comment of `disassemble_one`.
pub fn emit_disassembler_doc(w: &mut CWriter) {
    w.line("/**");
    w.line(" * Disassembles a single assembly instruction and prints it to stdout");
    w.line(" *");
    w.line(" * @param data: pointer to the instruction to disassemble");
    w.line(" * @param max_len: max. number of viable bytes in the instruction");
    w.line(" * @return Number of bytes in the disassembled instruction, or 0 on error");
    w.line(" */");
}

/// Emit the `disassemble_one` signature.
pub fn emit_disassembler_signature(w: &mut CWriter, trail: &str) {
    w.line("int");
    cline!(w, "disassemble_one(FILE *file, unsigned char *data, int max_len){trail}");
}

/// Emit the complete disassembler definition.
pub fn emit_disassembler(defs: &[InsnDef], w: &mut CWriter) {
    emit_disassembler_signature(w, "");
    w.line("{");
    for def in defs {
        for insn in def.encodings() {
            emit_try_disassemble(insn, w);
        }
    }
    w.indented(|w| {
        w.line("return 0; // failure");
    });
    w.line("}");
}

/// Emit the recognizer block(s) for one encoding.
fn emit_try_disassemble(insn: &Insn, w: &mut CWriter) {
    if insn.opt_prefix {
        emit_try_one(insn, &insn.machine_code, -1, w);
        emit_try_one(insn, &insn.machine_code[1..], 0, w);
    } else {
        emit_try_one(insn, &insn.machine_code, 0, w);
    }
}

fn emit_try_one(insn: &Insn, machine_code: &[u8], offset_shift: i32, w: &mut CWriter) {
    let mut checks = Vec::new();
    for (index, &byte) in machine_code.iter().enumerate() {
        let offset = offset_shift + index as i32;
        let mask = insn
            .args
            .iter()
            .fold(0xffu8, |m, arg| m & arg.spec.mask_out_at(offset));
        let data_index = offset - offset_shift;
        match mask {
            0 => {}
            0xff => checks.push(format!("data[{data_index}] == 0x{byte:02x}")),
            _ => checks.push(format!("(data[{data_index}] & 0x{mask:02x}) == 0x{byte:02x}")),
        }
    }
    assert!(
        !checks.is_empty(),
        "no recognizable bytes for `{}`",
        insn.name
    );

    w.indented(|w| {
        cline!(
            w,
            "if (max_len >= {} && {}) {{",
            machine_code.len(),
            checks.iter().join(" && ")
        );
        w.indented(|w| {
            cline!(w, "const int machine_code_len = {};", machine_code.len());
            let mut formats = Vec::new();
            let mut format_args = Vec::new();
            for arg in &insn.args {
                let fragment = arg.spec.emit_disassemble(&arg.name, "data", -offset_shift, w);
                formats.extend(fragment.formats);
                format_args.extend(fragment.args);
            }
            w.line("if (file)");
            w.indented(|w| {
                if formats.is_empty() {
                    cline!(w, "fprintf(file, \"{}\");", insn.name);
                } else {
                    cline!(
                        w,
                        "fprintf(file, \"{}\\t{}\", {});",
                        insn.name,
                        formats.iter().join(", "),
                        format_args.iter().join(", ")
                    );
                }
            });
            w.line("return machine_code_len;");
        });
        w.line("}");
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::{ArgSpec, RegSpec};
    use crate::bits::{BitPattern, PREFIX_BYTE};

    #[test]
    fn bare_instruction_compares_every_byte() {
        let insn = Insn::new("jreturn", vec![0xc3], vec![]);
        let mut w = CWriter::new();
        emit_try_disassemble(&insn, &mut w);
        let text = w.finish();
        assert!(text.contains("if (max_len >= 1 && data[0] == 0xc3) {"));
        assert!(text.contains("fprintf(file, \"jreturn\");"));
        assert!(text.contains("return machine_code_len;"));
    }

    #[test]
    fn masked_bytes_use_masked_compare() {
        let insn = Insn::new(
            "add",
            vec![0x48, 0x01, 0xc0],
            vec![
                ArgSpec::Reg(RegSpec::new(vec![
                    BitPattern::new(0, 0, 1),
                    BitPattern::new(2, 0, 3),
                ])),
                ArgSpec::Reg(RegSpec::new(vec![
                    BitPattern::new(0, 2, 1),
                    BitPattern::new(2, 3, 3),
                ])),
            ],
        );
        let mut w = CWriter::new();
        emit_try_disassemble(&insn, &mut w);
        let text = w.finish();
        assert!(text.contains(
            "if (max_len >= 3 && (data[0] & 0xfa) == 0x48 && data[1] == 0x01 && (data[2] & 0xc0) == 0xc0) {"
        ));
        assert!(text.contains("fprintf(file, \"add\\t%s, %s\", register_names[r1].mips, register_names[r2].mips);"));
    }

    #[test]
    fn optional_prefix_gets_two_recognizers() {
        let insn = Insn::with_opt_prefix(
            "jalr",
            0x40,
            vec![0xff, 0xd0],
            vec![ArgSpec::Reg(RegSpec::new(vec![
                BitPattern::new(PREFIX_BYTE, 0, 1),
                BitPattern::new(1, 0, 3),
            ]))],
        );
        let mut w = CWriter::new();
        emit_try_disassemble(&insn, &mut w);
        let text = w.finish();
        // With prefix: three bytes, prefix masked down to its fixed bits.
        assert!(text.contains(
            "if (max_len >= 3 && (data[0] & 0xfe) == 0x40 && data[1] == 0xff && (data[2] & 0xf8) == 0xd0) {"
        ));
        // Without prefix: two bytes.
        assert!(text.contains("if (max_len >= 2 && data[0] == 0xff && (data[1] & 0xf8) == 0xd0) {"));
    }
}
