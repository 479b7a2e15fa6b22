//! The two emitted artifacts: prototypes and definitions.

use metagen_emit::CWriter;
use tracing::debug;

use crate::disasm::{emit_disassembler, emit_disassembler_doc, emit_disassembler_signature};
use crate::insn::InsnDef;

const BANNER: &str =
    "// This is GENERATED CODE.  Do not modify by hand, or your modifications will be lost on the next rebuild!";

/// Emit the `headers` artifact: encoder prototypes plus the disassembler
/// prototype.
pub fn emit_headers(defs: &[InsnDef]) -> String {
    debug!(instructions = defs.len(), "emitting encoder prototypes");
    let mut w = CWriter::new();
    w.line(BANNER);
    w.line("#include \"assembler-buffer.h\"");
    for def in defs {
        def.public().emit_signature(&mut w, ";");
    }
    emit_disassembler_doc(&mut w);
    emit_disassembler_signature(&mut w, ";");
    w.finish()
}

/// Emit the `code` artifact: every encoder definition followed by the
/// disassembler.
pub fn emit_code(defs: &[InsnDef]) -> String {
    debug!(instructions = defs.len(), "emitting encoder definitions");
    let mut w = CWriter::new();
    w.line(BANNER);
    w.line("#include <string.h>");
    w.line("#include <stdio.h>");
    w.blank();
    w.line("#include \"assembler-buffer.h\"");
    w.line("#include \"registers.h\"");
    w.blank();
    for def in defs {
        def.emit_encoder(&mut w);
        w.blank();
    }
    emit_disassembler(defs, &mut w);
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isa::instruction_set;

    #[test]
    fn headers_declare_every_public_encoder_once() {
        let text = emit_headers(&instruction_set());
        assert!(text.contains("emit_add(buffer_t *buf, int r1, int r2);"));
        assert!(text.contains("emit_jreturn(buffer_t *buf);"));
        assert!(text.contains("emit_jal(buffer_t *buf, relative_jump_label_t *label);"));
        // Hidden alternative encoders stay out of the header.
        assert!(!text.contains("emit_sd__0"));
        assert!(text.contains("disassemble_one(FILE *file, unsigned char *data, int max_len);"));
    }

    #[test]
    fn code_defines_dispatcher_after_hidden_encoders() {
        let text = emit_code(&instruction_set());
        let hidden = text.find("emit_sd__0(buffer_t *buf").unwrap();
        let dispatcher = text.find("emit_sd(buffer_t *buf").unwrap();
        assert!(hidden < dispatcher);
        assert!(text.contains("return 0; // failure"));
    }
}
