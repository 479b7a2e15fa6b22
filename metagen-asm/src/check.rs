//! Consistency checks over the instruction table.
//!
//! Run before emission: a table that fails here would generate encoders and
//! recognizers that disagree with each other.

use thiserror::Error;

use crate::insn::{Insn, InsnDef};

/// Instruction-table consistency failure.
#[derive(Debug, Error)]
pub enum IsaError {
    /// A template byte carries bits inside some argument's bit range.
    #[error(
        "instruction `{insn}`: template byte at offset {offset} (0x{byte:02x}) overlaps argument bits (mask 0x{mask:02x})"
    )]
    TemplateOverlap {
        /// Mnemonic (function name for hidden encodings).
        insn: String,
        /// Template byte offset.
        offset: i32,
        /// Template byte value.
        byte: u8,
        /// Bits claimed by arguments at this offset.
        mask: u8,
    },

    /// A byte inside one argument's exclusive region is still claimed by
    /// another argument.
    #[error("instruction `{insn}`: byte at offset {offset} is exclusive but shared")]
    SharedExclusiveByte {
        /// Mnemonic.
        insn: String,
        /// Template byte offset.
        offset: i32,
    },

    /// Two arguments derived the same name.
    #[error("instruction `{insn}`: duplicate argument name `{name}`")]
    DuplicateArgName {
        /// Mnemonic.
        insn: String,
        /// The colliding name.
        name: String,
    },
}

/// Validate every encoding of every table entry.
pub fn validate(defs: &[InsnDef]) -> Result<(), IsaError> {
    for def in defs {
        for insn in def.encodings() {
            validate_insn(insn)?;
        }
    }
    Ok(())
}

fn validate_insn(insn: &Insn) -> Result<(), IsaError> {
    let mut names = std::collections::HashSet::new();
    for arg in insn.enabled_args() {
        if !names.insert(arg.name.as_str()) {
            return Err(IsaError::DuplicateArgName {
                insn: insn.function_name.clone(),
                name: arg.name.clone(),
            });
        }
    }

    let mut offset = insn.first_offset();
    for &byte in &insn.machine_code {
        let exclusive = insn.args.iter().any(|a| a.spec.in_exclusive_region(offset));
        let mask_out = insn
            .args
            .iter()
            .fold(0xffu8, |m, a| m & a.spec.mask_out_at(offset));
        if exclusive {
            // The owner must be the byte's only claimant.
            let shared = insn
                .args
                .iter()
                .filter(|a| !a.spec.in_exclusive_region(offset))
                .any(|a| a.spec.mask_out_at(offset) != 0xff);
            if shared {
                return Err(IsaError::SharedExclusiveByte {
                    insn: insn.function_name.clone(),
                    offset,
                });
            }
        } else if byte & !mask_out != 0 {
            return Err(IsaError::TemplateOverlap {
                insn: insn.function_name.clone(),
                offset,
                byte,
                mask: !mask_out,
            });
        }
        offset += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::{ArgSpec, RegSpec};
    use crate::bits::BitPattern;

    #[test]
    fn accepts_disjoint_template_and_args() {
        let insn = Insn::new(
            "push",
            vec![0x48, 0x50],
            vec![ArgSpec::Reg(RegSpec::new(vec![
                BitPattern::new(0, 0, 1),
                BitPattern::new(1, 0, 3),
            ]))],
        );
        assert!(validate(&[InsnDef::Plain(insn)]).is_ok());
    }

    #[test]
    fn rejects_template_bits_under_argument_bits() {
        let insn = Insn::new(
            "bad",
            vec![0x48, 0x57],
            vec![ArgSpec::Reg(RegSpec::new(vec![
                BitPattern::new(0, 0, 1),
                BitPattern::new(1, 0, 3),
            ]))],
        );
        let err = validate(&[InsnDef::Plain(insn)]).unwrap_err();
        assert!(matches!(err, IsaError::TemplateOverlap { offset: 1, .. }));
    }
}
