//! The declarative x86-64 instruction table.
//!
//! This is the single source of truth the encoder and disassembler are
//! generated from. Mnemonics follow the MIPS-flavored names the rest of the
//! toolchain uses; the byte templates are the x86-64 sequences implementing
//! them, assuming sixteen usable registers.

use crate::arg::{ArgSpec, ImmSpec, PcRelSpec, RegSpec};
use crate::bits::{BitPattern, PREFIX_BYTE};
use crate::insn::{Alternatives, Insn, InsnDef};

/// Destination register of an arithmetic form: REX.B at `base`, low three
/// bits in the ModRM r/m field at `offset`.
fn arithmetic_dest_reg_at(offset: i32, base: i32) -> ArgSpec {
    ArgSpec::Reg(RegSpec::new(vec![
        BitPattern::new(base, 0, 1),
        BitPattern::new(offset, 0, 3),
    ]))
}

fn arithmetic_dest_reg(offset: i32) -> ArgSpec {
    arithmetic_dest_reg_at(offset, 0)
}

/// Source register of an arithmetic form: REX.R at `base`, low three bits
/// in the ModRM reg field at `offset`.
fn arithmetic_src_reg_at(offset: i32, base: i32) -> ArgSpec {
    ArgSpec::Reg(RegSpec::new(vec![
        BitPattern::new(base, 2, 1),
        BitPattern::new(offset, 3, 3),
    ]))
}

fn arithmetic_src_reg(offset: i32) -> ArgSpec {
    arithmetic_src_reg_at(offset, 0)
}

/// Destination register whose REX bit lives in the optional prefix byte.
fn optional_arithmetic_dest_reg(offset: i32) -> ArgSpec {
    ArgSpec::Reg(RegSpec::new(vec![
        BitPattern::new(PREFIX_BYTE, 0, 1),
        BitPattern::new(offset, 0, 3),
    ]))
}

fn joint_reg(subs: Vec<ArgSpec>) -> ArgSpec {
    ArgSpec::Joint(
        subs.into_iter()
            .map(|spec| match spec {
                ArgSpec::Reg(reg) => reg,
                _ => unreachable!("joint registers are built from plain register specs"),
            })
            .collect(),
    )
}

fn imm_int(byte: i32) -> ArgSpec {
    ArgSpec::Imm(ImmSpec {
        c_type: "int",
        format: "%x",
        byte,
        len: 4,
    })
}

fn imm_uint(byte: i32) -> ArgSpec {
    ArgSpec::Imm(ImmSpec {
        c_type: "unsigned int",
        format: "%x",
        byte,
        len: 4,
    })
}

fn imm_long_long(byte: i32) -> ArgSpec {
    ArgSpec::Imm(ImmSpec {
        c_type: "long long",
        format: "%llx",
        byte,
        len: 8,
    })
}

fn pc_relative(byte: i32, width: u32, delta: i32) -> ArgSpec {
    ArgSpec::PcRelative(PcRelSpec { byte, width, delta })
}

/// A compare-and-branch form: `cmp` of two registers followed by a
/// conditional jump with a 32-bit displacement.
fn branch(name: &str, cc: u8) -> InsnDef {
    InsnDef::Plain(Insn::new(
        name,
        vec![0x48, 0x39, 0xc0, 0x0f, cc, 0, 0, 0, 0],
        vec![
            arithmetic_dest_reg(2),
            arithmetic_src_reg(2),
            pc_relative(5, 4, -9),
        ],
    ))
}

/// A compare-with-zero branch: `cmp $0, reg` followed by a conditional jump.
fn branch_zero(name: &str, cc: u8) -> InsnDef {
    InsnDef::Plain(Insn::new(
        name,
        vec![0x48, 0x83, 0xc0, 0x00, 0x0f, cc, 0, 0, 0, 0],
        vec![arithmetic_dest_reg(2), pc_relative(6, 4, -10)],
    ))
}

/// A set-on-comparison form: `xor` the destination, `cmp`, then `setcc`.
fn set_cc(name: &str, setcc: u8) -> InsnDef {
    InsnDef::Plain(Insn::new(
        name,
        vec![0x48, 0x31, 0xc0, 0x48, 0x39, 0xc0, 0x40, 0x0f, setcc, 0xc0],
        vec![
            joint_reg(vec![
                arithmetic_src_reg(2),
                arithmetic_dest_reg(2),
                arithmetic_dest_reg_at(9, 6),
            ]),
            arithmetic_dest_reg(5),
            arithmetic_src_reg(5),
        ],
    ))
}

/// The complete instruction table, in emission order.
pub fn instruction_set() -> Vec<InsnDef> {
    vec![
        InsnDef::Plain(Insn::new(
            "add",
            vec![0x48, 0x01, 0xc0],
            vec![arithmetic_dest_reg(2), arithmetic_src_reg(2)],
        )),
        InsnDef::Plain(Insn::new(
            "sub",
            vec![0x48, 0x29, 0xc0],
            vec![arithmetic_dest_reg(2), arithmetic_src_reg(2)],
        )),
        InsnDef::Plain(Insn::new(
            "move",
            vec![0x48, 0x89, 0xc0],
            vec![arithmetic_dest_reg(2), arithmetic_src_reg(2)],
        )),
        InsnDef::Plain(Insn::new(
            "mul",
            vec![0x48, 0x0f, 0xaf, 0xc0],
            vec![arithmetic_src_reg(3), arithmetic_dest_reg(3)],
        )),
        InsnDef::Plain(Insn::new(
            "div_a2v0",
            vec![0x48, 0xf7, 0xf8],
            vec![arithmetic_dest_reg(2)],
        )),
        InsnDef::Plain(Insn::new(
            "li",
            vec![0x48, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0],
            vec![arithmetic_dest_reg(1), imm_long_long(2)],
        )),
        InsnDef::Plain(Insn::new("jreturn", vec![0xc3], vec![])),
        InsnDef::Plain(Insn::new(
            "jal",
            vec![0xe8, 0xe3, 0x00, 0x00, 0x00, 0x00],
            vec![pc_relative(2, 4, -6)],
        )),
        InsnDef::Plain(Insn::with_opt_prefix(
            "jalr",
            0x40,
            vec![0xff, 0xd0],
            vec![optional_arithmetic_dest_reg(1)],
        )),
        branch("bgt", 0x8f),
        branch("bge", 0x8d),
        branch("blt", 0x8c),
        branch("ble", 0x8e),
        branch("beq", 0x84),
        branch("bne", 0x85),
        branch_zero("bgtz", 0x8f),
        branch_zero("bgez", 0x8d),
        branch_zero("bltz", 0x8c),
        branch_zero("blez", 0x8e),
        branch_zero("bnez", 0x85),
        branch_zero("beqz", 0x84),
        // not: test, mov $0, then sete over a shared destination.
        InsnDef::Plain(Insn::new(
            "not",
            vec![
                0x48, 0x85, 0xc0, 0x40, 0xb8, 0, 0, 0, 0, 0x40, 0x0f, 0x94, 0xc0,
            ],
            vec![
                joint_reg(vec![
                    arithmetic_dest_reg_at(12, 9),
                    arithmetic_dest_reg_at(4, 3),
                ]),
                joint_reg(vec![arithmetic_src_reg(2), arithmetic_dest_reg(2)]),
            ],
        )),
        set_cc("slt", 0x9c),
        set_cc("sle", 0x9e),
        set_cc("seq", 0x94),
        set_cc("sne", 0x95),
        InsnDef::Plain(Insn::new(
            "push",
            vec![0x48, 0x50],
            vec![arithmetic_dest_reg(1)],
        )),
        InsnDef::Plain(Insn::new(
            "pop",
            vec![0x48, 0x58],
            vec![arithmetic_dest_reg(1)],
        )),
        InsnDef::Plain(Insn::new(
            "addiu",
            vec![0x48, 0x81, 0xc0, 0, 0, 0, 0],
            vec![arithmetic_dest_reg(2), imm_uint(3)],
        )),
        InsnDef::Plain(Insn::new(
            "subiu",
            vec![0x48, 0x81, 0xe8, 0, 0, 0, 0],
            vec![arithmetic_dest_reg(2), imm_uint(3)],
        )),
        // sd: plain base+displacement store, with a SIB form when the base
        // register is the stack pointer.
        InsnDef::Alternatives(Alternatives::new(
            "sd",
            (
                vec![0x48, 0x89, 0x80, 0, 0, 0, 0],
                vec![
                    arithmetic_src_reg(2),
                    arithmetic_dest_reg(2),
                    imm_int(3),
                ],
            ),
            vec![(
                "{arg1} == 4",
                (
                    vec![0x48, 0x89, 0x84, 0x24, 0, 0, 0, 0],
                    vec![
                        arithmetic_src_reg(2),
                        ArgSpec::Disabled {
                            inner: Box::new(arithmetic_dest_reg(2)),
                            shown: "4".to_owned(),
                        },
                        imm_int(4),
                    ],
                ),
            )],
        )),
        InsnDef::Plain(Insn::new(
            "ld",
            vec![0x48, 0x8b, 0x80, 0, 0, 0, 0],
            vec![arithmetic_src_reg(2), arithmetic_dest_reg(2), imm_int(3)],
        )),
        InsnDef::Plain(Insn::new(
            "j",
            vec![0xe9, 0, 0, 0, 0],
            vec![pc_relative(1, 4, -5)],
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::validate;
    use rstest::rstest;

    #[test]
    fn table_is_consistent() {
        validate(&instruction_set()).unwrap();
    }

    #[rstest]
    #[case("bgt", 0x8f)]
    #[case("bge", 0x8d)]
    #[case("blt", 0x8c)]
    #[case("ble", 0x8e)]
    #[case("beq", 0x84)]
    #[case("bne", 0x85)]
    fn branches_share_the_compare_template(#[case] name: &str, #[case] cc: u8) {
        let defs = instruction_set();
        let def = defs.iter().find(|d| d.name() == name).unwrap();
        let insn = def.public();
        assert_eq!(&insn.machine_code[..4], &[0x48, 0x39, 0xc0, 0x0f]);
        assert_eq!(insn.machine_code[4], cc);
        assert_eq!(insn.machine_code.len(), 9);
        let names: Vec<&str> = insn.args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r2", "label"]);
    }

    #[test]
    fn every_mnemonic_is_unique() {
        let defs = instruction_set();
        let mut names: Vec<&str> = defs.iter().map(|d| d.name()).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }
}
