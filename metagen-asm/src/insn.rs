//! Instruction definitions and encoder emission.
//!
//! An [`Insn`] couples a mnemonic with a machine-code byte template and a
//! list of typed arguments. Emission folds the template and the arguments'
//! per-byte builder expressions into one C function per instruction:
//! template bytes OR in argument bits, exclusive regions are filled by a
//! single copy each, and the optional prefix byte is materialized only when
//! an argument actually sets a bit in it.

use std::collections::HashMap;

use itertools::Itertools;
use metagen_emit::{cline, CWriter};

use crate::arg::ArgSpec;
use crate::bits::PREFIX_BYTE;

/// Prefix of every emitted encoder function name.
pub const EMIT_PREFIX: &str = "emit_";

/// One argument slot of an instruction: the derived name plus the spec.
#[derive(Debug, Clone)]
pub struct NamedArg {
    /// Parameter name in the emitted encoder; literal text for disabled
    /// arguments.
    pub name: String,
    /// The argument's encoding spec.
    pub spec: ArgSpec,
}

/// A single encoding of one mnemonic.
#[derive(Debug, Clone)]
pub struct Insn {
    /// Assembly-level mnemonic, as printed by the disassembler.
    pub name: String,
    /// Emitted function name; differs from `name` for hidden alternative
    /// encoders.
    pub function_name: String,
    /// Whether the emitted encoder is `static`.
    pub is_static: bool,
    /// Machine-code template. When `opt_prefix` is set, the first byte is
    /// the optional prefix and lives at byte offset −1.
    pub machine_code: Vec<u8>,
    /// Arguments in signature order.
    pub args: Vec<NamedArg>,
    /// Whether the template starts with an optional prefix byte.
    pub opt_prefix: bool,
}

/// Derive argument names from generic names: a generic name occurring k > 1
/// times gets suffixes 1..=k left to right; disabled arguments show their
/// pinned literal instead.
fn name_args(specs: Vec<ArgSpec>) -> Vec<NamedArg> {
    let mut multiplicity: HashMap<&str, usize> = HashMap::new();
    for spec in &specs {
        if let Some(generic) = spec.generic_name() {
            *multiplicity.entry(generic).or_insert(0) += 1;
        }
    }

    let mut seen: HashMap<&'static str, usize> = HashMap::new();
    specs
        .into_iter()
        .map(|spec| {
            let name = match (&spec, spec.generic_name()) {
                (ArgSpec::Disabled { shown, .. }, _) => shown.clone(),
                (_, Some(generic)) => {
                    let occurrence = seen.entry(generic).or_insert(0);
                    *occurrence += 1;
                    if multiplicity[generic] > 1 {
                        format!("{generic}{occurrence}")
                    } else {
                        generic.to_owned()
                    }
                }
                (_, None) => String::new(),
            };
            NamedArg { name, spec }
        })
        .collect()
}

impl Insn {
    /// Plain instruction: all template bytes are unconditionally emitted.
    pub fn new(name: &str, machine_code: Vec<u8>, args: Vec<ArgSpec>) -> Self {
        assert!(!machine_code.is_empty(), "empty machine code for `{name}`");
        Self {
            name: name.to_owned(),
            function_name: name.to_owned(),
            is_static: false,
            machine_code,
            args: name_args(args),
            opt_prefix: false,
        }
    }

    /// Instruction with an optional one-byte prefix, emitted only when an
    /// argument contributes a nonzero bit at byte −1.
    pub fn with_opt_prefix(name: &str, prefix: u8, machine_code: Vec<u8>, args: Vec<ArgSpec>) -> Self {
        let mut full = Vec::with_capacity(machine_code.len() + 1);
        full.push(prefix);
        full.extend(machine_code);
        Self {
            opt_prefix: true,
            ..Self::new(name, full, args)
        }
    }

    /// Byte offset of the first template byte (−1 with an optional prefix).
    pub fn first_offset(&self) -> i32 {
        if self.opt_prefix {
            PREFIX_BYTE
        } else {
            0
        }
    }

    /// Arguments that appear in the encoder signature.
    pub fn enabled_args(&self) -> impl Iterator<Item = &NamedArg> {
        self.args.iter().filter(|a| !a.spec.is_disabled())
    }

    /// Builder expressions (each parenthesized) contributed at `offset`, or
    /// `None` when the byte lies inside some argument's exclusive region
    /// and must not be written piecemeal.
    pub fn builders_at(&self, offset: i32) -> Option<Vec<String>> {
        let mut builders = Vec::new();
        for arg in &self.args {
            if arg.spec.in_exclusive_region(offset) {
                return None;
            }
            if let Some(builder) = arg.spec.builder_at(&arg.name, offset) {
                builders.push(format!("({builder})"));
            }
        }
        Some(builders)
    }

    /// Emit `void\nemit_<name>(buffer_t *buf, …)<trail>`.
    pub fn emit_signature(&self, w: &mut CWriter, trail: &str) {
        let params = std::iter::once("buffer_t *buf".to_owned())
            .chain(self.enabled_args().map(|a| {
                let ty = a.spec.c_type();
                if ty.ends_with('*') {
                    format!("{ty}{}", a.name)
                } else {
                    format!("{ty} {}", a.name)
                }
            }))
            .join(", ");
        w.line(if self.is_static { "static void" } else { "void" });
        cline!(w, "{EMIT_PREFIX}{}({params}){trail}", self.function_name);
    }

    /// C expression for the encoded length.
    fn len_expr(&self) -> String {
        if self.opt_prefix {
            format!("{} - 1 + data_prefix_len", self.machine_code.len())
        } else {
            format!("{}", self.machine_code.len())
        }
    }

    /// Emit the full encoder definition.
    pub fn emit_encoder(&self, w: &mut CWriter) {
        self.emit_signature(w, "");
        w.line("{");
        w.indented(|w| {
            if self.opt_prefix {
                let prefix_bits = self
                    .builders_at(PREFIX_BYTE)
                    .expect("prefix byte cannot be an exclusive region")
                    .join(" || ");
                w.line("int data_prefix_len = 0;");
                cline!(w, "if ({prefix_bits}) {{ data_prefix_len = 1; }}");
            }
            cline!(w, "const int machine_code_len = {};", self.len_expr());
            w.line("unsigned char *data = buffer_alloc(buf, machine_code_len);");
            if self.opt_prefix {
                w.line("data += data_prefix_len;");
            }

            let mut offset = self.first_offset();
            for &byte in &self.machine_code {
                if let Some(builders) = self.builders_at(offset) {
                    let tail = builders.iter().map(|b| format!(" | {b}")).join("");
                    if offset < 0 {
                        w.line("if (data_prefix_len) {");
                        w.indented(|w| {
                            cline!(w, "data[{offset}] = 0x{byte:02x}{tail};");
                        });
                        w.line("}");
                    } else {
                        cline!(w, "data[{offset}] = 0x{byte:02x}{tail};");
                    }
                }
                offset += 1;
            }

            for arg in &self.args {
                if arg.spec.exclusive_region().is_some() {
                    arg.spec.emit_copy_to_region(&arg.name, "data", w);
                }
            }
        });
        w.line("}");
    }
}

/// One mnemonic with several guarded encodings behind a single public
/// encoder symbol.
#[derive(Debug, Clone)]
pub struct Alternatives {
    /// Public instruction carrying the default encoding; used for the
    /// prototype and as the default recognizer.
    pub public: Insn,
    /// Hidden static encoder for the default encoding.
    pub default_fn: Insn,
    /// `(guard, encoder)` pairs. Guards are C conditions over `{arg0}` …
    /// `{argN}` placeholders, tried in order by the dispatcher.
    pub options: Vec<(String, Insn)>,
}

impl Alternatives {
    /// Build from the default encoding plus guarded alternates.
    ///
    /// Alternates may pin arguments with [`ArgSpec::Disabled`] but must
    /// keep the default's argument order.
    pub fn new(
        name: &str,
        default: (Vec<u8>, Vec<ArgSpec>),
        options: Vec<(&str, (Vec<u8>, Vec<ArgSpec>))>,
    ) -> Self {
        let public = Insn::new(name, default.0.clone(), default.1.clone());
        let options: Vec<(String, Insn)> = options
            .into_iter()
            .enumerate()
            .map(|(index, (guard, (code, args)))| {
                let mut insn = Insn::new(name, code, args);
                insn.is_static = true;
                insn.function_name = format!("{name}__{index}");
                (guard.to_owned(), insn)
            })
            .collect();
        let mut default_fn = Insn::new(name, default.0, default.1);
        default_fn.is_static = true;
        default_fn.function_name = format!("{name}__{}", options.len());
        Self {
            public,
            default_fn,
            options,
        }
    }

    /// Emit the hidden encoders followed by the public dispatcher.
    pub fn emit_encoder(&self, w: &mut CWriter) {
        self.default_fn.emit_encoder(w);
        w.blank();
        for (_, option) in &self.options {
            option.emit_encoder(w);
            w.blank();
        }

        let arg_names: Vec<&str> = self.public.args.iter().map(|a| a.name.as_str()).collect();

        self.public.emit_signature(w, "");
        w.line("{");
        w.indented(|w| {
            for (guard, option) in &self.options {
                cline!(w, "if ({}) {{", substitute_guard(guard, &arg_names));
                w.indented(|w| {
                    w.line(invoke(option, &arg_names));
                    w.line("return;");
                });
                w.line("}");
            }
            w.line(invoke(&self.default_fn, &arg_names));
        });
        w.line("}");
    }
}

/// Replace `{argN}` placeholders in a guard with the dispatcher's argument
/// names.
fn substitute_guard(guard: &str, arg_names: &[&str]) -> String {
    let mut cond = guard.to_owned();
    for (index, name) in arg_names.iter().enumerate() {
        cond = cond.replace(&format!("{{arg{index}}}"), name);
    }
    cond
}

/// Call expression forwarding the dispatcher's arguments, skipping slots the
/// encoding has pinned.
fn invoke(insn: &Insn, arg_names: &[&str]) -> String {
    let args = std::iter::once("buf")
        .chain(
            insn.args
                .iter()
                .zip(arg_names)
                .filter(|(arg, _)| !arg.spec.is_disabled())
                .map(|(_, name)| *name),
        )
        .join(", ");
    format!("{EMIT_PREFIX}{}({args});", insn.function_name)
}

/// A table entry: either one encoding or a guarded family.
#[derive(Debug, Clone)]
pub enum InsnDef {
    /// Single encoding.
    Plain(Insn),
    /// Guarded encoding family.
    Alternatives(Alternatives),
}

impl InsnDef {
    /// Mnemonic.
    pub fn name(&self) -> &str {
        match self {
            InsnDef::Plain(insn) => &insn.name,
            InsnDef::Alternatives(alt) => &alt.public.name,
        }
    }

    /// The instruction whose signature is the public contract.
    pub fn public(&self) -> &Insn {
        match self {
            InsnDef::Plain(insn) => insn,
            InsnDef::Alternatives(alt) => &alt.public,
        }
    }

    /// Every encoding the disassembler must recognize, alternates first so
    /// more specific forms win over the default.
    pub fn encodings(&self) -> Vec<&Insn> {
        match self {
            InsnDef::Plain(insn) => vec![insn],
            InsnDef::Alternatives(alt) => alt
                .options
                .iter()
                .map(|(_, insn)| insn)
                .chain(std::iter::once(&alt.public))
                .collect(),
        }
    }

    /// Emit the encoder definition(s).
    pub fn emit_encoder(&self, w: &mut CWriter) {
        match self {
            InsnDef::Plain(insn) => insn.emit_encoder(w),
            InsnDef::Alternatives(alt) => alt.emit_encoder(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arg::{ImmSpec, RegSpec};
    use crate::bits::BitPattern;

    fn dest(offset: i32) -> ArgSpec {
        ArgSpec::Reg(RegSpec::new(vec![
            BitPattern::new(0, 0, 1),
            BitPattern::new(offset, 0, 3),
        ]))
    }

    fn src(offset: i32) -> ArgSpec {
        ArgSpec::Reg(RegSpec::new(vec![
            BitPattern::new(0, 2, 1),
            BitPattern::new(offset, 3, 3),
        ]))
    }

    #[test]
    fn repeated_generics_get_numbered_left_to_right() {
        let insn = Insn::new("add", vec![0x48, 0x01, 0xc0], vec![dest(2), src(2)]);
        let names: Vec<&str> = insn.args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["r1", "r2"]);
    }

    #[test]
    fn lone_generic_keeps_bare_name() {
        let insn = Insn::new(
            "li",
            vec![0x48, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0],
            vec![
                dest(1),
                ArgSpec::Imm(ImmSpec {
                    c_type: "long long",
                    format: "%llx",
                    byte: 2,
                    len: 8,
                }),
            ],
        );
        let names: Vec<&str> = insn.args.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["r", "imm"]);
    }

    #[test]
    fn encoder_skips_exclusive_bytes_and_copies_once() {
        let insn = Insn::new(
            "li",
            vec![0x48, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0],
            vec![
                dest(1),
                ArgSpec::Imm(ImmSpec {
                    c_type: "long long",
                    format: "%llx",
                    byte: 2,
                    len: 8,
                }),
            ],
        );
        let mut w = CWriter::new();
        insn.emit_encoder(&mut w);
        let text = w.finish();
        assert!(text.contains("const int machine_code_len = 10;"));
        assert!(text.contains("data[0] = 0x48 | ((r >> 3) & 0x01);"));
        assert!(text.contains("data[1] = 0xb8 | (r & 0x07);"));
        assert!(!text.contains("data[2]"));
        assert!(text.contains("memcpy(data + 2, &imm, 8);"));
    }

    #[test]
    fn optional_prefix_encoder_guards_byte_minus_one() {
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
        insn.emit_encoder(&mut w);
        let text = w.finish();
        assert!(text.contains("if (((r >> 3) & 0x01)) { data_prefix_len = 1; }"));
        assert!(text.contains("const int machine_code_len = 3 - 1 + data_prefix_len;"));
        assert!(text.contains("data += data_prefix_len;"));
        assert!(text.contains("data[-1] = 0x40 | ((r >> 3) & 0x01);"));
        assert!(text.contains("data[1] = 0xd0 | (r & 0x07);"));
    }

    #[test]
    fn dispatcher_substitutes_guards_and_skips_pinned_args() {
        let alt = Alternatives::new(
            "sd",
            (
                vec![0x48, 0x89, 0x80, 0, 0, 0, 0],
                vec![
                    src(2),
                    dest(2),
                    ArgSpec::Imm(ImmSpec {
                        c_type: "int",
                        format: "%x",
                        byte: 3,
                        len: 4,
                    }),
                ],
            ),
            vec![(
                "{arg1} == 4",
                (
                    vec![0x48, 0x89, 0x84, 0x24, 0, 0, 0, 0],
                    vec![
                        src(2),
                        ArgSpec::Disabled {
                            inner: Box::new(dest(2)),
                            shown: "4".to_owned(),
                        },
                        ArgSpec::Imm(ImmSpec {
                            c_type: "int",
                            format: "%x",
                            byte: 4,
                            len: 4,
                        }),
                    ],
                ),
            )],
        );
        let mut w = CWriter::new();
        alt.emit_encoder(&mut w);
        let text = w.finish();
        assert!(text.contains("static void\nemit_sd__0("));
        assert!(text.contains("static void\nemit_sd__1("));
        assert!(text.contains("if (r2 == 4) {"));
        assert!(text.contains("emit_sd__0(buf, r1, imm);"));
        assert!(text.contains("emit_sd__1(buf, r1, r2, imm);"));
    }
}
