//! Scenario tests over the emitted C text.
//!
//! The generated functions cannot be compiled here, so these tests pin the
//! emitted expressions exactly and mirror their arithmetic on sample values
//! to check the encode/decode contract.

use metagen_asm::{emit_code, emit_headers, instruction_set};

fn code() -> String {
    emit_code(&instruction_set())
}

#[test]
fn single_byte_instruction_round_trips() {
    let text = code();
    assert!(text.contains("emit_jreturn(buffer_t *buf)"));
    assert!(text.contains("const int machine_code_len = 1;"));
    assert!(text.contains("data[0] = 0xc3;"));
    assert!(text.contains("if (max_len >= 1 && data[0] == 0xc3) {"));
}

#[test]
fn two_register_arithmetic_encodes_into_split_fields() {
    let text = code();
    assert!(text.contains("data[0] = 0x48 | ((r1 >> 3) & 0x01) | ((r2 >> 1) & 0x04);"));
    assert!(text.contains("data[1] = 0x01;"));
    assert!(text.contains("data[2] = 0xc0 | (r1 & 0x07) | ((r2 << 3) & 0x38);"));

    // Mirror of the emitted expressions: dest=3, src=5 must give 48 01 eb.
    let (r1, r2) = (3u8, 5u8);
    let byte0 = 0x48 | ((r1 >> 3) & 0x01) | ((r2 >> 1) & 0x04);
    let byte2 = 0xc0 | (r1 & 0x07) | ((r2 << 3) & 0x38);
    assert_eq!([byte0, 0x01, byte2], [0x48, 0x01, 0xeb]);

    // Decode direction, mirroring the emitted recovery expressions.
    let data = [0x48u8, 0x01, 0xeb];
    let dest = ((data[2] & 0x07) >> 0) | (((data[0] & 0x01) >> 0) << 3);
    let src = ((data[2] & 0x38) >> 3) | (((data[0] & 0x04) >> 2) << 3);
    assert_eq!((dest, src), (3, 5));

    // The recognizer accepts the encoding it produced.
    assert!(text.contains(
        "if (max_len >= 3 && (data[0] & 0xfa) == 0x48 && data[1] == 0x01 && (data[2] & 0xc0) == 0xc0) {"
    ));
    assert_eq!(data[0] & 0xfa, 0x48);
    assert_eq!(data[2] & 0xc0, 0xc0);
}

#[test]
fn optional_prefix_appears_only_for_high_registers() {
    let text = code();
    assert!(text.contains("if (((r >> 3) & 0x01)) { data_prefix_len = 1; }"));
    assert!(text.contains("const int machine_code_len = 3 - 1 + data_prefix_len;"));

    // reg = 7: prefix bit clear, two bytes.
    let r = 7u8;
    assert_eq!((r >> 3) & 0x01, 0);
    assert_eq!([0xff, 0xd0 | (r & 0x07)], [0xff, 0xd7]);

    // reg = 9: prefix present, three bytes.
    let r = 9u8;
    assert_eq!((r >> 3) & 0x01, 1);
    let prefix = 0x40 | ((r >> 3) & 0x01);
    assert_eq!([prefix, 0xff, 0xd0 | (r & 0x07)], [0x41, 0xff, 0xd1]);

    // Both recognizer shapes are present.
    assert!(text.contains(
        "if (max_len >= 3 && (data[0] & 0xfe) == 0x40 && data[1] == 0xff && (data[2] & 0xf8) == 0xd0) {"
    ));
    assert!(text.contains("if (max_len >= 2 && data[0] == 0xff && (data[1] & 0xf8) == 0xd0) {"));
}

#[test]
fn alternative_encodings_dispatch_on_guard() {
    let text = code();
    // Hidden encoders: SIB form is 8 bytes, default form 7.
    assert!(text.contains("static void\nemit_sd__0(buffer_t *buf, int r, int imm)"));
    assert!(text.contains("static void\nemit_sd__1(buffer_t *buf, int r1, int r2, int imm)"));
    assert!(text.contains("const int machine_code_len = 8;"));
    assert!(text.contains("const int machine_code_len = 7;"));
    // Dispatcher tests the stack-pointer guard, then falls back.
    assert!(text.contains("if (r2 == 4) {"));
    assert!(text.contains("emit_sd__0(buf, r1, imm);"));
    assert!(text.contains("emit_sd__1(buf, r1, r2, imm);"));
    // The SIB recognizer checks its extra constant byte; the disabled base
    // register is still printed.
    assert!(text.contains("data[3] == 0x24"));
    assert!(text.contains("register_names[4].mips"));
}

#[test]
fn pc_relative_arguments_record_fixups() {
    let text = code();
    assert!(text.contains("label->label_position = data + 2;"));
    assert!(text.contains("label->base_position = data + machine_code_len;"));
    // jal never writes its displacement bytes directly.
    assert!(!text.contains("memcpy(data + 2, &label"));
}

#[test]
fn header_and_code_agree_on_signatures() {
    let headers = emit_headers(&instruction_set());
    let text = code();
    for line in headers.lines().filter(|l| l.starts_with("emit_")) {
        let signature = line.trim_end_matches(';');
        assert!(
            text.contains(signature),
            "missing definition for `{signature}`"
        );
    }
}
