//! Per-opcode flag tables.
//!
//! Each case lists operands, carry-in, and the full expected F byte —
//! including the undocumented X/Y copies — against the documented Z80
//! flag tables.

use cpu_z80::Z80;
use machine_core::{SimpleBus, TstateClock};

/// Execute `opcode` once with A, B, and F preset; return (A, F) after.
fn alu_op(opcode: &[u8], a: u8, b: u8, f_in: u8) -> (u8, u8) {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, opcode);
    let mut cpu = Z80::new(TstateClock::new());
    cpu.regs.a = a;
    cpu.regs.b = b;
    cpu.regs.f = f_in;
    cpu.step(&mut bus);
    (cpu.regs.a, cpu.regs.f)
}

/// Execute a CB opcode on B; return (B, F) after.
fn cb_op(sub: u8, b: u8, f_in: u8) -> (u8, u8) {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &[0xCB, sub]);
    let mut cpu = Z80::new(TstateClock::new());
    cpu.regs.b = b;
    cpu.regs.f = f_in;
    cpu.step(&mut bus);
    (cpu.regs.b, cpu.regs.f)
}

fn check(table: &[(u8, u8, u8, u8, u8)], opcode: u8, name: &str) {
    for &(a, b, f_in, want_a, want_f) in table {
        let (got_a, got_f) = alu_op(&[opcode], a, b, f_in);
        assert_eq!(
            got_a, want_a,
            "{name} A={a:02X} B={b:02X} F_in={f_in:02X}: result"
        );
        assert_eq!(
            got_f, want_f,
            "{name} A={a:02X} B={b:02X} F_in={f_in:02X}: flags {got_f:02X} != {want_f:02X}"
        );
    }
}

// (a, b, f_in, expected_a, expected_f)

#[test]
fn add_a_b_flags() {
    check(
        &[
            (0x00, 0x00, 0x00, 0x00, 0x40),
            (0x0F, 0x01, 0x00, 0x10, 0x10),
            (0x7F, 0x01, 0x00, 0x80, 0x94),
            (0x80, 0x80, 0x00, 0x00, 0x45),
            (0xFF, 0x01, 0x00, 0x00, 0x51),
            (0x3C, 0x46, 0x00, 0x82, 0x94),
            (0x12, 0x34, 0x00, 0x46, 0x00),
            (0x28, 0x00, 0x00, 0x28, 0x28),
        ],
        0x80,
        "ADD A,B",
    );
}

#[test]
fn adc_a_b_flags() {
    check(
        &[
            (0xFF, 0x00, 0x01, 0x00, 0x51),
            (0x7F, 0x00, 0x01, 0x80, 0x94),
            (0x10, 0x2F, 0x01, 0x40, 0x10),
            // Carry clear behaves exactly like ADD
            (0x7F, 0x01, 0x00, 0x80, 0x94),
        ],
        0x88,
        "ADC A,B",
    );
}

#[test]
fn sub_b_flags() {
    check(
        &[
            (0x00, 0x01, 0x00, 0xFF, 0xBB),
            (0x10, 0x01, 0x00, 0x0F, 0x1A),
            (0x80, 0x01, 0x00, 0x7F, 0x3E),
            (0x42, 0x42, 0x00, 0x00, 0x42),
        ],
        0x90,
        "SUB B",
    );
}

#[test]
fn sbc_a_b_flags() {
    check(
        &[
            (0x01, 0x00, 0x01, 0x00, 0x42),
            (0x00, 0x00, 0x01, 0xFF, 0xBB),
            (0x80, 0x7F, 0x01, 0x00, 0x56),
        ],
        0x98,
        "SBC A,B",
    );
}

#[test]
fn cp_b_flags() {
    // CP: result discarded, X/Y come from the operand
    check(
        &[
            (0x00, 0x28, 0x00, 0x00, 0xBB),
            (0x40, 0x40, 0x00, 0x40, 0x42),
            (0x01, 0x02, 0x00, 0x01, 0x93),
        ],
        0xB8,
        "CP B",
    );
}

#[test]
fn and_b_flags() {
    check(
        &[
            (0xF0, 0x0F, 0x00, 0x00, 0x54),
            (0xFF, 0xFF, 0x00, 0xFF, 0xBC),
            (0x0F, 0x03, 0x01, 0x03, 0x14), // C always cleared
        ],
        0xA0,
        "AND B",
    );
}

#[test]
fn or_b_flags() {
    check(
        &[
            (0x00, 0x00, 0x00, 0x00, 0x44),
            (0x80, 0x01, 0x00, 0x81, 0x84),
            (0x28, 0x00, 0x01, 0x28, 0x2C), // C always cleared
        ],
        0xB0,
        "OR B",
    );
}

#[test]
fn xor_b_flags() {
    check(
        &[
            (0xFF, 0x0F, 0x00, 0xF0, 0xA4),
            (0xAA, 0xAA, 0x01, 0x00, 0x44), // C always cleared
        ],
        0xA8,
        "XOR B",
    );
}

#[test]
fn inc_a_flags() {
    // INC preserves C
    check(
        &[
            (0x0F, 0x00, 0x01, 0x10, 0x11),
            (0x7F, 0x00, 0x00, 0x80, 0x94),
            (0xFF, 0x00, 0x00, 0x00, 0x50),
            (0x27, 0x00, 0x00, 0x28, 0x28),
        ],
        0x3C,
        "INC A",
    );
}

#[test]
fn dec_a_flags() {
    // DEC preserves C and sets N
    check(
        &[
            (0x10, 0x00, 0x00, 0x0F, 0x1A),
            (0x80, 0x00, 0x00, 0x7F, 0x3E),
            (0x01, 0x00, 0x00, 0x00, 0x42),
            (0x00, 0x00, 0x00, 0xFF, 0xBA),
            (0x01, 0x00, 0x01, 0x00, 0x43),
        ],
        0x3D,
        "DEC A",
    );
}

#[test]
fn rotate_and_shift_flags() {
    // (sub-opcode, b_in, f_in, expected_b, expected_f)
    let cases: &[(u8, u8, u8, u8, u8, &str)] = &[
        (0x00, 0x80, 0x00, 0x01, 0x01, "RLC B"),
        (0x00, 0x00, 0x00, 0x00, 0x44, "RLC B"),
        (0x00, 0x55, 0x00, 0xAA, 0xAC, "RLC B"),
        (0x08, 0x01, 0x00, 0x80, 0x81, "RRC B"),
        (0x10, 0x00, 0x01, 0x01, 0x00, "RL B carry in"),
        (0x10, 0x80, 0x00, 0x00, 0x45, "RL B carry out"),
        (0x18, 0x01, 0x00, 0x00, 0x45, "RR B carry out"),
        (0x18, 0x00, 0x01, 0x80, 0x80, "RR B carry in"),
        (0x20, 0xFF, 0x00, 0xFE, 0xA9, "SLA B"),
        (0x28, 0x80, 0x00, 0xC0, 0x84, "SRA B"),
        (0x28, 0x81, 0x00, 0xC0, 0x85, "SRA B"),
        (0x30, 0x00, 0x00, 0x01, 0x00, "SLL B"),
        (0x30, 0x80, 0x00, 0x01, 0x01, "SLL B"),
        (0x38, 0x81, 0x00, 0x40, 0x01, "SRL B"),
        (0x38, 0x01, 0x00, 0x00, 0x45, "SRL B"),
    ];
    for &(sub, b, f_in, want_b, want_f, name) in cases {
        let (got_b, got_f) = cb_op(sub, b, f_in);
        assert_eq!(got_b, want_b, "{name} B={b:02X}: result");
        assert_eq!(
            got_f, want_f,
            "{name} B={b:02X}: flags {got_f:02X} != {want_f:02X}"
        );
    }
}

#[test]
fn daa_flags() {
    // (a, f_in, expected_a, expected_f)
    let cases: &[(u8, u8, u8, u8)] = &[
        (0x0A, 0x00, 0x10, 0x10),
        (0x9A, 0x00, 0x00, 0x55),
        (0x15, 0x12, 0x0F, 0x1E), // after SUB with half-borrow
        (0x99, 0x00, 0x99, 0x8C), // already valid BCD
    ];
    for &(a, f_in, want_a, want_f) in cases {
        let (got_a, got_f) = alu_op(&[0x27], a, 0, f_in);
        assert_eq!(got_a, want_a, "DAA A={a:02X} F={f_in:02X}: result");
        assert_eq!(
            got_f, want_f,
            "DAA A={a:02X} F={f_in:02X}: flags {got_f:02X} != {want_f:02X}"
        );
    }
}

#[test]
fn scf_and_ccf_xy_from_a() {
    // With no prior flag-setting instruction, X/Y follow A
    let (_, f) = alu_op(&[0x37], 0x28, 0, 0x00); // SCF
    assert_eq!(f, 0x29, "SCF: C set, X/Y from A");

    let (_, f) = alu_op(&[0x3F], 0x00, 0, 0x01); // CCF with C set
    assert_eq!(f, 0x10, "CCF: old C moves to H");

    let (_, f) = alu_op(&[0x3F], 0x00, 0, 0x00); // CCF with C clear
    assert_eq!(f, 0x01, "CCF: C set when it was clear");
}

#[test]
fn cpl_sets_h_and_n_only() {
    let (a, f) = alu_op(&[0x2F], 0x55, 0, 0x00);
    assert_eq!(a, 0xAA);
    // H, N plus X/Y from the new A (0xAA has bits 5 and 3 set)
    assert_eq!(f, 0x3A);
}

#[test]
fn rlca_family_touch_only_hnc_and_xy() {
    // RLCA: S/Z/P preserved, H/N cleared, C from bit 7
    let (a, f) = alu_op(&[0x07], 0x81, 0xFF, 0xD6); // S|Z|P|H|N preset
    assert_eq!(a, 0x03);
    assert_eq!(f, 0xC5, "S|Z|P kept, H/N dropped, C set");

    // RRA: carry rotates in from F
    let (a, f) = alu_op(&[0x1F], 0x00, 0, 0x01);
    assert_eq!(a, 0x80);
    assert_eq!(f, 0x00, "carry consumed, none produced");
}

#[test]
fn ld_a_i_copies_iff2_into_pv() {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &[0xED, 0x57, 0xED, 0x57]); // LD A,I twice

    let mut cpu = Z80::new(TstateClock::new());
    cpu.regs.i = 0x00;
    cpu.regs.iff2 = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.f & 0x04, 0x04, "P/V mirrors IFF2 set");
    assert_eq!(cpu.regs.f & 0x40, 0x40, "Z from copied value");

    cpu.regs.iff2 = false;
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.f & 0x04, 0x00, "P/V mirrors IFF2 clear");
}

#[test]
fn ldi_flags() {
    let mut bus = SimpleBus::new();
    bus.load(0x7000, &[0x28, 0x28]);
    bus.load(0x0000, &[0xED, 0xA0]); // LDI

    let mut cpu = Z80::new(TstateClock::new());
    cpu.regs.a = 0x00;
    cpu.regs.f = 0x00;
    cpu.regs.set_hl(0x7000);
    cpu.regs.set_de(0x8000);
    cpu.regs.set_bc(0x0002);
    cpu.step(&mut bus);

    // n = value + A = 0x28: X set, Y clear (from bit 1); BC=1 -> P/V
    assert_eq!(cpu.regs.f, 0x0C);
    assert_eq!(cpu.regs.bc(), 1);

    // Final transfer drops P/V
    bus.load(0x0002, &[0xED, 0xA0]);
    cpu.step(&mut bus);
    assert_eq!(cpu.regs.f, 0x08);
    assert_eq!(cpu.regs.bc(), 0);
}

#[test]
fn cpi_flags() {
    let mut bus = SimpleBus::new();
    bus.load(0x7000, &[0x10]);
    bus.load(0x0000, &[0xED, 0xA1]); // CPI

    let mut cpu = Z80::new(TstateClock::new());
    cpu.regs.a = 0x10;
    cpu.regs.f = 0x00;
    cpu.regs.set_hl(0x7000);
    cpu.regs.set_bc(0x0002);
    cpu.step(&mut bus);

    // Match: Z and N, BC=1 -> P/V
    assert_eq!(cpu.regs.f, 0x46);
    assert_eq!(cpu.regs.hl(), 0x7001);
}

#[test]
fn bit_on_register_takes_xy_from_value() {
    let mut bus = SimpleBus::new();
    bus.load(0x0000, &[0xCB, 0x68]); // BIT 5, B

    let mut cpu = Z80::new(TstateClock::new());
    cpu.regs.b = 0x28;
    cpu.regs.f = 0x00;
    cpu.step(&mut bus);

    // Bit 5 is set: Z clear, H set, X/Y copied from the value
    assert_eq!(cpu.regs.f, 0x38);
}
