//! Instruction execution for the Z80.
//!
//! One exhaustive match per prefix family. Each arm performs its own bus
//! cycles in hardware order and charges internal cycles explicitly, so the
//! per-opcode totals reproduce the datasheet T-state counts.

#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]

use machine_core::Bus;

use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

use super::{Index, Z80};

impl Z80 {
    /// Dispatch a fetched opcode to its family.
    pub(super) fn execute<B: Bus>(&mut self, bus: &mut B, opcode: u8) {
        match opcode {
            0xCB => {
                let op = self.fetch_opcode(bus);
                self.execute_cb(bus, op);
            }
            0xDD => self.execute_indexed(bus, Index::Ix),
            0xFD => self.execute_indexed(bus, Index::Iy),
            0xED => {
                let op = self.fetch_opcode(bus);
                self.execute_ed(bus, op);
            }
            _ => self.execute_unprefixed(bus, opcode),
        }
    }

    // =========================================================================
    // Unprefixed instructions
    // =========================================================================

    fn execute_unprefixed<B: Bus>(&mut self, bus: &mut B, op: u8) {
        match op {
            // NOP
            0x00 => {}

            // LD rr, nn (01=BC, 11=DE, 21=HL, 31=SP)
            0x01 | 0x11 | 0x21 | 0x31 => {
                let value = self.read_imm16(bus);
                self.set_reg16((op >> 4) & 3, value);
            }

            // LD (BC), A
            0x02 => {
                let addr = self.regs.bc();
                self.regs.wz =
                    (u16::from(self.regs.a) << 8) | (addr.wrapping_add(1) & 0xFF);
                let a = self.regs.a;
                self.write_mem(bus, addr, a);
            }

            // INC rr (03=BC, 13=DE, 23=HL, 33=SP)
            0x03 | 0x13 | 0x23 | 0x33 => {
                self.internal(2);
                let rp = (op >> 4) & 3;
                let value = self.get_reg16(rp).wrapping_add(1);
                self.set_reg16(rp, value);
            }

            // INC r (04=B, 0C=C, 14=D, 1C=E, 24=H, 2C=L, 3C=A)
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let r = (op >> 3) & 7;
                let result = alu::inc8(self.get_reg8(r));
                self.set_reg8(r, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // DEC r (05=B, 0D=C, 15=D, 1D=E, 25=H, 2D=L, 3D=A)
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let r = (op >> 3) & 7;
                let result = alu::dec8(self.get_reg8(r));
                self.set_reg8(r, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // LD r, n (06=B, 0E=C, 16=D, 1E=E, 26=H, 2E=L, 3E=A)
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let value = self.read_imm8(bus);
                self.set_reg8((op >> 3) & 7, value);
            }

            // RLCA
            0x07 => {
                let carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | carry;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF))
                        | (self.regs.a & (YF | XF))
                        | if carry != 0 { CF } else { 0 },
                );
            }

            // EX AF, AF'
            0x08 => {
                core::mem::swap(&mut self.regs.a, &mut self.regs.a_alt);
                core::mem::swap(&mut self.regs.f, &mut self.regs.f_alt);
            }

            // ADD HL, rr (09=BC, 19=DE, 29=HL, 39=SP)
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.internal(7);
                let hl = self.regs.hl();
                let rr = self.get_reg16((op >> 4) & 3);
                self.regs.wz = hl.wrapping_add(1);
                let (result, flags) = alu::add16(hl, rr);
                self.regs.set_hl(result);
                self.set_f((self.regs.f & (SF | ZF | PF)) | flags);
            }

            // LD A, (BC)
            0x0A => {
                let addr = self.regs.bc();
                self.regs.a = self.read_mem(bus, addr);
                self.regs.wz = addr.wrapping_add(1);
            }

            // DEC rr (0B=BC, 1B=DE, 2B=HL, 3B=SP)
            0x0B | 0x1B | 0x2B | 0x3B => {
                self.internal(2);
                let rp = (op >> 4) & 3;
                let value = self.get_reg16(rp).wrapping_sub(1);
                self.set_reg16(rp, value);
            }

            // RRCA
            0x0F => {
                let carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | (carry << 7);
                self.set_f(
                    (self.regs.f & (SF | ZF | PF))
                        | (self.regs.a & (YF | XF))
                        | if carry != 0 { CF } else { 0 },
                );
            }

            // DJNZ e
            0x10 => {
                self.internal(1);
                let displacement = self.read_imm8(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.internal(5);
                    self.regs.pc = self.regs.pc.wrapping_add(displacement as u16);
                    self.regs.wz = self.regs.pc;
                }
            }

            // LD (DE), A
            0x12 => {
                let addr = self.regs.de();
                self.regs.wz =
                    (u16::from(self.regs.a) << 8) | (addr.wrapping_add(1) & 0xFF);
                let a = self.regs.a;
                self.write_mem(bus, addr, a);
            }

            // RLA
            0x17 => {
                let old_carry = u8::from(self.regs.f & CF != 0);
                let new_carry = self.regs.a >> 7;
                self.regs.a = (self.regs.a << 1) | old_carry;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF))
                        | (self.regs.a & (YF | XF))
                        | if new_carry != 0 { CF } else { 0 },
                );
            }

            // JR e
            0x18 => {
                let displacement = self.read_imm8(bus) as i8;
                self.internal(5);
                self.regs.pc = self.regs.pc.wrapping_add(displacement as u16);
                self.regs.wz = self.regs.pc;
            }

            // LD A, (DE)
            0x1A => {
                let addr = self.regs.de();
                self.regs.a = self.read_mem(bus, addr);
                self.regs.wz = addr.wrapping_add(1);
            }

            // RRA
            0x1F => {
                let old_carry = if self.regs.f & CF != 0 { 0x80 } else { 0 };
                let new_carry = self.regs.a & 1;
                self.regs.a = (self.regs.a >> 1) | old_carry;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF))
                        | (self.regs.a & (YF | XF))
                        | if new_carry != 0 { CF } else { 0 },
                );
            }

            // JR cc, e (20=NZ, 28=Z, 30=NC, 38=C)
            0x20 | 0x28 | 0x30 | 0x38 => {
                let displacement = self.read_imm8(bus) as i8;
                if self.condition((op >> 3) & 3) {
                    self.internal(5);
                    self.regs.pc = self.regs.pc.wrapping_add(displacement as u16);
                    self.regs.wz = self.regs.pc;
                }
            }

            // LD (nn), HL
            0x22 => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr.wrapping_add(1);
                let (l, h) = (self.regs.l, self.regs.h);
                self.write_mem(bus, addr, l);
                self.write_mem(bus, addr.wrapping_add(1), h);
            }

            // DAA
            0x27 => {
                let a = self.regs.a;
                let nf = self.regs.f & NF != 0;
                let cf = self.regs.f & CF != 0;
                let hf = self.regs.f & HF != 0;

                let mut correction: u8 = 0;
                let mut new_cf = cf;

                if hf || (a & 0x0F) > 9 {
                    correction |= 0x06;
                }
                if cf || a > 0x99 {
                    correction |= 0x60;
                    new_cf = true;
                }

                let result = if nf {
                    a.wrapping_sub(correction)
                } else {
                    a.wrapping_add(correction)
                };

                let new_hf = if nf {
                    hf && (a & 0x0F) < 6
                } else {
                    (a & 0x0F) > 9
                };

                self.regs.a = result;
                self.set_f(
                    sz53p(result)
                        | if nf { NF } else { 0 }
                        | if new_cf { CF } else { 0 }
                        | if new_hf { HF } else { 0 },
                );
            }

            // LD HL, (nn)
            0x2A => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr.wrapping_add(1);
                self.regs.l = self.read_mem(bus, addr);
                self.regs.h = self.read_mem(bus, addr.wrapping_add(1));
            }

            // CPL
            0x2F => {
                self.regs.a = !self.regs.a;
                self.set_f(
                    (self.regs.f & (SF | ZF | PF | CF))
                        | HF
                        | NF
                        | (self.regs.a & (XF | YF)),
                );
            }

            // LD (nn), A
            0x32 => {
                let addr = self.read_imm16(bus);
                self.regs.wz =
                    (u16::from(self.regs.a) << 8) | (addr.wrapping_add(1) & 0xFF);
                let a = self.regs.a;
                self.write_mem(bus, addr, a);
            }

            // INC (HL)
            0x34 => {
                let addr = self.regs.hl();
                let result = alu::inc8(self.read_mem(bus, addr));
                self.internal(1);
                self.write_mem(bus, addr, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // DEC (HL)
            0x35 => {
                let addr = self.regs.hl();
                let result = alu::dec8(self.read_mem(bus, addr));
                self.internal(1);
                self.write_mem(bus, addr, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // LD (HL), n
            0x36 => {
                let value = self.read_imm8(bus);
                let addr = self.regs.hl();
                self.write_mem(bus, addr, value);
            }

            // SCF
            0x37 => {
                let xy = self.scf_xy();
                self.set_f((self.regs.f & (SF | ZF | PF)) | CF | xy);
            }

            // LD A, (nn)
            0x3A => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr.wrapping_add(1);
                self.regs.a = self.read_mem(bus, addr);
            }

            // CCF
            0x3F => {
                let old_cf = self.regs.f & CF;
                let xy = self.scf_xy();
                self.set_f(
                    (self.regs.f & (SF | ZF | PF))
                        | xy
                        | if old_cf != 0 { HF } else { CF },
                );
            }

            // HALT — PC stays pinned on the opcode until an interrupt.
            0x76 => {
                self.regs.halted = true;
                self.regs.pc = self.regs.pc.wrapping_sub(1);
            }

            // LD r, r' (40-7F except 76=HALT)
            0x40..=0x7F => {
                let src = op & 7;
                let dst = (op >> 3) & 7;
                if src == 6 {
                    // LD r, (HL)
                    let addr = self.regs.hl();
                    let value = self.read_mem(bus, addr);
                    self.set_reg8(dst, value);
                } else if dst == 6 {
                    // LD (HL), r
                    let addr = self.regs.hl();
                    let value = self.get_reg8(src);
                    self.write_mem(bus, addr, value);
                } else {
                    let value = self.get_reg8(src);
                    self.set_reg8(dst, value);
                }
            }

            // ALU A, r|(HL) (80-BF)
            0x80..=0xBF => {
                let r = op & 7;
                let value = if r == 6 {
                    let addr = self.regs.hl();
                    self.read_mem(bus, addr)
                } else {
                    self.get_reg8(r)
                };
                self.alu_a(op, value);
            }

            // RET cc (C0=NZ, C8=Z, D0=NC, D8=C, E0=PO, E8=PE, F0=P, F8=M)
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                self.internal(1);
                if self.condition((op >> 3) & 7) {
                    let addr = self.pop16(bus);
                    self.regs.wz = addr;
                    self.regs.pc = addr;
                }
            }

            // POP rr (C1=BC, D1=DE, E1=HL, F1=AF)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let value = self.pop16(bus);
                self.set_reg16_af((op >> 4) & 3, value);
            }

            // JP cc, nn
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr;
                if self.condition((op >> 3) & 7) {
                    self.regs.pc = addr;
                }
            }

            // JP nn
            0xC3 => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr;
                self.regs.pc = addr;
            }

            // CALL cc, nn
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.read_imm16(bus);
                self.regs.wz = target;
                if self.condition((op >> 3) & 7) {
                    self.internal(1);
                    let ret = self.regs.pc;
                    self.push16(bus, ret);
                    self.regs.pc = target;
                }
            }

            // PUSH rr (C5=BC, D5=DE, E5=HL, F5=AF)
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                self.internal(1);
                let value = self.get_reg16_af((op >> 4) & 3);
                self.push16(bus, value);
            }

            // ALU A, n (C6=ADD, CE=ADC, D6=SUB, DE=SBC, E6=AND, EE=XOR, F6=OR, FE=CP)
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let value = self.read_imm8(bus);
                self.alu_a(op, value);
            }

            // RST n (C7=00, CF=08, D7=10, DF=18, E7=20, EF=28, F7=30, FF=38)
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                self.internal(1);
                let target = u16::from(op & 0x38);
                self.regs.wz = target;
                let ret = self.regs.pc;
                self.push16(bus, ret);
                self.regs.pc = target;
            }

            // RET
            0xC9 => {
                let addr = self.pop16(bus);
                self.regs.wz = addr;
                self.regs.pc = addr;
            }

            // CALL nn
            0xCD => {
                let target = self.read_imm16(bus);
                self.regs.wz = target;
                self.internal(1);
                let ret = self.regs.pc;
                self.push16(bus, ret);
                self.regs.pc = target;
            }

            // OUT (n), A — port = (A << 8) | n
            0xD3 => {
                let n = self.read_imm8(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                self.regs.wz =
                    (u16::from(self.regs.a) << 8) | u16::from(n.wrapping_add(1));
                let a = self.regs.a;
                self.io_write(bus, port, a);
            }

            // EXX
            0xD9 => {
                core::mem::swap(&mut self.regs.b, &mut self.regs.b_alt);
                core::mem::swap(&mut self.regs.c, &mut self.regs.c_alt);
                core::mem::swap(&mut self.regs.d, &mut self.regs.d_alt);
                core::mem::swap(&mut self.regs.e, &mut self.regs.e_alt);
                core::mem::swap(&mut self.regs.h, &mut self.regs.h_alt);
                core::mem::swap(&mut self.regs.l, &mut self.regs.l_alt);
            }

            // IN A, (n) — port = (A << 8) | n
            0xDB => {
                let n = self.read_imm8(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                self.regs.wz = port.wrapping_add(1);
                self.regs.a = self.io_read(bus, port);
            }

            // EX (SP), HL
            0xE3 => {
                let sp = self.regs.sp;
                let lo = self.read_mem(bus, sp);
                let hi = self.read_mem(bus, sp.wrapping_add(1));
                self.internal(1);
                let (h, l) = (self.regs.h, self.regs.l);
                self.write_mem(bus, sp.wrapping_add(1), h);
                self.write_mem(bus, sp, l);
                self.internal(2);
                self.regs.l = lo;
                self.regs.h = hi;
                self.regs.wz = self.regs.hl();
            }

            // JP (HL)
            0xE9 => {
                self.regs.pc = self.regs.hl();
            }

            // EX DE, HL
            0xEB => {
                core::mem::swap(&mut self.regs.d, &mut self.regs.h);
                core::mem::swap(&mut self.regs.e, &mut self.regs.l);
            }

            // DI
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }

            // LD SP, HL
            0xF9 => {
                self.internal(2);
                self.regs.sp = self.regs.hl();
            }

            // EI — interrupts stay masked for one more instruction
            0xFB => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
                self.ei_delay = true;
            }

            _ => {
                // Decode escape: every base opcode has an arm above, so
                // reaching here is an implementation bug. Execute as a
                // minimum-cost NOP and leave a trace for triage.
                log::error!(
                    "undecoded opcode {:02X} at PC={:04X}",
                    op,
                    self.regs.pc.wrapping_sub(1)
                );
            }
        }
    }

    /// Perform ALU operation on A selected by bits 5-3 of the opcode.
    fn alu_a(&mut self, op: u8, value: u8) {
        let carry = self.regs.f & CF != 0;
        let result = match (op >> 3) & 7 {
            0 => alu::add8(self.regs.a, value, false),
            1 => alu::add8(self.regs.a, value, carry),
            2 => alu::sub8(self.regs.a, value, false),
            3 => alu::sub8(self.regs.a, value, carry),
            4 => alu::and8(self.regs.a, value),
            5 => alu::xor8(self.regs.a, value),
            6 => alu::or8(self.regs.a, value),
            7 => {
                // CP discards the result
                let result = alu::cp8(self.regs.a, value);
                self.set_f(result.flags);
                return;
            }
            _ => unreachable!(),
        };
        self.regs.a = result.value;
        self.set_f(result.flags);
    }

    // =========================================================================
    // CB-prefixed instructions
    // =========================================================================

    fn execute_cb<B: Bus>(&mut self, bus: &mut B, op: u8) {
        let r = op & 7;
        if r == 6 {
            let addr = self.regs.hl();
            let value = self.read_mem(bus, addr);
            self.internal(1);
            // For BIT n,(HL), X/Y flags come from the high byte of WZ
            let flag_source = (self.regs.wz >> 8) as u8;
            if let Some(result) = self.cb_operation(op, value, flag_source) {
                self.write_mem(bus, addr, result);
            }
        } else {
            let value = self.get_reg8(r);
            if let Some(result) = self.cb_operation(op, value, value) {
                self.set_reg8(r, result);
            }
        }
    }

    /// Execute a CB operation, returning Some(result) for write-back or
    /// None for BIT.
    fn cb_operation(&mut self, op: u8, value: u8, flag_source: u8) -> Option<u8> {
        match op & 0xC0 {
            // Rotate/shift family
            0x00 => {
                let result = match (op >> 3) & 7 {
                    0 => alu::rlc8(value),
                    1 => alu::rrc8(value),
                    2 => alu::rl8(value, self.regs.f & CF != 0),
                    3 => alu::rr8(value, self.regs.f & CF != 0),
                    4 => alu::sla8(value),
                    5 => alu::sra8(value),
                    6 => alu::sll8(value),
                    7 => alu::srl8(value),
                    _ => unreachable!(),
                };
                self.set_f(result.flags);
                Some(result.value)
            }
            // BIT b
            0x40 => {
                let bit = (op >> 3) & 7;
                let is_zero = value & (1 << bit) == 0;

                let mut flags = (self.regs.f & CF) | HF;
                if is_zero {
                    flags |= ZF | PF;
                }
                if bit == 7 && !is_zero {
                    flags |= SF;
                }
                flags |= flag_source & (XF | YF);
                self.set_f(flags);
                None
            }
            // RES b
            0x80 => Some(value & !(1 << ((op >> 3) & 7))),
            // SET b
            _ => Some(value | (1 << ((op >> 3) & 7))),
        }
    }

    // =========================================================================
    // DD/FD-prefixed instructions
    // =========================================================================

    /// Consume repeated DD/FD prefixes (last one wins) and execute the
    /// indexed instruction.
    fn execute_indexed<B: Bus>(&mut self, bus: &mut B, mut index: Index) {
        loop {
            let op = self.fetch_opcode(bus);
            match op {
                0xDD => index = Index::Ix,
                0xFD => index = Index::Iy,
                0xCB => {
                    self.execute_indexed_cb(bus, index);
                    return;
                }
                _ => {
                    self.execute_indexed_op(bus, op, index);
                    return;
                }
            }
        }
    }

    fn execute_indexed_op<B: Bus>(&mut self, bus: &mut B, op: u8, index: Index) {
        match op {
            // ADD IX/IY, rr (09=BC, 19=DE, 29=IX/IY, 39=SP)
            0x09 | 0x19 | 0x29 | 0x39 => {
                self.internal(7);
                let idx = self.get_index(index);
                self.regs.wz = idx.wrapping_add(1);
                let rp = (op >> 4) & 3;
                let rr = if rp == 2 { idx } else { self.get_reg16(rp) };
                let (result, flags) = alu::add16(idx, rr);
                self.set_index(index, result);
                self.set_f((self.regs.f & (SF | ZF | PF)) | flags);
            }

            // LD IX/IY, nn
            0x21 => {
                let value = self.read_imm16(bus);
                self.set_index(index, value);
            }

            // LD (nn), IX/IY
            0x22 => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr.wrapping_add(1);
                let idx = self.get_index(index);
                self.write_mem(bus, addr, idx as u8);
                self.write_mem(bus, addr.wrapping_add(1), (idx >> 8) as u8);
            }

            // INC IX/IY
            0x23 => {
                self.internal(2);
                let value = self.get_index(index).wrapping_add(1);
                self.set_index(index, value);
            }

            // INC/DEC IXH/IYH (undocumented)
            0x24 | 0x25 => {
                let value = self.get_reg8_indexed(index, 4);
                let result = if op == 0x24 { alu::inc8(value) } else { alu::dec8(value) };
                self.set_reg8_indexed(index, 4, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // LD IXH/IYH, n (undocumented)
            0x26 => {
                let value = self.read_imm8(bus);
                self.set_reg8_indexed(index, 4, value);
            }

            // LD IX/IY, (nn)
            0x2A => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr.wrapping_add(1);
                let lo = self.read_mem(bus, addr);
                let hi = self.read_mem(bus, addr.wrapping_add(1));
                self.set_index(index, u16::from(lo) | (u16::from(hi) << 8));
            }

            // DEC IX/IY
            0x2B => {
                self.internal(2);
                let value = self.get_index(index).wrapping_sub(1);
                self.set_index(index, value);
            }

            // INC/DEC IXL/IYL (undocumented)
            0x2C | 0x2D => {
                let value = self.get_reg8_indexed(index, 5);
                let result = if op == 0x2C { alu::inc8(value) } else { alu::dec8(value) };
                self.set_reg8_indexed(index, 5, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // LD IXL/IYL, n (undocumented)
            0x2E => {
                let value = self.read_imm8(bus);
                self.set_reg8_indexed(index, 5, value);
            }

            // INC/DEC (IX+d)/(IY+d)
            0x34 | 0x35 => {
                let addr = self.indexed_addr(bus, index);
                self.internal(5);
                let value = self.read_mem(bus, addr);
                let result = if op == 0x34 { alu::inc8(value) } else { alu::dec8(value) };
                self.internal(1);
                self.write_mem(bus, addr, result.value);
                self.set_f((self.regs.f & CF) | result.flags);
            }

            // LD (IX+d)/(IY+d), n
            0x36 => {
                let addr = self.indexed_addr(bus, index);
                let value = self.read_imm8(bus);
                self.internal(2);
                self.write_mem(bus, addr, value);
            }

            // LD r, (IX+d)/(IY+d)
            0x46 | 0x4E | 0x56 | 0x5E | 0x66 | 0x6E | 0x7E => {
                let addr = self.indexed_addr(bus, index);
                self.internal(5);
                let value = self.read_mem(bus, addr);
                self.set_reg8((op >> 3) & 7, value);
            }

            // LD (IX+d)/(IY+d), r
            0x70..=0x75 | 0x77 => {
                let addr = self.indexed_addr(bus, index);
                self.internal(5);
                let value = self.get_reg8(op & 7);
                self.write_mem(bus, addr, value);
            }

            // Undocumented LD r, r' with IXH/IXL/IYH/IYL substitution
            0x40..=0x7F if op != 0x76 => {
                let value = self.get_reg8_indexed(index, op & 7);
                self.set_reg8_indexed(index, (op >> 3) & 7, value);
            }

            // ALU A, (IX+d)/(IY+d)
            0x86 | 0x8E | 0x96 | 0x9E | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let addr = self.indexed_addr(bus, index);
                self.internal(5);
                let value = self.read_mem(bus, addr);
                self.alu_a(op, value);
            }

            // ALU A, IXH/IXL/IYH/IYL (undocumented)
            0x80..=0xBF => {
                let value = self.get_reg8_indexed(index, op & 7);
                self.alu_a(op, value);
            }

            // POP IX/IY
            0xE1 => {
                let value = self.pop16(bus);
                self.set_index(index, value);
            }

            // EX (SP), IX/IY
            0xE3 => {
                let sp = self.regs.sp;
                let lo = self.read_mem(bus, sp);
                let hi = self.read_mem(bus, sp.wrapping_add(1));
                self.internal(1);
                let idx = self.get_index(index);
                self.write_mem(bus, sp.wrapping_add(1), (idx >> 8) as u8);
                self.write_mem(bus, sp, idx as u8);
                self.internal(2);
                let value = u16::from(lo) | (u16::from(hi) << 8);
                self.set_index(index, value);
                self.regs.wz = value;
            }

            // PUSH IX/IY
            0xE5 => {
                self.internal(1);
                let value = self.get_index(index);
                self.push16(bus, value);
            }

            // JP (IX)/(IY)
            0xE9 => {
                self.regs.pc = self.get_index(index);
            }

            // LD SP, IX/IY
            0xF9 => {
                self.internal(2);
                self.regs.sp = self.get_index(index);
            }

            // All other DD/FD opcodes execute as if unprefixed; the
            // prefix only cost its fetch.
            _ => self.execute(bus, op),
        }
    }

    /// Fetch the displacement byte and form (IX+d)/(IY+d), updating WZ.
    fn indexed_addr<B: Bus>(&mut self, bus: &mut B, index: Index) -> u16 {
        let displacement = self.read_imm8(bus) as i8;
        let addr = self.get_index(index).wrapping_add(displacement as i16 as u16);
        self.regs.wz = addr;
        addr
    }

    // =========================================================================
    // DDCB / FDCB instructions
    // =========================================================================

    fn execute_indexed_cb<B: Bus>(&mut self, bus: &mut B, index: Index) {
        let displacement = self.read_imm8(bus) as i8;
        let op = self.read_imm8(bus);
        self.internal(2);
        let addr = self.get_index(index).wrapping_add(displacement as i16 as u16);
        self.regs.wz = addr;

        let value = self.read_mem(bus, addr);
        self.internal(1);
        let flag_source = (addr >> 8) as u8;
        if let Some(result) = self.cb_operation(op, value, flag_source) {
            self.write_mem(bus, addr, result);
            // Undocumented: the result is also copied into the register
            // selected by the low 3 bits (6 is the pure memory slot).
            let r = op & 7;
            if r != 6 {
                self.set_reg8(r, result);
            }
        }
    }

    // =========================================================================
    // ED-prefixed instructions
    // =========================================================================

    fn execute_ed<B: Bus>(&mut self, bus: &mut B, op: u8) {
        match op {
            // IN r, (C); 70 = IN (C) — flags only, result discarded
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x70 | 0x78 => {
                let port = self.regs.bc();
                self.regs.wz = port.wrapping_add(1);
                let value = self.io_read(bus, port);
                let r = (op >> 3) & 7;
                if r != 6 {
                    self.set_reg8(r, value);
                }
                self.set_f(sz53p(value) | (self.regs.f & CF));
            }

            // OUT (C), r; 71 = OUT (C), 0
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x71 | 0x79 => {
                let port = self.regs.bc();
                self.regs.wz = port.wrapping_add(1);
                let r = (op >> 3) & 7;
                let value = if r == 6 { 0 } else { self.get_reg8(r) };
                self.io_write(bus, port, value);
            }

            // SBC HL, rr (42=BC, 52=DE, 62=HL, 72=SP)
            0x42 | 0x52 | 0x62 | 0x72 => {
                self.internal(7);
                let hl = self.regs.hl();
                self.regs.wz = hl.wrapping_add(1);
                let rr = self.get_reg16((op >> 4) & 3);
                let (result, flags) = alu::sbc16(hl, rr, self.regs.f & CF != 0);
                self.regs.set_hl(result);
                self.set_f(flags);
            }

            // LD (nn), rr (43=BC, 53=DE, 63=HL, 73=SP)
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr.wrapping_add(1);
                let value = self.get_reg16((op >> 4) & 3);
                self.write_mem(bus, addr, value as u8);
                self.write_mem(bus, addr.wrapping_add(1), (value >> 8) as u8);
            }

            // NEG (and undocumented mirrors)
            0x44 | 0x4C | 0x54 | 0x5C | 0x64 | 0x6C | 0x74 | 0x7C => {
                let result = alu::sub8(0, self.regs.a, false);
                self.regs.a = result.value;
                self.set_f(result.flags);
            }

            // RETN (and undocumented mirrors) — restores IFF1 from IFF2
            0x45 | 0x55 | 0x65 | 0x75 => {
                self.regs.iff1 = self.regs.iff2;
                let addr = self.pop16(bus);
                self.regs.wz = addr;
                self.regs.pc = addr;
            }

            // IM 0 (and undocumented mirrors)
            0x46 | 0x4E | 0x66 | 0x6E => {
                self.regs.im = 0;
            }

            // LD I, A
            0x47 => {
                self.internal(1);
                self.regs.i = self.regs.a;
            }

            // ADC HL, rr (4A=BC, 5A=DE, 6A=HL, 7A=SP)
            0x4A | 0x5A | 0x6A | 0x7A => {
                self.internal(7);
                let hl = self.regs.hl();
                self.regs.wz = hl.wrapping_add(1);
                let rr = self.get_reg16((op >> 4) & 3);
                let (result, flags) = alu::adc16(hl, rr, self.regs.f & CF != 0);
                self.regs.set_hl(result);
                self.set_f(flags);
            }

            // LD rr, (nn) (4B=BC, 5B=DE, 6B=HL, 7B=SP)
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.read_imm16(bus);
                self.regs.wz = addr.wrapping_add(1);
                let lo = self.read_mem(bus, addr);
                let hi = self.read_mem(bus, addr.wrapping_add(1));
                self.set_reg16((op >> 4) & 3, u16::from(lo) | (u16::from(hi) << 8));
            }

            // RETI (and undocumented mirrors)
            0x4D | 0x5D | 0x6D | 0x7D => {
                self.regs.iff1 = self.regs.iff2;
                let addr = self.pop16(bus);
                self.regs.wz = addr;
                self.regs.pc = addr;
            }

            // LD R, A
            0x4F => {
                self.internal(1);
                self.regs.r = self.regs.a;
            }

            // IM 1
            0x56 | 0x76 => {
                self.regs.im = 1;
            }

            // LD A, I — P/V reflects IFF2
            0x57 => {
                self.internal(1);
                self.regs.a = self.regs.i;
                let flags = (self.regs.f & CF)
                    | sz53(self.regs.a)
                    | if self.regs.iff2 { PF } else { 0 };
                self.set_f(flags);
            }

            // IM 2
            0x5E | 0x7E => {
                self.regs.im = 2;
            }

            // LD A, R — P/V reflects IFF2
            0x5F => {
                self.internal(1);
                self.regs.a = self.regs.r;
                let flags = (self.regs.f & CF)
                    | sz53(self.regs.a)
                    | if self.regs.iff2 { PF } else { 0 };
                self.set_f(flags);
            }

            // RRD
            0x67 => {
                let addr = self.regs.hl();
                let mem = self.read_mem(bus, addr);
                self.internal(4);
                self.regs.wz = addr.wrapping_add(1);
                let new_mem = ((self.regs.a & 0x0F) << 4) | (mem >> 4);
                self.regs.a = (self.regs.a & 0xF0) | (mem & 0x0F);
                self.write_mem(bus, addr, new_mem);
                let flags = sz53p(self.regs.a) | (self.regs.f & CF);
                self.set_f(flags);
            }

            // RLD
            0x6F => {
                let addr = self.regs.hl();
                let mem = self.read_mem(bus, addr);
                self.internal(4);
                self.regs.wz = addr.wrapping_add(1);
                let new_mem = (mem << 4) | (self.regs.a & 0x0F);
                self.regs.a = (self.regs.a & 0xF0) | (mem >> 4);
                self.write_mem(bus, addr, new_mem);
                let flags = sz53p(self.regs.a) | (self.regs.f & CF);
                self.set_f(flags);
            }

            // LDI / LDD / LDIR / LDDR
            0xA0 => self.block_ld(bus, true, false),
            0xA8 => self.block_ld(bus, false, false),
            0xB0 => self.block_ld(bus, true, true),
            0xB8 => self.block_ld(bus, false, true),

            // CPI / CPD / CPIR / CPDR
            0xA1 => self.block_cp(bus, true, false),
            0xA9 => self.block_cp(bus, false, false),
            0xB1 => self.block_cp(bus, true, true),
            0xB9 => self.block_cp(bus, false, true),

            // INI / IND / INIR / INDR
            0xA2 => self.block_in(bus, true, false),
            0xAA => self.block_in(bus, false, false),
            0xB2 => self.block_in(bus, true, true),
            0xBA => self.block_in(bus, false, true),

            // OUTI / OUTD / OTIR / OTDR
            0xA3 => self.block_out(bus, true, false),
            0xAB => self.block_out(bus, false, false),
            0xB3 => self.block_out(bus, true, true),
            0xBB => self.block_out(bus, false, true),

            // Undefined ED opcodes execute as 8 T-state NOPs.
            _ => {
                log::debug!("undefined ED opcode {:02X} executed as NOP", op);
            }
        }
    }

    // =========================================================================
    // Block operations
    // =========================================================================

    /// LDI/LDD (and their repeating forms): copy (HL) to (DE), step the
    /// pointers, decrement BC.
    fn block_ld<B: Bus>(&mut self, bus: &mut B, inc: bool, repeat: bool) {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let value = self.read_mem(bus, hl);
        self.write_mem(bus, de, value);
        self.internal(2);
        self.regs.set_hl(step16(hl, inc));
        self.regs.set_de(step16(de, inc));
        self.regs.set_bc(self.regs.bc().wrapping_sub(1));
        let n = value.wrapping_add(self.regs.a);

        if repeat && self.regs.bc() != 0 {
            // Repeat: rewind PC over ED xx; X/Y come from PCH.
            self.internal(5);
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.regs.wz = self.regs.pc.wrapping_add(1);
            let pch = (self.regs.pc >> 8) as u8;
            self.set_f((self.regs.f & (SF | ZF | CF)) | PF | (pch & (XF | YF)));
        } else {
            self.set_f(
                (self.regs.f & (SF | ZF | CF))
                    | (n & XF)
                    | if n & 0x02 != 0 { YF } else { 0 }
                    | if self.regs.bc() != 0 { PF } else { 0 },
            );
        }
    }

    /// CPI/CPD (and their repeating forms): compare A with (HL), step HL,
    /// decrement BC. Repeats stop on match or BC exhaustion.
    fn block_cp<B: Bus>(&mut self, bus: &mut B, inc: bool, repeat: bool) {
        let hl = self.regs.hl();
        let value = self.read_mem(bus, hl);
        self.internal(5);
        self.regs.wz = step16(self.regs.wz, inc);
        let result = self.regs.a.wrapping_sub(value);
        let hf = (self.regs.a & 0x0F) < (value & 0x0F);
        let n = result.wrapping_sub(u8::from(hf));
        self.regs.set_hl(step16(hl, inc));
        self.regs.set_bc(self.regs.bc().wrapping_sub(1));

        let base = (self.regs.f & CF)
            | NF
            | if result == 0 { ZF } else { 0 }
            | if result & 0x80 != 0 { SF } else { 0 }
            | if hf { HF } else { 0 }
            | if self.regs.bc() != 0 { PF } else { 0 };

        if repeat && self.regs.bc() != 0 && result != 0 {
            self.internal(5);
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.regs.wz = self.regs.pc.wrapping_add(1);
            let pch = (self.regs.pc >> 8) as u8;
            self.set_f(base | (pch & (XF | YF)));
        } else {
            self.set_f(base | (n & XF) | if n & 0x02 != 0 { YF } else { 0 });
        }
    }

    /// INI/IND (and their repeating forms): read port (C) into (HL),
    /// step HL, decrement B.
    fn block_in<B: Bus>(&mut self, bus: &mut B, inc: bool, repeat: bool) {
        self.internal(1);
        let port = self.regs.bc();
        self.regs.wz = step16(port, inc);
        let value = self.io_read(bus, port);
        let hl = self.regs.hl();
        self.write_mem(bus, hl, value);
        self.regs.b = self.regs.b.wrapping_sub(1);
        self.regs.set_hl(step16(hl, inc));

        let c_adj = if inc {
            self.regs.c.wrapping_add(1)
        } else {
            self.regs.c.wrapping_sub(1)
        };
        let k = u16::from(value) + u16::from(c_adj);
        self.block_io_flags(value, k, repeat);
    }

    /// OUTI/OUTD (and their repeating forms): write (HL) to port (C)
    /// with B already decremented, step HL.
    fn block_out<B: Bus>(&mut self, bus: &mut B, inc: bool, repeat: bool) {
        self.internal(1);
        let hl = self.regs.hl();
        let value = self.read_mem(bus, hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        let port = self.regs.bc();
        self.regs.wz = step16(port, inc);
        self.io_write(bus, port, value);
        self.regs.set_hl(step16(hl, inc));

        let k = u16::from(value) + u16::from(self.regs.l);
        self.block_io_flags(value, k, repeat);
    }

    /// Shared flag derivation for the block I/O family.
    ///
    /// The repeating forms recompute H and P/V from the in-flight B value
    /// and take X/Y from PCH after the rewind; the single-shot forms use
    /// the post-decrement B directly.
    fn block_io_flags(&mut self, value: u8, k: u16, repeat: bool) {
        let hcf = k > 255;
        let nf = value & 0x80 != 0;
        let p = ((k as u8) & 7) ^ self.regs.b;

        if repeat && self.regs.b != 0 {
            self.internal(5);
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.regs.wz = self.regs.pc.wrapping_add(1);
            let pch = (self.regs.pc >> 8) as u8;
            let (hf, pf) = if hcf {
                if nf {
                    (
                        if self.regs.b & 0x0F == 0 { HF } else { 0 },
                        sz53p(p ^ (self.regs.b.wrapping_sub(1) & 7)) & PF,
                    )
                } else {
                    (
                        if self.regs.b & 0x0F == 0x0F { HF } else { 0 },
                        sz53p(p ^ (self.regs.b.wrapping_add(1) & 7)) & PF,
                    )
                }
            } else {
                (0, sz53p(p ^ (self.regs.b & 7)) & PF)
            };
            self.set_f(
                (self.regs.b & SF)
                    | (pch & (XF | YF))
                    | if nf { NF } else { 0 }
                    | if hcf { CF } else { 0 }
                    | hf
                    | pf,
            );
        } else {
            self.set_f(
                sz53(self.regs.b)
                    | if nf { NF } else { 0 }
                    | if hcf { HF | CF } else { 0 }
                    | (sz53p(p) & PF),
            );
        }
    }
}

/// Step a 16-bit pointer up or down.
const fn step16(value: u16, inc: bool) -> u16 {
    if inc {
        value.wrapping_add(1)
    } else {
        value.wrapping_sub(1)
    }
}
