//! Z80 CPU core.
//!
//! Execution is instruction-grained: [`Z80::step`] runs one architectural
//! instruction (or services one pending interrupt, or burns one 4-T-state
//! HALT slice) and charges the shared clock per machine cycle as it goes —
//! opcode fetch 4, memory read/write 3, I/O 4, plus the internal cycles
//! each instruction specifies. Memory contention lands on the same clock
//! inside the bus, so the observable T-state sequence matches hardware.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.

mod execute;

use machine_core::{Bus, Ticks, TstateClock};

use crate::flags::{CF, PF, SF, XF, YF, ZF};
use crate::registers::Registers;

/// Index register selected by a DD/FD prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Index {
    Ix,
    Iy,
}

/// Z80 CPU.
pub struct Z80 {
    /// All CPU registers.
    pub regs: Registers,
    /// The machine's T-state counter; memory holds its own handle.
    clock: TstateClock,
    /// Pending maskable interrupt request.
    int_pending: bool,
    /// One-shot: EI defers interrupt acceptance by one instruction.
    ei_delay: bool,
    /// Q model for SCF/CCF X/Y flags: the F value the previous
    /// instruction set, or 0 if it left F alone.
    q: u8,
    prev_q: u8,
}

impl Z80 {
    /// Create a CPU charging time to the given clock.
    #[must_use]
    pub fn new(clock: TstateClock) -> Self {
        Self {
            regs: Registers::default(),
            clock,
            int_pending: false,
            ei_delay: false,
            q: 0,
            prev_q: 0,
        }
    }

    /// Put the CPU in the documented power-on state.
    ///
    /// The T-state counter is not reset; elapsed time is a machine
    /// concern.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.int_pending = false;
        self.ei_delay = false;
        self.q = 0;
        self.prev_q = 0;
    }

    /// Total T-states on the shared clock.
    #[must_use]
    pub fn total_tstates(&self) -> Ticks {
        self.clock.now()
    }

    /// Latch a maskable interrupt request. Returns true if the request
    /// armed (IFF1 set); a CPU with interrupts disabled never sees it.
    /// Idempotent until serviced.
    pub fn request_interrupt(&mut self) -> bool {
        if self.regs.iff1 {
            self.int_pending = true;
            true
        } else {
            false
        }
    }

    /// Is an armed interrupt waiting for the fetch gate?
    #[must_use]
    pub fn interrupt_pending(&self) -> bool {
        self.int_pending
    }

    /// Execute one instruction, interrupt acknowledge, or HALT idle
    /// slice. Returns the T-states consumed, contention included.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Ticks {
        let start = self.clock.now();

        // Fetch gate: a pending armed interrupt wins, unless the
        // previous instruction was EI.
        if self.int_pending && self.regs.iff1 && !self.ei_delay {
            self.service_interrupt(bus);
            return self.clock.now().since(start);
        }
        self.ei_delay = false;

        if self.regs.halted {
            // Idle M1 slice; refresh keeps running.
            self.inc_r();
            self.clock.advance(4);
            return self.clock.now().since(start);
        }

        self.prev_q = self.q;
        self.q = 0;

        let opcode = self.fetch_opcode(bus);
        self.execute(bus, opcode);

        self.clock.now().since(start)
    }

    // === Interrupts ===

    /// Acknowledge the pending maskable interrupt.
    ///
    /// IM 0 and IM 1 both vector to 0x0038 (the open data bus supplies
    /// 0xFF, i.e. RST 38) in 13 T-states; IM 2 reads the vector at
    /// (I << 8) | 0xFF in 19.
    fn service_interrupt<B: Bus>(&mut self, bus: &mut B) {
        self.int_pending = false;
        if self.regs.halted {
            // Leaving HALT: PC moves past the HALT opcode.
            self.regs.halted = false;
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        self.inc_r();
        self.regs.iff1 = false;
        self.regs.iff2 = false;

        self.internal(7);
        let ret = self.regs.pc;
        self.push16(bus, ret);

        if self.regs.im == 2 {
            let vector = (u16::from(self.regs.i) << 8) | 0xFF;
            let lo = self.read_mem(bus, vector);
            let hi = self.read_mem(bus, vector.wrapping_add(1));
            self.regs.pc = u16::from(lo) | (u16::from(hi) << 8);
        } else {
            self.regs.pc = 0x0038;
        }
        self.regs.wz = self.regs.pc;
    }

    // === Machine cycles ===

    /// Opcode fetch (M1): 4 T-states plus refresh.
    fn fetch_opcode<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = bus.read(self.regs.pc);
        self.clock.advance(4);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        self.inc_r();
        value
    }

    /// Memory read cycle: 3 T-states.
    fn read_mem<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        let value = bus.read(addr);
        self.clock.advance(3);
        value
    }

    /// Memory write cycle: 3 T-states.
    fn write_mem<B: Bus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        bus.write(addr, value);
        self.clock.advance(3);
    }

    /// Immediate byte at PC.
    fn read_imm8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let value = self.read_mem(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    /// Immediate word at PC, little-endian.
    fn read_imm16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.read_imm8(bus);
        let hi = self.read_imm8(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// I/O read cycle: 4 T-states.
    fn io_read<B: Bus>(&mut self, bus: &mut B, port: u16) -> u8 {
        let value = bus.io_read(port);
        self.clock.advance(4);
        value
    }

    /// I/O write cycle: 4 T-states.
    fn io_write<B: Bus>(&mut self, bus: &mut B, port: u16, value: u8) {
        bus.io_write(port, value);
        self.clock.advance(4);
    }

    /// Internal processor cycles with no bus activity.
    fn internal(&mut self, tstates: u64) {
        self.clock.advance(tstates);
    }

    /// Push a word: high byte first, SP pre-decremented.
    fn push16<B: Bus>(&mut self, bus: &mut B, value: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_mem(bus, self.regs.sp, (value >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write_mem(bus, self.regs.sp, value as u8);
    }

    /// Pop a word: low byte first, SP post-incremented.
    fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.read_mem(bus, self.regs.sp);
        let hi = self.read_mem(bus, self.regs.sp.wrapping_add(1));
        self.regs.sp = self.regs.sp.wrapping_add(2);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Increment R register (lower 7 bits only; bit 7 is sticky).
    fn inc_r(&mut self) {
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);
    }

    // === Register plumbing ===

    /// Write F and remember it for the Q model.
    fn set_f(&mut self, value: u8) {
        self.regs.f = value;
        self.q = value;
    }

    /// Evaluate condition code cc (NZ, Z, NC, C, PO, PE, P, M).
    fn condition(&self, cc: u8) -> bool {
        match cc {
            0 => self.regs.f & ZF == 0,
            1 => self.regs.f & ZF != 0,
            2 => self.regs.f & CF == 0,
            3 => self.regs.f & CF != 0,
            4 => self.regs.f & PF == 0,
            5 => self.regs.f & PF != 0,
            6 => self.regs.f & SF == 0,
            7 => self.regs.f & SF != 0,
            _ => unreachable!(),
        }
    }

    /// Read register by decode index (0=B 1=C 2=D 3=E 4=H 5=L 7=A).
    /// Index 6 is the (HL) slot and is handled by the caller.
    fn get_reg8(&self, r: u8) -> u8 {
        match r {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => self.regs.h,
            5 => self.regs.l,
            7 => self.regs.a,
            _ => unreachable!("(HL) handled by caller"),
        }
    }

    /// Write register by decode index.
    fn set_reg8(&mut self, r: u8, value: u8) {
        match r {
            0 => self.regs.b = value,
            1 => self.regs.c = value,
            2 => self.regs.d = value,
            3 => self.regs.e = value,
            4 => self.regs.h = value,
            5 => self.regs.l = value,
            7 => self.regs.a = value,
            _ => unreachable!("(HL) handled by caller"),
        }
    }

    /// Read register pair by decode index (0=BC 1=DE 2=HL 3=SP).
    fn get_reg16(&self, rp: u8) -> u16 {
        match rp {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.regs.hl(),
            3 => self.regs.sp,
            _ => unreachable!(),
        }
    }

    /// Write register pair by decode index.
    fn set_reg16(&mut self, rp: u8, value: u16) {
        match rp {
            0 => self.regs.set_bc(value),
            1 => self.regs.set_de(value),
            2 => self.regs.set_hl(value),
            3 => self.regs.sp = value,
            _ => unreachable!(),
        }
    }

    /// PUSH/POP variant of the pair index: 3 selects AF, not SP.
    fn get_reg16_af(&self, rp: u8) -> u16 {
        if rp == 3 { self.regs.af() } else { self.get_reg16(rp) }
    }

    /// PUSH/POP variant of the pair index: 3 selects AF, not SP.
    fn set_reg16_af(&mut self, rp: u8, value: u16) {
        if rp == 3 {
            self.regs.set_af(value);
        } else {
            self.set_reg16(rp, value);
        }
    }

    /// The index register selected by the active prefix.
    fn get_index(&self, index: Index) -> u16 {
        match index {
            Index::Ix => self.regs.ix,
            Index::Iy => self.regs.iy,
        }
    }

    fn set_index(&mut self, index: Index, value: u16) {
        match index {
            Index::Ix => self.regs.ix = value,
            Index::Iy => self.regs.iy = value,
        }
    }

    /// Register read with the DD/FD H/L substitution (4=IXH/IYH,
    /// 5=IXL/IYL).
    fn get_reg8_indexed(&self, index: Index, r: u8) -> u8 {
        match r {
            4 => (self.get_index(index) >> 8) as u8,
            5 => self.get_index(index) as u8,
            _ => self.get_reg8(r),
        }
    }

    /// Register write with the DD/FD H/L substitution.
    fn set_reg8_indexed(&mut self, index: Index, r: u8, value: u8) {
        match r {
            4 => {
                let idx = self.get_index(index);
                self.set_index(index, (idx & 0x00FF) | (u16::from(value) << 8));
            }
            5 => {
                let idx = self.get_index(index);
                self.set_index(index, (idx & 0xFF00) | u16::from(value));
            }
            _ => self.set_reg8(r, value),
        }
    }

    /// SCF/CCF X/Y source: (previous Q xor F) or A.
    fn scf_xy(&self) -> u8 {
        ((self.prev_q ^ self.regs.f) | self.regs.a) & (XF | YF)
    }
}
