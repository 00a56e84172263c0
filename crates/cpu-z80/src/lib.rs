//! Zilog Z80 CPU emulator.
//!
//! Each call to [`Z80::step`] executes exactly one architectural
//! instruction (or services one pending interrupt, or burns one HALT idle
//! slice) and returns the T-states consumed, contention stalls included.

mod alu;
mod cpu;
mod flags;
mod registers;

pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use registers::Registers;
