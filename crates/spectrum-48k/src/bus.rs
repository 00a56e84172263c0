//! Spectrum bus: memory and I/O routing.
//!
//! The bus connects the Z80 to memory and the ULA. I/O decoding on the
//! 48K is minimal: any port with bit 0 clear belongs to the ULA;
//! everything else is the open bus. Peripheral expansions (Kempston, AY)
//! would hang additional decodes here.

use machine_core::Bus;

use ferranti_ula::Ula;

use crate::memory::Memory;

/// The Spectrum bus, implementing [`machine_core::Bus`].
///
/// Owns the memory and the ULA. The CPU reaches both through the trait;
/// the machine reaches them through the public fields.
pub struct SpectrumBus {
    pub memory: Memory,
    pub ula: Ula,
}

impl SpectrumBus {
    #[must_use]
    pub fn new(memory: Memory, ula: Ula) -> Self {
        Self { memory, ula }
    }

    /// Rasterize the current frame from VRAM into the ULA framebuffer.
    pub fn render_frame(&mut self) {
        let memory = &self.memory;
        self.ula.render_frame(|addr| memory.peek(addr));
    }
}

impl Bus for SpectrumBus {
    fn read(&mut self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    fn write(&mut self, addr: u16, value: u8) {
        self.memory.write(addr, value);
    }

    fn io_read(&mut self, port: u16) -> u8 {
        self.ula.read_port(port)
    }

    fn io_write(&mut self, port: u16, value: u8) {
        self.ula.write_port(port, value);
    }
}
