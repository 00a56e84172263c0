//! Top-level Spectrum system.
//!
//! One [`Spectrum`] owns the CPU, the bus (memory + ULA), and the shared
//! T-state clock. [`Spectrum::run_frame`] executes one 69,888-T-state
//! frame: CPU instructions drive the clock, the ULA counter follows, the
//! frame boundary raises INT for the next frame, and the finished frame
//! is rasterized into the ULA framebuffer.

use machine_core::{Ticks, TstateClock};

use cpu_z80::Z80;
use ferranti_ula::{SpectrumKey, Ula};

use crate::bus::SpectrumBus;
use crate::config::SpectrumConfig;
use crate::memory::{Memory, MemoryError};

/// ZX Spectrum 48K system.
pub struct Spectrum {
    cpu: Z80,
    bus: SpectrumBus,
    clock: TstateClock,
    /// Completed frame counter.
    frame_count: u64,
}

impl Spectrum {
    /// Create a machine from the given configuration.
    pub fn new(config: &SpectrumConfig) -> Result<Self, MemoryError> {
        let clock = TstateClock::new();
        let mut memory = Memory::new(clock.clone());
        memory.load_rom(&config.rom)?;
        memory.set_contention(config.contention);

        Ok(Self {
            cpu: Z80::new(clock.clone()),
            bus: SpectrumBus::new(memory, Ula::new()),
            clock,
            frame_count: 0,
        })
    }

    /// Run one complete frame and rasterize it.
    ///
    /// Returns the T-states consumed (at least the frame length; the last
    /// instruction may overshoot the boundary).
    pub fn run_frame(&mut self) -> Ticks {
        let start = self.clock.now();

        loop {
            let consumed = self.cpu.step(&mut self.bus);
            self.bus.ula.advance(consumed.get());

            if self.bus.ula.take_frame_complete() {
                // Frame boundary: the ULA raises INT for the next frame.
                self.cpu.request_interrupt();
                break;
            }
            if self.bus.ula.int_active() {
                self.cpu.request_interrupt();
            }
        }

        self.bus.render_frame();
        self.frame_count += 1;

        self.clock.now().since(start)
    }

    /// Execute a single CPU step and keep the ULA counter in sync.
    /// Returns the T-states consumed.
    pub fn step(&mut self) -> Ticks {
        let consumed = self.cpu.step(&mut self.bus);
        self.bus.ula.advance(consumed.get());
        consumed
    }

    /// Reset the machine: documented CPU power-on state, RAM cleared,
    /// ULA latches cleared. ROM contents are preserved.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.memory.reset();
        self.bus.ula.reset();
    }

    /// Press a key (stays pressed until released).
    pub fn press_key(&mut self, key: SpectrumKey) {
        let (row, mask) = key.matrix();
        self.bus.ula.press_key(row, mask);
    }

    /// Release a key.
    pub fn release_key(&mut self, key: SpectrumKey) {
        let (row, mask) = key.matrix();
        self.bus.ula.release_key(row, mask);
    }

    /// Release all keys.
    pub fn release_all_keys(&mut self) {
        self.bus.ula.release_all_keys();
    }

    /// Reference to the framebuffer (ARGB32).
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.ula.framebuffer()
    }

    /// Reference to the CPU.
    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    /// Mutable reference to the CPU.
    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    /// Reference to the bus.
    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    /// Mutable reference to the bus.
    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    /// Total T-states since power-on.
    #[must_use]
    pub fn total_tstates(&self) -> Ticks {
        self.clock.now()
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
