//! Standard Sinclair ULA (Uncommitted Logic Array).
//!
//! The ULA generates the 50 Hz frame interrupt, owns the border/MIC/
//! speaker latch and the keyboard matrix behind port $FE, and rasterizes
//! the bitmap and attribute memory into a bordered framebuffer.
//!
//! # Standalone IC
//!
//! This crate has no dependencies — the ULA reads VRAM through a closure
//! passed by the caller, keeping it decoupled from any particular memory
//! model. Contention timing lives in [`contention`] as a pure function of
//! beam position; the memory subsystem applies it.
//!
//! # Timing (48K PAL)
//!
//! - 224 CPU T-states per line, 312 lines per frame = 69,888 T-states
//! - INT asserted for the first 32 T-states of each frame
//! - FLASH phase toggles every 16 frames
//!
//! # Framebuffer
//!
//! 320x288 ARGB32: 256 active + 32 border pixels either side
//! horizontally, 192 active + 48 border above and below.
//!
//! # Screen memory layout
//!
//! Bitmap at $4000-$57FF (6144 bytes), attributes at $5800-$5AFF (768
//! bytes). Bitmap address: `010Y7 Y6Y2 Y1Y0 Y5Y4Y3 X4X3X2X1X0`,
//! attribute address: `0101 10Y7 Y6Y5 Y4Y3 X4X3X2X1X0`.

#![allow(clippy::cast_possible_truncation)]

pub mod contention;
mod keyboard;
mod keys;
mod palette;

pub use contention::FRAME_TSTATES;
pub use keyboard::KeyboardMatrix;
pub use keys::SpectrumKey;
pub use palette::PALETTE;

/// Framebuffer dimensions.
pub const FB_WIDTH: u32 = 320;
pub const FB_HEIGHT: u32 = 288;

/// Display area within the framebuffer.
const BORDER_LEFT: u32 = 32;
const BORDER_TOP: u32 = 48;
const SCREEN_WIDTH: u32 = 256;
const SCREEN_HEIGHT: u32 = 192;

/// INT is held for the first 32 T-states of each frame — long enough for
/// a CPU sitting in an EI-delay shadow to still catch it.
const INT_LENGTH_TSTATES: u64 = 32;

/// Number of frames between FLASH toggles.
const FLASH_FRAME_COUNT: u8 = 16;

/// Standard Sinclair ULA.
pub struct Ula {
    /// Current border colour (0-7).
    border: u8,
    /// MIC output latch (bit 3 of port $FE writes).
    mic: bool,
    /// Speaker output latch (bit 4 of port $FE writes).
    speaker: bool,
    /// EAR input level (bit 6 of port $FE reads); released tape input
    /// reads high.
    ear_in: bool,
    /// T-states elapsed within the current frame.
    frame_tstates: u64,
    /// Frame complete flag, auto-clears on read.
    frame_complete: bool,
    /// FLASH state: false = normal, true = inverted.
    flash_state: bool,
    /// Frame counter for FLASH timing.
    flash_counter: u8,
    /// Keyboard matrix behind port $FE.
    keyboard: KeyboardMatrix,
    /// ARGB32 framebuffer.
    framebuffer: Vec<u32>,
}

impl Ula {
    #[must_use]
    pub fn new() -> Self {
        Self {
            border: 7, // White border on power-up
            mic: false,
            speaker: false,
            ear_in: true,
            frame_tstates: 0,
            frame_complete: false,
            flash_state: false,
            flash_counter: 0,
            keyboard: KeyboardMatrix::new(),
            framebuffer: vec![0xFF00_0000; (FB_WIDTH * FB_HEIGHT) as usize],
        }
    }

    /// Return to the power-on state. The framebuffer contents are left
    /// stale; the next render overwrites them.
    pub fn reset(&mut self) {
        self.border = 7;
        self.mic = false;
        self.speaker = false;
        self.ear_in = true;
        self.frame_tstates = 0;
        self.frame_complete = false;
        self.flash_state = false;
        self.flash_counter = 0;
        self.keyboard.release_all();
    }

    // === Port $FE ===

    /// Read an I/O port. The ULA answers any port with bit 0 clear;
    /// everything else reads as the open bus (0xFF).
    ///
    /// Bits 0-4: keyboard half-rows selected by the high address byte
    /// (active low). Bit 5: 1. Bit 6: EAR input. Bit 7: 1.
    #[must_use]
    pub fn read_port(&self, port: u16) -> u8 {
        if port & 0x01 != 0 {
            return 0xFF;
        }
        let keys = self.keyboard.read((port >> 8) as u8) & 0x1F;
        keys | 0xA0 | if self.ear_in { 0x40 } else { 0x00 }
    }

    /// Write an I/O port. The ULA latches any port with bit 0 clear:
    /// bits 0-2 border colour, bit 3 MIC, bit 4 speaker. Other ports are
    /// no-ops.
    pub fn write_port(&mut self, port: u16, value: u8) {
        if port & 0x01 != 0 {
            return;
        }
        self.border = value & 0x07;
        self.mic = value & 0x08 != 0;
        self.speaker = value & 0x10 != 0;
    }

    // === Frame timing ===

    /// Advance the intra-frame counter. Crossing the frame boundary wraps
    /// the counter, marks the frame complete, and steps the FLASH phase
    /// every 16 frames. The INT line tracks the counter: it is asserted
    /// for the first 32 T-states of each frame.
    pub fn advance(&mut self, tstates: u64) {
        self.frame_tstates += tstates;
        while self.frame_tstates >= contention::FRAME_TSTATES {
            self.frame_tstates -= contention::FRAME_TSTATES;
            self.frame_complete = true;
            self.flash_counter += 1;
            if self.flash_counter >= FLASH_FRAME_COUNT {
                self.flash_counter = 0;
                self.flash_state = !self.flash_state;
            }
        }
    }

    /// Is the INT signal currently asserted?
    #[must_use]
    pub fn int_active(&self) -> bool {
        self.frame_tstates < INT_LENGTH_TSTATES
    }

    /// Has the frame completed? Auto-clears on read.
    pub fn take_frame_complete(&mut self) -> bool {
        let result = self.frame_complete;
        self.frame_complete = false;
        result
    }

    /// T-states into the current frame.
    #[must_use]
    pub fn frame_tstates(&self) -> u64 {
        self.frame_tstates
    }

    /// Current FLASH phase (true = inverted).
    #[must_use]
    pub fn flash_state(&self) -> bool {
        self.flash_state
    }

    // === Keyboard ===

    /// Press the keys in `mask` (bits 0-4) on half-row `row`.
    pub fn press_key(&mut self, row: usize, mask: u8) {
        self.keyboard.press(row, mask);
    }

    /// Release the keys in `mask` (bits 0-4) on half-row `row`.
    pub fn release_key(&mut self, row: usize, mask: u8) {
        self.keyboard.release(row, mask);
    }

    /// Release every key.
    pub fn release_all_keys(&mut self) {
        self.keyboard.release_all();
    }

    // === Latches ===

    /// Current border colour index (0-7).
    #[must_use]
    pub fn border_colour(&self) -> u8 {
        self.border
    }

    /// Speaker output level from the last port $FE write.
    #[must_use]
    pub fn speaker_level(&self) -> bool {
        self.speaker
    }

    /// MIC output level from the last port $FE write.
    #[must_use]
    pub fn mic_level(&self) -> bool {
        self.mic
    }

    /// Drive the EAR input (bit 6 of port $FE reads). A tape source
    /// calls this; without one the line idles high.
    pub fn set_ear_level(&mut self, level: bool) {
        self.ear_in = level;
    }

    // === Rasterization ===

    /// Rasterize one full frame of bitmap+attribute memory into the
    /// framebuffer. `read_vram` must read without side effects.
    pub fn render_frame(&mut self, read_vram: impl Fn(u16) -> u8) {
        let border = PALETTE[self.border as usize];
        self.framebuffer.fill(border);

        for y in 0..SCREEN_HEIGHT as u8 {
            for col in 0..(SCREEN_WIDTH / 8) as u8 {
                let bitmap = read_vram(bitmap_addr(y, col));
                let attr = read_vram(attr_addr(y, col));

                // Decode attribute byte: FBPPPIII
                let flash = attr & 0x80 != 0;
                let bright = attr & 0x40 != 0;
                let paper = (attr >> 3) & 0x07;
                let ink = attr & 0x07;

                let (fg, bg) = if flash && self.flash_state {
                    (paper, ink)
                } else {
                    (ink, paper)
                };

                let bright_offset: u8 = if bright { 8 } else { 0 };
                let fg_colour = PALETTE[(fg + bright_offset) as usize];
                let bg_colour = PALETTE[(bg + bright_offset) as usize];

                let fb_y = u32::from(y) + BORDER_TOP;
                let fb_x = BORDER_LEFT + u32::from(col) * 8;
                let row_base = (fb_y * FB_WIDTH + fb_x) as usize;
                for bit in 0..8 {
                    // Bit 7 is the left-most pixel of the cell
                    let set = bitmap & (0x80 >> bit) != 0;
                    self.framebuffer[row_base + bit as usize] =
                        if set { fg_colour } else { bg_colour };
                }
            }
        }
    }

    /// Reference to the framebuffer (ARGB32).
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    /// Framebuffer width in pixels.
    #[must_use]
    pub fn framebuffer_width(&self) -> u32 {
        FB_WIDTH
    }

    /// Framebuffer height in pixels.
    #[must_use]
    pub fn framebuffer_height(&self) -> u32 {
        FB_HEIGHT
    }
}

impl Default for Ula {
    fn default() -> Self {
        Self::new()
    }
}

/// Bitmap address for screen line `y` (0-191) and character column
/// `col` (0-31): `010Y7 Y6Y2 Y1Y0 Y5Y4Y3 X4X3X2X1X0`.
#[must_use]
pub const fn bitmap_addr(y: u8, col: u8) -> u16 {
    0x4000
        | ((y as u16 >> 6) & 0x03) << 11
        | ((y as u16) & 0x07) << 8
        | ((y as u16 >> 3) & 0x07) << 5
        | (col as u16)
}

/// Attribute address for screen line `y` and character column `col`:
/// `0101 10Y7 Y6Y5 Y4Y3 X4X3X2X1X0`.
#[must_use]
pub const fn attr_addr(y: u8, col: u8) -> u16 {
    0x5800 | ((y as u16 >> 3) << 5) | (col as u16)
}
