//! ZX Spectrum keyboard matrix.
//!
//! The Spectrum keyboard is an 8×5 matrix of half-rows, read via port $FE.
//! The high byte of the port address selects which half-rows to scan: each
//! bit (A8-A15) enables one half-row. Multiple rows can be scanned
//! simultaneously by clearing multiple address bits.
//!
//! # Half-row layout
//!
//! | Addr bit | Row | Keys (bit 0-4)                |
//! |----------|-----|-------------------------------|
//! | A8       | 0   | Shift, Z, X, C, V            |
//! | A9       | 1   | A, S, D, F, G                |
//! | A10      | 2   | Q, W, E, R, T                |
//! | A11      | 3   | 1, 2, 3, 4, 5                |
//! | A12      | 4   | 0, 9, 8, 7, 6                |
//! | A13      | 5   | P, O, I, U, Y                |
//! | A14      | 6   | Enter, L, K, J, H            |
//! | A15      | 7   | Space, Sym, M, N, B          |
//!
//! A pressed key reads as 0 (active low). Bits 5-7 always read as 1.

/// Keyboard state: 8 half-rows of 5 keys each, stored active-low exactly
/// as the matrix reads (bit = 0 means pressed, bits 5-7 are pinned high).
#[derive(Debug, Clone, Copy)]
pub struct KeyboardMatrix {
    rows: [u8; 8],
}

impl KeyboardMatrix {
    #[must_use]
    pub fn new() -> Self {
        Self { rows: [0xFF; 8] }
    }

    /// Press the keys in `mask` (bits 0-4) on half-row `row`.
    pub fn press(&mut self, row: usize, mask: u8) {
        if row < 8 {
            self.rows[row] &= !(mask & 0x1F);
        }
    }

    /// Release the keys in `mask` (bits 0-4) on half-row `row`.
    pub fn release(&mut self, row: usize, mask: u8) {
        if row < 8 {
            self.rows[row] |= mask & 0x1F;
        }
    }

    /// Release all keys.
    pub fn release_all(&mut self) {
        self.rows = [0xFF; 8];
    }

    /// Read the keyboard for a port $FE access.
    ///
    /// `addr_high` is the high byte of the port address (bits A8-A15).
    /// Each cleared bit selects a half-row to scan; the selected rows are
    /// ANDed together, so a key pressed in any of them reads as 0.
    ///
    /// Returns bits 0-4 (active low), bits 5-7 = 1.
    #[must_use]
    pub fn read(&self, addr_high: u8) -> u8 {
        let mut result: u8 = 0xFF;
        for (i, row) in self.rows.iter().enumerate() {
            // A cleared address bit selects this row
            if addr_high & (1 << i) == 0 {
                result &= row;
            }
        }
        result | 0xE0
    }
}

impl Default for KeyboardMatrix {
    fn default() -> Self {
        Self::new()
    }
}
