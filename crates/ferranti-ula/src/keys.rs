//! Logical key names for the 40-key Spectrum keyboard.
//!
//! Hosts map their own input events to these and feed the resulting
//! (row, mask) pairs to [`crate::Ula::press_key`] /
//! [`crate::Ula::release_key`]. The enum carries no layout of its own;
//! the physical wiring lives in [`HALF_ROWS`].

/// A key on the 48K keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumKey {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    N0,
    N1,
    N2,
    N3,
    N4,
    N5,
    N6,
    N7,
    N8,
    N9,
    CapsShift,
    SymShift,
    Enter,
    Space,
}

/// Matrix half-rows in address-line order: A8 selects row 0 through A15
/// row 7. A key's position within its half-row is its bit number.
pub const HALF_ROWS: [[SpectrumKey; 5]; 8] = {
    use SpectrumKey::*;
    [
        [CapsShift, Z, X, C, V],
        [A, S, D, F, G],
        [Q, W, E, R, T],
        [N1, N2, N3, N4, N5],
        [N0, N9, N8, N7, N6],
        [P, O, I, U, Y],
        [Enter, L, K, J, H],
        [Space, SymShift, M, N, B],
    ]
};

impl SpectrumKey {
    /// The (row, mask) pair this key is wired to.
    #[must_use]
    pub fn matrix(self) -> (usize, u8) {
        for (row, half_row) in HALF_ROWS.iter().enumerate() {
            if let Some(bit) = half_row.iter().position(|&key| key == self) {
                return (row, 1 << bit);
            }
        }
        unreachable!("every key is wired into HALF_ROWS")
    }
}
