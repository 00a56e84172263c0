//! Machine configuration.

/// Configuration for creating a [`crate::Spectrum`].
pub struct SpectrumConfig {
    /// ROM image for the 16 KiB ROM slot. The standard Sinclair 48K
    /// image is exactly 16,384 bytes and begins F3 AF 11 FF FF.
    pub rom: Vec<u8>,
    /// Model ULA memory contention. Disable for exact instruction
    /// timing in tests and tooling.
    pub contention: bool,
}

impl SpectrumConfig {
    /// Standard configuration for the given ROM image.
    #[must_use]
    pub fn new(rom: Vec<u8>) -> Self {
        Self { rom, contention: true }
    }
}
