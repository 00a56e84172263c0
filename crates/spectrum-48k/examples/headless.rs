//! Headless driver: boot a ROM and run for a few seconds of emulated
//! time, reporting frame statistics.
//!
//! ```sh
//! cargo run --example headless -- path/to/48.rom [frames]
//! ```

use spectrum_48k::{Spectrum, SpectrumConfig};

fn main() {
    let mut args = std::env::args().skip(1);
    let Some(rom_path) = args.next() else {
        eprintln!("usage: headless <rom> [frames]");
        std::process::exit(2);
    };
    let frames: u64 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(100);

    let rom = std::fs::read(&rom_path).expect("read ROM image");
    let config = SpectrumConfig::new(rom);
    let mut spectrum = Spectrum::new(&config).expect("valid ROM image");

    for _ in 0..frames {
        spectrum.run_frame();
    }

    println!(
        "{} frames, {} T-states, border={}, PC={:04X}",
        spectrum.frame_count(),
        spectrum.total_tstates().get(),
        spectrum.bus().ula.border_colour(),
        spectrum.cpu().regs.pc,
    );
}
