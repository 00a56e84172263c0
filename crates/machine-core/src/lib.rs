//! Shared timing and bus types for the Spectrum core.
//!
//! Everything counts time in CPU T-states. The CPU charges its machine
//! cycles through a [`TstateClock`]; the memory subsystem holds a clone of
//! the same clock so contention stalls land on the counter at the exact
//! access they occur.

mod bus;
mod clock;
mod ticks;

pub use bus::{Bus, SimpleBus};
pub use clock::TstateClock;
pub use ticks::Ticks;
