//! The shared T-state counter.

use std::cell::Cell;
use std::rc::Rc;

use crate::Ticks;

/// The machine's T-state counter, shared between the CPU and the memory
/// subsystem.
///
/// The CPU advances the clock for every machine cycle it executes; the
/// memory advances it for contention stalls, *before* the stalled access
/// produces its byte. Cloning is cheap and yields a handle onto the same
/// counter. The counter is monotonic; nothing ever rewinds it.
#[derive(Debug, Clone, Default)]
pub struct TstateClock {
    tstates: Rc<Cell<u64>>,
}

impl TstateClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current T-state count since power-on.
    #[must_use]
    pub fn now(&self) -> Ticks {
        Ticks::new(self.tstates.get())
    }

    /// Advance the counter by `tstates`.
    pub fn advance(&self, tstates: u64) {
        self.tstates.set(self.tstates.get() + tstates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_counter() {
        let clock = TstateClock::new();
        let handle = clock.clone();

        clock.advance(4);
        handle.advance(3);

        assert_eq!(clock.now(), Ticks::new(7));
        assert_eq!(handle.now(), Ticks::new(7));
    }
}
