//! Timing primitives
//!
//! All waits in the power engine are bounded busy-polls with microsecond
//! granularity. Nothing here yields or retries.

use embedded_hal::delay::DelayNs;

use crate::{Error, Result};

/// Busy-wait delay calibrated from the core clock.
pub struct CycleDelay {
    ticks_per_us: u32,
}

impl CycleDelay {
    pub const fn new(core_clock_hz: u32) -> Self {
        let ticks_per_us = core_clock_hz / 1_000_000;
        Self {
            ticks_per_us: if ticks_per_us == 0 { 1 } else { ticks_per_us },
        }
    }

    /// Core cycles covering `ns`, rounded up so a wait never runs short.
    fn ns_to_cycles(&self, ns: u32) -> u32 {
        let cycles = (ns as u64 * self.ticks_per_us as u64).div_ceil(1000);
        cycles.min(u32::MAX as u64) as u32
    }

    fn us_to_cycles(&self, us: u32) -> u32 {
        us.saturating_mul(self.ticks_per_us)
    }
}

impl Default for CycleDelay {
    /// Worst case: 250 MHz high performance clock, so waits never run short.
    fn default() -> Self {
        Self::new(250_000_000)
    }
}

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        cortex_m::asm::delay(self.ns_to_cycles(ns));
    }

    fn delay_us(&mut self, us: u32) {
        cortex_m::asm::delay(self.us_to_cycles(us));
    }
}

/// Poll `done` once per microsecond for up to `timeout_us` microseconds.
///
/// The predicate is sampled `timeout_us + 1` times, the last sample right
/// after the final wait.
pub fn poll_until<D: DelayNs>(
    delay: &mut D,
    timeout_us: u32,
    mut done: impl FnMut() -> bool,
) -> Result {
    for _ in 0..timeout_us {
        if done() {
            return Ok(());
        }
        delay.delay_us(1);
    }

    if done() {
        Ok(())
    } else {
        Err(Error::Timeout)
    }
}
