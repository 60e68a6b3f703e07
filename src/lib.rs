#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod clkmgr;
pub mod delay;
pub mod periph;
pub mod pwrctrl;
pub mod regs;
pub mod silicon;
pub mod spotmgr;
pub mod trim;

#[cfg(test)]
mod testing;

pub use periph::Peripheral;
pub use pwrctrl::{GpuPowerMode, McuMemoryConfig, PowerControl, PowerMode, SramConfig};
pub use silicon::{Silicon, SiliconRevision};

/// Power control error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Status did not match what was programmed.
    Fail,
    /// A bounded poll never saw the expected status. The hardware may be
    /// halfway through the transition.
    Timeout,
    InvalidArg,
    /// A precondition does not hold, nothing was touched.
    InvalidOperation,
    InUse,
    OutOfRange,
}

pub type Result<T = ()> = core::result::Result<T, Error>;

/// System configuration.
#[derive(Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Leave debug trace powered at init.
    pub trace_clients: bool,
    /// Program the buck low power auto-switch thresholds at init.
    pub simolp_autoswitch: bool,
    /// Skip CHIPREV/INFO1 detection.
    pub silicon: Option<Silicon>,
    /// Memory setup applied at init. `None` takes
    /// [`McuMemoryConfig::for_silicon`].
    pub memory: Option<McuMemoryConfig>,
    pub sram: SramConfig,
}
