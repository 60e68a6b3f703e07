//! Power state manager interface
//!
//! Newer silicon hands voltage and trim decisions to a central power state
//! manager. The engine reports every transition to it and never reads state
//! back, except for the buck calibration published once at init.

use crate::Result;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpuState {
    Off,
    ActiveLp,
    ActiveHp,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpuState {
    ActiveLp,
    ActiveHp,
}

/// Temperature band reported to the manager.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TempBand {
    VeryLow,
    Low,
    Mid,
    High,
}

/// A power transition the manager needs to know about.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerEvent {
    /// Device domains in `mask` are about to power up, or have powered down.
    DevicePower { mask: u32, on: bool },
    /// Same as `DevicePower` for the audio subsystem.
    AudioPower { mask: u32, on: bool },
    /// MEMPWRSTATUS after a memory configuration change.
    MemoryPower(u32),
    /// SSRAMPWRST after a shared SRAM configuration change.
    SsramPower(u32),
    Gpu(GpuState),
    Cpu(CpuState),
    Temperature(TempBand),
}

/// Buck takeover calibration published by the manager.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BuckTrims {
    pub coreldo_active: u32,
    pub memldo_active: u32,
    pub memldo_ref: u32,
}

pub trait PowerStateManager {
    fn init(&mut self) -> Result;
    fn update(&mut self, event: PowerEvent) -> Result;

    fn buck_trims(&self) -> Option<BuckTrims> {
        None
    }
}

/// For silicon without a power state manager.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStateManager;

impl PowerStateManager for NoStateManager {
    fn init(&mut self) -> Result {
        Ok(())
    }

    fn update(&mut self, _event: PowerEvent) -> Result {
        Ok(())
    }
}

impl<T: PowerStateManager + ?Sized> PowerStateManager for &mut T {
    fn init(&mut self) -> Result {
        (**self).init()
    }

    fn update(&mut self, event: PowerEvent) -> Result {
        (**self).update(event)
    }

    fn buck_trims(&self) -> Option<BuckTrims> {
        (**self).buck_trims()
    }
}
