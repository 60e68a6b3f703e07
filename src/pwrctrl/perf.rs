//! CPU and GPU performance mode switching.

use embedded_hal::delay::DelayNs;

use super::{sequence, GpuPowerMode, PowerControl, PowerMode};
use crate::clkmgr::ClockManager;
use crate::delay::poll_until;
use crate::periph::Peripheral;
use crate::regs::{clkgen, pwrctrl, Registers};
use crate::silicon::SiliconRevision;
use crate::spotmgr::{CpuState, PowerEvent, PowerStateManager};
use crate::{Error, Result};

const HFRC2_READY_WAIT_US: u32 = 200;
const PERF_ACK_WAIT_US: u32 = 20;
const GFX_VDD_SETTLE_US: u32 = 1;
const GFX_PERF_SETTLE_US: u32 = 6;

impl<R, D, C, S> PowerControl<R, D, C, S>
where
    R: Registers,
    D: DelayNs,
    C: ClockManager,
    S: PowerStateManager,
{
    /// Switch the CPU performance mode.
    ///
    /// High performance needs the regulator in buck mode. The tracked mode
    /// only changes once the hardware acknowledged the request.
    pub fn cpu_mode_select(&mut self, mode: PowerMode) -> Result {
        if mode == PowerMode::HighPerformance && !self.buck_active() {
            warn!("pwrctrl: CPU HP needs the buck");
            return Err(Error::InvalidOperation);
        }
        if mode == self.state.cpu_mode {
            return Ok(());
        }

        debug!("pwrctrl: CPU {} -> {}", self.state.cpu_mode, mode);
        let res = match mode {
            PowerMode::HighPerformance => self.cpu_enter_hp(),
            PowerMode::LowPower => self.cpu_perf_request(mode),
        };

        match res {
            Ok(()) => {
                self.state.cpu_mode = mode;
                if mode == PowerMode::LowPower && self.managed() {
                    self.notify(PowerEvent::Cpu(CpuState::ActiveLp));
                }
            }
            Err(e) => {
                error!("pwrctrl: CPU mode switch failed: {}", e);
                if mode == PowerMode::HighPerformance && self.managed() {
                    self.notify(PowerEvent::Cpu(CpuState::ActiveLp));
                }
                return Err(e);
            }
        }

        if self.regs.get(pwrctrl::MCUPERFSTATUS) == mode.req() {
            Ok(())
        } else {
            Err(Error::Fail)
        }
    }

    /// HFRC2 has to run before the clock mux moves over. Forced on here
    /// unless someone already forces it, and released again afterwards.
    fn cpu_enter_hp(&mut self) -> Result {
        if self.managed() {
            self.notify(PowerEvent::Cpu(CpuState::ActiveHp));
        }

        let forced = !self.regs.is_set(clkgen::FRCHFRC2);
        if forced {
            self.cs(|pc| pc.regs.set(clkgen::FRCHFRC2, 1));
            self.delay.delay_us(1);
            let regs = &self.regs;
            if poll_until(&mut self.delay, HFRC2_READY_WAIT_US, || {
                regs.is_set(clkgen::HFRC2READY)
            })
            .is_err()
            {
                warn!("pwrctrl: HFRC2 not ready");
            }
        }

        let res = if self.regs.is_set(clkgen::HFRC2READY) {
            self.cpu_perf_request(PowerMode::HighPerformance)
        } else {
            Err(Error::Fail)
        };

        if forced {
            self.cs(|pc| pc.regs.set(clkgen::FRCHFRC2, 0));
        }
        res
    }

    fn cpu_perf_request(&mut self, mode: PowerMode) -> Result {
        self.cs(|pc| pc.regs.set(pwrctrl::MCUPERFREQ, mode.req()));
        let regs = &self.regs;
        poll_until(&mut self.delay, PERF_ACK_WAIT_US, || {
            regs.is_set(pwrctrl::MCUPERFACK)
        })
    }

    /// Tracked CPU mode.
    pub fn cpu_mode_status(&self) -> PowerMode {
        self.state.cpu_mode
    }

    /// Switch the GPU performance mode. Refused while GFX is powered.
    pub fn gpu_mode_select(&mut self, mode: GpuPowerMode) -> Result {
        if mode == GpuPowerMode::HighPerformance && !self.buck_active() {
            warn!("pwrctrl: GPU HP needs the buck");
            return Err(Error::InvalidOperation);
        }
        if self.enabled(Peripheral::Gfx) {
            return Err(Error::InUse);
        }
        if mode == self.state.gpu_mode {
            self.state.gpu_prev_mode = mode;
            return Ok(());
        }

        debug!("pwrctrl: GPU {} -> {}", self.state.gpu_mode, mode);
        let legacy = self.revision == SiliconRevision::Legacy;
        self.cs(|pc| {
            if legacy && mode == GpuPowerMode::HighPerformance {
                sequence::legacy_ton_update(&mut pc.regs, &pc.state, Some(mode));
            }
            let vddsel = (mode == GpuPowerMode::HighPerformance) as u32;
            pc.regs.set(pwrctrl::GFXVDDSEL, vddsel);
        });
        self.delay.delay_us(GFX_VDD_SETTLE_US);

        self.cs(|pc| {
            pc.regs.set(pwrctrl::GFXPERFREQ, mode.req());
            pc.state.gpu_mode = mode;
            pc.state.gpu_prev_mode = mode;
        });
        self.delay.delay_us(GFX_PERF_SETTLE_US);

        if legacy && mode == GpuPowerMode::LowPower {
            self.cs(|pc| sequence::legacy_ton_update(&mut pc.regs, &pc.state, Some(mode)));
        }
        Ok(())
    }

    /// Tracked GPU mode.
    pub fn gpu_mode_status(&self) -> GpuPowerMode {
        self.state.gpu_mode
    }
}
