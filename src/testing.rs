//! Host test doubles: a register file that reacts like the power blocks, a
//! delay that only counts, and a power state manager that records.

use std::collections::HashMap;

use embedded_hal::delay::DelayNs;
use tock_registers::LocalRegisterCopy;

use crate::periph::{HCPA_DOMAIN, HCPB_DOMAIN, HCPC_DOMAIN, I2S_DOMAIN, IOS_DOMAIN};
use crate::regs::{clkgen, crypto, mcuctrl, pwrctrl, Reg, Registers};
use crate::spotmgr::{BuckTrims, PowerEvent, PowerStateManager};
use crate::Result;

/// Simulated register file.
///
/// Enable registers are mirrored into their status registers on write, the
/// performance request is acknowledged at once, forcing HFRC2 makes it ready
/// and the buck enable drives the regulator status.
#[derive(Clone, Debug, Default)]
pub struct SimRegisters {
    values: HashMap<Reg, u32>,
    /// Status bits that no longer follow their enable bits.
    frozen: HashMap<Reg, u32>,
    pub perf_ack_stalled: bool,
    pub hfrc2_stalled: bool,
    pub writes: Vec<(Reg, u32)>,
}

impl SimRegisters {
    pub fn new() -> Self {
        let mut regs = Self::default();
        regs.poke(Reg::CryptoNvmIsIdle, crypto::NVMISIDLE::SET.value);
        regs.poke(Reg::CryptoHostCcIsIdle, crypto::HOSTCCISIDLE::SET.value);
        regs.poke(Reg::MramCryptoPwrCtrl, mcuctrl::CRYPTOPWRDOWREADY::SET.value);
        regs
    }

    /// Set a register without triggering any side effect.
    pub fn poke(&mut self, reg: Reg, value: u32) {
        self.values.insert(reg, value);
    }

    /// Freeze `mask` bits of a status register at their current value.
    pub fn freeze(&mut self, status: Reg, mask: u32) {
        *self.frozen.entry(status).or_default() |= mask;
    }

    /// Put the regulator in buck mode without going through the enable.
    pub fn set_buck_active(&mut self) {
        self.poke(Reg::PwrVrCtrl, pwrctrl::SIMOBUCKEN::SET.value);
        self.poke(Reg::VrStatus, pwrctrl::SIMOBUCKST::Active.value);
    }

    /// Register contents, for before/after comparisons.
    pub fn snapshot(&self) -> HashMap<Reg, u32> {
        self.values
            .iter()
            .filter(|(_, v)| **v != 0)
            .map(|(r, v)| (*r, *v))
            .collect()
    }

    pub fn write_count(&self, reg: Reg) -> usize {
        self.writes.iter().filter(|(r, _)| *r == reg).count()
    }

    fn mirror(&mut self, status: Reg, value: u32) {
        let frozen = self.frozen.get(&status).copied().unwrap_or(0);
        let old = self.read(status);
        self.poke(status, (old & frozen) | (value & !frozen));
    }
}

impl Registers for SimRegisters {
    fn read(&self, reg: Reg) -> u32 {
        self.values.get(&reg).copied().unwrap_or(0)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        self.writes.push((reg, value));
        match reg {
            Reg::DevPwrEn => {
                let domains = [IOS_DOMAIN, HCPA_DOMAIN, HCPB_DOMAIN, HCPC_DOMAIN];
                self.mirror(Reg::DevPwrStatus, with_domains(value, &domains))
            }
            Reg::AudSsPwrEn => self.mirror(Reg::AudSsPwrStatus, with_domains(value, &[I2S_DOMAIN])),
            Reg::MemPwrEn => self.mirror(Reg::MemPwrStatus, value),
            Reg::SsramPwrEn => self.mirror(Reg::SsramPwrSt, value),
            Reg::McuPerfReq => {
                let mut perf = LocalRegisterCopy::<u32, pwrctrl::McuPerfReq::Register>::new(value);
                if self.perf_ack_stalled {
                    perf.modify(pwrctrl::MCUPERFACK::CLEAR);
                } else {
                    let req = perf.read(pwrctrl::MCUPERFREQ);
                    perf.modify(pwrctrl::MCUPERFSTATUS.val(req) + pwrctrl::MCUPERFACK::SET);
                }
                self.poke(reg, perf.get());
                return;
            }
            Reg::ClkgenMisc => {
                let misc = LocalRegisterCopy::<u32, clkgen::ClkgenMisc::Register>::new(value);
                let ready = misc.is_set(clkgen::FRCHFRC2) && !self.hfrc2_stalled;
                let mut stat = self.local::<clkgen::ClockEnStat::Register>();
                stat.modify(clkgen::HFRC2READY.val(ready as u32));
                self.poke(Reg::ClockEnStat, stat.get());
            }
            Reg::PwrVrCtrl => {
                let ctrl = LocalRegisterCopy::<u32, pwrctrl::PwrVrCtrl::Register>::new(value);
                let st = if ctrl.is_set(pwrctrl::SIMOBUCKEN) {
                    pwrctrl::SIMOBUCKST::Active
                } else {
                    pwrctrl::SIMOBUCKST::Off
                };
                self.poke(Reg::VrStatus, st.value);
            }
            _ => {}
        }
        self.poke(reg, value);
    }
}

/// A shared domain reports every status bit once any member is enabled.
fn with_domains(enable: u32, domains: &[u32]) -> u32 {
    domains
        .iter()
        .filter(|d| enable & **d != 0)
        .fold(enable, |status, d| status | d)
}

/// Delay that only adds up the requested time.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingDelay {
    pub elapsed_us: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_us += (ns as u64).div_ceil(1000);
    }

    fn delay_us(&mut self, us: u32) {
        self.elapsed_us += us as u64;
    }
}

/// Power state manager that records what it is told.
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub initialized: bool,
    pub events: Vec<PowerEvent>,
    pub buck: Option<BuckTrims>,
}

impl PowerStateManager for EventLog {
    fn init(&mut self) -> Result {
        self.initialized = true;
        Ok(())
    }

    fn update(&mut self, event: PowerEvent) -> Result {
        self.events.push(event);
        Ok(())
    }

    fn buck_trims(&self) -> Option<BuckTrims> {
        self.buck
    }
}
