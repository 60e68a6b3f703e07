//! Boot sequence, firmware handoff and the less common control operations.

use embedded_hal::delay::DelayNs;

use super::{
    sequence, CpdlpConfig, McuMemoryConfig, PowerControl, PowerMode, CRYPTO_WAIT_US, MAX_WAIT_US,
};
use crate::clkmgr::ClockManager;
use crate::delay::poll_until;
use crate::periph::{Peripheral, AUDSSPWR_ALL_MASK, DEVPWR_ALL_MASK};
use crate::regs::{clkgen, crypto, dcb, info1, mcuctrl, pwrctrl, rstgen, timer, Reg, Registers};
use crate::silicon::SiliconRevision;
use crate::spotmgr::{PowerEvent, PowerStateManager};
use crate::trim::{clamp_add, clamp_sub, TrimSnapshot};
use crate::{Error, Result};

/// Deferred power state updates drain within this budget.
const SPOT_TIMER_WAIT_US: u32 = 2500;
/// Conservative reading reported before the sensor is up.
const HANDOFF_TEMPERATURE: f32 = -40.0;

const AUDADC_POWER_DELAY: u32 = 4;
const XTAL_BIAS_TRIM_DEEPSLEEP: u32 = 0x20;
const VDDCLV_LOW_TON_MANAGED: u32 = 6;
const MRAM_AUTO_WAKEUP: u32 = 3;

/// Factory calibration words kept from INFO1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Info1Calibration {
    /// INFO1 carried the valid signature.
    pub valid: bool,
    pub trim_rev: u32,
    pub patch_tracker: u32,
}

/// Operations behind [`PowerControl::control`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlOp {
    /// Hand the core rails over to the buck.
    SimobuckInit,
    /// Quiesce the crypto host, then power crypto down.
    CryptoPowerdown,
    /// Power the crystal down in deep sleep.
    XtalPwdnDeepsleep,
    /// Power down every device and audio domain at once.
    DisablePeriphsAll,
}

impl TryFrom<u32> for ControlOp {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(ControlOp::SimobuckInit),
            1 => Ok(ControlOp::CryptoPowerdown),
            2 => Ok(ControlOp::XtalPwdnDeepsleep),
            3 => Ok(ControlOp::DisablePeriphsAll),
            _ => Err(Error::InvalidArg),
        }
    }
}

impl<R, D, C, S> PowerControl<R, D, C, S>
where
    R: Registers,
    D: DelayNs,
    C: ClockManager,
    S: PowerStateManager,
{
    /// Boot time power setup. Call once, before anything else.
    ///
    /// A second call leaves the trim snapshot alone.
    pub fn low_power_init(&mut self) -> Result {
        if self.regs.is_set(rstgen::POASTAT) {
            self.cs(|pc| pc.regs.set(rstgen::BORSTAT, 0));
        }

        if !self.config.trace_clients {
            self.cs(|pc| pc.regs.set(dcb::TRCENA, 0));
            self.disable(Peripheral::Debug)?;
            self.cs(|pc| pc.regs.modify_fields(mcuctrl::DBGCLKGATE::SET));
        }

        self.cpdlp_config(&CpdlpConfig::default())?;
        self.cs(|pc| pc.regs.set(mcuctrl::DEEPISWIC, 1));

        if self.regs.is_set(mcuctrl::INFO1SELOTP) && !self.otp_powered() {
            self.enable(Peripheral::Otp)?;
        }
        if let Err(e) = self.info1_capture() {
            warn!("pwrctrl: INFO1 not read: {}", e);
        }

        if self.managed() {
            self.spot.init()?;
        }

        // Crypto first, it needs OTP.
        self.disable(Peripheral::Crypto)?;
        self.disable(Peripheral::Otp)?;

        let memory = self
            .config
            .memory
            .unwrap_or_else(|| McuMemoryConfig::for_silicon(self.silicon));
        self.mcu_memory_config(&memory)?;
        let sram = self.config.sram;
        self.sram_config(&sram)?;

        self.cs(|pc| {
            let regs = &mut pc.regs;
            regs.modify_fields(
                clkgen::CLKGATES::SET + clkgen::PWRONCLKEN::SET + clkgen::AXIXACLKENOVRRIDE::CLEAR,
            );
            regs.write(Reg::ClkCtrl, 0);
            regs.set(mcuctrl::AUDADCPWR1, AUDADC_POWER_DELAY);
        });

        if self.state.trims.is_none() {
            let mut snap = TrimSnapshot::capture(&self.regs);
            // The buck may already own the rails, record the LDO setting.
            if self.buck_active() {
                if let Some(reduce) = self.silicon.simobuck_coreldo_reduce() {
                    snap.coreldo_active =
                        clamp_add(snap.coreldo_active, reduce, mcuctrl::CORELDOACTIVETRIM.mask);
                }
            }
            debug!("pwrctrl: trims stored {}", snap);
            self.state.trims = Some(snap);
        }

        self.cs(|pc| {
            let regs = &mut pc.regs;
            regs.set(mcuctrl::PWRSWVDDRCPUSTATSEL, 1);
            regs.set(mcuctrl::PWRSWVDDRMSTATSEL, 1);
            regs.set(mcuctrl::PWRSWVDDRLSTATSEL, 1);
        });

        match self.revision {
            SiliconRevision::Legacy => {
                self.cs(|pc| sequence::legacy_ton_update(&mut pc.regs, &pc.state, None));
            }
            SiliconRevision::Transitional if self.config.simolp_autoswitch => {
                self.cs(|pc| {
                    let regs = &mut pc.regs;
                    regs.set(pwrctrl::TONCLKDIV, 0);
                    regs.set(pwrctrl::TONFCNT, 1000);
                    regs.set(pwrctrl::LPOVRHYSTCNT, 0);
                    regs.set(pwrctrl::LPOVRTHRESHVDDS, 800);
                    regs.set(pwrctrl::LPOVRTHRESHVDDF, 450);
                    regs.set(pwrctrl::LPOVRTHRESHVDDC, 600);
                    regs.set(pwrctrl::LPOVRTHRESHVDDCLV, 250);
                    regs.set(pwrctrl::LPMODESWOVR, 0);
                    regs.set(pwrctrl::ENABLELPOVR, 0);
                });
            }
            _ => {}
        }

        if self.silicon.ge_b1() {
            self.cs(|pc| pc.regs.set(pwrctrl::MRAMAUTOWAKEUPCTRL, MRAM_AUTO_WAKEUP));
        }

        info!("pwrctrl: low power init done ({})", self.revision);
        Ok(())
    }

    fn info1_capture(&mut self) -> Result {
        if self.state.info1.is_some() {
            return Ok(());
        }
        if self.regs.is_set(mcuctrl::INFO1SELOTP) && !self.otp_powered() {
            return Err(Error::InvalidOperation);
        }
        self.state.info1 = Some(Info1Calibration {
            valid: self.regs.read(info1::VALID) == info1::VALID_SIGNATURE,
            trim_rev: self.regs.get(info1::TRIM_REV),
            patch_tracker: self.regs.read(info1::PATCH_TRACKER0),
        });
        Ok(())
    }

    /// Put the power blocks in the state the next firmware image expects.
    ///
    /// CPU must be back in low power mode and GFX off.
    pub fn settings_restore(&mut self) -> Result {
        if self.regs.get(pwrctrl::MCUPERFSTATUS) == PowerMode::HighPerformance.req() {
            warn!("pwrctrl: restore refused, CPU in HP");
            return Err(Error::Fail);
        }
        if self.enabled(Peripheral::Gfx) {
            warn!("pwrctrl: restore refused, GFX on");
            return Err(Error::Fail);
        }
        if !self.managed() {
            return Ok(());
        }

        let idle = self.regs.read(Reg::DevPwrStatus) == 0
            && self.regs.read(Reg::AudSsPwrStatus) == 0;
        if !idle {
            return Err(Error::Fail);
        }
        self.enable(Peripheral::Otp).map_err(|_| Error::Fail)?;
        self.temperature_update(HANDOFF_TEMPERATURE)
            .map_err(|_| Error::Fail)?;

        let regs = &self.regs;
        poll_until(&mut self.delay, SPOT_TIMER_WAIT_US, || {
            !regs.is_set(timer::TMR0EN)
        })
    }

    pub fn control(&mut self, op: ControlOp) -> Result {
        debug!("pwrctrl: control {}", op);
        match op {
            ControlOp::SimobuckInit => self.simobuck_init(),
            ControlOp::CryptoPowerdown => self.crypto_powerdown(),
            ControlOp::XtalPwdnDeepsleep => {
                self.cs(|pc| {
                    pc.regs.set(mcuctrl::XTALBIASTRIM, XTAL_BIAS_TRIM_DEEPSLEEP);
                    pc.regs.write_fields(mcuctrl::PWDNCOREXTAL::SET + mcuctrl::XTALSWE::SET);
                });
                Ok(())
            }
            ControlOp::DisablePeriphsAll => self.disable_periphs_all(),
        }
    }

    fn simobuck_init(&mut self) -> Result {
        if self.buck_active() {
            return Ok(());
        }

        let managed = self.managed();
        self.cs(|pc| {
            let regs = &mut pc.regs;
            if managed {
                regs.set(mcuctrl::VDDCLVACTLOWTONTRIM, VDDCLV_LOW_TON_MANAGED);
            }
            regs.modify_fields(
                mcuctrl::SIMOBUCKPDNB::SET
                    + mcuctrl::SIMOBUCKRSTB::SET
                    + mcuctrl::SIMOBUCKACTIVE::SET
                    + mcuctrl::SIMOBUCKOVER::SET,
            );
            regs.modify_fields(mcuctrl::TRIMLATCHOVER::SET);
            regs.modify_fields(mcuctrl::RXCOMPEN::SET);
        });

        // (coreldo, memldo, memldo reference) once the buck runs
        let takeover = if managed {
            self.spot
                .buck_trims()
                .map(|t| (Some(t.coreldo_active), t.memldo_active, t.memldo_ref))
        } else if self.silicon.has_trims() {
            let coreldo = self.silicon.simobuck_coreldo_reduce().map(|reduce| {
                let base = match self.state.trims {
                    Some(snap) => snap.coreldo_active,
                    None => self.regs.get(mcuctrl::CORELDOACTIVETRIM),
                };
                clamp_sub(base, reduce)
            });
            let (memldo, memldo_ref) = self.silicon.memldo_buck_setting();
            Some((coreldo, memldo, memldo_ref))
        } else {
            None
        };

        match takeover {
            Some((coreldo, memldo, memldo_ref)) => {
                if let Some(coreldo) = coreldo {
                    self.cs(|pc| pc.regs.set(mcuctrl::CORELDOACTIVETRIM, coreldo));
                }
                self.cs(|pc| pc.regs.set(pwrctrl::SIMOBUCKEN, 1));
                self.cs(|pc| {
                    pc.regs.set(mcuctrl::MEMLDOACTIVETRIM, memldo);
                    pc.regs.set(mcuctrl::D2A_MEMLDO_REF, memldo_ref);
                });
            }
            None => self.cs(|pc| pc.regs.set(pwrctrl::SIMOBUCKEN, 1)),
        }
        info!("pwrctrl: buck enabled");
        Ok(())
    }

    fn crypto_powerdown(&mut self) -> Result {
        if !self.enabled(Peripheral::Crypto) {
            return Ok(());
        }

        let regs = &self.regs;
        let ready = poll_until(&mut self.delay, CRYPTO_WAIT_US, || {
            regs.is_set(mcuctrl::CRYPTOPWRDOWREADY)
        });
        if ready.is_err() {
            let regs = &self.regs;
            poll_until(&mut self.delay, CRYPTO_WAIT_US, || {
                regs.is_set(crypto::HOSTCCISIDLE)
            })?;
            self.cs(|pc| pc.regs.set(crypto::HOSTPOWERDOWN, 1));
            let regs = &self.regs;
            poll_until(&mut self.delay, CRYPTO_WAIT_US, || {
                regs.is_set(mcuctrl::CRYPTOPWRDOWREADY)
            })?;
        }

        self.disable(Peripheral::Crypto)
    }

    fn disable_periphs_all(&mut self) -> Result {
        self.cs(|pc| {
            let regs = &mut pc.regs;
            regs.set(dcb::TRCENA, 0);
            regs.set(mcuctrl::DBGTPIUTRACEENABLE, 0);
            regs.set(mcuctrl::DBGTPIUCLKSEL, 0);
            regs.write(Reg::DevPwrEn, 0);
            regs.write(Reg::AudSsPwrEn, 0);
        });

        let regs = &self.regs;
        poll_until(&mut self.delay, MAX_WAIT_US, || {
            regs.read(Reg::DevPwrStatus) == 0 && regs.read(Reg::AudSsPwrStatus) == 0
        })?;

        if self.managed() {
            self.notify(PowerEvent::DevicePower {
                mask: DEVPWR_ALL_MASK,
                on: false,
            });
            self.notify(PowerEvent::AudioPower {
                mask: AUDSSPWR_ALL_MASK,
                on: false,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clkmgr::{ClockId, ClockLedger, ClockUser};
    use crate::pwrctrl::tests::engine;
    use crate::pwrctrl::{GpuPowerMode, RomMode};
    use crate::silicon::{ChipRev, Silicon};
    use crate::spotmgr::BuckTrims;
    use crate::testing::{CountingDelay, EventLog, SimRegisters};
    use crate::Config;

    fn legacy() -> Silicon {
        Silicon::new(ChipRev::B0, 1)
    }

    #[test]
    fn control_op_from_code() {
        assert_eq!(ControlOp::try_from(0), Ok(ControlOp::SimobuckInit));
        assert_eq!(ControlOp::try_from(3), Ok(ControlOp::DisablePeriphsAll));
        assert_eq!(ControlOp::try_from(4), Err(Error::InvalidArg));
    }

    #[test]
    fn crypto_and_otp_lifecycle() {
        let mut pc = engine(legacy());
        assert_eq!(pc.low_power_init(), Ok(()));
        assert!(!pc.enabled(Peripheral::Crypto));

        assert_eq!(pc.enable(Peripheral::Otp), Ok(()));
        assert_eq!(pc.enable(Peripheral::Crypto), Ok(()));
        assert_eq!(pc.disable(Peripheral::Crypto), Ok(()));
        assert_eq!(pc.disable(Peripheral::Otp), Ok(()));
    }

    #[test]
    fn init_powers_down_crypto_then_otp() {
        let mut pc = engine(legacy());
        pc.enable(Peripheral::Otp).unwrap();
        pc.enable(Peripheral::Crypto).unwrap();

        pc.low_power_init().unwrap();
        assert!(!pc.enabled(Peripheral::Crypto));
        assert!(!pc.enabled(Peripheral::Otp));
        assert!(!pc.clocks().is_requested(ClockId::Hfrc));
    }

    #[test]
    fn init_applies_memory_defaults() {
        let mut pc = engine(Silicon::new(ChipRev::B1, 0));
        pc.low_power_init().unwrap();

        assert_eq!(
            pc.mcu_memory_config_get(),
            Ok(McuMemoryConfig::for_silicon(pc.silicon()))
        );
        assert_eq!(pc.regs().get(pwrctrl::SSRAMPWRST), 0b111);
        assert_eq!(pc.regs().get(pwrctrl::MRAMAUTOWAKEUPCTRL), 3);
        assert_eq!(pc.regs().get(clkgen::PWRONCLKEN), clkgen::PWRONCLKEN.mask);
    }

    #[test]
    fn init_lets_rom_power_down_from_b1() {
        for rev in [ChipRev::B1, ChipRev::B2] {
            let mut pc = engine(Silicon::new(rev, 1));
            pc.low_power_init().unwrap();
            assert_eq!(pc.state().rom_mode, RomMode::Auto, "{rev:?}");
            assert!(!pc.regs().is_set(pwrctrl::PWRENROM), "{rev:?}");
            assert!(!pc.regs().is_set(pwrctrl::PWRSTROM), "{rev:?}");
        }

        let mut pc = engine(legacy());
        pc.low_power_init().unwrap();
        assert_eq!(pc.state().rom_mode, RomMode::AlwaysOn);
        assert!(pc.regs().is_set(pwrctrl::PWRENROM));
    }

    #[test]
    fn init_keeps_caller_rom_mode() {
        let config = Config {
            silicon: Some(Silicon::new(ChipRev::B2, 1)),
            memory: Some(McuMemoryConfig::default()),
            ..Config::default()
        };
        let mut pc = PowerControl::new(
            SimRegisters::new(),
            CountingDelay::default(),
            ClockLedger::new(),
            EventLog::default(),
            config,
        );
        pc.low_power_init().unwrap();
        assert_eq!(pc.state().rom_mode, RomMode::AlwaysOn);
        assert!(pc.regs().is_set(pwrctrl::PWRSTROM));
    }

    #[test]
    fn snapshot_captured_once() {
        let mut pc = engine(legacy());
        pc.regs_mut().set(mcuctrl::TVRGCVREFTRIM, 60);
        pc.low_power_init().unwrap();
        pc.control(ControlOp::SimobuckInit).unwrap();

        pc.regs_mut().set(mcuctrl::TVRGCVREFTRIM, 100);
        pc.low_power_init().unwrap();
        assert_eq!(pc.state().trims.map(|t| t.tvrgc), Some(60));

        pc.enable(Peripheral::Gfx).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), 60 + 9);
        pc.disable(Peripheral::Gfx).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), 60);
    }

    #[test]
    fn snapshot_records_ldo_setting_when_buck_already_on() {
        let mut pc = engine(Silicon::new(ChipRev::B1, 1));
        pc.regs_mut().set(mcuctrl::CORELDOACTIVETRIM, 193);
        pc.regs_mut().set_buck_active();
        pc.low_power_init().unwrap();
        assert_eq!(pc.state().trims.map(|t| t.coreldo_active), Some(200));
    }

    #[test]
    fn info1_read_needs_otp_when_routed_there() {
        let mut pc = engine(legacy());
        pc.regs_mut().poke(info1::VALID, info1::VALID_SIGNATURE);
        pc.regs_mut().poke(Reg::Info1(1), 2);
        pc.regs_mut().poke(info1::PATCH_TRACKER0, 0xdead_beef);

        pc.low_power_init().unwrap();
        assert_eq!(
            pc.state().info1,
            Some(Info1Calibration {
                valid: true,
                trim_rev: 2,
                patch_tracker: 0xdead_beef,
            })
        );

        let mut pc = engine(legacy());
        pc.regs_mut().set(mcuctrl::INFO1SELOTP, 1);
        assert_eq!(pc.info1_capture(), Err(Error::InvalidOperation));
        assert_eq!(pc.state().info1, None);
    }

    #[test]
    fn simolp_autoswitch_thresholds() {
        let mut pc = engine(Silicon::new(ChipRev::B1, 0));
        pc.config.simolp_autoswitch = true;
        pc.low_power_init().unwrap();
        assert_eq!(pc.regs().get(pwrctrl::TONFCNT), 1000);
        assert_eq!(pc.regs().get(pwrctrl::LPOVRTHRESHVDDS), 800);
        assert_eq!(pc.regs().get(pwrctrl::LPOVRTHRESHVDDCLV), 250);
    }

    #[test]
    fn trace_left_alone_with_trace_clients() {
        let mut pc = engine(legacy());
        pc.config.trace_clients = true;
        pc.regs_mut().poke(Reg::DcbDemcr, dcb::TRCENA::SET.value);
        pc.low_power_init().unwrap();
        assert!(pc.regs().is_set(dcb::TRCENA));

        pc.config.trace_clients = false;
        pc.low_power_init().unwrap();
        assert!(!pc.regs().is_set(dcb::TRCENA));
    }

    #[test]
    fn simobuck_init_applies_takeover_trims() {
        let mut pc = engine(Silicon::new(ChipRev::B0, 3));
        pc.regs_mut().set(mcuctrl::CORELDOACTIVETRIM, 200);
        pc.regs_mut().set(mcuctrl::MEMLDOACTIVETRIM, 20);
        pc.low_power_init().unwrap();
        pc.control(ControlOp::SimobuckInit).unwrap();

        let r = pc.regs();
        assert!(pc.buck_active());
        assert!(r.is_set(mcuctrl::SIMOBUCKOVER));
        assert!(r.is_set(mcuctrl::TRIMLATCHOVER));
        assert_eq!(r.get(mcuctrl::CORELDOACTIVETRIM), 193);
        assert_eq!(r.get(mcuctrl::MEMLDOACTIVETRIM), 1);
        assert_eq!(r.get(mcuctrl::D2A_MEMLDO_REF), 0b10);

        // Already on: nothing to do.
        let writes = pc.regs().writes.len();
        pc.control(ControlOp::SimobuckInit).unwrap();
        assert_eq!(pc.regs().writes.len(), writes);
    }

    #[test]
    fn simobuck_init_without_trims_only_enables() {
        let mut pc = engine(Silicon::new(ChipRev::B0, 0));
        pc.regs_mut().set(mcuctrl::CORELDOACTIVETRIM, 200);
        pc.control(ControlOp::SimobuckInit).unwrap();
        assert!(pc.buck_active());
        assert_eq!(pc.regs().get(mcuctrl::CORELDOACTIVETRIM), 200);
    }

    #[test]
    fn simobuck_init_managed_uses_published_trims() {
        let mut pc = engine(Silicon::new(ChipRev::B2, 1));
        pc.spot.buck = Some(BuckTrims {
            coreldo_active: 150,
            memldo_active: 2,
            memldo_ref: 0b01,
        });
        pc.control(ControlOp::SimobuckInit).unwrap();

        let r = pc.regs();
        assert_eq!(r.get(mcuctrl::VDDCLVACTLOWTONTRIM), 6);
        assert_eq!(r.get(mcuctrl::CORELDOACTIVETRIM), 150);
        assert_eq!(r.get(mcuctrl::MEMLDOACTIVETRIM), 2);
        assert_eq!(r.get(mcuctrl::D2A_MEMLDO_REF), 0b01);
    }

    #[test]
    fn crypto_powerdown_quiesces_host() {
        let mut pc = engine(Silicon::new(ChipRev::B1, 0));
        pc.enable(Peripheral::Otp).unwrap();
        pc.enable(Peripheral::Crypto).unwrap();
        pc.regs_mut().poke(Reg::MramCryptoPwrCtrl, 0);

        // Host never reports ready for power down.
        assert_eq!(pc.control(ControlOp::CryptoPowerdown), Err(Error::Timeout));
        assert!(pc.regs().is_set(crypto::HOSTPOWERDOWN));
        assert!(pc.enabled(Peripheral::Crypto));

        pc.regs_mut().poke(Reg::MramCryptoPwrCtrl, mcuctrl::CRYPTOPWRDOWREADY::SET.value);
        assert_eq!(pc.control(ControlOp::CryptoPowerdown), Ok(()));
        assert!(!pc.enabled(Peripheral::Crypto));
        assert!(!pc.clocks().holds(ClockId::Hfrc, ClockUser::Crypto));
    }

    #[test]
    fn xtal_deepsleep_powerdown() {
        let mut pc = engine(legacy());
        pc.control(ControlOp::XtalPwdnDeepsleep).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::XTALBIASTRIM), 0x20);
        assert_eq!(pc.regs().read(Reg::XtalCtrl), (1 << 7) | (1 << 8));
    }

    #[test]
    fn disable_all_drops_every_domain() {
        let mut pc = engine(Silicon::new(ChipRev::B2, 1));
        pc.enable(Peripheral::Uart0).unwrap();
        pc.enable(Peripheral::Iom3).unwrap();
        pc.enable(Peripheral::Pdm0).unwrap();

        pc.control(ControlOp::DisablePeriphsAll).unwrap();
        assert_eq!(pc.status_get().devices, 0);
        assert_eq!(pc.status_get().audio, 0);
        assert!(pc.state_manager().events.ends_with(&[
            PowerEvent::DevicePower {
                mask: DEVPWR_ALL_MASK,
                on: false
            },
            PowerEvent::AudioPower {
                mask: AUDSSPWR_ALL_MASK,
                on: false
            },
        ]));
    }

    #[test]
    fn settings_restore_preconditions() {
        let mut pc = engine(Silicon::new(ChipRev::B2, 1));
        pc.low_power_init().unwrap();
        pc.control(ControlOp::SimobuckInit).unwrap();

        pc.cpu_mode_select(PowerMode::HighPerformance).unwrap();
        assert_eq!(pc.settings_restore(), Err(Error::Fail));
        pc.cpu_mode_select(PowerMode::LowPower).unwrap();

        pc.enable(Peripheral::Gfx).unwrap();
        assert_eq!(pc.settings_restore(), Err(Error::Fail));
        pc.disable(Peripheral::Gfx).unwrap();

        pc.enable(Peripheral::Uart2).unwrap();
        assert_eq!(pc.settings_restore(), Err(Error::Fail));
        pc.disable(Peripheral::Uart2).unwrap();

        assert_eq!(pc.settings_restore(), Ok(()));
        assert!(pc.enabled(Peripheral::Otp));
    }

    #[test]
    fn settings_restore_reads_hardware_perf_status() {
        let mut pc = engine(Silicon::new(ChipRev::B2, 1));
        pc.low_power_init().unwrap();
        assert_eq!(pc.state().cpu_mode, PowerMode::LowPower);

        // Someone else raised the CPU behind the engine's back.
        let hp = pwrctrl::MCUPERFREQ.val(2) + pwrctrl::MCUPERFSTATUS.val(2);
        pc.regs_mut().poke(Reg::McuPerfReq, hp.value);
        assert_eq!(pc.settings_restore(), Err(Error::Fail));
        assert!(!pc.enabled(Peripheral::Otp));

        pc.regs_mut().poke(Reg::McuPerfReq, 0);
        assert_eq!(pc.settings_restore(), Ok(()));
    }

    #[test]
    fn settings_restore_waits_for_state_manager() {
        let mut pc = engine(Silicon::new(ChipRev::B2, 1));
        pc.low_power_init().unwrap();
        pc.regs_mut().set(timer::TMR0EN, 1);
        assert_eq!(pc.settings_restore(), Err(Error::Timeout));
    }

    #[test]
    fn settings_restore_is_a_no_op_before_managed_parts() {
        let mut pc = engine(Silicon::new(ChipRev::B1, 0));
        pc.low_power_init().unwrap();
        assert_eq!(pc.settings_restore(), Ok(()));
        assert!(!pc.enabled(Peripheral::Otp));
        assert_eq!(pc.gpu_mode_status(), GpuPowerMode::LowPower);
    }
}
