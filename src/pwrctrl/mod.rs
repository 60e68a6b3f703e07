//! Power control engine
//!
//! [`PowerControl`] owns the register file and every piece of mutable power
//! state: CPU/GPU performance modes, the factory trim snapshot, the GPU boost
//! currently applied and the postponed tempco request.
//!
//! Entry points:
//! - peripheral power: [`PowerControl::enable`], [`PowerControl::disable`], [`PowerControl::enabled`]
//! - performance modes: [`PowerControl::cpu_mode_select`], [`PowerControl::gpu_mode_select`]
//! - temperature: [`PowerControl::temperature_update`]
//! - boot and handoff: [`PowerControl::low_power_init`], [`PowerControl::settings_restore`], [`PowerControl::control`]
//! - memories: [`PowerControl::mcu_memory_config`], [`PowerControl::sram_config`]
//!
//! Register mutations run inside `critical_section::with`, delays and polls
//! run outside of it.

use embedded_hal::delay::DelayNs;

use crate::clkmgr::{ClockId, ClockManager, ClockUser};
use crate::delay::poll_until;
use crate::periph::{Peripheral, PeripheralDescriptor};
use crate::regs::{crypto, dcb, mcuctrl, otp, pwrctrl, Reg, Registers};
use crate::silicon::{Silicon, SiliconRevision};
use crate::spotmgr::{PowerEvent, PowerStateManager, TempBand};
use crate::trim::TrimSnapshot;
use crate::{Config, Error, Result};

mod init;
mod memory;
mod perf;
mod sequence;
mod temp;

pub use init::{ControlOp, Info1Calibration};
pub use memory::{
    CpdlpConfig, CpdlpMode, DtcmSize, McuMemoryConfig, NvmSelect, PowerStatus, RomMode,
    SramActive, SramConfig, SramRetain, SramSize,
};
pub use sequence::GpuBoost;
pub use temp::TempThresholds;

use sequence::Sequencer;

/// Status poll budget for a peripheral domain.
const MAX_WAIT_US: u32 = 5;
/// OTP programming can take a while to drain.
const OTP_IDLE_WAIT_US: u32 = 100_000;
const OTP_SETTLE_US: u32 = 100;
const CRYPTO_WAIT_US: u32 = 100;

/// CPU performance mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerMode {
    #[default]
    LowPower,
    HighPerformance,
}

impl PowerMode {
    /// MCUPERFREQ encoding.
    pub(crate) const fn req(self) -> u32 {
        match self {
            PowerMode::LowPower => 0,
            PowerMode::HighPerformance => 2,
        }
    }
}

/// GPU performance mode.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpuPowerMode {
    #[default]
    LowPower,
    HighPerformance,
}

impl GpuPowerMode {
    /// GFXPERFREQ encoding.
    pub(crate) const fn req(self) -> u32 {
        match self {
            GpuPowerMode::LowPower => 0,
            GpuPowerMode::HighPerformance => 3,
        }
    }
}

/// Mutable power state. Zeroed at construction, populated by
/// [`PowerControl::low_power_init`] and only changed through the engine's
/// entry points.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerEngineState {
    pub cpu_mode: PowerMode,
    pub gpu_mode: GpuPowerMode,
    /// Mode to return to on the next GFX enable.
    pub gpu_prev_mode: GpuPowerMode,
    pub rom_mode: RomMode,
    /// Captured once, `Some` means stored.
    pub trims: Option<TrimSnapshot>,
    pub gpu_boost: Option<GpuBoost>,
    /// A GPU transition is in flight, tempco requests are parked.
    pub postpone_tempco: bool,
    pub pending_tempco: Option<TempBand>,
    /// Band the references were last compensated for.
    pub tempco_band: Option<TempBand>,
    /// The regulator must stay in buck mode through deep sleep.
    pub force_buck_active: bool,
    pub info1: Option<Info1Calibration>,
}

/// The power control engine.
pub struct PowerControl<R, D, C, S> {
    regs: R,
    delay: D,
    clocks: C,
    spot: S,
    config: Config,
    silicon: Silicon,
    revision: SiliconRevision,
    state: PowerEngineState,
}

impl<R, D, C, S> PowerControl<R, D, C, S>
where
    R: Registers,
    D: DelayNs,
    C: ClockManager,
    S: PowerStateManager,
{
    /// Build the engine. The silicon revision is resolved here, once.
    pub fn new(regs: R, delay: D, clocks: C, spot: S, config: Config) -> Self {
        let silicon = config.silicon.unwrap_or_else(|| Silicon::detect(&regs));
        let revision = silicon.revision();
        debug!("pwrctrl: {} trim {} -> {}", silicon.rev, silicon.trim_version, revision);

        Self {
            regs,
            delay,
            clocks,
            spot,
            config,
            silicon,
            revision,
            state: PowerEngineState::default(),
        }
    }

    pub fn silicon(&self) -> Silicon {
        self.silicon
    }

    pub fn revision(&self) -> SiliconRevision {
        self.revision
    }

    pub fn state(&self) -> &PowerEngineState {
        &self.state
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn regs_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn clocks(&self) -> &C {
        &self.clocks
    }

    pub fn state_manager(&self) -> &S {
        &self.spot
    }

    /// Give back the parts.
    pub fn free(self) -> (R, D, C, S) {
        (self.regs, self.delay, self.clocks, self.spot)
    }

    /// Run `f` with interrupts masked.
    fn cs<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        critical_section::with(|_| f(self))
    }

    fn sequencer(&mut self) -> Sequencer<'_, R, D, S> {
        Sequencer {
            regs: &mut self.regs,
            delay: &mut self.delay,
            spot: &mut self.spot,
            state: &mut self.state,
            silicon: self.silicon,
        }
    }

    fn managed(&self) -> bool {
        self.revision == SiliconRevision::Managed
    }

    pub(crate) fn buck_active(&self) -> bool {
        self.regs.matches_all(pwrctrl::SIMOBUCKST::Active)
    }

    /// Report to the power state manager. Reporting is advisory, a refusal
    /// does not abort the transition.
    fn notify(&mut self, event: PowerEvent) {
        if let Err(e) = self.spot.update(event) {
            warn!("pwrctrl: state manager rejected {}: {}", event, e);
        }
    }

    fn wait_bits(&mut self, reg: Reg, mask: u32, set: bool, timeout_us: u32) -> Result {
        let regs = &self.regs;
        poll_until(&mut self.delay, timeout_us, || {
            let bits = regs.read(reg) & mask;
            if set {
                bits == mask
            } else {
                bits == 0
            }
        })
    }

    fn otp_powered(&self) -> bool {
        self.enabled(Peripheral::Otp)
    }

    /// Whether the peripheral's power domain reports powered.
    pub fn enabled(&self, periph: Peripheral) -> bool {
        let desc = periph.descriptor();
        self.regs.read(desc.status_reg) & desc.status_mask != 0
    }

    fn enable_bit_set(&self, desc: &PeripheralDescriptor) -> bool {
        self.regs.read(desc.enable_reg) & desc.enable_mask != 0
    }

    /// After clearing a peripheral's enable bit: true unless another member
    /// of its domain still holds the domain up.
    fn last_in_domain(&self, desc: &PeripheralDescriptor) -> bool {
        let en = self.regs.read(desc.enable_reg);
        !(en & desc.enable_domain_mask != 0 && en & desc.enable_mask == 0)
    }

    fn power_event(desc: &PeripheralDescriptor, on: bool) -> PowerEvent {
        let mask = desc.status_mask;
        if desc.enable_reg == Reg::AudSsPwrEn {
            PowerEvent::AudioPower { mask, on }
        } else {
            PowerEvent::DevicePower { mask, on }
        }
    }

    /// Power up a peripheral.
    ///
    /// Does nothing when the enable bit is already set. Crypto needs OTP to
    /// be powered. GFX runs the GPU boost sequence first.
    pub fn enable(&mut self, periph: Peripheral) -> Result {
        let desc = periph.descriptor();
        if self.enable_bit_set(desc) {
            return Ok(());
        }

        if periph == Peripheral::Crypto && !self.otp_powered() {
            warn!("pwrctrl: crypto enable refused, OTP is off");
            return Err(Error::Fail);
        }

        debug!("pwrctrl: enable {}", periph);
        if periph == Peripheral::Gfx {
            self.gfx_power_up()?;
        } else if self.managed() {
            self.notify(Self::power_event(desc, true));
        }

        self.cs(|pc| {
            pc.regs.set_bits(desc.enable_reg, desc.enable_mask);
            if periph == Peripheral::Gfx {
                pc.finish_gpu_transition();
            }
        });

        if let Err(e) = self.wait_bits(desc.status_reg, desc.status_mask, true, MAX_WAIT_US) {
            error!("pwrctrl: {} never powered up", periph);
            return Err(e);
        }

        match periph {
            Peripheral::Crypto => {
                let regs = &self.regs;
                poll_until(&mut self.delay, CRYPTO_WAIT_US, || regs.is_set(crypto::NVMISIDLE))?;
                self.clocks.request(ClockId::Hfrc, ClockUser::Crypto);
            }
            Peripheral::Otp => self.delay.delay_us(OTP_SETTLE_US),
            _ => {}
        }

        if self.enabled(periph) {
            Ok(())
        } else {
            Err(Error::Fail)
        }
    }

    /// Power down a peripheral.
    ///
    /// Only waits for the domain status to drop when this was the last
    /// enabled member of the domain.
    pub fn disable(&mut self, periph: Peripheral) -> Result {
        let desc = periph.descriptor();
        if !self.enable_bit_set(desc) {
            return Ok(());
        }

        match periph {
            Peripheral::Otp => {
                if !self.silicon.ge_b1() && self.enabled(Peripheral::Crypto) {
                    warn!("pwrctrl: OTP still needed by crypto");
                    return Err(Error::InUse);
                }
                let regs = &self.regs;
                poll_until(&mut self.delay, OTP_IDLE_WAIT_US, || {
                    !regs.is_set(otp::PTMSTAT_BUSY)
                })?;
            }
            Peripheral::Debug => self.cs(|pc| {
                pc.regs.clear_bits(Reg::DcbDemcr, dcb::TRCENA::SET.value);
                pc.regs.set(mcuctrl::DBGTPIUTRACEENABLE, 0);
                pc.regs.set(mcuctrl::DBGTPIUCLKSEL, 0);
            }),
            _ => {}
        }

        debug!("pwrctrl: disable {}", periph);
        if periph == Peripheral::Gfx {
            self.gfx_power_down()?;
        } else {
            self.cs(|pc| pc.regs.clear_bits(desc.enable_reg, desc.enable_mask));
        }

        if !self.last_in_domain(desc) {
            return Ok(());
        }

        if let Err(e) = self.wait_bits(desc.status_reg, desc.status_mask, false, MAX_WAIT_US) {
            error!("pwrctrl: {} domain never powered down", periph);
            return Err(e);
        }

        match periph {
            Peripheral::Crypto => self.clocks.release(ClockId::Hfrc, ClockUser::Crypto),
            Peripheral::Gfx => {
                if self.state.gpu_mode == GpuPowerMode::HighPerformance {
                    self.gpu_mode_select(GpuPowerMode::LowPower)?;
                    self.state.gpu_prev_mode = GpuPowerMode::HighPerformance;
                } else {
                    self.state.gpu_prev_mode = GpuPowerMode::LowPower;
                }
                if self.managed() {
                    self.gpu_off()?;
                }
            }
            _ => {
                if self.managed() {
                    self.notify(Self::power_event(desc, false));
                }
            }
        }

        Ok(())
    }

    fn gfx_power_up(&mut self) -> Result {
        if self.revision == SiliconRevision::Transitional {
            self.cs(|pc| pc.state.postpone_tempco = true);
        }

        if self.state.gpu_prev_mode == GpuPowerMode::HighPerformance {
            if let Err(e) = self.gpu_mode_select(GpuPowerMode::HighPerformance) {
                warn!("pwrctrl: GPU stays in LP: {}", e);
            }
        } else if self.revision == SiliconRevision::Legacy {
            self.cs(|pc| {
                sequence::legacy_ton_update(&mut pc.regs, &pc.state, Some(GpuPowerMode::LowPower))
            });
        }

        self.gpu_on()
    }

    fn gfx_power_down(&mut self) -> Result {
        let desc = Peripheral::Gfx.descriptor();
        match self.revision {
            SiliconRevision::Legacy => {
                self.cs(|pc| pc.regs.clear_bits(desc.enable_reg, desc.enable_mask));
                self.gpu_off()?;
                self.cs(|pc| sequence::legacy_ton_update(&mut pc.regs, &pc.state, None));
            }
            SiliconRevision::Transitional => {
                self.cs(|pc| {
                    pc.state.postpone_tempco = true;
                    pc.regs.clear_bits(desc.enable_reg, desc.enable_mask);
                });
                let res = self.gpu_off();
                self.cs(|pc| pc.finish_gpu_transition());
                res?;
            }
            // GPU off is reported once the domain is down.
            SiliconRevision::Managed => {
                self.cs(|pc| pc.regs.clear_bits(desc.enable_reg, desc.enable_mask));
            }
        }
        Ok(())
    }

    /// End of a GPU transition, called with interrupts masked.
    fn finish_gpu_transition(&mut self) {
        if let Some(range) = self.state.pending_tempco.take() {
            debug!("pwrctrl: applying postponed tempco {}", range);
            self.apply_tempco(range);
        }
        self.state.postpone_tempco = false;
    }

    fn gpu_on(&mut self) -> Result {
        self.clocks.request(ClockId::Hfrc, ClockUser::Gfx);
        if self.state.gpu_mode == GpuPowerMode::HighPerformance {
            self.clocks.request(ClockId::Hfrc2, ClockUser::Gfx);
        }
        let revision = self.revision;
        sequence::gpu_on(revision, &mut self.sequencer())
    }

    fn gpu_off(&mut self) -> Result {
        let revision = self.revision;
        let res = sequence::gpu_off(revision, &mut self.sequencer());
        self.clocks.release_all(ClockUser::Gfx);
        res
    }

    /// Tempco for the resolved revision, interrupts masked.
    fn apply_tempco(&mut self, range: TempBand) {
        let revision = self.revision;
        sequence::tempco(revision, &mut self.sequencer(), range);
    }

    /// Apply now or park until the running GPU transition completes.
    fn request_tempco(&mut self, range: TempBand) {
        self.cs(|pc| {
            if pc.state.postpone_tempco {
                if let Some(prev) = pc.state.pending_tempco.replace(range) {
                    warn!("pwrctrl: postponed tempco {} replaced by {}", prev, range);
                }
            } else {
                pc.apply_tempco(range);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clkmgr::ClockLedger;
    use crate::periph::HCPB_DOMAIN;
    use crate::silicon::ChipRev;
    use crate::testing::{CountingDelay, EventLog, SimRegisters};

    pub(crate) type TestEngine = PowerControl<SimRegisters, CountingDelay, ClockLedger, EventLog>;

    pub(crate) fn engine(silicon: Silicon) -> TestEngine {
        let config = Config {
            silicon: Some(silicon),
            ..Config::default()
        };
        PowerControl::new(
            SimRegisters::new(),
            CountingDelay::default(),
            ClockLedger::new(),
            EventLog::default(),
            config,
        )
    }

    fn b0_legacy() -> Silicon {
        Silicon::new(ChipRev::B0, 1)
    }

    #[test]
    fn enable_is_idempotent() {
        let mut pc = engine(b0_legacy());
        assert_eq!(pc.enable(Peripheral::Iom0), Ok(()));
        let after_first = pc.regs().snapshot();
        let writes = pc.regs().writes.len();

        assert_eq!(pc.enable(Peripheral::Iom0), Ok(()));
        assert_eq!(pc.regs().snapshot(), after_first);
        assert_eq!(pc.regs().writes.len(), writes);
    }

    #[test]
    fn disable_when_off_is_a_no_op() {
        let mut pc = engine(b0_legacy());
        assert_eq!(pc.disable(Peripheral::Uart1), Ok(()));
        assert!(pc.regs().writes.is_empty());
    }

    #[test]
    fn shared_domain_waits_only_for_last_member() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::Iom0).unwrap();
        pc.enable(Peripheral::Iom1).unwrap();

        // Pretend the domain can never drop: only the last member polls.
        pc.regs_mut().freeze(Reg::DevPwrStatus, HCPB_DOMAIN);
        let before = pc.delay.elapsed_us;
        assert_eq!(pc.disable(Peripheral::Iom0), Ok(()));
        assert_eq!(pc.delay.elapsed_us, before);
        assert!(pc.enabled(Peripheral::Iom1));

        assert_eq!(pc.disable(Peripheral::Iom1), Err(Error::Timeout));
        assert_eq!(pc.delay.elapsed_us, before + MAX_WAIT_US as u64);
    }

    #[test]
    fn shared_domain_drops_after_last_member() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::Iom0).unwrap();
        pc.enable(Peripheral::Iom1).unwrap();

        pc.disable(Peripheral::Iom0).unwrap();
        assert!(pc.enabled(Peripheral::Iom1));
        pc.disable(Peripheral::Iom1).unwrap();
        assert!(!pc.enabled(Peripheral::Iom1));
        assert_eq!(pc.regs().read(Reg::DevPwrStatus) & HCPB_DOMAIN, 0);
    }

    #[test]
    fn enable_times_out_when_status_never_rises() {
        let mut pc = engine(b0_legacy());
        pc.regs_mut().freeze(Reg::DevPwrStatus, 1 << Peripheral::Adc as u32);

        assert_eq!(pc.enable(Peripheral::Adc), Err(Error::Timeout));
        assert_eq!(pc.delay.elapsed_us, MAX_WAIT_US as u64);
    }

    #[test]
    fn crypto_needs_otp() {
        let mut pc = engine(b0_legacy());
        let before = pc.regs().snapshot();

        assert_eq!(pc.enable(Peripheral::Crypto), Err(Error::Fail));
        assert_eq!(pc.regs().snapshot(), before);
    }

    #[test]
    fn otp_held_while_crypto_is_on() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::Otp).unwrap();
        pc.enable(Peripheral::Crypto).unwrap();
        let before = pc.regs().snapshot();

        assert_eq!(pc.disable(Peripheral::Otp), Err(Error::InUse));
        assert_eq!(pc.regs().snapshot(), before);
    }

    #[test]
    fn otp_release_allowed_on_b1() {
        let mut pc = engine(Silicon::new(ChipRev::B1, 0));
        pc.enable(Peripheral::Otp).unwrap();
        pc.enable(Peripheral::Crypto).unwrap();

        assert_eq!(pc.disable(Peripheral::Otp), Ok(()));
    }

    #[test]
    fn otp_disable_waits_for_programming() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::Otp).unwrap();
        pc.regs_mut().poke(Reg::OtpPtmStat, otp::PTMSTAT_BUSY::SET.value);

        assert_eq!(pc.disable(Peripheral::Otp), Err(Error::Timeout));
        // Power left on.
        assert!(pc.enabled(Peripheral::Otp));
    }

    #[test]
    fn crypto_holds_hfrc_while_on() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::Otp).unwrap();
        pc.enable(Peripheral::Crypto).unwrap();
        assert!(pc.clocks().holds(ClockId::Hfrc, ClockUser::Crypto));

        pc.disable(Peripheral::Crypto).unwrap();
        assert!(!pc.clocks().is_requested(ClockId::Hfrc));
    }

    #[test]
    fn crypto_enable_waits_for_nvm_idle() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::Otp).unwrap();
        pc.regs_mut().poke(Reg::CryptoNvmIsIdle, 0);

        assert_eq!(pc.enable(Peripheral::Crypto), Err(Error::Timeout));
        assert!(!pc.clocks().is_requested(ClockId::Hfrc));
    }

    #[test]
    fn debug_trace_cleared_before_power_removed() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::Debug).unwrap();
        pc.regs_mut().poke(Reg::DcbDemcr, dcb::TRCENA::SET.value);
        pc.regs_mut().writes.clear();

        pc.disable(Peripheral::Debug).unwrap();
        let demcr = pc.regs().writes.iter().position(|(r, _)| *r == Reg::DcbDemcr);
        let devpwr = pc.regs().writes.iter().position(|(r, _)| *r == Reg::DevPwrEn);
        assert!(demcr.unwrap() < devpwr.unwrap());
        assert!(!pc.regs().is_set(dcb::TRCENA));
    }

    #[test]
    fn audio_peripherals_use_audss_registers() {
        let mut pc = engine(b0_legacy());
        pc.enable(Peripheral::I2s0).unwrap();
        pc.enable(Peripheral::I2s1).unwrap();
        assert_eq!(pc.regs().read(Reg::AudSsPwrEn), (1 << 6) | (1 << 7));
        assert_eq!(pc.regs().read(Reg::DevPwrEn), 0);

        pc.disable(Peripheral::I2s0).unwrap();
        assert!(pc.enabled(Peripheral::I2s1));
    }

    #[test]
    fn managed_parts_report_device_power() {
        let mut pc = engine(Silicon::new(ChipRev::B2, 1));
        pc.enable(Peripheral::Uart0).unwrap();
        pc.disable(Peripheral::Uart0).unwrap();

        let mask = Peripheral::Uart0.descriptor().status_mask;
        assert_eq!(
            pc.state_manager().events,
            [
                PowerEvent::DevicePower { mask, on: true },
                PowerEvent::DevicePower { mask, on: false },
            ]
        );
    }

    #[test]
    fn domain_membership_follows_enable_layout() {
        let mut pc = engine(b0_legacy());
        // Status reports the domain on a bit no enable uses.
        let desc = PeripheralDescriptor {
            enable_reg: Reg::DevPwrEn,
            enable_mask: 1 << 3,
            enable_domain_mask: (1 << 3) | (1 << 4),
            status_reg: Reg::DevPwrStatus,
            status_mask: 1 << 29,
        };

        pc.regs_mut().poke(Reg::DevPwrEn, 1 << 4);
        assert!(!pc.last_in_domain(&desc));

        pc.regs_mut().poke(Reg::DevPwrEn, (1 << 29) | (1 << 5));
        assert!(pc.last_in_domain(&desc));
    }
}
