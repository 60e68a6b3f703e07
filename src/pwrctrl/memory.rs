//! MCU memories, shared SRAM, system PLL and cache idle states.

use embedded_hal::delay::DelayNs;

use super::{PowerControl, MAX_WAIT_US};
use crate::clkmgr::ClockManager;
use crate::delay::poll_until;
use crate::regs::{mcuctrl, pwrctrl, pwrmodctl, scb, Reg, Registers};
use crate::silicon::Silicon;
use crate::spotmgr::{PowerEvent, PowerStateManager};
use crate::{Error, Result};

const SYSPLL_ISO_SETTLE_US: u32 = 1;
const SYSPLL_SETTLE_US: u32 = 5;

/// ROM power policy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RomMode {
    /// ROM stays powered.
    #[default]
    AlwaysOn,
    /// ROM is powered on demand through [`PowerControl::rom_enable`].
    Auto,
}

/// ITCM/DTCM banks to power.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DtcmSize {
    Itcm32kDtcm128k,
    Itcm128kDtcm256k,
    #[default]
    Itcm256kDtcm512k,
}

impl DtcmSize {
    const fn bits(self) -> u32 {
        match self {
            DtcmSize::Itcm32kDtcm128k => 0b001,
            DtcmSize::Itcm128kDtcm256k => 0b011,
            DtcmSize::Itcm256kDtcm512k => 0b111,
        }
    }

    fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            0b001 => Ok(DtcmSize::Itcm32kDtcm128k),
            0b011 => Ok(DtcmSize::Itcm128kDtcm256k),
            0b111 => Ok(DtcmSize::Itcm256kDtcm512k),
            _ => Err(Error::OutOfRange),
        }
    }
}

/// NVM banks to power.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NvmSelect {
    Nvm0,
    #[default]
    Nvm0AndNvm1,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct McuMemoryConfig {
    pub rom_mode: RomMode,
    pub dtcm: DtcmSize,
    /// Keep TCM contents through deep sleep.
    pub retain_tcm: bool,
    pub nvm: NvmSelect,
    /// Keep NVM powered through deep sleep.
    pub keep_nvm_on_deep_sleep: bool,
}

impl Default for McuMemoryConfig {
    fn default() -> Self {
        Self {
            rom_mode: RomMode::AlwaysOn,
            dtcm: DtcmSize::Itcm256kDtcm512k,
            retain_tcm: true,
            nvm: NvmSelect::Nvm0AndNvm1,
            keep_nvm_on_deep_sleep: false,
        }
    }
}

impl McuMemoryConfig {
    /// Boot default for `silicon`. B1 and later let the ROM power down
    /// once nothing uses it.
    pub fn for_silicon(silicon: Silicon) -> Self {
        let rom_mode = if silicon.ge_b1() {
            RomMode::Auto
        } else {
            RomMode::AlwaysOn
        };
        Self {
            rom_mode,
            ..Self::default()
        }
    }
}

/// Shared SRAM banks, one bit per megabyte group.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SramSize {
    None,
    Sram1M,
    Sram2M,
    Sram3M,
}

impl SramSize {
    const fn bits(self) -> u32 {
        match self {
            SramSize::None => 0b000,
            SramSize::Sram1M => 0b001,
            SramSize::Sram2M => 0b011,
            SramSize::Sram3M => 0b111,
        }
    }

    fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            0b000 => Ok(SramSize::None),
            0b001 => Ok(SramSize::Sram1M),
            0b011 => Ok(SramSize::Sram2M),
            0b111 => Ok(SramSize::Sram3M),
            _ => Err(Error::OutOfRange),
        }
    }
}

/// Shared SRAM groups a bus master keeps active.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SramActive {
    None,
    Group1,
    Group2,
    Group1And2,
    Group3,
    Group1And3,
    Group2And3,
    All,
}

impl SramActive {
    const fn bits(self) -> u32 {
        self as u32
    }

    fn from_bits(bits: u32) -> Self {
        match bits & 0b111 {
            0 => SramActive::None,
            1 => SramActive::Group1,
            2 => SramActive::Group2,
            3 => SramActive::Group1And2,
            4 => SramActive::Group3,
            5 => SramActive::Group1And3,
            6 => SramActive::Group2And3,
            _ => SramActive::All,
        }
    }
}

/// Shared SRAM kept through deep sleep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SramRetain {
    None,
    Sram1M,
    Sram2M,
    Sram3M,
}

impl SramRetain {
    /// Groups powered down in deep sleep.
    const fn pwdslp(self) -> u32 {
        match self {
            SramRetain::None => 0b111,
            SramRetain::Sram1M => 0b110,
            SramRetain::Sram2M => 0b100,
            SramRetain::Sram3M => 0b000,
        }
    }

    fn from_pwdslp(bits: u32) -> Result<Self> {
        match bits {
            0b111 => Ok(SramRetain::None),
            0b110 => Ok(SramRetain::Sram1M),
            0b100 => Ok(SramRetain::Sram2M),
            0b000 => Ok(SramRetain::Sram3M),
            _ => Err(Error::OutOfRange),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SramConfig {
    pub size: SramSize,
    pub active_mcu: SramActive,
    pub active_gfx: SramActive,
    pub active_disp: SramActive,
    pub retain: SramRetain,
}

impl Default for SramConfig {
    fn default() -> Self {
        Self {
            size: SramSize::Sram3M,
            active_mcu: SramActive::None,
            active_gfx: SramActive::None,
            active_disp: SramActive::None,
            retain: SramRetain::Sram3M,
        }
    }
}

/// Raw power status words.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerStatus {
    pub devices: u32,
    pub audio: u32,
    pub memory: u32,
    pub system: u32,
    pub sram: u32,
    pub regulator: u32,
    pub adc: u32,
    pub audio_adc: u32,
}

/// Cache/retention idle state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CpdlpMode {
    #[default]
    On,
    Retain,
    Off,
}

impl CpdlpMode {
    const fn bits(self) -> u32 {
        match self {
            CpdlpMode::On => 0,
            CpdlpMode::Retain => 1,
            CpdlpMode::Off => 3,
        }
    }

    fn from_bits(bits: u32) -> Result<Self> {
        match bits {
            0 => Ok(CpdlpMode::On),
            1 => Ok(CpdlpMode::Retain),
            3 => Ok(CpdlpMode::Off),
            _ => Err(Error::OutOfRange),
        }
    }
}

/// Idle states of the RAM, execution and cache logic partitions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CpdlpConfig {
    pub rlp: CpdlpMode,
    pub elp: CpdlpMode,
    pub clp: CpdlpMode,
}

impl<R, D, C, S> PowerControl<R, D, C, S>
where
    R: Registers,
    D: DelayNs,
    C: ClockManager,
    S: PowerStateManager,
{
    fn wait_status(&mut self, reg: Reg, mask: u32, expected: u32) -> Result {
        let regs = &self.regs;
        poll_until(&mut self.delay, MAX_WAIT_US, || regs.read(reg) & mask == expected)
    }

    /// Power and retention of TCM, NVM and ROM.
    pub fn mcu_memory_config(&mut self, config: &McuMemoryConfig) -> Result {
        let current = self.regs.local::<pwrctrl::MemPwrEn::Register>();
        let rom_on = match config.rom_mode {
            RomMode::AlwaysOn => true,
            RomMode::Auto => current.is_set(pwrctrl::PWRENROM),
        };
        let nvm1 = config.nvm == NvmSelect::Nvm0AndNvm1;
        let enable = pwrctrl::PWRENTCM.val(config.dtcm.bits())
            + pwrctrl::PWRENNVM0::SET
            + pwrctrl::PWRENNVM1.val(nvm1 as u32)
            + pwrctrl::PWRENROM.val(rom_on as u32);

        // Bringing up NVM1 next to NVM0 needs the AXI clock held.
        let force_axi = current.is_set(pwrctrl::PWRENNVM0)
            && !current.is_set(pwrctrl::PWRENNVM1)
            && nvm1;
        if force_axi {
            self.cs(|pc| pc.regs.modify_fields(mcuctrl::FRCAXICLKEN::SET));
        }

        if self.managed() {
            self.notify(PowerEvent::MemoryPower(enable.value));
        }

        self.cs(|pc| pc.regs.modify_fields(enable));
        // Status bits sit where the enables are.
        let res = self.wait_status(Reg::MemPwrStatus, enable.mask(), enable.value);

        if force_axi {
            self.cs(|pc| pc.regs.modify_fields(mcuctrl::FRCAXICLKEN::CLEAR));
        }
        res?;

        if self.regs.read(Reg::MemPwrStatus) & enable.mask() != enable.value {
            return Err(Error::Fail);
        }

        let tcm_pwdslp = if config.retain_tcm {
            0
        } else {
            pwrctrl::TCMPWDSLP.mask
        };
        self.cs(|pc| {
            pc.regs.modify_fields(
                pwrctrl::TCMPWDSLP.val(tcm_pwdslp)
                    + pwrctrl::NVMPWDSLP.val(!config.keep_nvm_on_deep_sleep as u32),
            );
            pc.state.rom_mode = config.rom_mode;
        });
        Ok(())
    }

    pub fn mcu_memory_config_get(&self) -> Result<McuMemoryConfig> {
        let dtcm = DtcmSize::from_bits(self.regs.get(pwrctrl::PWRENTCM))?;
        let nvm = if self.regs.is_set(pwrctrl::PWRENNVM1) {
            NvmSelect::Nvm0AndNvm1
        } else {
            NvmSelect::Nvm0
        };
        Ok(McuMemoryConfig {
            rom_mode: self.state.rom_mode,
            dtcm,
            retain_tcm: self.regs.get(pwrctrl::TCMPWDSLP) == 0,
            nvm,
            keep_nvm_on_deep_sleep: !self.regs.is_set(pwrctrl::NVMPWDSLP),
        })
    }

    fn rom_power(&mut self, on: bool) -> Result {
        if self.state.rom_mode != RomMode::Auto {
            return Ok(());
        }
        self.cs(|pc| pc.regs.set(pwrctrl::PWRENROM, on as u32));
        let mask = pwrctrl::PWRSTROM::SET.value;
        self.wait_status(Reg::MemPwrStatus, mask, if on { mask } else { 0 })
    }

    /// Power the ROM. Only acts in [`RomMode::Auto`].
    pub fn rom_enable(&mut self) -> Result {
        self.rom_power(true)
    }

    /// Power down the ROM. Only acts in [`RomMode::Auto`].
    pub fn rom_disable(&mut self) -> Result {
        self.rom_power(false)
    }

    /// Shared SRAM power, per-master activity and retention.
    pub fn sram_config(&mut self, config: &SramConfig) -> Result {
        let enable = config.size.bits();
        if self.managed() {
            self.notify(PowerEvent::SsramPower(enable));
        }

        self.cs(|pc| pc.regs.set(pwrctrl::PWRENSSRAM, enable));
        let status = pwrctrl::SSRAMPWRST.val(enable);
        self.wait_status(Reg::SsramPwrSt, status.mask(), status.value)?;
        if self.regs.get(pwrctrl::SSRAMPWRST) != enable {
            return Err(Error::Fail);
        }

        self.cs(|pc| {
            pc.regs.modify_fields(
                pwrctrl::SSRAMACTMCU.val(config.active_mcu.bits())
                    + pwrctrl::SSRAMACTGFX.val(config.active_gfx.bits())
                    + pwrctrl::SSRAMACTDISP.val(config.active_disp.bits())
                    + pwrctrl::SSRAMPWDSLP.val(config.retain.pwdslp()),
            );
            pc.regs.modify_fields(
                pwrctrl::MMSOVRSSRAMRETGFX::CLEAR + pwrctrl::MMSOVRSSRAMRETDISP::CLEAR,
            );
        });
        Ok(())
    }

    pub fn sram_config_get(&self) -> Result<SramConfig> {
        Ok(SramConfig {
            size: SramSize::from_bits(self.regs.get(pwrctrl::PWRENSSRAM))?,
            active_mcu: SramActive::from_bits(self.regs.get(pwrctrl::SSRAMACTMCU)),
            active_gfx: SramActive::from_bits(self.regs.get(pwrctrl::SSRAMACTGFX)),
            active_disp: SramActive::from_bits(self.regs.get(pwrctrl::SSRAMACTDISP)),
            retain: SramRetain::from_pwdslp(self.regs.get(pwrctrl::SSRAMPWDSLP))?,
        })
    }

    pub fn status_get(&self) -> PowerStatus {
        let r = &self.regs;
        PowerStatus {
            devices: r.read(Reg::DevPwrStatus),
            audio: r.read(Reg::AudSsPwrStatus),
            memory: r.read(Reg::MemPwrStatus),
            system: r.read(Reg::SysPwrStatus),
            sram: r.read(Reg::SsramPwrSt),
            regulator: r.read(Reg::VrStatus),
            adc: r.read(Reg::AdcStatus),
            audio_adc: r.read(Reg::AudAdcStatus),
        }
    }

    pub fn syspll_enable(&mut self) {
        if self.silicon.ge_b1() {
            self.cs(|pc| pc.regs.set(mcuctrl::D2A_SYSPLL_ISO, 0));
            self.delay.delay_us(SYSPLL_ISO_SETTLE_US);
        }
        self.cs(|pc| {
            pc.regs
                .modify_fields(mcuctrl::SYSPLLVDDFPDNB::SET + mcuctrl::SYSPLLVDDHPDNB::SET)
        });
        self.delay.delay_us(SYSPLL_SETTLE_US);
    }

    pub fn syspll_disable(&mut self) {
        self.cs(|pc| {
            pc.regs
                .modify_fields(mcuctrl::SYSPLLVDDFPDNB::CLEAR + mcuctrl::SYSPLLVDDHPDNB::CLEAR)
        });
        if self.silicon.ge_b1() {
            self.delay.delay_us(SYSPLL_ISO_SETTLE_US);
            self.cs(|pc| pc.regs.set(mcuctrl::D2A_SYSPLL_ISO, 1));
        }
    }

    pub fn syspll_enabled(&self) -> bool {
        self.regs.is_set(mcuctrl::SYSPLLVDDFPDNB) && self.regs.is_set(mcuctrl::SYSPLLVDDHPDNB)
    }

    /// Program the cache/retention idle states.
    ///
    /// Fails when a cache is enabled and its RAM partition would be turned
    /// off.
    pub fn cpdlp_config(&mut self, config: &CpdlpConfig) -> Result {
        let caches_on = self.regs.is_set(scb::CCR_IC) || self.regs.is_set(scb::CCR_DC);
        if caches_on && config.rlp == CpdlpMode::Off {
            warn!("pwrctrl: RLP off with caches enabled");
            return Err(Error::Fail);
        }

        self.cs(|pc| {
            pc.regs.modify_fields(
                pwrmodctl::CPDLP_RLP.val(config.rlp.bits())
                    + pwrmodctl::CPDLP_ELP.val(config.elp.bits())
                    + pwrmodctl::CPDLP_CLP.val(config.clp.bits()),
            )
        });
        Ok(())
    }

    pub fn cpdlp_get(&self) -> Result<CpdlpConfig> {
        Ok(CpdlpConfig {
            rlp: CpdlpMode::from_bits(self.regs.get(pwrmodctl::CPDLP_RLP))?,
            elp: CpdlpMode::from_bits(self.regs.get(pwrmodctl::CPDLP_ELP))?,
            clp: CpdlpMode::from_bits(self.regs.get(pwrmodctl::CPDLP_CLP))?,
        })
    }
}
