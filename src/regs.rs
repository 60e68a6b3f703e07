//! Register file model
//!
//! The power engine never touches raw pointers directly. Every access goes
//! through [`Registers`], so the same sequencing code runs against the real
//! memory mapped blocks ([`Mmio`]) and against a simulated register file in
//! host tests.
//!
//! Blocks covered:
//! - PWRCTRL (enables, status, performance requests, retention)
//! - MCUCTRL (regulator trims, overrides, chip revision)
//! - CLKGEN, CRYPTO, OTP, RSTGEN, TIMER
//! - DCB/SCB (Cortex-M debug and cache control)
//! - PWRMODCTL (cache/retention idle states)
//! - INFO1 (factory calibration words)
//!
//! Field layouts are declared with `register_bitfields!`, one module per
//! block, each register named after its [`Reg`]. The fields are re-exported
//! at block level, so `mcuctrl::CORELDOACTIVETRIM` is a
//! `Field<u32, mcuctrl::LdoReg1::Register>`. Positions follow a compact
//! model of the blocks, the board supplies the block base addresses through
//! [`AddressMap`].

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};

use cortex_m::peripheral::{DCB, SCB};
use tock_registers::fields::{Field, FieldValue};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::{ReadOnly, ReadWrite};
use tock_registers::{register_bitfields, register_structs, LocalRegisterCopy, RegisterLongName};

/// Identity of every register the power engine reads or writes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Reg {
    // PWRCTRL
    McuPerfReq,
    DevPwrEn,
    DevPwrStatus,
    AudSsPwrEn,
    AudSsPwrStatus,
    MemPwrEn,
    MemPwrStatus,
    MemRetCfg,
    SysPwrStatus,
    SsramPwrEn,
    SsramPwrSt,
    SsramRetCfg,
    MmsOverride,
    GfxPerfReq,
    GfxPwrSwSel,
    PwrVrCtrl,
    VrStatus,
    AdcStatus,
    AudAdcStatus,
    TonCntrCtrl,
    LpOvrHystCnt,
    LpOvrThreshVdds,
    LpOvrThreshVddf,
    LpOvrThreshVddc,
    LpOvrThreshVddclv,
    MramExtCtrl,

    // MCUCTRL
    ChipRev,
    ShadowValid,
    McuVrCtrl,
    SimoBuck0,
    SimoBuck2,
    SimoBuck4,
    SimoBuck6,
    SimoBuck7,
    SimoBuck14,
    SimoBuck15,
    LdoReg1,
    LdoReg2,
    VrefGen2,
    VrefGen4,
    D2aSpare,
    PwrSw0,
    PwrSw1,
    XtalCtrl,
    XtalGenCtrl,
    DbgCtrl,
    PllCtl0,
    WicControl,
    ForceAxiClkEn,
    AudAdcPwrDly,
    MramCryptoPwrCtrl,

    // CLKGEN
    ClkgenMisc,
    ClockEnStat,
    ClkCtrl,

    // CRYPTO
    CryptoNvmIsIdle,
    CryptoHostCcIsIdle,
    CryptoHostPowerDown,

    // OTP
    OtpPtmStat,

    // RSTGEN
    RstgenStat,

    // Cortex-M system blocks
    DcbDemcr,
    ScbCcr,

    // PWRMODCTL
    CpdlpState,

    // TIMER
    TimerCtrl0,

    /// INFO1 calibration word, indexed in words from the start of INFO1.
    Info1(u16),
}

/// Ties a bitfield register declaration to the [`Reg`] it lives in.
pub trait RegisterId: RegisterLongName {
    const REG: Reg;
}

/// Access to the register file.
///
/// Backends only move whole words. Field access goes through a
/// [`LocalRegisterCopy`] of the register.
pub trait Registers {
    fn read(&self, reg: Reg) -> u32;
    fn write(&mut self, reg: Reg, value: u32);

    /// Read-modify-write with a raw mask, for the table driven enables.
    fn modify(&mut self, reg: Reg, f: impl FnOnce(u32) -> u32) {
        let value = self.read(reg);
        self.write(reg, f(value));
    }

    fn set_bits(&mut self, reg: Reg, mask: u32) {
        self.modify(reg, |v| v | mask);
    }

    fn clear_bits(&mut self, reg: Reg, mask: u32) {
        self.modify(reg, |v| v & !mask);
    }

    fn local<R: RegisterId>(&self) -> LocalRegisterCopy<u32, R> {
        LocalRegisterCopy::new(self.read(R::REG))
    }

    fn get<R: RegisterId>(&self, field: Field<u32, R>) -> u32 {
        self.local::<R>().read(field)
    }

    fn is_set<R: RegisterId>(&self, field: Field<u32, R>) -> bool {
        self.local::<R>().is_set(field)
    }

    fn matches_all<R: RegisterId>(&self, fields: FieldValue<u32, R>) -> bool {
        self.local::<R>().matches_all(fields)
    }

    /// Update the given fields, leave the rest of the register alone.
    fn modify_fields<R: RegisterId>(&mut self, fields: FieldValue<u32, R>) {
        let mut copy = self.local::<R>();
        copy.modify(fields);
        self.write(R::REG, copy.get());
    }

    /// Write the whole register, fields not named read back as zero.
    fn write_fields<R: RegisterId>(&mut self, fields: FieldValue<u32, R>) {
        self.write(R::REG, fields.value);
    }

    /// `value` truncated to the field width.
    fn set<R: RegisterId>(&mut self, field: Field<u32, R>, value: u32) {
        self.modify_fields(field.val(value));
    }
}

impl<T: Registers + ?Sized> Registers for &mut T {
    fn read(&self, reg: Reg) -> u32 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Reg, value: u32) {
        (**self).write(reg, value)
    }
}

pub mod pwrctrl {
    use super::*;

    register_bitfields![u32,
        pub McuPerfReq [
            MCUPERFREQ OFFSET(0) NUMBITS(2) [],
            MCUPERFACK OFFSET(2) NUMBITS(1) [],
            MCUPERFSTATUS OFFSET(3) NUMBITS(2) []
        ],
        pub MemPwrEn [
            PWRENTCM OFFSET(0) NUMBITS(3) [],
            PWRENNVM0 OFFSET(4) NUMBITS(1) [],
            PWRENNVM1 OFFSET(5) NUMBITS(1) [],
            PWRENROM OFFSET(6) NUMBITS(1) []
        ],
        pub MemPwrStatus [
            PWRSTTCM OFFSET(0) NUMBITS(3) [],
            PWRSTNVM0 OFFSET(4) NUMBITS(1) [],
            PWRSTNVM1 OFFSET(5) NUMBITS(1) [],
            PWRSTROM OFFSET(6) NUMBITS(1) []
        ],
        pub MemRetCfg [
            TCMPWDSLP OFFSET(0) NUMBITS(3) [],
            NVMPWDSLP OFFSET(4) NUMBITS(1) []
        ],
        pub SsramPwrEn [
            PWRENSSRAM OFFSET(0) NUMBITS(3) []
        ],
        pub SsramPwrSt [
            SSRAMPWRST OFFSET(0) NUMBITS(3) []
        ],
        pub SsramRetCfg [
            SSRAMPWDSLP OFFSET(0) NUMBITS(3) [],
            SSRAMACTMCU OFFSET(4) NUMBITS(3) [],
            SSRAMACTGFX OFFSET(8) NUMBITS(3) [],
            SSRAMACTDISP OFFSET(12) NUMBITS(3) []
        ],
        pub MmsOverride [
            MMSOVRSSRAMRETGFX OFFSET(0) NUMBITS(1) [],
            MMSOVRSSRAMRETDISP OFFSET(1) NUMBITS(1) []
        ],
        pub GfxPerfReq [
            GFXPERFREQ OFFSET(0) NUMBITS(3) []
        ],
        pub GfxPwrSwSel [
            GFXVDDSEL OFFSET(0) NUMBITS(1) []
        ],
        pub PwrVrCtrl [
            SIMOBUCKEN OFFSET(0) NUMBITS(1) []
        ],
        pub VrStatus [
            SIMOBUCKST OFFSET(0) NUMBITS(2) [
                Off = 0,
                Active = 2
            ]
        ],
        pub TonCntrCtrl [
            TONCLKDIV OFFSET(0) NUMBITS(2) [],
            TONFCNT OFFSET(4) NUMBITS(16) [],
            LPMODESWOVR OFFSET(20) NUMBITS(1) [],
            ENABLELPOVR OFFSET(21) NUMBITS(1) []
        ],
        pub LpOvrHystCnt [
            LPOVRHYSTCNT OFFSET(0) NUMBITS(8) []
        ],
        pub LpOvrThreshVdds [
            LPOVRTHRESHVDDS OFFSET(0) NUMBITS(12) []
        ],
        pub LpOvrThreshVddf [
            LPOVRTHRESHVDDF OFFSET(0) NUMBITS(12) []
        ],
        pub LpOvrThreshVddc [
            LPOVRTHRESHVDDC OFFSET(0) NUMBITS(12) []
        ],
        pub LpOvrThreshVddclv [
            LPOVRTHRESHVDDCLV OFFSET(0) NUMBITS(12) []
        ],
        pub MramExtCtrl [
            MRAMAUTOWAKEUPCTRL OFFSET(0) NUMBITS(2) []
        ]
    ];

    pub use GfxPerfReq::GFXPERFREQ;
    pub use GfxPwrSwSel::GFXVDDSEL;
    pub use LpOvrHystCnt::LPOVRHYSTCNT;
    pub use LpOvrThreshVddc::LPOVRTHRESHVDDC;
    pub use LpOvrThreshVddclv::LPOVRTHRESHVDDCLV;
    pub use LpOvrThreshVddf::LPOVRTHRESHVDDF;
    pub use LpOvrThreshVdds::LPOVRTHRESHVDDS;
    pub use McuPerfReq::{MCUPERFACK, MCUPERFREQ, MCUPERFSTATUS};
    pub use MemPwrEn::{PWRENNVM0, PWRENNVM1, PWRENROM, PWRENTCM};
    pub use MemPwrStatus::{PWRSTNVM0, PWRSTNVM1, PWRSTROM, PWRSTTCM};
    pub use MemRetCfg::{NVMPWDSLP, TCMPWDSLP};
    pub use MmsOverride::{MMSOVRSSRAMRETDISP, MMSOVRSSRAMRETGFX};
    pub use MramExtCtrl::MRAMAUTOWAKEUPCTRL;
    pub use PwrVrCtrl::SIMOBUCKEN;
    pub use SsramPwrEn::PWRENSSRAM;
    pub use SsramPwrSt::SSRAMPWRST;
    pub use SsramRetCfg::{SSRAMACTDISP, SSRAMACTGFX, SSRAMACTMCU, SSRAMPWDSLP};
    pub use TonCntrCtrl::{ENABLELPOVR, LPMODESWOVR, TONCLKDIV, TONFCNT};
    pub use VrStatus::SIMOBUCKST;
}

pub mod mcuctrl {
    use super::*;

    register_bitfields![u32,
        pub ChipRev [
            REVMIN OFFSET(0) NUMBITS(4) [],
            REVMAJ OFFSET(4) NUMBITS(4) []
        ],
        pub ShadowValid [
            INFO1SELOTP OFFSET(1) NUMBITS(1) []
        ],
        pub McuVrCtrl [
            SIMOBUCKOVER OFFSET(0) NUMBITS(1) [],
            SIMOBUCKPDNB OFFSET(1) NUMBITS(1) [],
            SIMOBUCKRSTB OFFSET(2) NUMBITS(1) [],
            SIMOBUCKACTIVE OFFSET(3) NUMBITS(1) []
        ],
        pub SimoBuck0 [
            /// RX compensation enables for VDDC, VDDF, VDDS and VDDCLV.
            RXCOMPEN OFFSET(4) NUMBITS(4) []
        ],
        pub SimoBuck2 [
            VDDCACTLOWTONTRIM OFFSET(0) NUMBITS(5) [],
            VDDCACTHIGHTONTRIM OFFSET(5) NUMBITS(5) []
        ],
        pub SimoBuck4 [
            VDDCLVACTLOWTONTRIM OFFSET(0) NUMBITS(5) [],
            VDDCLVACTHIGHTONTRIM OFFSET(5) NUMBITS(5) [],
            VDDSACTLOWTONTRIM OFFSET(10) NUMBITS(5) [],
            VDDSACTHIGHTONTRIM OFFSET(15) NUMBITS(5) []
        ],
        pub SimoBuck6 [
            VDDFACTHIGHTONTRIM OFFSET(0) NUMBITS(5) []
        ],
        pub SimoBuck7 [
            VDDFACTLOWTONTRIM OFFSET(0) NUMBITS(5) []
        ],
        pub SimoBuck14 [
            VDDCLKGTRIM OFFSET(0) NUMBITS(4) []
        ],
        pub SimoBuck15 [
            TRIMLATCHOVER OFFSET(0) NUMBITS(1) []
        ],
        pub LdoReg1 [
            CORELDOTEMPCOTRIM OFFSET(0) NUMBITS(4) [],
            CORELDOACTIVETRIM OFFSET(4) NUMBITS(10) []
        ],
        pub LdoReg2 [
            MEMLDOACTIVETRIM OFFSET(0) NUMBITS(6) []
        ],
        pub VrefGen2 [
            TVRGCVREFTRIM OFFSET(0) NUMBITS(7) []
        ],
        pub VrefGen4 [
            TVRGFVREFTRIM OFFSET(0) NUMBITS(7) []
        ],
        pub D2aSpare [
            /// VDDC boost enable.
            D2A_VDDC_BOOST OFFSET(8) NUMBITS(1) [],
            /// MEMLDO reference select.
            D2A_MEMLDO_REF OFFSET(15) NUMBITS(2) [],
            /// SYSPLL isolation.
            D2A_SYSPLL_ISO OFFSET(21) NUMBITS(1) []
        ],
        pub PwrSw0 [
            PWRSWVDDRCPUSTATSEL OFFSET(0) NUMBITS(1) []
        ],
        pub PwrSw1 [
            PWRSWVDDRMSTATSEL OFFSET(0) NUMBITS(1) [],
            PWRSWVDDRLSTATSEL OFFSET(1) NUMBITS(1) [],
            SHORTVDDFVDDS OFFSET(4) NUMBITS(1) [],
            SHORTVDDCVDDCLV OFFSET(5) NUMBITS(1) []
        ],
        pub XtalCtrl [
            /// Crystal core powered down.
            PWDNCOREXTAL OFFSET(7) NUMBITS(1) [],
            /// Software override of the crystal controls.
            XTALSWE OFFSET(8) NUMBITS(1) []
        ],
        pub XtalGenCtrl [
            XTALBIASTRIM OFFSET(0) NUMBITS(6) []
        ],
        pub DbgCtrl [
            DBGTPIUCLKSEL OFFSET(0) NUMBITS(3) [],
            DBGTPIUTRACEENABLE OFFSET(4) NUMBITS(1) [],
            /// Debug clock gating enables.
            DBGCLKGATE OFFSET(8) NUMBITS(2) []
        ],
        pub PllCtl0 [
            SYSPLLVDDFPDNB OFFSET(0) NUMBITS(1) [],
            SYSPLLVDDHPDNB OFFSET(1) NUMBITS(1) []
        ],
        pub WicControl [
            DEEPISWIC OFFSET(0) NUMBITS(1) []
        ],
        pub ForceAxiClkEn [
            FRCAXICLKEN OFFSET(0) NUMBITS(1) []
        ],
        pub AudAdcPwrDly [
            AUDADCPWR1 OFFSET(8) NUMBITS(8) []
        ],
        pub MramCryptoPwrCtrl [
            CRYPTOPWRDOWREADY OFFSET(2) NUMBITS(1) []
        ]
    ];

    pub use AudAdcPwrDly::AUDADCPWR1;
    pub use ChipRev::{REVMAJ, REVMIN};
    pub use D2aSpare::{D2A_MEMLDO_REF, D2A_SYSPLL_ISO, D2A_VDDC_BOOST};
    pub use DbgCtrl::{DBGCLKGATE, DBGTPIUCLKSEL, DBGTPIUTRACEENABLE};
    pub use ForceAxiClkEn::FRCAXICLKEN;
    pub use LdoReg1::{CORELDOACTIVETRIM, CORELDOTEMPCOTRIM};
    pub use LdoReg2::MEMLDOACTIVETRIM;
    pub use McuVrCtrl::{SIMOBUCKACTIVE, SIMOBUCKOVER, SIMOBUCKPDNB, SIMOBUCKRSTB};
    pub use MramCryptoPwrCtrl::CRYPTOPWRDOWREADY;
    pub use PllCtl0::{SYSPLLVDDFPDNB, SYSPLLVDDHPDNB};
    pub use PwrSw0::PWRSWVDDRCPUSTATSEL;
    pub use PwrSw1::{PWRSWVDDRLSTATSEL, PWRSWVDDRMSTATSEL, SHORTVDDCVDDCLV, SHORTVDDFVDDS};
    pub use ShadowValid::INFO1SELOTP;
    pub use SimoBuck0::RXCOMPEN;
    pub use SimoBuck14::VDDCLKGTRIM;
    pub use SimoBuck15::TRIMLATCHOVER;
    pub use SimoBuck2::{VDDCACTHIGHTONTRIM, VDDCACTLOWTONTRIM};
    pub use SimoBuck4::{
        VDDCLVACTHIGHTONTRIM, VDDCLVACTLOWTONTRIM, VDDSACTHIGHTONTRIM, VDDSACTLOWTONTRIM,
    };
    pub use SimoBuck6::VDDFACTHIGHTONTRIM;
    pub use SimoBuck7::VDDFACTLOWTONTRIM;
    pub use VrefGen2::TVRGCVREFTRIM;
    pub use VrefGen4::TVRGFVREFTRIM;
    pub use WicControl::DEEPISWIC;
    pub use XtalCtrl::{PWDNCOREXTAL, XTALSWE};
    pub use XtalGenCtrl::XTALBIASTRIM;
}

pub mod clkgen {
    use super::*;

    register_bitfields![u32,
        pub ClkgenMisc [
            FRCHFRC2 OFFSET(0) NUMBITS(1) [],
            AXIXACLKENOVRRIDE OFFSET(1) NUMBITS(1) [],
            /// Power-on clock enables for DISP, DISPPHY, GFX, USB, SDIO,
            /// CRYPTO, I2S0, I2S1, both I2S reference clocks and the USB
            /// reference clock.
            PWRONCLKEN OFFSET(4) NUMBITS(11) [],
            /// GFX, GFX AXI, APB DMA CPU, ETM trace and HFRC func clock gates.
            CLKGATES OFFSET(19) NUMBITS(5) []
        ],
        pub ClockEnStat [
            HFRC2READY OFFSET(0) NUMBITS(1) []
        ]
    ];

    pub use ClkgenMisc::{AXIXACLKENOVRRIDE, CLKGATES, FRCHFRC2, PWRONCLKEN};
    pub use ClockEnStat::HFRC2READY;
}

pub mod crypto {
    use super::*;

    register_bitfields![u32,
        pub CryptoNvmIsIdle [
            NVMISIDLE OFFSET(0) NUMBITS(1) []
        ],
        pub CryptoHostCcIsIdle [
            HOSTCCISIDLE OFFSET(0) NUMBITS(1) []
        ],
        pub CryptoHostPowerDown [
            HOSTPOWERDOWN OFFSET(0) NUMBITS(1) []
        ]
    ];

    pub use CryptoHostCcIsIdle::HOSTCCISIDLE;
    pub use CryptoHostPowerDown::HOSTPOWERDOWN;
    pub use CryptoNvmIsIdle::NVMISIDLE;
}

pub mod otp {
    use super::*;

    register_bitfields![u32,
        pub OtpPtmStat [
            PTMSTAT_BUSY OFFSET(0) NUMBITS(1) []
        ]
    ];

    pub use OtpPtmStat::PTMSTAT_BUSY;
}

pub mod rstgen {
    use super::*;

    register_bitfields![u32,
        pub RstgenStat [
            BORSTAT OFFSET(0) NUMBITS(1) [],
            POASTAT OFFSET(1) NUMBITS(1) []
        ]
    ];

    pub use RstgenStat::{BORSTAT, POASTAT};
}

pub mod dcb {
    use super::*;

    register_bitfields![u32,
        pub DcbDemcr [
            TRCENA OFFSET(24) NUMBITS(1) []
        ]
    ];

    pub use DcbDemcr::TRCENA;
}

pub mod scb {
    use super::*;

    register_bitfields![u32,
        pub ScbCcr [
            CCR_DC OFFSET(16) NUMBITS(1) [],
            CCR_IC OFFSET(17) NUMBITS(1) []
        ]
    ];

    pub use ScbCcr::{CCR_DC, CCR_IC};
}

pub mod pwrmodctl {
    use super::*;

    register_bitfields![u32,
        pub CpdlpState [
            CPDLP_RLP OFFSET(0) NUMBITS(2) [],
            CPDLP_ELP OFFSET(4) NUMBITS(2) [],
            CPDLP_CLP OFFSET(8) NUMBITS(2) []
        ]
    ];

    pub use CpdlpState::{CPDLP_CLP, CPDLP_ELP, CPDLP_RLP};
}

pub mod timer {
    use super::*;

    register_bitfields![u32,
        pub TimerCtrl0 [
            /// Timer A enable of timer 0, used by the power state manager.
            TMR0EN OFFSET(0) NUMBITS(1) []
        ]
    ];

    pub use TimerCtrl0::TMR0EN;
}

pub mod info1 {
    use super::*;

    /// Calibration words are valid when this holds [`VALID_SIGNATURE`].
    pub const VALID: Reg = Reg::Info1(0);
    pub const VALID_SIGNATURE: u32 = 0xA5A5_5A5A;
    pub const PATCH_TRACKER0: Reg = Reg::Info1(2);

    register_bitfields![u32,
        pub TrimRev [
            TRIM_REV OFFSET(0) NUMBITS(8) []
        ]
    ];

    pub use TrimRev::TRIM_REV;

    impl RegisterId for TrimRev::Register {
        const REG: Reg = Reg::Info1(1);
    }
}

macro_rules! register_ids {
    ($($block:ident { $($name:ident),* $(,)? })*) => {
        $($(
            impl RegisterId for $block::$name::Register {
                const REG: Reg = Reg::$name;
            }
        )*)*
    };
}

register_ids! {
    pwrctrl {
        McuPerfReq, MemPwrEn, MemPwrStatus, MemRetCfg, SsramPwrEn, SsramPwrSt, SsramRetCfg,
        MmsOverride, GfxPerfReq, GfxPwrSwSel, PwrVrCtrl, VrStatus, TonCntrCtrl, LpOvrHystCnt,
        LpOvrThreshVdds, LpOvrThreshVddf, LpOvrThreshVddc, LpOvrThreshVddclv, MramExtCtrl,
    }
    mcuctrl {
        ChipRev, ShadowValid, McuVrCtrl, SimoBuck0, SimoBuck2, SimoBuck4, SimoBuck6, SimoBuck7,
        SimoBuck14, SimoBuck15, LdoReg1, LdoReg2, VrefGen2, VrefGen4, D2aSpare, PwrSw0, PwrSw1,
        XtalCtrl, XtalGenCtrl, DbgCtrl, PllCtl0, WicControl, ForceAxiClkEn, AudAdcPwrDly,
        MramCryptoPwrCtrl,
    }
    clkgen { ClkgenMisc, ClockEnStat }
    crypto { CryptoNvmIsIdle, CryptoHostCcIsIdle, CryptoHostPowerDown }
    otp { OtpPtmStat }
    rstgen { RstgenStat }
    dcb { DcbDemcr }
    scb { ScbCcr }
    pwrmodctl { CpdlpState }
    timer { TimerCtrl0 }
}

/// INFO1 words reachable through [`Reg::Info1`].
pub const INFO1_WORDS: usize = 64;

register_structs! {
    pub PwrctrlBlock {
        (0x000 => mcuperfreq: ReadWrite<u32, pwrctrl::McuPerfReq::Register>),
        (0x004 => devpwren: ReadWrite<u32>),
        (0x008 => devpwrstatus: ReadOnly<u32>),
        (0x00c => audsspwren: ReadWrite<u32>),
        (0x010 => audsspwrstatus: ReadOnly<u32>),
        (0x014 => mempwren: ReadWrite<u32, pwrctrl::MemPwrEn::Register>),
        (0x018 => mempwrstatus: ReadOnly<u32, pwrctrl::MemPwrStatus::Register>),
        (0x01c => memretcfg: ReadWrite<u32, pwrctrl::MemRetCfg::Register>),
        (0x020 => syspwrstatus: ReadOnly<u32>),
        (0x024 => ssrampwren: ReadWrite<u32, pwrctrl::SsramPwrEn::Register>),
        (0x028 => ssrampwrst: ReadOnly<u32, pwrctrl::SsramPwrSt::Register>),
        (0x02c => ssramretcfg: ReadWrite<u32, pwrctrl::SsramRetCfg::Register>),
        (0x030 => mmsoverride: ReadWrite<u32, pwrctrl::MmsOverride::Register>),
        (0x034 => gfxperfreq: ReadWrite<u32, pwrctrl::GfxPerfReq::Register>),
        (0x038 => gfxpwrswsel: ReadWrite<u32, pwrctrl::GfxPwrSwSel::Register>),
        (0x03c => vrctrl: ReadWrite<u32, pwrctrl::PwrVrCtrl::Register>),
        (0x040 => vrstatus: ReadOnly<u32, pwrctrl::VrStatus::Register>),
        (0x044 => adcstatus: ReadOnly<u32>),
        (0x048 => audadcstatus: ReadOnly<u32>),
        (0x04c => toncntrctrl: ReadWrite<u32, pwrctrl::TonCntrCtrl::Register>),
        (0x050 => lpovrhystcnt: ReadWrite<u32, pwrctrl::LpOvrHystCnt::Register>),
        (0x054 => lpovrthreshvdds: ReadWrite<u32, pwrctrl::LpOvrThreshVdds::Register>),
        (0x058 => lpovrthreshvddf: ReadWrite<u32, pwrctrl::LpOvrThreshVddf::Register>),
        (0x05c => lpovrthreshvddc: ReadWrite<u32, pwrctrl::LpOvrThreshVddc::Register>),
        (0x060 => lpovrthreshvddclv: ReadWrite<u32, pwrctrl::LpOvrThreshVddclv::Register>),
        (0x064 => mramextctrl: ReadWrite<u32, pwrctrl::MramExtCtrl::Register>),
        (0x068 => @END),
    },

    pub McuctrlBlock {
        (0x000 => chiprev: ReadOnly<u32, mcuctrl::ChipRev::Register>),
        (0x004 => shadowvalid: ReadOnly<u32, mcuctrl::ShadowValid::Register>),
        (0x008 => vrctrl: ReadWrite<u32, mcuctrl::McuVrCtrl::Register>),
        (0x00c => simobuck0: ReadWrite<u32, mcuctrl::SimoBuck0::Register>),
        (0x010 => simobuck2: ReadWrite<u32, mcuctrl::SimoBuck2::Register>),
        (0x014 => simobuck4: ReadWrite<u32, mcuctrl::SimoBuck4::Register>),
        (0x018 => simobuck6: ReadWrite<u32, mcuctrl::SimoBuck6::Register>),
        (0x01c => simobuck7: ReadWrite<u32, mcuctrl::SimoBuck7::Register>),
        (0x020 => simobuck14: ReadWrite<u32, mcuctrl::SimoBuck14::Register>),
        (0x024 => simobuck15: ReadWrite<u32, mcuctrl::SimoBuck15::Register>),
        (0x028 => ldoreg1: ReadWrite<u32, mcuctrl::LdoReg1::Register>),
        (0x02c => ldoreg2: ReadWrite<u32, mcuctrl::LdoReg2::Register>),
        (0x030 => vrefgen2: ReadWrite<u32, mcuctrl::VrefGen2::Register>),
        (0x034 => vrefgen4: ReadWrite<u32, mcuctrl::VrefGen4::Register>),
        (0x038 => d2aspare: ReadWrite<u32, mcuctrl::D2aSpare::Register>),
        (0x03c => pwrsw0: ReadWrite<u32, mcuctrl::PwrSw0::Register>),
        (0x040 => pwrsw1: ReadWrite<u32, mcuctrl::PwrSw1::Register>),
        (0x044 => xtalctrl: ReadWrite<u32, mcuctrl::XtalCtrl::Register>),
        (0x048 => xtalgenctrl: ReadWrite<u32, mcuctrl::XtalGenCtrl::Register>),
        (0x04c => dbgctrl: ReadWrite<u32, mcuctrl::DbgCtrl::Register>),
        (0x050 => pllctl0: ReadWrite<u32, mcuctrl::PllCtl0::Register>),
        (0x054 => wiccontrol: ReadWrite<u32, mcuctrl::WicControl::Register>),
        (0x058 => forceaxiclken: ReadWrite<u32, mcuctrl::ForceAxiClkEn::Register>),
        (0x05c => audadcpwrdly: ReadWrite<u32, mcuctrl::AudAdcPwrDly::Register>),
        (0x060 => mramcryptopwrctrl: ReadWrite<u32, mcuctrl::MramCryptoPwrCtrl::Register>),
        (0x064 => @END),
    },

    pub ClkgenBlock {
        (0x000 => misc: ReadWrite<u32, clkgen::ClkgenMisc::Register>),
        (0x004 => clockenstat: ReadOnly<u32, clkgen::ClockEnStat::Register>),
        (0x008 => clkctrl: ReadWrite<u32>),
        (0x00c => @END),
    },

    pub CryptoBlock {
        (0x000 => nvmisidle: ReadOnly<u32, crypto::CryptoNvmIsIdle::Register>),
        (0x004 => hostccisidle: ReadOnly<u32, crypto::CryptoHostCcIsIdle::Register>),
        (0x008 => hostpowerdown: ReadWrite<u32, crypto::CryptoHostPowerDown::Register>),
        (0x00c => @END),
    },

    pub OtpBlock {
        (0x000 => ptmstat: ReadOnly<u32, otp::OtpPtmStat::Register>),
        (0x004 => @END),
    },

    pub RstgenBlock {
        (0x000 => stat: ReadWrite<u32, rstgen::RstgenStat::Register>),
        (0x004 => @END),
    },

    pub PwrmodctlBlock {
        (0x000 => cpdlpstate: ReadWrite<u32, pwrmodctl::CpdlpState::Register>),
        (0x004 => @END),
    },

    pub TimerBlock {
        (0x000 => ctrl0: ReadWrite<u32, timer::TimerCtrl0::Register>),
        (0x004 => @END),
    },

    pub Info1Block {
        (0x000 => words: [ReadOnly<u32>; INFO1_WORDS]),
        (0x100 => @END),
    }
}

/// Vendor register blocks behind [`Mmio`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Block {
    Pwrctrl,
    Mcuctrl,
    Clkgen,
    Crypto,
    Otp,
    Rstgen,
    Pwrmodctl,
    Timer,
    Info1,
}

/// Board supplied base address of every vendor block. DCB and SCB come from
/// the Cortex-M core peripherals.
pub trait AddressMap {
    fn base(block: Block) -> usize;
}

/// Volatile access to the memory mapped register blocks.
pub struct Mmio<M: AddressMap> {
    _map: PhantomData<M>,
}

impl<M: AddressMap> Mmio<M> {
    /// Take the register blocks.
    ///
    /// Returns `None` once they have been handed out.
    pub fn take() -> Option<Self> {
        static TAKEN: AtomicBool = AtomicBool::new(false);
        if TAKEN
            .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }

        // Safety: single instance guarded by `TAKEN`.
        Some(unsafe { Self::steal() })
    }

    /// # Safety
    ///
    /// Caller must make sure no other instance drives the same blocks.
    pub unsafe fn steal() -> Self {
        Self { _map: PhantomData }
    }
}

macro_rules! block_accessors {
    ($($fn_name:ident: $ty:ty = $block:ident,)*) => {
        impl<M: AddressMap> Mmio<M> {
            $(
                fn $fn_name(&self) -> &$ty {
                    // Safety: `AddressMap` points at the device block, which is
                    // always mapped.
                    unsafe { &*(M::base(Block::$block) as *const $ty) }
                }
            )*
        }
    };
}

block_accessors! {
    pwrctrl: PwrctrlBlock = Pwrctrl,
    mcuctrl: McuctrlBlock = Mcuctrl,
    clkgen: ClkgenBlock = Clkgen,
    crypto: CryptoBlock = Crypto,
    otp: OtpBlock = Otp,
    rstgen: RstgenBlock = Rstgen,
    pwrmodctl: PwrmodctlBlock = Pwrmodctl,
    timer: TimerBlock = Timer,
    info1: Info1Block = Info1,
}

macro_rules! mmio_registers {
    (
        rw { $($rw:ident => $rw_block:ident.$rw_field:ident,)* }
        ro { $($ro:ident => $ro_block:ident.$ro_field:ident,)* }
    ) => {
        impl<M: AddressMap> Registers for Mmio<M> {
            fn read(&self, reg: Reg) -> u32 {
                match reg {
                    $(Reg::$rw => self.$rw_block().$rw_field.get(),)*
                    $(Reg::$ro => self.$ro_block().$ro_field.get(),)*
                    // Safety: the core peripherals are always mapped.
                    Reg::DcbDemcr => unsafe { (*DCB::PTR).demcr.read() },
                    Reg::ScbCcr => unsafe { (*SCB::PTR).ccr.read() },
                    Reg::Info1(word) => self
                        .info1()
                        .words
                        .get(word as usize)
                        .map_or(0, |w| w.get()),
                }
            }

            fn write(&mut self, reg: Reg, value: u32) {
                match reg {
                    $(Reg::$rw => self.$rw_block().$rw_field.set(value),)*
                    // Status words and INFO1 ignore writes.
                    $(Reg::$ro)|* | Reg::Info1(_) => {}
                    // Safety: the core peripherals are always mapped.
                    Reg::DcbDemcr => unsafe { (*DCB::PTR).demcr.write(value) },
                    Reg::ScbCcr => unsafe { (*SCB::PTR).ccr.write(value) },
                }
            }
        }
    };
}

mmio_registers! {
    rw {
        McuPerfReq => pwrctrl.mcuperfreq,
        DevPwrEn => pwrctrl.devpwren,
        AudSsPwrEn => pwrctrl.audsspwren,
        MemPwrEn => pwrctrl.mempwren,
        MemRetCfg => pwrctrl.memretcfg,
        SsramPwrEn => pwrctrl.ssrampwren,
        SsramRetCfg => pwrctrl.ssramretcfg,
        MmsOverride => pwrctrl.mmsoverride,
        GfxPerfReq => pwrctrl.gfxperfreq,
        GfxPwrSwSel => pwrctrl.gfxpwrswsel,
        PwrVrCtrl => pwrctrl.vrctrl,
        TonCntrCtrl => pwrctrl.toncntrctrl,
        LpOvrHystCnt => pwrctrl.lpovrhystcnt,
        LpOvrThreshVdds => pwrctrl.lpovrthreshvdds,
        LpOvrThreshVddf => pwrctrl.lpovrthreshvddf,
        LpOvrThreshVddc => pwrctrl.lpovrthreshvddc,
        LpOvrThreshVddclv => pwrctrl.lpovrthreshvddclv,
        MramExtCtrl => pwrctrl.mramextctrl,
        McuVrCtrl => mcuctrl.vrctrl,
        SimoBuck0 => mcuctrl.simobuck0,
        SimoBuck2 => mcuctrl.simobuck2,
        SimoBuck4 => mcuctrl.simobuck4,
        SimoBuck6 => mcuctrl.simobuck6,
        SimoBuck7 => mcuctrl.simobuck7,
        SimoBuck14 => mcuctrl.simobuck14,
        SimoBuck15 => mcuctrl.simobuck15,
        LdoReg1 => mcuctrl.ldoreg1,
        LdoReg2 => mcuctrl.ldoreg2,
        VrefGen2 => mcuctrl.vrefgen2,
        VrefGen4 => mcuctrl.vrefgen4,
        D2aSpare => mcuctrl.d2aspare,
        PwrSw0 => mcuctrl.pwrsw0,
        PwrSw1 => mcuctrl.pwrsw1,
        XtalCtrl => mcuctrl.xtalctrl,
        XtalGenCtrl => mcuctrl.xtalgenctrl,
        DbgCtrl => mcuctrl.dbgctrl,
        PllCtl0 => mcuctrl.pllctl0,
        WicControl => mcuctrl.wiccontrol,
        ForceAxiClkEn => mcuctrl.forceaxiclken,
        AudAdcPwrDly => mcuctrl.audadcpwrdly,
        MramCryptoPwrCtrl => mcuctrl.mramcryptopwrctrl,
        ClkgenMisc => clkgen.misc,
        ClkCtrl => clkgen.clkctrl,
        CryptoHostPowerDown => crypto.hostpowerdown,
        RstgenStat => rstgen.stat,
        CpdlpState => pwrmodctl.cpdlpstate,
        TimerCtrl0 => timer.ctrl0,
    }
    ro {
        DevPwrStatus => pwrctrl.devpwrstatus,
        AudSsPwrStatus => pwrctrl.audsspwrstatus,
        MemPwrStatus => pwrctrl.mempwrstatus,
        SysPwrStatus => pwrctrl.syspwrstatus,
        SsramPwrSt => pwrctrl.ssrampwrst,
        VrStatus => pwrctrl.vrstatus,
        AdcStatus => pwrctrl.adcstatus,
        AudAdcStatus => pwrctrl.audadcstatus,
        ChipRev => mcuctrl.chiprev,
        ShadowValid => mcuctrl.shadowvalid,
        ClockEnStat => clkgen.clockenstat,
        CryptoNvmIsIdle => crypto.nvmisidle,
        CryptoHostCcIsIdle => crypto.hostccisidle,
        OtpPtmStat => otp.ptmstat,
    }
}
