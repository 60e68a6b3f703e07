//! Peripheral power table
//!
//! One descriptor per peripheral. Peripherals behind a shared power domain
//! report the same status mask, so a status bit only tells "some member of
//! the domain is powered".

use crate::regs::Reg;
use crate::Error;

/// Peripherals with a switchable power domain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Peripheral {
    Ios0 = 0,
    IosFd0,
    IosFd1,
    Iom0,
    Iom1,
    Iom2,
    Iom3,
    Iom4,
    Iom5,
    Iom6,
    Iom7,
    Uart0,
    Uart1,
    Uart2,
    Uart3,
    Adc,
    Mspi0,
    Mspi1,
    Mspi2,
    Mspi3,
    Gfx,
    Disp,
    DispPhy,
    Crypto,
    Sdio0,
    Sdio1,
    Usb,
    UsbPhy,
    Debug,
    Otp,
    Pdm0,
    I2s0,
    I2s1,
    AudAdc,
}

impl Peripheral {
    pub const COUNT: usize = 34;

    pub const ALL: [Peripheral; Self::COUNT] = {
        use Peripheral::*;
        [
            Ios0, IosFd0, IosFd1, Iom0, Iom1, Iom2, Iom3, Iom4, Iom5, Iom6, Iom7, Uart0, Uart1,
            Uart2, Uart3, Adc, Mspi0, Mspi1, Mspi2, Mspi3, Gfx, Disp, DispPhy, Crypto, Sdio0,
            Sdio1, Usb, UsbPhy, Debug, Otp, Pdm0, I2s0, I2s1, AudAdc,
        ]
    };

    pub fn descriptor(self) -> &'static PeripheralDescriptor {
        &TABLE[self as usize]
    }
}

impl TryFrom<u8> for Peripheral {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(value as usize)
            .copied()
            .ok_or(Error::InvalidArg)
    }
}

/// Where a peripheral's enable and status bits live.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralDescriptor {
    pub enable_reg: Reg,
    pub enable_mask: u32,
    /// Enable bits of every member of the power domain.
    pub enable_domain_mask: u32,
    pub status_reg: Reg,
    /// Status bits of the whole power domain.
    pub status_mask: u32,
}

const DEV: u32 = 0;
const AUD: u32 = 1;

const fn dev(bit: u32) -> u32 {
    1 << bit
}

/// DEVPWREN/DEVPWRSTATUS bits of every device peripheral.
pub const DEVPWR_ALL_MASK: u32 = 0x3fff_ffff;
/// AUDSSPWREN/AUDSSPWRSTATUS bits of every audio peripheral.
pub const AUDSSPWR_ALL_MASK: u32 = 0x4c4;

const PDM0_BIT: u32 = 1 << 2;
const I2S0_BIT: u32 = 1 << 6;
const I2S1_BIT: u32 = 1 << 7;
const AUDADC_BIT: u32 = 1 << 10;

/// IOS0 and both IOS FIFO domains.
pub const IOS_DOMAIN: u32 = dev(0) | dev(1) | dev(2);
/// IOM0..3
pub const HCPB_DOMAIN: u32 = dev(3) | dev(4) | dev(5) | dev(6);
/// IOM4..7
pub const HCPC_DOMAIN: u32 = dev(7) | dev(8) | dev(9) | dev(10);
/// UART0..3
pub const HCPA_DOMAIN: u32 = dev(11) | dev(12) | dev(13) | dev(14);
pub const I2S_DOMAIN: u32 = I2S0_BIT | I2S1_BIT;

const fn entry(
    block: u32,
    enable_mask: u32,
    enable_domain_mask: u32,
    status_mask: u32,
) -> PeripheralDescriptor {
    let (enable_reg, status_reg) = if block == AUD {
        (Reg::AudSsPwrEn, Reg::AudSsPwrStatus)
    } else {
        (Reg::DevPwrEn, Reg::DevPwrStatus)
    };
    PeripheralDescriptor {
        enable_reg,
        enable_mask,
        enable_domain_mask,
        status_reg,
        status_mask,
    }
}

/// Bits of the domain a device bit belongs to. DEVPWREN and DEVPWRSTATUS
/// share one layout.
const fn dev_domain(bit: u32) -> u32 {
    let mask = dev(bit);
    if mask & IOS_DOMAIN != 0 {
        IOS_DOMAIN
    } else if mask & HCPB_DOMAIN != 0 {
        HCPB_DOMAIN
    } else if mask & HCPC_DOMAIN != 0 {
        HCPC_DOMAIN
    } else if mask & HCPA_DOMAIN != 0 {
        HCPA_DOMAIN
    } else {
        mask
    }
}

static TABLE: [PeripheralDescriptor; Peripheral::COUNT] = {
    let mut table = [entry(DEV, 0, 0, 0); Peripheral::COUNT];
    let mut i = 0;
    while i < Peripheral::Pdm0 as usize {
        let domain = dev_domain(i as u32);
        table[i] = entry(DEV, dev(i as u32), domain, domain);
        i += 1;
    }
    table[Peripheral::Pdm0 as usize] = entry(AUD, PDM0_BIT, PDM0_BIT, PDM0_BIT);
    table[Peripheral::I2s0 as usize] = entry(AUD, I2S0_BIT, I2S_DOMAIN, I2S_DOMAIN);
    table[Peripheral::I2s1 as usize] = entry(AUD, I2S1_BIT, I2S_DOMAIN, I2S_DOMAIN);
    table[Peripheral::AudAdc as usize] = entry(AUD, AUDADC_BIT, AUDADC_BIT, AUDADC_BIT);
    table
};
