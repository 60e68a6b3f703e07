//! Saturating trim arithmetic and the factory trim snapshot.
//!
//! Trim codes are unsigned fields of a few bits. Adjustments never wrap and
//! never exceed the field width.

use tock_registers::fields::Field;
use tock_registers::RegisterLongName;

use crate::regs::{mcuctrl, Registers};

/// `value + delta`, capped at `max`.
pub const fn clamp_add(value: u32, delta: u32, max: u32) -> u32 {
    let sum = value.saturating_add(delta);
    if sum > max {
        max
    } else {
        sum
    }
}

/// `value - delta`, floored at zero.
pub const fn clamp_sub(value: u32, delta: u32) -> u32 {
    value.saturating_sub(delta)
}

/// `value + delta` for a signed delta, kept inside `0..=max`.
pub const fn signed_offset(value: u32, delta: i32, max: u32) -> u32 {
    if delta >= 0 {
        clamp_add(value, delta as u32, max)
    } else {
        clamp_sub(value, delta.unsigned_abs())
    }
}

/// Headroom left in `field` above `current`, limited to `wanted`.
pub fn headroom<R: RegisterLongName>(current: u32, wanted: u32, field: Field<u32, R>) -> u32 {
    let room = field.mask.saturating_sub(current);
    if room < wanted {
        room
    } else {
        wanted
    }
}

/// Buck on-time trims.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TonTrims {
    pub vddc_low: u32,
    pub vddc_high: u32,
    pub vddclv_low: u32,
    pub vddclv_high: u32,
    pub vddf_low: u32,
    pub vddf_high: u32,
    pub vdds_low: u32,
    pub vdds_high: u32,
}

impl TonTrims {
    pub fn read<R: Registers>(regs: &R) -> Self {
        Self {
            vddc_low: regs.get(mcuctrl::VDDCACTLOWTONTRIM),
            vddc_high: regs.get(mcuctrl::VDDCACTHIGHTONTRIM),
            vddclv_low: regs.get(mcuctrl::VDDCLVACTLOWTONTRIM),
            vddclv_high: regs.get(mcuctrl::VDDCLVACTHIGHTONTRIM),
            vddf_low: regs.get(mcuctrl::VDDFACTLOWTONTRIM),
            vddf_high: regs.get(mcuctrl::VDDFACTHIGHTONTRIM),
            vdds_low: regs.get(mcuctrl::VDDSACTLOWTONTRIM),
            vdds_high: regs.get(mcuctrl::VDDSACTHIGHTONTRIM),
        }
    }

    pub fn write<R: Registers>(&self, regs: &mut R) {
        regs.set(mcuctrl::VDDCACTLOWTONTRIM, self.vddc_low);
        regs.set(mcuctrl::VDDCACTHIGHTONTRIM, self.vddc_high);
        regs.set(mcuctrl::VDDCLVACTLOWTONTRIM, self.vddclv_low);
        regs.set(mcuctrl::VDDCLVACTHIGHTONTRIM, self.vddclv_high);
        regs.set(mcuctrl::VDDFACTLOWTONTRIM, self.vddf_low);
        regs.set(mcuctrl::VDDFACTHIGHTONTRIM, self.vddf_high);
        regs.set(mcuctrl::VDDSACTLOWTONTRIM, self.vdds_low);
        regs.set(mcuctrl::VDDSACTHIGHTONTRIM, self.vdds_high);
    }
}

/// Factory trims captured once at low power init.
///
/// Every boost and tempco adjustment is computed from these values, never
/// from the live (possibly boosted) register contents.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrimSnapshot {
    pub coreldo_active: u32,
    pub coreldo_tempco: u32,
    pub memldo_active: u32,
    pub tvrgc: u32,
    pub tvrgf: u32,
    pub vddclkg: u32,
    pub d2a_vddc_boost: bool,
    pub ton: TonTrims,
}

impl TrimSnapshot {
    pub fn capture<R: Registers>(regs: &R) -> Self {
        Self {
            coreldo_active: regs.get(mcuctrl::CORELDOACTIVETRIM),
            coreldo_tempco: regs.get(mcuctrl::CORELDOTEMPCOTRIM),
            memldo_active: regs.get(mcuctrl::MEMLDOACTIVETRIM),
            tvrgc: regs.get(mcuctrl::TVRGCVREFTRIM),
            tvrgf: regs.get(mcuctrl::TVRGFVREFTRIM),
            vddclkg: regs.get(mcuctrl::VDDCLKGTRIM),
            d2a_vddc_boost: regs.is_set(mcuctrl::D2A_VDDC_BOOST),
            ton: TonTrims::read(regs),
        }
    }
}
