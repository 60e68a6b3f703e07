//! Temperature bands and compensation requests.

use embedded_hal::delay::DelayNs;

use super::sequence::{GPU_VDDC_BOOST, GPU_VDDF_BOOST};
use super::PowerControl;
use crate::clkmgr::ClockManager;
use crate::periph::Peripheral;
use crate::regs::{mcuctrl, Registers};
use crate::silicon::SiliconRevision;
use crate::spotmgr::{PowerStateManager, TempBand};
use crate::trim::{clamp_add, clamp_sub};
use crate::{Error, Result};

const LOW_LIMIT: f32 = -273.0;
const HIGH_LIMIT: f32 = 1000.0;
const HYSTERESIS: f32 = 2.0;

const RESTORE_SETTLE_US: u32 = 15;

/// Band edges for the next temperature reading. The caller should report
/// again once the temperature leaves `low..high`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TempThresholds {
    pub low: f32,
    pub high: f32,
}

/// `(band, lower edge, upper edge)`, upper edge exclusive.
type Band = (TempBand, f32, f32);

const MANAGED_BANDS: [Band; 4] = [
    (TempBand::VeryLow, LOW_LIMIT, -20.0),
    (TempBand::Low, -20.0, 0.0),
    (TempBand::Mid, 0.0, 50.0),
    (TempBand::High, 50.0, HIGH_LIMIT),
];

const TRANSITIONAL_BANDS: [Band; 3] = [
    (TempBand::Low, LOW_LIMIT, 35.0),
    (TempBand::Mid, 35.0, 50.0),
    (TempBand::High, 50.0, HIGH_LIMIT),
];

fn classify(bands: &[Band], celsius: f32) -> Option<(TempBand, TempThresholds)> {
    bands
        .iter()
        .find(|(_, low, high)| celsius >= *low && celsius < *high)
        .map(|&(band, low, high)| {
            // Hysteresis below the band only, the bottom band has nothing below.
            let low = if low == LOW_LIMIT { low } else { low - HYSTERESIS };
            (band, TempThresholds { low, high })
        })
}

impl<R, D, C, S> PowerControl<R, D, C, S>
where
    R: Registers,
    D: DelayNs,
    C: ClockManager,
    S: PowerStateManager,
{
    /// Report the die temperature.
    ///
    /// Applies (or, during a GPU transition, postpones) the compensation for
    /// the band `celsius` falls into and returns the thresholds at which the
    /// next report is due. Readings outside -273..1000 are refused.
    pub fn temperature_update(&mut self, celsius: f32) -> Result<TempThresholds> {
        let bands: &[Band] = match self.revision {
            SiliconRevision::Legacy => {
                return Ok(TempThresholds {
                    low: LOW_LIMIT,
                    high: HIGH_LIMIT,
                })
            }
            SiliconRevision::Transitional => &TRANSITIONAL_BANDS,
            SiliconRevision::Managed => &MANAGED_BANDS,
        };

        let Some((band, thresholds)) = classify(bands, celsius) else {
            warn!("pwrctrl: temperature out of range");
            return Err(Error::Fail);
        };

        trace!("pwrctrl: temperature band {}", band);
        if self.revision == SiliconRevision::Transitional {
            self.state.force_buck_active = band == TempBand::High;
        }
        self.request_tempco(band);
        Ok(thresholds)
    }

    /// The regulator must stay in buck mode through deep sleep.
    pub fn force_buck_active(&self) -> bool {
        self.state.force_buck_active
    }

    /// Put VDDC and VDDF back on the factory references before deep sleep,
    /// for parts that run without temperature reports.
    pub fn vddc_vddf_restore(&mut self) {
        let Some(snap) = self.state.trims else {
            return;
        };
        if !self.buck_active() {
            return;
        }

        let gfx_on = self.enabled(Peripheral::Gfx);
        let reduce = self.silicon.simobuck_coreldo_reduce();
        self.cs(|pc| {
            let regs = &mut pc.regs;
            if gfx_on {
                regs.set(
                    mcuctrl::TVRGFVREFTRIM,
                    clamp_add(snap.tvrgf, GPU_VDDF_BOOST, mcuctrl::TVRGFVREFTRIM.mask),
                );
                regs.set(
                    mcuctrl::TVRGCVREFTRIM,
                    clamp_add(snap.tvrgc, GPU_VDDC_BOOST, mcuctrl::TVRGCVREFTRIM.mask),
                );
            } else {
                regs.set(mcuctrl::TVRGFVREFTRIM, snap.tvrgf);
                regs.set(mcuctrl::TVRGCVREFTRIM, snap.tvrgc);
                if let Some(reduce) = reduce {
                    regs.set(
                        mcuctrl::CORELDOACTIVETRIM,
                        clamp_sub(snap.coreldo_active, reduce),
                    );
                }
            }
            pc.state.tempco_band = None;
        });
        self.delay.delay_us(RESTORE_SETTLE_US);
    }
}
