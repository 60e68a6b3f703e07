//! GPU boost and temperature compensation sequences.
//!
//! One set of sequences per silicon revision, picked by [`gpu_on`],
//! [`gpu_off`] and [`tempco`] from the revision the engine resolved at
//! construction:
//! - legacy: cycle the buck off while the boosted trims are written
//! - transitional: short VDDC/VDDCLV and VDDS/VDDF while references move
//! - managed: report to the power state manager, touch nothing
//!
//! Every boost leaves a [`GpuBoost`] record behind and the matching off
//! sequence undoes exactly that record.

use embedded_hal::delay::DelayNs;

use super::{GpuPowerMode, PowerEngineState};
use crate::periph::Peripheral;
use crate::regs::{mcuctrl, pwrctrl, Registers};
use crate::silicon::{Silicon, SiliconRevision};
use crate::spotmgr::{GpuState, PowerEvent, PowerStateManager, TempBand};
use crate::trim::{clamp_add, clamp_sub, headroom, signed_offset, TonTrims, TrimSnapshot};
use crate::Result;

/// VDDC reference boost while the GPU runs.
pub(super) const GPU_VDDC_BOOST: u32 = 9;
/// VDDF reference boost while the GPU runs.
pub(super) const GPU_VDDF_BOOST: u32 = 15;
/// CORELDO headroom held during a rail transition.
const CORELDO_TRANSITION_BOOST: u32 = 12;
const MEMLDO_TRANSITION: u32 = 5;
const MEMLDO_LDO_BOOST: u32 = 5;
const CORELDO_TEMPCO_BUCK_BOOST: u32 = 1;
const CORELDO_TEMPCO_LDO_BOOST: u32 = 2;
const VDDCLKG_BOOST: u32 = 3;

const BUCK_TOGGLE_US: u32 = 5;
const BOOST_SETTLE_US: u32 = 15;
const LDO_SETTLE_US: u32 = 5;
const SHORT_SETTLE_US: u32 = 10;

/// What the GPU on sequence changed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpuBoost {
    /// Buck was cycled around trims derived from the snapshot.
    LegacyBuck,
    /// Rail-short sequence. Holds the values to put back and the reference
    /// codes actually added.
    Buck {
        coreldo_tempco: u32,
        memldo: u32,
        d2a_vddc_boost: bool,
        ton: TonTrims,
        vddc_added: u32,
        vddf_added: u32,
    },
    /// Regulator in LDO mode.
    Ldo { coreldo_tempco: u32, memldo: u32 },
}

/// Borrowed view of the engine handed to the per-revision sequences.
pub(crate) struct Sequencer<'a, R, D, S> {
    pub regs: &'a mut R,
    pub delay: &'a mut D,
    pub spot: &'a mut S,
    pub state: &'a mut PowerEngineState,
    pub silicon: Silicon,
}

impl<R: Registers, D: DelayNs, S: PowerStateManager> Sequencer<'_, R, D, S> {
    fn cs<T>(&mut self, f: impl FnOnce(&mut R) -> T) -> T {
        critical_section::with(|_| f(&mut *self.regs))
    }

    fn buck_active(&self) -> bool {
        self.regs.matches_all(pwrctrl::SIMOBUCKST::Active)
    }

    fn gfx_enabled(&self) -> bool {
        let desc = Peripheral::Gfx.descriptor();
        self.regs.read(desc.enable_reg) & desc.enable_mask != 0
    }

    /// Buck enable with the deep sleep overrides following it.
    fn simobuck_enable(&mut self, on: bool) {
        if on {
            self.cs(|r| r.set(pwrctrl::SIMOBUCKEN, 1));
            self.delay.delay_us(BUCK_TOGGLE_US);
            self.cs(|r| r.set(mcuctrl::SIMOBUCKOVER, 1));
        } else {
            self.cs(|r| r.set(mcuctrl::SIMOBUCKOVER, 0));
            self.delay.delay_us(BUCK_TOGGLE_US);
            self.cs(|r| r.set(pwrctrl::SIMOBUCKEN, 0));
        }
    }

    fn rail_short(&mut self, on: bool) {
        self.cs(|r| {
            r.set(mcuctrl::SHORTVDDCVDDCLV, on as u32);
            r.set(mcuctrl::SHORTVDDFVDDS, on as u32);
        });
    }

    fn notify(&mut self, event: PowerEvent) {
        if let Err(e) = self.spot.update(event) {
            warn!("pwrctrl: state manager rejected {}: {}", event, e);
        }
    }

    /// LDO mode boost, shared by legacy and transitional parts.
    fn ldo_boost(&mut self) {
        let boost = self.cs(|r| {
            let coreldo_tempco = r.get(mcuctrl::CORELDOTEMPCOTRIM);
            let memldo = r.get(mcuctrl::MEMLDOACTIVETRIM);
            r.set(mcuctrl::CORELDOTEMPCOTRIM, CORELDO_TEMPCO_LDO_BOOST);
            r.set(
                mcuctrl::MEMLDOACTIVETRIM,
                clamp_add(memldo, MEMLDO_LDO_BOOST, mcuctrl::MEMLDOACTIVETRIM.mask),
            );
            GpuBoost::Ldo { coreldo_tempco, memldo }
        });
        self.delay.delay_us(BOOST_SETTLE_US);
        self.state.gpu_boost = Some(boost);
    }

    fn ldo_restore(&mut self, coreldo_tempco: u32, memldo: u32) {
        self.cs(|r| {
            r.set(mcuctrl::MEMLDOACTIVETRIM, memldo);
            r.set(mcuctrl::CORELDOTEMPCOTRIM, coreldo_tempco);
        });
    }
}

/// Ton trims while the GPU is powered. VDDS keeps its current setting.
fn gpu_ton(base: TonTrims, mode: GpuPowerMode) -> TonTrims {
    let (vddf_low, vddf_high) = match mode {
        GpuPowerMode::LowPower => (16, 20),
        GpuPowerMode::HighPerformance => (20, 22),
    };
    TonTrims {
        vddc_low: 10,
        vddc_high: 10,
        vddclv_low: 8,
        vddclv_high: 8,
        vddf_low,
        vddf_high,
        ..base
    }
}

/// Ton configuration of older parts. `Some(mode)` selects the GPU table for
/// that mode, `None` goes back to the factory Ton.
///
/// Only acts once the trims have been captured. Called with interrupts masked.
pub(crate) fn legacy_ton_update<R: Registers>(
    regs: &mut R,
    state: &PowerEngineState,
    gpu: Option<GpuPowerMode>,
) {
    let Some(snap) = state.trims else {
        return;
    };
    match gpu {
        Some(mode) => gpu_ton(snap.ton, mode).write(regs),
        None => snap.ton.write(regs),
    }
}

pub(crate) fn gpu_on<R, D, S>(rev: SiliconRevision, s: &mut Sequencer<'_, R, D, S>) -> Result
where
    R: Registers,
    D: DelayNs,
    S: PowerStateManager,
{
    match rev {
        SiliconRevision::Legacy => legacy::gpu_on(s),
        SiliconRevision::Transitional => transitional::gpu_on(s),
        SiliconRevision::Managed => managed::gpu_on(s),
    }
}

pub(crate) fn gpu_off<R, D, S>(rev: SiliconRevision, s: &mut Sequencer<'_, R, D, S>) -> Result
where
    R: Registers,
    D: DelayNs,
    S: PowerStateManager,
{
    match rev {
        SiliconRevision::Legacy => legacy::gpu_off(s),
        SiliconRevision::Transitional => transitional::gpu_off(s),
        SiliconRevision::Managed => managed::gpu_off(s),
    }
}

/// Called with interrupts masked.
pub(crate) fn tempco<R, D, S>(rev: SiliconRevision, s: &mut Sequencer<'_, R, D, S>, range: TempBand)
where
    R: Registers,
    D: DelayNs,
    S: PowerStateManager,
{
    match rev {
        SiliconRevision::Legacy => {
            trace!("pwrctrl: no tempco on legacy trims ({})", range);
        }
        SiliconRevision::Transitional => transitional::tempco(s, range),
        SiliconRevision::Managed => s.notify(PowerEvent::Temperature(range)),
    }
}

mod legacy {
    use super::*;

    pub(super) fn gpu_on<R, D, S>(s: &mut Sequencer<'_, R, D, S>) -> Result
    where
        R: Registers,
        D: DelayNs,
        S: PowerStateManager,
    {
        if !s.silicon.has_trims() {
            return Ok(());
        }
        if !s.buck_active() {
            s.ldo_boost();
            return Ok(());
        }
        let Some(snap) = s.state.trims else {
            return Ok(());
        };

        debug!("pwrctrl: GPU boost, buck cycled");
        s.simobuck_enable(false);
        s.cs(|r| {
            r.set(mcuctrl::CORELDOTEMPCOTRIM, CORELDO_TEMPCO_BUCK_BOOST);
            r.set(
                mcuctrl::TVRGCVREFTRIM,
                clamp_add(snap.tvrgc, GPU_VDDC_BOOST, mcuctrl::TVRGCVREFTRIM.mask),
            );
            r.set(mcuctrl::D2A_VDDC_BOOST, 1);
            r.set(
                mcuctrl::TVRGFVREFTRIM,
                clamp_add(snap.tvrgf, GPU_VDDF_BOOST, mcuctrl::TVRGFVREFTRIM.mask),
            );
            r.set(mcuctrl::VDDCLKGTRIM, VDDCLKG_BOOST);
        });
        s.simobuck_enable(true);
        s.delay.delay_us(BOOST_SETTLE_US);
        s.state.gpu_boost = Some(GpuBoost::LegacyBuck);
        Ok(())
    }

    pub(super) fn gpu_off<R, D, S>(s: &mut Sequencer<'_, R, D, S>) -> Result
    where
        R: Registers,
        D: DelayNs,
        S: PowerStateManager,
    {
        match s.state.gpu_boost.take() {
            Some(GpuBoost::LegacyBuck) => {
                let Some(snap) = s.state.trims else {
                    return Ok(());
                };
                s.simobuck_enable(false);
                s.cs(|r| {
                    r.set(mcuctrl::VDDCLKGTRIM, snap.vddclkg);
                    r.set(mcuctrl::TVRGFVREFTRIM, snap.tvrgf);
                    r.set(mcuctrl::D2A_VDDC_BOOST, snap.d2a_vddc_boost as u32);
                    r.set(mcuctrl::TVRGCVREFTRIM, snap.tvrgc);
                    r.set(mcuctrl::CORELDOTEMPCOTRIM, snap.coreldo_tempco);
                });
                s.simobuck_enable(true);
            }
            Some(GpuBoost::Ldo { coreldo_tempco, memldo }) => s.ldo_restore(coreldo_tempco, memldo),
            Some(other) => warn!("pwrctrl: unexpected GPU boost record {}", other),
            None => {}
        }
        Ok(())
    }
}

mod transitional {
    use super::*;

    /// `(CORELDO, VDDC, VDDF)` reductions for a band. Colder die needs less
    /// voltage.
    fn band_reduce(silicon: Silicon, band: Option<TempBand>) -> (u32, i32, i32) {
        match band {
            Some(TempBand::VeryLow | TempBand::Low) => (17, 35, 10),
            Some(TempBand::Mid) => (12, 20, 10),
            Some(TempBand::High) => (silicon.tempco_high_reduce(), 0, 0),
            None => (0, 0, 0),
        }
    }

    /// VDDC and VDDF references for `band` on top of the snapshot.
    fn references(
        snap: &TrimSnapshot,
        silicon: Silicon,
        band: Option<TempBand>,
        gpu: bool,
    ) -> (u32, u32) {
        let (_, vddc_reduce, vddf_reduce) = band_reduce(silicon, band);
        let (vddc_gpu, vddf_gpu) = if gpu {
            (GPU_VDDC_BOOST as i32, GPU_VDDF_BOOST as i32)
        } else {
            (0, 0)
        };
        (
            signed_offset(snap.tvrgc, vddc_gpu - vddc_reduce, mcuctrl::TVRGCVREFTRIM.mask),
            signed_offset(snap.tvrgf, vddf_gpu - vddf_reduce, mcuctrl::TVRGFVREFTRIM.mask),
        )
    }

    pub(super) fn gpu_on<R, D, S>(s: &mut Sequencer<'_, R, D, S>) -> Result
    where
        R: Registers,
        D: DelayNs,
        S: PowerStateManager,
    {
        if !s.buck_active() {
            s.ldo_boost();
            return Ok(());
        }

        debug!("pwrctrl: GPU boost, rails shorted");
        let mode = s.state.gpu_mode;
        let (memldo_steady, _) = s.silicon.memldo_buck_setting();

        let (coreldo_tempco, memldo, d2a_vddc_boost, ton, coreldo_added) = s.cs(|r| {
            let coreldo_tempco = r.get(mcuctrl::CORELDOTEMPCOTRIM);
            let memldo = r.get(mcuctrl::MEMLDOACTIVETRIM);
            let d2a = r.is_set(mcuctrl::D2A_VDDC_BOOST);
            let ton = TonTrims::read(r);

            r.set(mcuctrl::CORELDOTEMPCOTRIM, CORELDO_TEMPCO_BUCK_BOOST);
            let coreldo = r.get(mcuctrl::CORELDOACTIVETRIM);
            let added = headroom(coreldo, CORELDO_TRANSITION_BOOST, mcuctrl::CORELDOACTIVETRIM);
            r.set(mcuctrl::CORELDOACTIVETRIM, coreldo + added);
            r.set(mcuctrl::MEMLDOACTIVETRIM, MEMLDO_TRANSITION);
            (coreldo_tempco, memldo, d2a, ton, added)
        });
        s.delay.delay_us(LDO_SETTLE_US);

        let vddf_added = s.cs(|r| {
            let vddf = r.get(mcuctrl::TVRGFVREFTRIM);
            let added = headroom(vddf, GPU_VDDF_BOOST, mcuctrl::TVRGFVREFTRIM);
            r.set(mcuctrl::TVRGFVREFTRIM, vddf + added);
            added
        });

        s.rail_short(true);
        s.delay.delay_us(SHORT_SETTLE_US);

        let vddc_added = s.cs(|r| {
            let vddc = r.get(mcuctrl::TVRGCVREFTRIM);
            let added = headroom(vddc, GPU_VDDC_BOOST, mcuctrl::TVRGCVREFTRIM);
            r.set(mcuctrl::TVRGCVREFTRIM, vddc + added);
            r.set(mcuctrl::D2A_VDDC_BOOST, 1);
            gpu_ton(ton, mode).write(r);
            added
        });

        s.rail_short(false);
        s.cs(|r| {
            let coreldo = r.get(mcuctrl::CORELDOACTIVETRIM);
            r.set(mcuctrl::CORELDOACTIVETRIM, clamp_sub(coreldo, coreldo_added));
            r.set(mcuctrl::MEMLDOACTIVETRIM, memldo_steady);
        });

        s.state.gpu_boost = Some(GpuBoost::Buck {
            coreldo_tempco,
            memldo,
            d2a_vddc_boost,
            ton,
            vddc_added,
            vddf_added,
        });
        Ok(())
    }

    pub(super) fn gpu_off<R, D, S>(s: &mut Sequencer<'_, R, D, S>) -> Result
    where
        R: Registers,
        D: DelayNs,
        S: PowerStateManager,
    {
        let (coreldo_tempco, memldo, d2a_vddc_boost, ton, vddc_added, vddf_added) =
            match s.state.gpu_boost.take() {
                Some(GpuBoost::Buck {
                    coreldo_tempco,
                    memldo,
                    d2a_vddc_boost,
                    ton,
                    vddc_added,
                    vddf_added,
                }) => (coreldo_tempco, memldo, d2a_vddc_boost, ton, vddc_added, vddf_added),
                Some(GpuBoost::Ldo { coreldo_tempco, memldo }) => {
                    s.ldo_restore(coreldo_tempco, memldo);
                    return Ok(());
                }
                Some(other) => {
                    warn!("pwrctrl: unexpected GPU boost record {}", other);
                    return Ok(());
                }
                None => return Ok(()),
            };

        // Settle on what the band asks for, a saturated boost cannot be
        // subtracted back out.
        let settled = s
            .state
            .trims
            .map(|snap| references(&snap, s.silicon, s.state.tempco_band, false));

        debug!("pwrctrl: GPU unboost, rails shorted");
        let coreldo_added = s.cs(|r| {
            let coreldo = r.get(mcuctrl::CORELDOACTIVETRIM);
            let added = headroom(coreldo, CORELDO_TRANSITION_BOOST, mcuctrl::CORELDOACTIVETRIM);
            r.set(mcuctrl::CORELDOACTIVETRIM, coreldo + added);
            r.set(mcuctrl::MEMLDOACTIVETRIM, MEMLDO_TRANSITION);
            added
        });
        s.delay.delay_us(LDO_SETTLE_US);

        s.rail_short(true);
        s.delay.delay_us(SHORT_SETTLE_US);

        s.cs(|r| {
            ton.write(r);
            let (vddc, vddf) = settled.unwrap_or_else(|| {
                (
                    clamp_sub(r.get(mcuctrl::TVRGCVREFTRIM), vddc_added),
                    clamp_sub(r.get(mcuctrl::TVRGFVREFTRIM), vddf_added),
                )
            });
            r.set(mcuctrl::TVRGFVREFTRIM, vddf);
            r.set(mcuctrl::TVRGCVREFTRIM, vddc);
            r.set(mcuctrl::CORELDOTEMPCOTRIM, coreldo_tempco);
            r.set(mcuctrl::D2A_VDDC_BOOST, d2a_vddc_boost as u32);
            let coreldo = r.get(mcuctrl::CORELDOACTIVETRIM);
            r.set(mcuctrl::CORELDOACTIVETRIM, clamp_sub(coreldo, coreldo_added));
            r.set(mcuctrl::MEMLDOACTIVETRIM, memldo);
        });
        s.rail_short(false);
        Ok(())
    }

    pub(super) fn tempco<R, D, S>(s: &mut Sequencer<'_, R, D, S>, range: TempBand)
    where
        R: Registers,
        D: DelayNs,
        S: PowerStateManager,
    {
        let Some(snap) = s.state.trims else {
            return;
        };
        if !s.buck_active() {
            return;
        }

        debug!("pwrctrl: tempco {}", range);
        let band = Some(range);
        let (coreldo_reduce, _, _) = band_reduce(s.silicon, band);
        let (vddc, vddf) = references(&snap, s.silicon, band, s.gfx_enabled());
        let regs = &mut *s.regs;
        regs.set(mcuctrl::CORELDOACTIVETRIM, clamp_sub(snap.coreldo_active, coreldo_reduce));
        regs.set(mcuctrl::TVRGCVREFTRIM, vddc);
        regs.set(mcuctrl::TVRGFVREFTRIM, vddf);
        s.state.tempco_band = band;
    }
}

mod managed {
    use super::*;

    pub(super) fn gpu_on<R, D, S>(s: &mut Sequencer<'_, R, D, S>) -> Result
    where
        R: Registers,
        D: DelayNs,
        S: PowerStateManager,
    {
        let state = match s.state.gpu_mode {
            GpuPowerMode::LowPower => GpuState::ActiveLp,
            GpuPowerMode::HighPerformance => GpuState::ActiveHp,
        };
        s.notify(PowerEvent::Gpu(state));
        Ok(())
    }

    pub(super) fn gpu_off<R, D, S>(s: &mut Sequencer<'_, R, D, S>) -> Result
    where
        R: Registers,
        D: DelayNs,
        S: PowerStateManager,
    {
        s.notify(PowerEvent::Gpu(GpuState::Off));
        Ok(())
    }
}

/// Trim registers the boost sequences may touch.
#[cfg(test)]
pub(crate) const TRIM_REGS: [crate::regs::Reg; 10] = [
    crate::regs::Reg::LdoReg1,
    crate::regs::Reg::LdoReg2,
    crate::regs::Reg::VrefGen2,
    crate::regs::Reg::VrefGen4,
    crate::regs::Reg::D2aSpare,
    crate::regs::Reg::SimoBuck2,
    crate::regs::Reg::SimoBuck4,
    crate::regs::Reg::SimoBuck6,
    crate::regs::Reg::SimoBuck7,
    crate::regs::Reg::SimoBuck14,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::periph::Peripheral;
    use crate::pwrctrl::tests::{engine, TestEngine};
    use crate::pwrctrl::ControlOp;
    use crate::silicon::ChipRev;

    fn trims(pc: &TestEngine) -> [u32; 10] {
        TRIM_REGS.map(|r| pc.regs().read(r))
    }

    /// Factory-looking trims, then the boot sequence with the buck taking over.
    fn booted(silicon: Silicon) -> TestEngine {
        let mut pc = engine(silicon);
        let regs = pc.regs_mut();
        regs.set(mcuctrl::CORELDOACTIVETRIM, 200);
        regs.set(mcuctrl::CORELDOTEMPCOTRIM, 4);
        regs.set(mcuctrl::MEMLDOACTIVETRIM, 20);
        regs.set(mcuctrl::TVRGCVREFTRIM, 60);
        regs.set(mcuctrl::TVRGFVREFTRIM, 70);
        regs.set(mcuctrl::VDDCLKGTRIM, 1);
        TonTrims {
            vddc_low: 6,
            vddc_high: 6,
            vddclv_low: 5,
            vddclv_high: 5,
            vddf_low: 7,
            vddf_high: 10,
            vdds_low: 9,
            vdds_high: 9,
        }
        .write(regs);

        pc.low_power_init().unwrap();
        pc.control(ControlOp::SimobuckInit).unwrap();
        assert!(pc.buck_active());
        pc
    }

    fn all_silicon() -> [Silicon; 6] {
        [
            Silicon::new(ChipRev::B0, 1),
            Silicon::new(ChipRev::B0, 2),
            Silicon::new(ChipRev::B0, 3),
            Silicon::new(ChipRev::B1, 0),
            Silicon::new(ChipRev::B1, 1),
            Silicon::new(ChipRev::B2, 1),
        ]
    }

    #[test]
    fn gpu_boost_is_undone_exactly() {
        for silicon in all_silicon() {
            let mut pc = booted(silicon);
            let before = trims(&pc);

            pc.enable(Peripheral::Gfx).unwrap();
            pc.disable(Peripheral::Gfx).unwrap();

            assert_eq!(trims(&pc), before, "{silicon:?}");
            assert_eq!(pc.state().gpu_boost, None);
        }
    }

    #[test]
    fn gpu_boost_is_undone_exactly_in_every_tempco_range() {
        let transitional = [
            Silicon::new(ChipRev::B0, 2),
            Silicon::new(ChipRev::B1, 1),
            Silicon::new(ChipRev::B2, 0),
        ];
        for silicon in transitional {
            for temp in [-40.0, 40.0, 80.0] {
                let mut pc = booted(silicon);
                pc.temperature_update(temp).unwrap();
                let before = trims(&pc);

                pc.enable(Peripheral::Gfx).unwrap();
                pc.disable(Peripheral::Gfx).unwrap();

                assert_eq!(trims(&pc), before, "{silicon:?} at {temp}");
            }
        }
    }

    #[test]
    fn ldo_mode_boost_round_trip() {
        for silicon in [Silicon::new(ChipRev::B0, 1), Silicon::new(ChipRev::B1, 0)] {
            let mut pc = engine(silicon);
            pc.regs_mut().set(mcuctrl::MEMLDOACTIVETRIM, 62);
            pc.regs_mut().set(mcuctrl::CORELDOTEMPCOTRIM, 7);
            pc.low_power_init().unwrap();
            let before = trims(&pc);

            pc.enable(Peripheral::Gfx).unwrap();
            assert_eq!(pc.regs().get(mcuctrl::CORELDOTEMPCOTRIM), 2);
            // Capped at the field maximum.
            assert_eq!(pc.regs().get(mcuctrl::MEMLDOACTIVETRIM), 63);

            pc.disable(Peripheral::Gfx).unwrap();
            assert_eq!(trims(&pc), before);
        }
    }

    #[test]
    fn legacy_buck_boost_from_snapshot() {
        let mut pc = booted(Silicon::new(ChipRev::B0, 1));
        pc.enable(Peripheral::Gfx).unwrap();

        let r = pc.regs();
        assert_eq!(r.get(mcuctrl::CORELDOTEMPCOTRIM), 1);
        assert_eq!(r.get(mcuctrl::TVRGCVREFTRIM), 60 + 9);
        assert_eq!(r.get(mcuctrl::TVRGFVREFTRIM), 70 + 15);
        assert_eq!(r.get(mcuctrl::VDDCLKGTRIM), 3);
        assert!(r.is_set(mcuctrl::D2A_VDDC_BOOST));
        // Buck back on afterwards.
        assert!(pc.buck_active());
        assert_eq!(pc.state().gpu_boost, Some(GpuBoost::LegacyBuck));
    }

    #[test]
    fn transitional_boost_leaves_references_raised() {
        let mut pc = booted(Silicon::new(ChipRev::B1, 1));
        let coreldo = pc.regs().get(mcuctrl::CORELDOACTIVETRIM);
        let tvrgc = pc.regs().get(mcuctrl::TVRGCVREFTRIM);
        let tvrgf = pc.regs().get(mcuctrl::TVRGFVREFTRIM);

        pc.enable(Peripheral::Gfx).unwrap();

        let r = pc.regs();
        assert_eq!(r.get(mcuctrl::TVRGCVREFTRIM), tvrgc + 9);
        assert_eq!(r.get(mcuctrl::TVRGFVREFTRIM), tvrgf + 15);
        // CORELDO and MEMLDO back at their steady state.
        assert_eq!(r.get(mcuctrl::CORELDOACTIVETRIM), coreldo);
        assert_eq!(r.get(mcuctrl::MEMLDOACTIVETRIM), 1);
        assert_eq!(r.get(mcuctrl::VDDFACTLOWTONTRIM), 16);
        assert_eq!(r.get(mcuctrl::VDDCACTHIGHTONTRIM), 10);
        // Rails not left shorted.
        assert!(!r.is_set(mcuctrl::SHORTVDDCVDDCLV));
        assert!(!r.is_set(mcuctrl::SHORTVDDFVDDS));
    }

    fn booted_with_references(silicon: Silicon, tvrgc: u32, tvrgf: u32) -> TestEngine {
        let mut pc = engine(silicon);
        pc.regs_mut().set(mcuctrl::TVRGCVREFTRIM, tvrgc);
        pc.regs_mut().set(mcuctrl::TVRGFVREFTRIM, tvrgf);
        pc.low_power_init().unwrap();
        pc.control(ControlOp::SimobuckInit).unwrap();
        pc
    }

    #[test]
    fn boost_saturates_at_field_max() {
        let mut pc = booted_with_references(Silicon::new(ChipRev::B1, 0), 60, 120);
        pc.enable(Peripheral::Gfx).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), 127);

        pc.disable(Peripheral::Gfx).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), 120);
    }

    #[test]
    fn unboost_after_saturated_tempco_returns_to_band() {
        let mut pc = booted_with_references(Silicon::new(ChipRev::B1, 0), 125, 120);
        pc.temperature_update(20.0).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), 125 - 35);
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), 120 - 10);

        pc.enable(Peripheral::Gfx).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), 125 - 35 + 9);
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), 120 - 10 + 15);

        // Warming up while boosted clips both references at the field max.
        pc.temperature_update(80.0).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), 127);
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), 127);

        pc.disable(Peripheral::Gfx).unwrap();
        assert_eq!(pc.state().tempco_band, Some(TempBand::High));
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), 125);
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), 120);
    }

    #[test]
    fn managed_boost_is_reported_not_applied() {
        let mut pc = booted(Silicon::new(ChipRev::B2, 1));
        let before = trims(&pc);

        pc.enable(Peripheral::Gfx).unwrap();
        assert_eq!(trims(&pc), before);
        pc.disable(Peripheral::Gfx).unwrap();

        let gpu: Vec<_> = pc
            .state_manager()
            .events
            .iter()
            .filter(|e| matches!(e, PowerEvent::Gpu(_)))
            .copied()
            .collect();
        assert_eq!(
            gpu,
            [PowerEvent::Gpu(GpuState::ActiveLp), PowerEvent::Gpu(GpuState::Off)]
        );
    }

    #[test]
    fn gpu_holds_hfrc_while_on() {
        use crate::clkmgr::{ClockId, ClockUser};

        let mut pc = booted(Silicon::new(ChipRev::B1, 1));
        pc.gpu_mode_select(GpuPowerMode::HighPerformance).unwrap();
        pc.enable(Peripheral::Gfx).unwrap();
        assert!(pc.clocks().holds(ClockId::Hfrc, ClockUser::Gfx));
        assert!(pc.clocks().holds(ClockId::Hfrc2, ClockUser::Gfx));

        pc.disable(Peripheral::Gfx).unwrap();
        assert!(!pc.clocks().is_requested(ClockId::Hfrc));
        assert!(!pc.clocks().is_requested(ClockId::Hfrc2));
    }

    #[test]
    fn tempco_tables() {
        let mut pc = booted(Silicon::new(ChipRev::B1, 0));
        let snap = pc.state().trims.unwrap();

        pc.temperature_update(20.0).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::CORELDOACTIVETRIM), snap.coreldo_active - 17);
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), snap.tvrgc - 35);
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), snap.tvrgf - 10);

        pc.temperature_update(40.0).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::CORELDOACTIVETRIM), snap.coreldo_active - 12);
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), snap.tvrgc - 20);

        pc.temperature_update(60.0).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::CORELDOACTIVETRIM), snap.coreldo_active - 6);
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), snap.tvrgc);
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), snap.tvrgf);
    }

    #[test]
    fn tempco_composes_with_gpu_boost() {
        let mut pc = booted(Silicon::new(ChipRev::B1, 0));
        let snap = pc.state().trims.unwrap();
        pc.enable(Peripheral::Gfx).unwrap();

        pc.temperature_update(40.0).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), snap.tvrgc - 20 + 9);
        assert_eq!(pc.regs().get(mcuctrl::TVRGFVREFTRIM), snap.tvrgf - 10 + 15);
    }

    #[test]
    fn tempco_never_underflows() {
        let mut pc = engine(Silicon::new(ChipRev::B1, 0));
        pc.regs_mut().set(mcuctrl::TVRGCVREFTRIM, 10);
        pc.regs_mut().set(mcuctrl::CORELDOACTIVETRIM, 4);
        pc.low_power_init().unwrap();
        pc.control(ControlOp::SimobuckInit).unwrap();

        pc.temperature_update(0.0).unwrap();
        assert_eq!(pc.regs().get(mcuctrl::TVRGCVREFTRIM), 0);
        assert_eq!(pc.regs().get(mcuctrl::CORELDOACTIVETRIM), 0);
    }
}
