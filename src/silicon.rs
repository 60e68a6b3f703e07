//! Silicon revision and trim version
//!
//! Resolved once when the power engine is constructed. Everything
//! revision-dependent keys off [`Silicon`] and the [`SiliconRevision`]
//! strategy it selects.

use crate::regs::{info1, mcuctrl, Registers};

/// Chip revision as reported by MCUCTRL.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipRev {
    B0,
    B1,
    B2,
    /// Anything after B2.
    Newer,
}

impl ChipRev {
    /// Decode CHIPREV. Unknown or pre-B encodings are treated as B0.
    pub fn from_chiprev(major: u32, minor: u32) -> Self {
        match (major, minor) {
            (2, 0) => ChipRev::B0,
            (2, 1) => ChipRev::B1,
            (2, 2) => ChipRev::B2,
            (2, _) => ChipRev::Newer,
            (m, _) if m > 2 => ChipRev::Newer,
            _ => ChipRev::B0,
        }
    }
}

/// Trim sequencing strategy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SiliconRevision {
    /// B0 parts with fixed or PCM0.7 trims. GPU boost toggles the buck around
    /// the trim writes.
    Legacy,
    /// B0 PCM1.0 and later, B1 up to PCM2.0, B2 PCM2.0. GPU boost shorts the
    /// rails while the references move.
    Transitional,
    /// Everything newer. Trims are owned by the power state manager.
    Managed,
}

/// Chip revision plus factory trim version.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Silicon {
    pub rev: ChipRev,
    /// Trim version code from INFO1. The meaning depends on `rev`:
    /// - B0: 0 fixed, 1 PCM0.7, 2 PCM1.0, 3 PCM1.1
    /// - B1: 0 PCM1.1, 1 PCM2.0, 2 PCM2.1
    /// - B2: 0 PCM2.0, 1 PCM2.1
    pub trim_version: u32,
}

impl Silicon {
    pub const fn new(rev: ChipRev, trim_version: u32) -> Self {
        Self { rev, trim_version }
    }

    /// Read CHIPREV and the INFO1 trim version.
    pub fn detect<R: Registers>(regs: &R) -> Self {
        let rev = ChipRev::from_chiprev(regs.get(mcuctrl::REVMAJ), regs.get(mcuctrl::REVMIN));
        let trim_version = if regs.read(info1::VALID) == info1::VALID_SIGNATURE {
            regs.get(info1::TRIM_REV)
        } else {
            0
        };
        Self { rev, trim_version }
    }

    pub fn revision(&self) -> SiliconRevision {
        match (self.rev, self.trim_version) {
            (ChipRev::B0, 0..=1) => SiliconRevision::Legacy,
            (ChipRev::B0, _) => SiliconRevision::Transitional,
            (ChipRev::B1, 0..=1) => SiliconRevision::Transitional,
            (ChipRev::B2, 0) => SiliconRevision::Transitional,
            _ => SiliconRevision::Managed,
        }
    }

    pub fn ge_b1(&self) -> bool {
        self.rev >= ChipRev::B1
    }

    /// Parts with any factory trims at all (B0 fixed-trim parts have none).
    pub fn has_trims(&self) -> bool {
        !(self.rev == ChipRev::B0 && self.trim_version == 0)
    }

    /// B0 PCM1.1, B1 PCM2.0 and B2 PCM2.0. These run MEMLDO off TVRGF with a
    /// raised MEMLDO steady state.
    pub fn memldo_on_tvrgf(&self) -> bool {
        matches!(
            (self.rev, self.trim_version),
            (ChipRev::B0, 3..) | (ChipRev::B1, 1) | (ChipRev::B2, 0)
        )
    }

    /// CORELDO active trim reduction applied when the buck takes over.
    ///
    /// Characterisation constants, `None` where no reduction applies.
    pub fn simobuck_coreldo_reduce(&self) -> Option<u32> {
        if !self.has_trims() || self.revision() == SiliconRevision::Managed {
            None
        } else if self.memldo_on_tvrgf() {
            Some(7)
        } else {
            Some(6)
        }
    }

    /// MEMLDO active trim and D2A reference select used once the buck is on.
    pub fn memldo_buck_setting(&self) -> (u32, u32) {
        if self.memldo_on_tvrgf() {
            (1, 0b10)
        } else {
            (0, 0b01)
        }
    }

    /// CORELDO reduction used by the high temperature tempco range.
    pub fn tempco_high_reduce(&self) -> u32 {
        self.simobuck_coreldo_reduce().unwrap_or(6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_mapping() {
        use ChipRev::*;
        use SiliconRevision::*;

        let cases = [
            (B0, 0, Legacy),
            (B0, 1, Legacy),
            (B0, 2, Transitional),
            (B0, 3, Transitional),
            (B1, 0, Transitional),
            (B1, 1, Transitional),
            (B1, 2, Managed),
            (B2, 0, Transitional),
            (B2, 1, Managed),
            (Newer, 0, Managed),
        ];
        for (rev, trim, expected) in cases {
            assert_eq!(Silicon::new(rev, trim).revision(), expected, "{rev:?} trim {trim}");
        }
    }

    #[test]
    fn coreldo_reduce() {
        assert_eq!(Silicon::new(ChipRev::B0, 0).simobuck_coreldo_reduce(), None);
        assert_eq!(Silicon::new(ChipRev::B0, 1).simobuck_coreldo_reduce(), Some(6));
        assert_eq!(Silicon::new(ChipRev::B0, 2).simobuck_coreldo_reduce(), Some(6));
        assert_eq!(Silicon::new(ChipRev::B0, 3).simobuck_coreldo_reduce(), Some(7));
        assert_eq!(Silicon::new(ChipRev::B1, 0).simobuck_coreldo_reduce(), Some(6));
        assert_eq!(Silicon::new(ChipRev::B1, 1).simobuck_coreldo_reduce(), Some(7));
        assert_eq!(Silicon::new(ChipRev::B2, 0).simobuck_coreldo_reduce(), Some(7));
        assert_eq!(Silicon::new(ChipRev::B2, 1).simobuck_coreldo_reduce(), None);
    }

    #[test]
    fn chiprev_decode() {
        assert_eq!(ChipRev::from_chiprev(2, 1), ChipRev::B1);
        assert_eq!(ChipRev::from_chiprev(1, 3), ChipRev::B0);
        assert_eq!(ChipRev::from_chiprev(3, 0), ChipRev::Newer);
    }
}
