//! Clock request interface
//!
//! The power engine asks for the high frequency RC oscillators while GPU or
//! crypto are powered. Arbitration between users belongs to the clock
//! manager, this module only defines the seam plus a bookkeeping
//! implementation for systems without one.

/// Clock sources the power engine requests.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockId {
    /// 96 MHz HFRC
    Hfrc,
    /// 250 MHz HFRC2, needed by the GPU in high performance mode
    Hfrc2,
}

/// Requesters owned by the power engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockUser {
    Gfx,
    Crypto,
}

pub trait ClockManager {
    fn request(&mut self, clock: ClockId, user: ClockUser);
    fn release(&mut self, clock: ClockId, user: ClockUser);
    /// Drop every request held by `user`.
    fn release_all(&mut self, user: ClockUser);
}

/// Tracks which user holds which clock.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClockLedger {
    hfrc: u8,
    hfrc2: u8,
}

impl ClockLedger {
    pub const fn new() -> Self {
        Self { hfrc: 0, hfrc2: 0 }
    }

    fn slot(&mut self, clock: ClockId) -> &mut u8 {
        match clock {
            ClockId::Hfrc => &mut self.hfrc,
            ClockId::Hfrc2 => &mut self.hfrc2,
        }
    }

    pub fn is_requested(&self, clock: ClockId) -> bool {
        match clock {
            ClockId::Hfrc => self.hfrc != 0,
            ClockId::Hfrc2 => self.hfrc2 != 0,
        }
    }

    pub fn holds(&self, clock: ClockId, user: ClockUser) -> bool {
        let users = match clock {
            ClockId::Hfrc => self.hfrc,
            ClockId::Hfrc2 => self.hfrc2,
        };
        users & user_bit(user) != 0
    }
}

const fn user_bit(user: ClockUser) -> u8 {
    match user {
        ClockUser::Gfx => 1 << 0,
        ClockUser::Crypto => 1 << 1,
    }
}

impl ClockManager for ClockLedger {
    fn request(&mut self, clock: ClockId, user: ClockUser) {
        debug!("clock request {} by {}", clock, user);
        *self.slot(clock) |= user_bit(user);
    }

    fn release(&mut self, clock: ClockId, user: ClockUser) {
        debug!("clock release {} by {}", clock, user);
        *self.slot(clock) &= !user_bit(user);
    }

    fn release_all(&mut self, user: ClockUser) {
        self.release(ClockId::Hfrc, user);
        self.release(ClockId::Hfrc2, user);
    }
}

impl<T: ClockManager + ?Sized> ClockManager for &mut T {
    fn request(&mut self, clock: ClockId, user: ClockUser) {
        (**self).request(clock, user)
    }

    fn release(&mut self, clock: ClockId, user: ClockUser) {
        (**self).release(clock, user)
    }

    fn release_all(&mut self, user: ClockUser) {
        (**self).release_all(user)
    }
}
