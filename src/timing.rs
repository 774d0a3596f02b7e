//! The framing timer and the character gaps it measures.
//!
//! RTU has no frame delimiters, so frame boundaries are inferred from how long the line stays
//! quiet. A single countdown timer is re-armed with one of four thresholds depending on the
//! framing phase:
//! * 1 character - last response byte draining out of the transmitter.
//! * 2 characters - remainder of the inter-frame gap after the inter-character gap passed.
//! * 2.5 characters - inter-character gap while a frame is arriving.
//! * 4.5 characters - silent interval before a new frame is accepted.

use fugit::MicrosDurationU32;

use crate::{config::BaudRate, session::Phase};

/// Bit-times in one RTU character: start, 8 data, parity or second stop, stop.
pub const BITS_PER_CHAR: u32 = 11;

/// Countdown timer used to detect frame boundaries.
///
/// Implementations fire the slave's `on_timer_expired` once the armed duration has elapsed.
/// Starting the timer while it is running re-arms it.
pub trait FramingTimer {
    fn start(&mut self, timeout: MicrosDurationU32);
    fn stop(&mut self);
}

/// Which threshold the timer gets armed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gap {
    OneChar,
    TwoChars,
    /// 2.5 characters.
    InterChar,
    /// 4.5 characters.
    Silent,
}

impl Gap {
    /// Pick the threshold the next arm should use for the given framing phase.
    pub const fn for_phase(phase: Phase) -> Self {
        match phase {
            Phase::AddressReceived | Phase::InterCharWait => Gap::InterChar,
            Phase::InterFrameCheck | Phase::InterFrameConfirmed => Gap::TwoChars,
            Phase::Transmitting => Gap::OneChar,
            Phase::Idle | Phase::FrameReady => Gap::Silent,
        }
    }
}

/// Gap durations derived once from the baud rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharTimings {
    one_char: MicrosDurationU32,
    two_chars: MicrosDurationU32,
    inter_char: MicrosDurationU32,
    silent: MicrosDurationU32,
}

impl CharTimings {
    pub const fn from_baud(baud_rate: BaudRate) -> Self {
        // Everything is scaled from the two character time, like a timer preset would be.
        let two = 2 * BITS_PER_CHAR * 1_000_000 / baud_rate.bps();
        Self {
            one_char: MicrosDurationU32::micros(two >> 1),
            two_chars: MicrosDurationU32::micros(two),
            inter_char: MicrosDurationU32::micros((two * 5) >> 2),
            silent: MicrosDurationU32::micros((two * 9) >> 2),
        }
    }

    pub const fn duration(&self, gap: Gap) -> MicrosDurationU32 {
        match gap {
            Gap::OneChar => self.one_char,
            Gap::TwoChars => self.two_chars,
            Gap::InterChar => self.inter_char,
            Gap::Silent => self.silent,
        }
    }
}

impl Default for CharTimings {
    fn default() -> Self {
        Self::from_baud(BaudRate::default())
    }
}
