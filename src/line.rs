//! The half-duplex serial line the slave talks over.

use modular_bitfield::prelude::*;

/// A UART (plus RS-485 driver) the slave can turn around between receiving and transmitting.
///
/// Response bytes go out through [embedded_io::Write], one byte per transmit-ready event, so
/// `write` should hand the byte to the transmit register and return without waiting for it to
/// leave the shift register.
pub trait SerialLine: embedded_io::Write {
    /// Flush the receive FIFO, clear overrun/framing errors and enable receive events.
    fn enable_receiver(&mut self);
    fn disable_receiver(&mut self);
    /// Enable the transmitter and drive the bus.
    fn enable_transmitter(&mut self);
    /// Release the bus.
    fn disable_transmitter(&mut self);
    /// Turn transmit-ready events on or off.
    fn set_transmit_events(&mut self, enabled: bool);
}

/// Receive status latched by the UART alongside each received byte.
#[bitfield]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxStatus {
    pub parity_error: bool,
    pub overrun: bool,
    pub framing_error: bool,
    #[skip]
    __: B5,
}

impl RxStatus {
    /// Status for a byte received without any fault.
    pub fn clean() -> Self {
        Self::new()
    }

    /// Any fault means the byte, and whatever frame it belonged to, can't be trusted.
    pub fn is_fault(&self) -> bool {
        self.parity_error() || self.overrun() || self.framing_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_status_has_no_fault() {
        let status = RxStatus::clean();
        assert!(!status.is_fault());
        assert_eq!(status.into_bytes(), [0x00]);
    }

    #[test]
    fn fault_flags() {
        assert!(RxStatus::new().with_overrun(true).is_fault());
        assert!(RxStatus::new().with_framing_error(true).is_fault());
        assert!(RxStatus::new().with_parity_error(true).is_fault());

        // Bit layout matches the status byte: parity, overrun, framing from bit 0 up.
        let status = RxStatus::from_bytes([0b0000_0100]);
        assert!(status.framing_error());
        assert!(!status.overrun());
    }
}
