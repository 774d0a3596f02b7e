//! We use this mocking module in unit tests to emulate the UART and the framing timer.

use fugit::MicrosDurationU32;

use crate::{line::SerialLine, timing::FramingTimer};

/// Our mock type used to emulate a half-duplex serial line.
pub struct MockSerial {
    /// Buffer to store bytes handed to the transmitter
    write_buffer: heapless::Vec<u8, 512>,
    /// Receiver currently enabled
    receiver_enabled: bool,
    /// Transmitter currently driving the bus
    transmitter_enabled: bool,
    /// Transmit-ready events enabled
    transmit_events: bool,
    /// How many times reception was (re)started
    receiver_restarts: usize,
    /// Flag to simulate write errors
    should_error_on_write: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MockSerialError {
    /// Simulated buffer overflow
    #[error("Mock write buffer overflow")]
    BufferOverflow,
    /// Generic simulated error for testing
    #[error("Simulated serial error")]
    SimulatedError,
}

impl embedded_io::Error for MockSerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            MockSerialError::BufferOverflow => embedded_io::ErrorKind::OutOfMemory,
            MockSerialError::SimulatedError => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for MockSerial {
    type Error = MockSerialError;
}

impl embedded_io::Write for MockSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }

        self.write_buffer
            .extend_from_slice(buf)
            .map_err(|_| MockSerialError::BufferOverflow)?;

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if self.should_error_on_write {
            return Err(MockSerialError::SimulatedError);
        }
        Ok(())
    }
}

impl SerialLine for MockSerial {
    fn enable_receiver(&mut self) {
        self.receiver_enabled = true;
        self.receiver_restarts += 1;
    }

    fn disable_receiver(&mut self) {
        self.receiver_enabled = false;
    }

    fn enable_transmitter(&mut self) {
        self.transmitter_enabled = true;
    }

    fn disable_transmitter(&mut self) {
        self.transmitter_enabled = false;
    }

    fn set_transmit_events(&mut self, enabled: bool) {
        self.transmit_events = enabled;
    }
}

impl MockSerial {
    /// Create a new MockSerial instance with an idle line
    pub fn new() -> Self {
        Self {
            write_buffer: heapless::Vec::new(),
            receiver_enabled: false,
            transmitter_enabled: false,
            transmit_events: false,
            receiver_restarts: 0,
            should_error_on_write: false,
        }
    }

    /// Get a reference to the data that was transmitted
    pub fn written_data(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Clear the write buffer
    pub fn clear_written_data(&mut self) {
        self.write_buffer.clear();
    }

    /// Configure whether write operations should fail with an error
    pub fn set_write_error(&mut self, should_error: bool) {
        self.should_error_on_write = should_error;
    }

    pub fn receiver_enabled(&self) -> bool {
        self.receiver_enabled
    }

    pub fn transmitter_enabled(&self) -> bool {
        self.transmitter_enabled
    }

    pub fn transmit_events(&self) -> bool {
        self.transmit_events
    }

    pub fn receiver_restarts(&self) -> usize {
        self.receiver_restarts
    }
}

/// Our mock framing timer, it only remembers how it was armed.
pub struct MockTimer {
    /// Duration of the running countdown, `None` when stopped
    armed: Option<MicrosDurationU32>,
    /// How many times the timer was started
    starts: usize,
}

impl FramingTimer for MockTimer {
    fn start(&mut self, timeout: MicrosDurationU32) {
        self.armed = Some(timeout);
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.armed = None;
    }
}

impl MockTimer {
    pub fn new() -> Self {
        Self {
            armed: None,
            starts: 0,
        }
    }

    pub fn armed(&self) -> Option<MicrosDurationU32> {
        self.armed
    }

    pub fn starts(&self) -> usize {
        self.starts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_io::{Error, Write};

    #[test]
    fn test_new_mock_serial() {
        let mock = MockSerial::new();
        assert_eq!(mock.written_data().len(), 0);
        assert!(!mock.receiver_enabled());
        assert!(!mock.transmitter_enabled());
        assert!(!mock.transmit_events());
        assert_eq!(mock.should_error_on_write, false);
    }

    #[test]
    fn test_write_multiple_times() {
        let mut mock = MockSerial::new();
        mock.write_all(&[0x01]).unwrap();
        mock.write_all(&[0x03, 0x02]).unwrap();

        assert_eq!(mock.written_data(), &[0x01, 0x03, 0x02]);

        mock.clear_written_data();
        assert!(mock.written_data().is_empty());
    }

    #[test]
    fn test_write_buffer_overflow() {
        let mut mock = MockSerial::new();
        let large_data = [0u8; 600]; // Larger than 512 byte capacity

        let result = mock.write(&large_data);
        assert!(matches!(result.unwrap_err(), MockSerialError::BufferOverflow));
    }

    #[test]
    fn test_write_error_simulation() {
        let mut mock = MockSerial::new();
        mock.set_write_error(true);

        assert!(matches!(
            mock.write(b"test").unwrap_err(),
            MockSerialError::SimulatedError
        ));
        assert!(mock.flush().is_err());
        assert_eq!(mock.written_data().len(), 0); // Nothing should be written

        mock.set_write_error(false);
        assert!(mock.write(b"test").is_ok());
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            MockSerialError::BufferOverflow.kind(),
            embedded_io::ErrorKind::OutOfMemory
        ));
        assert!(matches!(
            MockSerialError::SimulatedError.kind(),
            embedded_io::ErrorKind::Other
        ));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            MockSerialError::SimulatedError.to_string(),
            "Simulated serial error"
        );
        let err: &dyn core::error::Error = &MockSerialError::BufferOverflow;
        assert_eq!(err.to_string(), "Mock write buffer overflow");
    }

    #[test]
    fn test_line_control() {
        let mut mock = MockSerial::new();
        mock.enable_receiver();
        mock.enable_receiver();
        assert!(mock.receiver_enabled());
        assert_eq!(mock.receiver_restarts(), 2);

        mock.disable_receiver();
        mock.enable_transmitter();
        mock.set_transmit_events(true);
        assert!(!mock.receiver_enabled());
        assert!(mock.transmitter_enabled());
        assert!(mock.transmit_events());
    }

    #[test]
    fn test_timer() {
        let mut timer = MockTimer::new();
        assert_eq!(timer.armed(), None);

        timer.start(MicrosDurationU32::micros(2291));
        timer.start(MicrosDurationU32::micros(5154));
        assert_eq!(timer.armed(), Some(MicrosDurationU32::micros(5154)));
        assert_eq!(timer.starts(), 2);

        timer.stop();
        assert_eq!(timer.armed(), None);
    }
}
