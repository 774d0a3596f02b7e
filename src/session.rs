//! Per-frame protocol state owned by the slave's event handlers.

/// Longest RTU frame, address through CRC.
pub const MAX_FRAME_LENGTH: usize = 256;

pub type FrameBuffer = heapless::Vec<u8, MAX_FRAME_LENGTH>;

/// Where the slave is in receiving, validating or answering a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No partial frame. Bytes are only taken once the silent interval has passed.
    #[default]
    Idle,
    /// First byte of a new frame buffered, inter-character gap armed.
    AddressReceived,
    /// Further byte buffered, inter-character gap armed.
    InterCharWait,
    /// Inter-character gap passed, the rest of the inter-frame gap is still to be checked.
    InterFrameCheck,
    /// Waiting out the rest of the inter-frame gap. A byte now breaks the frame.
    InterFrameConfirmed,
    /// A whole frame with silence before and after it. Only here does the dispatcher run.
    FrameReady,
    /// Response going out byte by byte.
    Transmitting,
}

/// Reset at the start of every frame attempt, nothing survives from one frame to the next.
#[derive(Debug, Default)]
pub struct Session {
    pub(crate) phase: Phase,
    /// Set by every timer expiry, cleared by every received byte. Transmission only starts
    /// once the line has been seen silent.
    pub(crate) line_silent: bool,
    pub(crate) frame: FrameBuffer,
    pub(crate) response: FrameBuffer,
    /// Next response byte to send.
    pub(crate) tx_index: usize,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything for a fresh frame attempt. The line is not yet known to be silent.
    pub(crate) fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.line_silent = false;
        self.frame.clear();
        self.response.clear();
        self.tx_index = 0;
    }

    /// Discard a partial frame after a gap violation or overflow.
    pub(crate) fn discard_frame(&mut self) {
        self.phase = Phase::Idle;
        self.line_silent = false;
        self.frame.clear();
    }

    /// Take the next response byte, advancing the transmit index.
    pub(crate) fn next_tx_byte(&mut self) -> Option<u8> {
        let byte = self.response.get(self.tx_index).copied()?;
        self.tx_index += 1;
        Some(byte)
    }

    pub(crate) fn all_sent(&self) -> bool {
        self.tx_index >= self.response.len()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Bytes of the frame received so far.
    pub fn frame(&self) -> &[u8] {
        &self.frame
    }
}
