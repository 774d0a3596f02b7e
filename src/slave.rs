use log::{debug, trace, warn};

use crate::{
    block::{Storage, UpdateCallback},
    config::SlaveConfig,
    dispatch::{Disposition, handle_frame},
    error::{Error, Result},
    line::{RxStatus, SerialLine},
    registry::Registry,
    session::{Phase, Session},
    timing::{CharTimings, FramingTimer, Gap},
    types::DataKind,
};

/// You can create an RtuSlave using any line implementing [SerialLine] and any countdown
/// implementing [FramingTimer].
///
/// The `on_*` methods are the asynchronous side and belong in the UART and timer interrupt
/// handlers. None of them block: anything that has to wait arms the timer and returns.
/// [`RtuSlave::service_blocks`] is the application side and belongs in the main loop.
pub struct RtuSlave<'a, L: SerialLine, T: FramingTimer, const N: usize = 8> {
    config: SlaveConfig,
    /// Derived once from the baud rate.
    timings: CharTimings,
    line: L,
    timer: T,
    registry: Registry<'a, N>,
    session: Session,
}

impl<'a, L: SerialLine, T: FramingTimer, const N: usize> RtuSlave<'a, L, T, N> {
    /// Create a new slave. Nothing happens on the line until [`RtuSlave::start`] is called.
    pub fn new(config: SlaveConfig, line: L, timer: T, registry: Registry<'a, N>) -> Self {
        Self {
            timings: CharTimings::from_baud(config.baud_rate()),
            config,
            line,
            timer,
            registry,
            session: Session::new(),
        }
    }

    /// Register a data table, see [`Registry::register`].
    pub fn register(
        &mut self,
        kind: DataKind,
        owner_address: u8,
        base_address: u16,
        count: u16,
        storage: Storage<'a>,
        on_update: Option<UpdateCallback<'a>>,
    ) -> Result<(), L::Error> {
        self.registry
            .register(kind, owner_address, base_address, count, storage, on_update)?;
        Ok(())
    }

    /// Enable reception and wait out a silent interval in case the bus is already busy.
    pub fn start(&mut self) {
        self.restart_rx();
    }

    /// The framing timer ran out.
    pub fn on_timer_expired(&mut self) -> Result<(), L::Error> {
        self.timer.stop();
        self.session.line_silent = true;

        match self.session.phase {
            Phase::Transmitting => {
                // The last byte has left the shift register.
                if self.session.all_sent() {
                    self.restart_rx();
                }
                return Ok(());
            }
            Phase::AddressReceived | Phase::InterCharWait => {
                self.set_phase(Phase::InterFrameCheck);
            }
            Phase::InterFrameConfirmed => {
                self.set_phase(Phase::FrameReady);
            }
            Phase::Idle | Phase::InterFrameCheck | Phase::FrameReady => {}
        }
        self.advance()
    }

    /// A byte arrived together with the UART's receive status.
    pub fn on_byte_received(&mut self, byte: u8, status: RxStatus) {
        if status.is_fault() {
            warn!("Line fault {:?}, restarting reception", status);
            self.restart_rx();
            return;
        }

        let in_frame = match self.session.phase {
            Phase::Idle => self.session.line_silent,
            Phase::AddressReceived | Phase::InterCharWait => true,
            Phase::InterFrameCheck | Phase::InterFrameConfirmed => false,
            // The receiver is off while answering.
            Phase::FrameReady | Phase::Transmitting => return,
        };
        if !in_frame || self.session.frame.is_full() {
            if self.session.frame.is_full() {
                warn!("Receive buffer overflow, dropping frame");
            } else {
                debug!("Byte inside a frame gap, waiting for silence");
            }
            self.session.discard_frame();
            self.arm_timer();
            return;
        }

        if self.session.phase == Phase::Idle {
            self.set_phase(Phase::AddressReceived);
        } else {
            self.session.phase = Phase::InterCharWait;
        }
        self.session.line_silent = false;
        if self.session.frame.push(byte).is_err() {
            self.session.discard_frame();
        }
        self.arm_timer();
    }

    /// The transmitter can take another byte.
    pub fn on_transmit_ready(&mut self) -> Result<(), L::Error> {
        if self.session.phase != Phase::Transmitting {
            return Ok(());
        }
        if self.session.all_sent() {
            // Let the final byte drain before turning the line around.
            self.arm_timer();
            self.line.set_transmit_events(false);
            return Ok(());
        }
        self.send_next()
    }

    /// Deliver update callbacks for blocks the master changed since the last pass.
    ///
    /// Call this once per main loop iteration, never from an interrupt handler.
    pub fn service_blocks(&mut self) {
        self.registry.service_all();
    }

    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    pub fn timings(&self) -> &CharTimings {
        &self.timings
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn registry(&self) -> &Registry<'a, N> {
        &self.registry
    }

    /// For the collaborators producing input data. Writes through here don't mark blocks dirty.
    pub fn registry_mut(&mut self) -> &mut Registry<'a, N> {
        &mut self.registry
    }

    pub fn line(&self) -> &L {
        &self.line
    }

    pub fn line_mut(&mut self) -> &mut L {
        &mut self.line
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    fn set_phase(&mut self, phase: Phase) {
        trace!("{:?} -> {:?}", self.session.phase, phase);
        self.session.phase = phase;
    }

    /// Arm the timer with the gap matching the current phase.
    fn arm_timer(&mut self) {
        let gap = Gap::for_phase(self.session.phase);
        self.timer.start(self.timings.duration(gap));
    }

    /// Clear the partial frame and any line errors, then wait out a silent interval.
    fn restart_rx(&mut self) {
        self.line.set_transmit_events(false);
        self.line.disable_transmitter();
        self.set_phase(Phase::Idle);
        self.session.reset();
        self.line.enable_receiver();
        self.arm_timer();
    }

    fn advance(&mut self) -> Result<(), L::Error> {
        if self.session.phase == Phase::InterFrameCheck {
            // Inter-character gap is over, check the rest of the 3.5 character gap.
            self.set_phase(Phase::InterFrameConfirmed);
            self.arm_timer();
        }
        if self.session.phase != Phase::FrameReady {
            return Ok(());
        }

        let disposition = handle_frame(
            &mut self.registry,
            self.config.slave_address(),
            &self.session.frame,
            &mut self.session.response,
        );
        match disposition {
            Disposition::Replied(_) => self.begin_transmission(),
            Disposition::Ignored | Disposition::ChecksumMismatch => {
                // The line is known to be silent, so the next byte may start a frame.
                self.session.frame.clear();
                self.set_phase(Phase::Idle);
                Ok(())
            }
        }
    }

    /// Turn the line around and push out the first two bytes of the response.
    fn begin_transmission(&mut self) -> Result<(), L::Error> {
        if !self.session.line_silent {
            self.restart_rx();
            return Ok(());
        }
        self.line.disable_receiver();
        self.line.enable_transmitter();
        self.set_phase(Phase::Transmitting);
        self.session.tx_index = 0;

        // Address, then function code so the transmit path is primed before events resume.
        self.send_next()?;
        self.send_next()?;
        self.line.set_transmit_events(true);
        Ok(())
    }

    fn send_next(&mut self) -> Result<(), L::Error> {
        let Some(byte) = self.session.next_tx_byte() else {
            return Ok(());
        };
        if let Err(err) = self.line.write_all(&[byte]) {
            warn!("Transmit failed, abandoning response");
            self.restart_rx();
            return Err(Error::SerialError(err));
        }
        Ok(())
    }
}
