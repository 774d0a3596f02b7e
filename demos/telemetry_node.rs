use std::{
    env,
    time::{Duration, Instant},
};

use fugit::MicrosDurationU32;
use inquire::Select;
use log::{error, info, warn};
use rtu_slave::{
    block::{Block, Storage},
    config::{BaudRate, CharFormat, Parity, SlaveConfig, StopBits},
    error::Error,
    line::{RxStatus, SerialLine},
    registry::Registry,
    slave::RtuSlave,
    timing::FramingTimer,
    types::DataKind,
};
use serialport::{ClearBuffer, SerialPort};

// Configuration constants - adjust these for your setup
const BAUD_RATE: BaudRate = BaudRate::_9600;
const SLAVE_ADDRESS: u8 = 0x01;
// 8N1, as the DAQ node ships.
const CHAR_FORMAT: CharFormat = CharFormat {
    stop_bits: StopBits::One,
    parity: Parity::None,
};
// Short enough to keep the framing timer honest at 9600 baud.
const POLL_TIMEOUT_MS: u64 = 1;
const TELEMETRY_PERIOD_MS: u64 = 100;

const STATUS_INPUTS: u16 = 8;
const TEMPERATURE_CHANNELS: usize = 12;
/// Temperature word pairs, then internal temperature, pressure and battery.
const INPUT_REGISTERS: usize = TEMPERATURE_CHANNELS * 2 + 3;
const SETPOINTS: usize = 4;

type NodeSlave<'a> = RtuSlave<'a, HostLine, HostTimer>;

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

/// A host serial port behind a USB RS-485 adapter, RTS drives the transceiver direction.
pub struct HostLine {
    port: Box<dyn SerialPort>,
    receiving: bool,
    transmit_events: bool,
}

impl HostLine {
    fn new(port: Box<dyn SerialPort>) -> Self {
        Self {
            port,
            receiving: false,
            transmit_events: false,
        }
    }

    /// Wait up to the port timeout for one byte.
    fn poll_byte(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        match std::io::Read::read(&mut self.port, &mut byte) {
            Ok(1) if self.receiving => Some(byte[0]),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => None,
            Err(e) => {
                warn!("Serial read failed: {}", e);
                None
            }
        }
    }

    fn transmit_events(&self) -> bool {
        self.transmit_events
    }
}

impl embedded_io::ErrorType for HostLine {
    type Error = IoError;
}

impl embedded_io::Write for HostLine {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.port, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.port).map_err(IoError)
    }
}

impl SerialLine for HostLine {
    fn enable_receiver(&mut self) {
        if let Err(e) = self.port.clear(ClearBuffer::Input) {
            warn!("Could not clear receive buffer: {}", e);
        }
        self.receiving = true;
    }

    fn disable_receiver(&mut self) {
        self.receiving = false;
    }

    fn enable_transmitter(&mut self) {
        if let Err(e) = self.port.write_request_to_send(true) {
            warn!("Could not raise RTS: {}", e);
        }
    }

    fn disable_transmitter(&mut self) {
        // Wait for the OS to drain its buffer before releasing the bus.
        if let Err(e) = std::io::Write::flush(&mut self.port) {
            warn!("Could not drain transmit buffer: {}", e);
        }
        if let Err(e) = self.port.write_request_to_send(false) {
            warn!("Could not drop RTS: {}", e);
        }
    }

    fn set_transmit_events(&mut self, enabled: bool) {
        self.transmit_events = enabled;
    }
}

/// One-shot framing timer polled from the main loop.
#[derive(Default)]
pub struct HostTimer {
    deadline: Option<Instant>,
}

impl HostTimer {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl FramingTimer for HostTimer {
    fn start(&mut self, timeout: MicrosDurationU32) {
        self.deadline = Some(Instant::now() + Duration::from_micros(timeout.to_micros().into()));
    }

    fn stop(&mut self) {
        self.deadline = None;
    }
}

/// Simulated acquisition pass, a real node would sample its ADCs here.
fn sample_telemetry(tick: u32, words: &mut [u16]) {
    let wobble = (tick % 50) as f32 * 0.1;
    for channel in 0..TEMPERATURE_CHANNELS {
        let bits = (20.0 + channel as f32 * 0.5 + wobble).to_bits();
        words[channel * 2] = (bits >> 16) as u16;
        words[channel * 2 + 1] = bits as u16;
    }

    let raw = &mut words[TEMPERATURE_CHANNELS * 2..];
    raw[0] = 512 + (tick % 16) as u16; // internal temperature
    raw[1] = 3100 - (tick % 32) as u16; // pressure
    raw[2] = 3900 - (tick / 600 % 100) as u16; // battery
}

/// Heartbeat on input 1, every other input mirrors a bit of the tick.
fn sample_status(tick: u32) -> u8 {
    (tick as u8 & 0xFE) | (tick % 2) as u8
}

fn publish(slave: &mut NodeSlave<'_>, tick: u32) {
    let registry = slave.registry_mut();
    if let Some(block) =
        registry.find_covering_mut(DataKind::InputRegisters, 1, INPUT_REGISTERS as u16)
    {
        if let Storage::Words(words) = block.storage_mut() {
            sample_telemetry(tick, words);
        }
    }
    if let Some(block) = registry.find_covering_mut(DataKind::DiscreteInputs, 1, STATUS_INPUTS) {
        if let Storage::Bits(bits) = block.storage_mut() {
            bits[0] = sample_status(tick);
        }
    }
}

/// Open the port with the slave's line settings.
fn open_port(port_name: &str, config: &SlaveConfig) -> Result<Box<dyn SerialPort>, IoError> {
    let format = config.char_format();
    serialport::new(port_name, config.baud_rate().bps())
        .data_bits(serialport::DataBits::Eight)
        .stop_bits(match format.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        })
        .parity(match format.parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        })
        .timeout(Duration::from_millis(POLL_TIMEOUT_MS))
        .open()
        .map_err(|e| IoError(e.into()))
}

fn run(port_name: &str) -> Result<(), Error<IoError>> {
    let mut status = [0u8; 1];
    let mut inputs = [0u16; INPUT_REGISTERS];
    let mut setpoints = [0u16; SETPOINTS];
    let mut on_setpoints = |block: &Block<'_>| {
        if let Storage::Words(words) = block.storage() {
            info!("Setpoints updated: {:?}", words);
        }
    };

    let config = SlaveConfig::new(SLAVE_ADDRESS, BAUD_RATE)?.with_char_format(CHAR_FORMAT);
    let port = open_port(port_name, &config).map_err(Error::SerialError)?;
    let mut slave: NodeSlave<'_> =
        RtuSlave::new(config, HostLine::new(port), HostTimer::default(), Registry::new());
    slave.register(
        DataKind::DiscreteInputs,
        SLAVE_ADDRESS,
        1,
        STATUS_INPUTS,
        Storage::Bits(&mut status),
        None,
    )?;
    slave.register(
        DataKind::InputRegisters,
        SLAVE_ADDRESS,
        1,
        INPUT_REGISTERS as u16,
        Storage::Words(&mut inputs),
        None,
    )?;
    slave.register(
        DataKind::HoldingRegisters,
        SLAVE_ADDRESS,
        1,
        SETPOINTS as u16,
        Storage::Words(&mut setpoints),
        Some(&mut on_setpoints),
    )?;

    info!(
        "Slave {} listening at {} baud, {:?}",
        slave.config().slave_address(),
        u32::from(slave.config().baud_rate()),
        slave.config().char_format()
    );
    slave.start();

    let period = Duration::from_millis(TELEMETRY_PERIOD_MS);
    let mut last_sample = Instant::now();
    let mut tick = 0u32;
    loop {
        if let Some(byte) = slave.line_mut().poll_byte() {
            // The host driver doesn't report per-byte parity or framing errors.
            slave.on_byte_received(byte, RxStatus::clean());
        }
        if slave.timer().expired() {
            if let Err(e) = slave.on_timer_expired() {
                error!("Response abandoned: {:?}", e);
            }
        }
        if slave.line().transmit_events() {
            if let Err(e) = slave.on_transmit_ready() {
                error!("Response abandoned: {:?}", e);
            }
        }

        slave.service_blocks();

        if last_sample.elapsed() >= period {
            tick = tick.wrapping_add(1);
            publish(&mut slave, tick);
            last_sample = Instant::now();
        }
    }
}

fn main() {
    env_logger::init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select a serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    if let Err(e) = run(&port_name) {
        eprintln!("Slave stopped: {}", e);
        std::process::exit(1);
    }
}
