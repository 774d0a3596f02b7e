//! Serial link configuration for the slave.

use strum_macros::EnumIter;

use crate::error::ConfigError;

/// Lowest and highest unicast addresses a slave may answer to.
pub const MIN_SLAVE_ADDRESS: u8 = 1;
pub const MAX_SLAVE_ADDRESS: u8 = 247;

/// All baud rates supported by the node.
#[derive(Debug, EnumIter, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaudRate {
    _1200,
    _2400,
    _4800,
    /// This is the default node baud rate.
    #[default]
    _9600,
    _19200,
    _38400,
    _57600,
    _115200,
}

impl BaudRate {
    /// Bits per second.
    pub const fn bps(&self) -> u32 {
        match self {
            BaudRate::_1200 => 1200,
            BaudRate::_2400 => 2400,
            BaudRate::_4800 => 4800,
            BaudRate::_9600 => 9600,
            BaudRate::_19200 => 19200,
            BaudRate::_38400 => 38400,
            BaudRate::_57600 => 57600,
            BaudRate::_115200 => 115200,
        }
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1200 => Ok(BaudRate::_1200),
            2400 => Ok(BaudRate::_2400),
            4800 => Ok(BaudRate::_4800),
            9600 => Ok(BaudRate::_9600),
            19200 => Ok(BaudRate::_19200),
            38400 => Ok(BaudRate::_38400),
            57600 => Ok(BaudRate::_57600),
            115200 => Ok(BaudRate::_115200),
            other => Err(ConfigError::UnsupportedBaudRate(other)),
        }
    }
}

impl From<BaudRate> for u32 {
    fn from(value: BaudRate) -> Self {
        value.bps()
    }
}

/// Stop bits after each character.
#[derive(Debug, EnumIter, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    /// Sent as a ninth, always set, data bit on UARTs without a native second stop bit.
    Two,
}

#[derive(Debug, EnumIter, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Character format on the line. Data bits are always 8.
///
/// Gap timing always assumes 11 bit-times per character, whatever the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharFormat {
    pub stop_bits: StopBits,
    pub parity: Parity,
}

/// Settings fixed for the lifetime of a slave session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Frames whose address byte differs from this are ignored.
    slave_address: u8,
    baud_rate: BaudRate,
    char_format: CharFormat,
}

impl SlaveConfig {
    pub fn new(slave_address: u8, baud_rate: BaudRate) -> Result<Self, ConfigError> {
        if !(MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&slave_address) {
            return Err(ConfigError::InvalidSlaveAddress(slave_address));
        }
        Ok(Self {
            slave_address,
            baud_rate,
            char_format: CharFormat::default(),
        })
    }

    /// Use a character format other than the default 8N1.
    pub fn with_char_format(mut self, char_format: CharFormat) -> Self {
        self.char_format = char_format;
        self
    }

    pub fn slave_address(&self) -> u8 {
        self.slave_address
    }

    pub fn baud_rate(&self) -> BaudRate {
        self.baud_rate
    }

    pub fn char_format(&self) -> CharFormat {
        self.char_format
    }
}

/// Address 1 at 9600 baud, 8N1.
impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            slave_address: MIN_SLAVE_ADDRESS,
            baud_rate: BaudRate::default(),
            char_format: CharFormat::default(),
        }
    }
}
