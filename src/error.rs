//! Our error types for the RTU slave.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Errors surfaced by the slave to the code driving it.
///
/// Line faults and checksum mismatches never show up here, the state machine recovers
/// from those by restarting reception.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Block registration failed: {0}")]
    Registration(RegistrationError),
    #[error("Invalid configuration: {0}")]
    Config(ConfigError),
}

impl<I: embedded_io::Error> From<RegistrationError> for Error<I> {
    fn from(err: RegistrationError) -> Self {
        Error::Registration(err)
    }
}

impl<I: embedded_io::Error> From<ConfigError> for Error<I> {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

/// A data table could not be registered. Firmware must not carry on with a broken table.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Invalid block argument")]
    InvalidArgument,
    #[error("Address range overlaps an existing block")]
    OverlappingRange,
    #[error("No room left in the block table")]
    CapacityExceeded,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Slave address {0} outside 1-247")]
    InvalidSlaveAddress(u8),
    #[error("Unsupported baud rate {0}")]
    UnsupportedBaudRate(u32),
}
