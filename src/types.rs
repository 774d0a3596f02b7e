//! This module contains the Modbus data table kinds, function codes and exception codes.

use strum_macros::{EnumCount, EnumIter, FromRepr};
use thiserror::Error;

/// Set on the function code of a reply to flag an exception response.
pub const EXCEPTION_FLAG: u8 = 0x80;

/// The four Modbus data tables a block can back.
#[derive(Debug, EnumIter, EnumCount, FromRepr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum DataKind {
    /// Read/write single bits.
    Coils = 1,
    /// Read-only single bits.
    DiscreteInputs = 2,
    /// Read/write 16 bit registers.
    HoldingRegisters = 3,
    /// Read-only 16 bit registers.
    InputRegisters = 4,
}

impl DataKind {
    /// Order in which tables are visited by the service loop.
    pub const SERVICE_ORDER: [DataKind; 4] = [
        DataKind::HoldingRegisters,
        DataKind::DiscreteInputs,
        DataKind::InputRegisters,
        DataKind::Coils,
    ];

    /// Bit tables are stored packed eight items per byte, register tables one item per word.
    pub const fn is_bits(&self) -> bool {
        matches!(self, DataKind::Coils | DataKind::DiscreteInputs)
    }
}

/// Function codes understood by the slave.
#[derive(Debug, EnumIter, FromRepr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum FunctionCode {
    /// FC-01
    ReadCoils = 0x01,
    /// FC-02
    ReadDiscreteInputs = 0x02,
    /// FC-03
    ReadHoldingRegisters = 0x03,
    /// FC-04
    ReadInputRegisters = 0x04,
    /// FC-05, value field must be `0xFF00` (on) or `0x0000` (off).
    ForceSingleCoil = 0x05,
    /// FC-06
    PresetSingleRegister = 0x06,
    /// FC-15
    ForceMultipleCoils = 0x0F,
    /// FC-16
    PresetMultipleRegisters = 0x10,
}

impl FunctionCode {
    /// The data table this function operates on.
    pub const fn kind(&self) -> DataKind {
        use FunctionCode as FC;
        match self {
            FC::ReadCoils | FC::ForceSingleCoil | FC::ForceMultipleCoils => DataKind::Coils,
            FC::ReadDiscreteInputs => DataKind::DiscreteInputs,
            FC::ReadHoldingRegisters | FC::PresetSingleRegister | FC::PresetMultipleRegisters => {
                DataKind::HoldingRegisters
            }
            FC::ReadInputRegisters => DataKind::InputRegisters,
        }
    }

    /// Single item writes carry a value where the other functions carry a quantity.
    pub const fn is_single_write(&self) -> bool {
        matches!(
            self,
            FunctionCode::ForceSingleCoil | FunctionCode::PresetSingleRegister
        )
    }
}

impl From<FunctionCode> for u8 {
    fn from(value: FunctionCode) -> Self {
        value as u8
    }
}

/// Exception codes reported back to the master.
#[derive(Error, Debug, EnumIter, FromRepr, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum Exception {
    #[error("Illegal function")]
    IllegalFunction = 0x01,
    #[error("Illegal data address")]
    IllegalDataAddress = 0x02,
    #[error("Illegal data value")]
    IllegalDataValue = 0x03,
}

impl From<Exception> for u8 {
    fn from(value: Exception) -> Self {
        value as u8
    }
}
