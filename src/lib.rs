//! This crate provides an interrupt driven Modbus RTU slave for data-acquisition nodes.
//!
//! It supports `no-std` environments by use of the `no_std` feature flag.
//!
//! The slave frames requests purely by line silence, so it needs two things from the platform:
//! * A half-duplex UART (plus RS-485 driver), see [line::SerialLine].
//! * A one-shot countdown for the character gaps, see [timing::FramingTimer].
//!
//! Supported function codes:
//! * 0x01 Read Coil Status
//! * 0x02 Read Input Status
//! * 0x03 Read Holding Registers
//! * 0x04 Read Input Registers
//! * 0x05 Force Single Coil
//! * 0x06 Preset Single Register
//! * 0x0F Force Multiple Coils
//! * 0x10 Preset Multiple Registers
//!
//! The serial port should be configured like so:
//! * Default baud rate: 9600
//! * Data bits: 8
//! * Stop bits: 1 (or 2, see [config::CharFormat])
//! * Parity: None (or even/odd, see [config::CharFormat])
//!
//! Frame gaps are timed at 11 bit-times per character regardless of the format.
//!
//! Data lives in caller-owned buffers registered as blocks, see [registry::Registry]. Blocks
//! are numbered from 1 while addresses on the wire start at 0.

#![cfg_attr(feature = "no_std", no_std)]

pub mod block;
pub mod config;
pub mod crc;
pub mod dispatch;
pub mod error;
pub mod line;
pub mod registry;
pub mod session;
pub mod slave;
pub mod timing;
pub mod types;

#[cfg(test)]
mod mock_serial;
