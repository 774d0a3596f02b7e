//! The request dispatcher, run once a complete frame has been framed by silence.
//!
//! It validates the checksum, resolves the block a request targets, performs the read or
//! write and builds the response (or exception response) in place, sealed with its CRC.

use log::debug;

use crate::{
    block::Block,
    crc::{crc16, frame_checksum_ok},
    registry::Registry,
    session::FrameBuffer,
    types::{EXCEPTION_FLAG, Exception, FunctionCode},
};

/// Most bits FC-01/FC-02 may read.
pub const MAX_BITS_READ: u16 = 2000;
/// Most registers FC-03/FC-04 may read.
pub const MAX_REGISTERS_READ: u16 = 125;
/// Most coils FC-15 may force.
pub const MAX_COILS_WRITE: u16 = 1968;
/// Most registers FC-16 may preset.
pub const MAX_REGISTERS_WRITE: u16 = 123;

/// Address, function, start address and quantity (or value).
const FIXED_HEADER_LENGTH: usize = 6;
/// Bulk writes add a byte count.
const BULK_HEADER_LENGTH: usize = 7;

/// What became of a buffered frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Addressed to another slave, or too short to be a frame.
    Ignored,
    /// Corrupted on the way, the master will retry.
    ChecksumMismatch,
    /// A response is ready to send, `Some` when it is an exception response.
    Replied(Option<Exception>),
}

/// Handle one buffered frame addressed to `slave_address`.
///
/// On [`Disposition::Replied`] `response` holds the complete reply including its CRC,
/// otherwise it is left empty.
pub fn handle_frame<const N: usize>(
    registry: &mut Registry<'_, N>,
    slave_address: u8,
    frame: &[u8],
    response: &mut FrameBuffer,
) -> Disposition {
    response.clear();
    if frame.len() <= 3 || frame[0] != slave_address {
        return Disposition::Ignored;
    }
    if !frame_checksum_ok(frame) {
        debug!("Dropping frame with bad CRC");
        return Disposition::ChecksumMismatch;
    }

    let request = &frame[..frame.len() - 2];
    let result = execute(registry, request, response);
    if let Err(exception) = result {
        debug!("FC{:02X} answered with exception: {}", request[1], exception);
        response.clear();
        let header = [request[0], request[1] | EXCEPTION_FLAG, exception.into()];
        if response.extend_from_slice(&header).is_err() {
            return Disposition::Ignored;
        }
    }

    let [lo, hi] = crc16(response).to_le_bytes();
    if response.extend_from_slice(&[lo, hi]).is_err() {
        response.clear();
        return Disposition::Ignored;
    }
    Disposition::Replied(result.err())
}

/// Decode and run a request (without its CRC), writing the response body into `response`.
fn execute<const N: usize>(
    registry: &mut Registry<'_, N>,
    request: &[u8],
    response: &mut FrameBuffer,
) -> Result<(), Exception> {
    let function = FunctionCode::from_repr(request[1]).ok_or(Exception::IllegalFunction)?;
    let kind = function.kind();
    if registry.is_empty(kind) {
        return Err(Exception::IllegalDataAddress);
    }

    let header = request
        .get(..FIXED_HEADER_LENGTH)
        .ok_or(Exception::IllegalDataValue)?;
    let wire_start = u16::from_be_bytes([header[2], header[3]]);
    let field = u16::from_be_bytes([header[4], header[5]]);
    let quantity = if function.is_single_write() { 1 } else { field };

    // Wire addresses are 0-based, blocks are 1-based.
    let start = u16::try_from(wire_start as u32 + 1).map_err(|_| Exception::IllegalDataAddress)?;
    let end = u16::try_from(wire_start as u32 + quantity as u32)
        .map_err(|_| Exception::IllegalDataAddress)?;
    let block = registry
        .find_covering_mut(kind, start, end)
        .ok_or(Exception::IllegalDataAddress)?;
    let first = start - block.base_address();
    let last = end - block.base_address();

    debug!(
        "FC{:02X} {:?} {}..={} for slave {}",
        request[1],
        kind,
        start,
        end,
        block.owner_address()
    );

    use FunctionCode as FC;
    match function {
        FC::ReadCoils | FC::ReadDiscreteInputs => {
            if quantity > MAX_BITS_READ {
                return Err(Exception::IllegalDataValue);
            }
            let byte_count = (quantity as usize).div_ceil(8);
            start_read_response(request, response, byte_count)?;
            if block.read_bits(first, last, &mut response[3..]) == 0 {
                return Err(Exception::IllegalDataAddress);
            }
        }
        FC::ReadHoldingRegisters | FC::ReadInputRegisters => {
            if quantity > MAX_REGISTERS_READ {
                return Err(Exception::IllegalDataValue);
            }
            start_read_response(request, response, quantity as usize * 2)?;
            if block.read_words(first, last, &mut response[3..]) == 0 {
                return Err(Exception::IllegalDataAddress);
            }
        }
        FC::ForceSingleCoil => {
            let state = match field {
                0xFF00 => true,
                0x0000 => false,
                _ => return Err(Exception::IllegalDataValue),
            };
            block.write_bit(first, state)?;
            echo(request, response)?;
        }
        FC::PresetSingleRegister => {
            block.write_word(first, header[4], header[5])?;
            echo(request, response)?;
        }
        FC::ForceMultipleCoils => {
            let byte_count = *request
                .get(BULK_HEADER_LENGTH - 1)
                .ok_or(Exception::IllegalDataValue)?;
            if quantity > MAX_COILS_WRITE || quantity > byte_count as u16 * 8 {
                return Err(Exception::IllegalDataAddress);
            }
            let data = bulk_data(request, byte_count as usize)?;
            write_coils(block, first, quantity, data)?;
            echo(request, response)?;
        }
        FC::PresetMultipleRegisters => {
            if quantity > MAX_REGISTERS_WRITE {
                return Err(Exception::IllegalDataAddress);
            }
            let data = bulk_data(request, quantity as usize * 2)?;
            write_registers(block, first, data)?;
            echo(request, response)?;
        }
    }
    Ok(())
}

/// Address, function and byte count, followed by `data_length` zeroed bytes to pack into.
fn start_read_response(
    request: &[u8],
    response: &mut FrameBuffer,
    data_length: usize,
) -> Result<(), Exception> {
    let byte_count = u8::try_from(data_length).map_err(|_| Exception::IllegalDataValue)?;
    response
        .extend_from_slice(&[request[0], request[1], byte_count])
        .map_err(|_| Exception::IllegalDataValue)?;
    response
        .resize(3 + data_length, 0)
        .map_err(|_| Exception::IllegalDataValue)
}

/// Write responses repeat the request's address, function, start address and value/quantity.
fn echo(request: &[u8], response: &mut FrameBuffer) -> Result<(), Exception> {
    response
        .extend_from_slice(&request[..FIXED_HEADER_LENGTH])
        .map_err(|_| Exception::IllegalDataValue)
}

/// The `length` data bytes following a bulk write header, if they were all received.
fn bulk_data(request: &[u8], length: usize) -> Result<&[u8], Exception> {
    request
        .get(BULK_HEADER_LENGTH..BULK_HEADER_LENGTH + length)
        .ok_or(Exception::IllegalDataValue)
}

fn write_coils(
    block: &mut Block<'_>,
    first: u16,
    quantity: u16,
    data: &[u8],
) -> Result<(), Exception> {
    for n in 0..quantity {
        let index = n as usize;
        let state = data[index / 8] & (1 << (index % 8)) != 0;
        // The block was resolved for the whole range, so this only fails if that invariant broke.
        block.write_bit(first + n, state)?;
    }
    Ok(())
}

fn write_registers(block: &mut Block<'_>, first: u16, data: &[u8]) -> Result<(), Exception> {
    for (offset, pair) in (first..).zip(data.chunks_exact(2)) {
        block.write_word(offset, pair[0], pair[1])?;
    }
    Ok(())
}
