//! CRC16/Modbus checksum used to validate received frames and seal responses.

use ::crc::{CRC_16_MODBUS, Crc};

/// Reflected polynomial 0xA001, seed 0xFFFF, no final XOR.
const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// Compute the Modbus CRC16 of `buffer`.
///
/// On the wire the result is sent low byte first, e.g. the request
/// `[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]` gives `0x0A84` which is appended as `0x84, 0x0A`.
pub fn crc16(buffer: &[u8]) -> u16 {
    CRC_MODBUS.checksum(buffer)
}

/// Check the two trailing CRC bytes of a complete frame against its body.
///
/// Frames shorter than three bytes can never carry a valid checksum.
pub fn frame_checksum_ok(frame: &[u8]) -> bool {
    if frame.len() < 3 {
        return false;
    }
    let (body, trailer) = frame.split_at(frame.len() - 2);
    let [lo, hi] = crc16(body).to_le_bytes();
    trailer[0] == lo && trailer[1] == hi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01]), 0x0A84);
        // Read holding register 0x20 request and a matching reply.
        assert_eq!(crc16(&[0x01, 0x03, 0x00, 0x20, 0x00, 0x01]), 0xC085);
        assert_eq!(crc16(&[0x01, 0x03, 0x02, 0x56, 0x78]), 0xC687);
        assert_eq!(crc16(&[0x01, 0x06, 0x00, 0x10, 0x12, 0x34]), 0x7885);
    }

    #[test]
    fn empty_buffer_is_seed() {
        assert_eq!(crc16(&[]), 0xFFFF);
    }

    #[test]
    fn checksum_validation() {
        let good = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A];
        assert!(frame_checksum_ok(&good));

        // Swapped byte order must not pass.
        let swapped = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x0A, 0x84];
        assert!(!frame_checksum_ok(&swapped));

        let mut corrupted = good;
        corrupted[7] ^= 0x01;
        assert!(!frame_checksum_ok(&corrupted));

        assert!(!frame_checksum_ok(&[0x01, 0x02]));
    }
}
