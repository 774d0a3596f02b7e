//! A block is one contiguously addressed slice of a Modbus data table.
//!
//! The backing array is owned by the application and lent to the block for its whole life.
//! Bit tables (coils, discrete inputs) are packed least significant bit first, eight items per
//! byte. Register tables hold one `u16` per item.

use crate::types::{DataKind, Exception};

/// Backing storage lent to a block by the application.
#[derive(Debug)]
pub enum Storage<'a> {
    Bits(&'a mut [u8]),
    Words(&'a mut [u16]),
}

impl Storage<'_> {
    /// Number of items this storage can hold.
    pub fn capacity(&self) -> usize {
        match self {
            Storage::Bits(bytes) => bytes.len() * 8,
            Storage::Words(words) => words.len(),
        }
    }

    pub(crate) fn is_bits(&self) -> bool {
        matches!(self, Storage::Bits(_))
    }
}

/// Called by the service loop after the master changed a block.
pub type UpdateCallback<'a> = &'a mut dyn FnMut(&Block<'_>);

pub struct Block<'a> {
    /// Bus address (1 - 247) this block answers for.
    owner_address: u8,
    kind: DataKind,
    /// First item, 1-based.
    base_address: u16,
    count: u16,
    storage: Storage<'a>,
    /// Set when a request changed the storage, cleared by the service loop.
    dirty: bool,
    on_update: Option<UpdateCallback<'a>>,
}

impl<'a> Block<'a> {
    /// Arguments are validated by the registry before a block is built.
    pub(crate) fn new(
        owner_address: u8,
        kind: DataKind,
        base_address: u16,
        count: u16,
        storage: Storage<'a>,
        on_update: Option<UpdateCallback<'a>>,
    ) -> Self {
        Self {
            owner_address,
            kind,
            base_address,
            count,
            storage,
            dirty: false,
            on_update,
        }
    }

    pub fn owner_address(&self) -> u8 {
        self.owner_address
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    pub fn base_address(&self) -> u16 {
        self.base_address
    }

    pub fn count(&self) -> u16 {
        self.count
    }

    /// Address of the last item in this block.
    pub fn last_address(&self) -> u16 {
        self.base_address + (self.count - 1)
    }

    /// Whether `start..=end` lies entirely inside this block.
    pub fn contains(&self, start: u16, end: u16) -> bool {
        start >= self.base_address && start <= end && end <= self.last_address()
    }

    /// Whether `[base, base + count)` shares any address with this block.
    pub fn overlaps(&self, base: u16, count: u16) -> bool {
        let last = base as u32 + count as u32 - 1;
        (base as u32) <= self.last_address() as u32 && last >= self.base_address as u32
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn storage(&self) -> &Storage<'a> {
        &self.storage
    }

    /// Direct access for the collaborators producing the data. Changes made through this do
    /// not mark the block dirty.
    pub fn storage_mut(&mut self) -> &mut Storage<'a> {
        &mut self.storage
    }

    /// State of one bit, `None` for register blocks or offsets past the end.
    pub fn bit(&self, offset: u16) -> Option<bool> {
        match &self.storage {
            Storage::Bits(bytes) if offset < self.count => {
                let offset = offset as usize;
                Some(bytes[offset / 8] & (1 << (offset % 8)) != 0)
            }
            _ => None,
        }
    }

    /// Value of one register, `None` for bit blocks or offsets past the end.
    pub fn word(&self, offset: u16) -> Option<u16> {
        match &self.storage {
            Storage::Words(words) if offset < self.count => Some(words[offset as usize]),
            _ => None,
        }
    }

    /// Pack the bits from `start_offset` to `end_offset` inclusive into `out`, least
    /// significant bit first, and return how many bits were packed.
    ///
    /// Returns 0 when the range or the output buffer doesn't fit, or this isn't a bit block.
    pub fn read_bits(&self, start_offset: u16, end_offset: u16, out: &mut [u8]) -> usize {
        if !self.storage.is_bits() || start_offset > end_offset || end_offset >= self.count {
            return 0;
        }
        let bits = (end_offset - start_offset) as usize + 1;
        let bytes = bits.div_ceil(8);
        if out.len() < bytes {
            return 0;
        }
        out[..bytes].fill(0);
        for (n, offset) in (start_offset..=end_offset).enumerate() {
            if self.bit(offset) == Some(true) {
                out[n / 8] |= 1 << (n % 8);
            }
        }
        bits
    }

    /// Pack the registers from `start_offset` to `end_offset` inclusive into `out`, high byte
    /// first, and return how many bytes were written.
    ///
    /// Returns 0 when the range or the output buffer doesn't fit, or this isn't a register block.
    pub fn read_words(&self, start_offset: u16, end_offset: u16, out: &mut [u8]) -> usize {
        let Storage::Words(words) = &self.storage else {
            return 0;
        };
        if start_offset > end_offset || end_offset >= self.count {
            return 0;
        }
        let items = &words[start_offset as usize..=end_offset as usize];
        if out.len() < items.len() * 2 {
            return 0;
        }
        for (chunk, word) in out.chunks_exact_mut(2).zip(items) {
            chunk.copy_from_slice(&word.to_be_bytes());
        }
        items.len() * 2
    }

    /// Set or clear one bit and flag the block for the service loop.
    pub fn write_bit(&mut self, offset: u16, value: bool) -> Result<(), Exception> {
        if offset >= self.count {
            return Err(Exception::IllegalDataAddress);
        }
        let Storage::Bits(bytes) = &mut self.storage else {
            return Err(Exception::IllegalDataAddress);
        };
        let offset = offset as usize;
        let mask = 1 << (offset % 8);
        if value {
            bytes[offset / 8] |= mask;
        } else {
            bytes[offset / 8] &= !mask;
        }
        self.dirty = true;
        Ok(())
    }

    /// Store one register from its wire bytes and flag the block for the service loop.
    pub fn write_word(&mut self, offset: u16, hi: u8, lo: u8) -> Result<(), Exception> {
        if offset >= self.count {
            return Err(Exception::IllegalDataAddress);
        }
        let Storage::Words(words) = &mut self.storage else {
            return Err(Exception::IllegalDataAddress);
        };
        words[offset as usize] = u16::from_be_bytes([hi, lo]);
        self.dirty = true;
        Ok(())
    }

    /// Run the update callback if the block is dirty, then clear the flag.
    pub(crate) fn service(&mut self) {
        if !self.dirty {
            return;
        }
        // The callback borrows the block, so it is taken out while it runs.
        if let Some(callback) = self.on_update.take() {
            callback(self);
            self.on_update = Some(callback);
        }
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_capacity() {
        let (mut bits, mut words) = ([0u8; 3], [0u16; 5]);
        let bits = Storage::Bits(&mut bits);
        let words = Storage::Words(&mut words);
        assert_eq!(bits.capacity(), 24);
        assert!(bits.is_bits());
        assert_eq!(words.capacity(), 5);
        assert!(!words.is_bits());
    }

    #[test]
    fn bit_packing() {
        let mut bits = [0b1010_0101u8, 0b0000_0011];
        let block = Block::new(1, DataKind::Coils, 1, 10, Storage::Bits(&mut bits), None);

        let mut out = [0xFFu8; 4];
        assert_eq!(block.read_bits(0, 9, &mut out), 10);
        assert_eq!(out[..2], [0b1010_0101, 0b0000_0011]);

        // Starting mid-byte shifts the packing down to bit 0.
        assert_eq!(block.read_bits(2, 9, &mut out), 8);
        assert_eq!(out[0], 0b1110_1001);

        assert_eq!(block.read_bits(0, 10, &mut out), 0);
        assert_eq!(block.read_bits(0, 9, &mut out[..1]), 0);
    }

    #[test]
    fn word_packing_is_big_endian() {
        let mut words = [0x1234u16, 0xABCD, 0x0001];
        let block = Block::new(
            1,
            DataKind::HoldingRegisters,
            10,
            3,
            Storage::Words(&mut words),
            None,
        );

        let mut out = [0u8; 6];
        assert_eq!(block.read_words(0, 2, &mut out), 6);
        assert_eq!(out, [0x12, 0x34, 0xAB, 0xCD, 0x00, 0x01]);
        assert_eq!(block.read_words(1, 3, &mut out), 0);
        assert_eq!(block.read_bits(0, 1, &mut out), 0);
        assert!(matches!(block.storage(), Storage::Words(w) if w.len() == 3));
    }

    #[test]
    fn writes_mark_dirty() {
        let mut words = [0u16; 2];
        let mut block = Block::new(
            1,
            DataKind::HoldingRegisters,
            1,
            2,
            Storage::Words(&mut words),
            None,
        );
        assert!(!block.is_dirty());

        assert_eq!(block.write_word(2, 0x00, 0x01), Err(Exception::IllegalDataAddress));
        assert!(!block.is_dirty());

        block.write_word(1, 0xBE, 0xEF).unwrap();
        assert!(block.is_dirty());
        assert_eq!(block.word(1), Some(0xBEEF));

        block.service();
        assert!(!block.is_dirty());
    }

    #[test]
    fn write_bit_sets_and_clears() {
        let mut bits = [0u8; 2];
        let mut block = Block::new(1, DataKind::Coils, 1, 12, Storage::Bits(&mut bits), None);

        block.write_bit(9, true).unwrap();
        assert_eq!(block.bit(9), Some(true));
        block.write_bit(9, false).unwrap();
        assert_eq!(block.bit(9), Some(false));
        assert_eq!(block.write_bit(12, true), Err(Exception::IllegalDataAddress));
        assert_eq!(block.write_word(0, 0, 1), Err(Exception::IllegalDataAddress));
    }

    #[test]
    fn containment_and_overlap() {
        let mut words = [0u16; 10];
        let block = Block::new(
            1,
            DataKind::InputRegisters,
            11,
            10,
            Storage::Words(&mut words),
            None,
        );
        assert_eq!(block.last_address(), 20);
        assert!(block.contains(11, 20));
        assert!(block.contains(15, 15));
        assert!(!block.contains(10, 12));
        assert!(!block.contains(19, 21));

        assert!(block.overlaps(1, 11));
        assert!(block.overlaps(20, 5));
        assert!(!block.overlaps(1, 10));
        assert!(!block.overlaps(21, 5));
    }
}
