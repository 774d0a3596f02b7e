//! The block registry, one ordered table of blocks per Modbus data kind.
//!
//! Tables are filled once at start-up and never shrink. Lookups scan a table in registration
//! order, which is fine for the handful of blocks a node carries.

use log::debug;

use crate::{
    block::{Block, Storage, UpdateCallback},
    config::{MAX_SLAVE_ADDRESS, MIN_SLAVE_ADDRESS},
    error::RegistrationError,
    types::DataKind,
};

/// Holds up to `N` blocks of each kind.
pub struct Registry<'a, const N: usize = 8> {
    coils: heapless::Vec<Block<'a>, N>,
    discrete_inputs: heapless::Vec<Block<'a>, N>,
    holding_registers: heapless::Vec<Block<'a>, N>,
    input_registers: heapless::Vec<Block<'a>, N>,
}

impl<'a, const N: usize> Default for Registry<'a, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, const N: usize> Registry<'a, N> {
    pub fn new() -> Self {
        Self {
            coils: heapless::Vec::new(),
            discrete_inputs: heapless::Vec::new(),
            holding_registers: heapless::Vec::new(),
            input_registers: heapless::Vec::new(),
        }
    }

    fn table(&self, kind: DataKind) -> &heapless::Vec<Block<'a>, N> {
        match kind {
            DataKind::Coils => &self.coils,
            DataKind::DiscreteInputs => &self.discrete_inputs,
            DataKind::HoldingRegisters => &self.holding_registers,
            DataKind::InputRegisters => &self.input_registers,
        }
    }

    fn table_mut(&mut self, kind: DataKind) -> &mut heapless::Vec<Block<'a>, N> {
        match kind {
            DataKind::Coils => &mut self.coils,
            DataKind::DiscreteInputs => &mut self.discrete_inputs,
            DataKind::HoldingRegisters => &mut self.holding_registers,
            DataKind::InputRegisters => &mut self.input_registers,
        }
    }

    /// Register a block of `count` items starting at the 1-based `base_address`.
    ///
    /// `storage` must match the kind (bytes for bit tables, words for register tables) and be
    /// large enough for `count` items. The range must not overlap any block of the same kind.
    pub fn register(
        &mut self,
        kind: DataKind,
        owner_address: u8,
        base_address: u16,
        count: u16,
        storage: Storage<'a>,
        on_update: Option<UpdateCallback<'a>>,
    ) -> Result<(), RegistrationError> {
        if !(MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&owner_address)
            || base_address == 0
            || count == 0
        {
            return Err(RegistrationError::InvalidArgument);
        }
        // The whole range has to be addressable.
        if base_address as u32 + count as u32 - 1 > u16::MAX as u32 {
            return Err(RegistrationError::InvalidArgument);
        }
        if storage.is_bits() != kind.is_bits() || storage.capacity() < count as usize {
            return Err(RegistrationError::InvalidArgument);
        }

        let table = self.table_mut(kind);
        if table.iter().any(|block| block.overlaps(base_address, count)) {
            return Err(RegistrationError::OverlappingRange);
        }
        table
            .push(Block::new(
                owner_address,
                kind,
                base_address,
                count,
                storage,
                on_update,
            ))
            .map_err(|_| RegistrationError::CapacityExceeded)?;

        debug!(
            "Registered {:?} block {}..={} for slave {}",
            kind,
            base_address,
            base_address + (count - 1),
            owner_address
        );
        Ok(())
    }

    /// Index of the block serving `start..=end`, if a single block covers all of it.
    ///
    /// The first block in registration order holding `start` is picked, and the request is
    /// refused unless that same block also holds `end`. A range spanning two adjacent blocks is
    /// therefore rejected, never split across them.
    fn position_covering(&self, kind: DataKind, start: u16, end: u16) -> Option<usize> {
        let table = self.table(kind);
        let index = table
            .iter()
            .position(|block| start >= block.base_address() && start <= block.last_address())?;
        table[index].contains(start, end).then_some(index)
    }

    /// The block covering the 1-based addresses `start..=end`, see [`Registry::find_covering_mut`].
    pub fn find_covering(&self, kind: DataKind, start: u16, end: u16) -> Option<&Block<'a>> {
        let index = self.position_covering(kind, start, end)?;
        self.table(kind).get(index)
    }

    /// The block covering the 1-based addresses `start..=end`.
    ///
    /// Returns `None` when no block holds `start`, or the block holding `start` ends before `end`.
    pub fn find_covering_mut(
        &mut self,
        kind: DataKind,
        start: u16,
        end: u16,
    ) -> Option<&mut Block<'a>> {
        let index = self.position_covering(kind, start, end)?;
        self.table_mut(kind).get_mut(index)
    }

    /// Blocks of one kind in registration order.
    pub fn blocks(&self, kind: DataKind) -> impl Iterator<Item = &Block<'a>> {
        self.table(kind).iter()
    }

    pub fn is_empty(&self, kind: DataKind) -> bool {
        self.table(kind).is_empty()
    }

    /// Deliver update callbacks for every dirty block and clear the flags.
    ///
    /// Tables are visited in [`DataKind::SERVICE_ORDER`], blocks in registration order.
    /// Only call this from the application loop, never from the event handlers.
    pub fn service_all(&mut self) {
        for kind in DataKind::SERVICE_ORDER {
            for block in self.table_mut(kind).iter_mut() {
                block.service();
            }
        }
    }
}
