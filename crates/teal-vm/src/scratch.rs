//! Scratch space (256 addressable slots)

use crate::error::{Fault, FaultResult};
use crate::value::Value;

/// Number of scratch slots
pub const SCRATCH_SLOTS: usize = 256;

/// Fixed-size scratch space, every slot initialised to integer zero
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScratchSpace {
    slots: Vec<Value>,
}

impl ScratchSpace {
    /// Create scratch space with all slots zero
    pub fn new() -> Self {
        Self {
            slots: vec![Value::ZERO; SCRATCH_SLOTS],
        }
    }

    fn index(slot: u64) -> FaultResult<usize> {
        match usize::try_from(slot) {
            Ok(i) if i < SCRATCH_SLOTS => Ok(i),
            _ => Err(Fault::ScratchOutOfBounds(slot)),
        }
    }

    /// Read a slot
    pub fn load(&self, slot: u64) -> FaultResult<&Value> {
        Ok(&self.slots[Self::index(slot)?])
    }

    /// Write a slot
    pub fn store(&mut self, slot: u64, value: Value) -> FaultResult<()> {
        self.slots[Self::index(slot)?] = value;
        Ok(())
    }

    /// All slots in index order
    pub fn slots(&self) -> &[Value] {
        &self.slots
    }

    /// Slots holding anything other than integer zero
    pub fn non_zero(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_zero_uint())
    }

    /// Consume into the slot vector
    pub fn into_vec(self) -> Vec<Value> {
        self.slots
    }
}

impl Default for ScratchSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<usize> for ScratchSpace {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.slots[index]
    }
}
