//! Multi-level pointer chains.
//!
//! A chain `[0x10, 0x48, 0x1c]` applied to `base` reads the pointer at
//! `base + 0x10`, then the pointer at that value `+ 0x48`, and yields the
//! final address `that + 0x1c`. Every offset but the last is dereferenced.

use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, Result};
use crate::reader::ReadMemory;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointerChain {
    pub offsets: Vec<i64>,
}

impl PointerChain {
    pub fn new(offsets: impl Into<Vec<i64>>) -> Self {
        Self {
            offsets: offsets.into(),
        }
    }

    /// Walk the chain from `base` and return the final address.
    ///
    /// An empty chain resolves to `base` itself.
    pub fn resolve<R: ReadMemory + ?Sized>(&self, reader: &R, base: u64) -> Result<u64> {
        let Some((last, hops)) = self.offsets.split_last() else {
            return Ok(base);
        };

        let mut address = base;
        for (depth, offset) in hops.iter().enumerate() {
            address = reader.read_ptr(address.wrapping_add_signed(*offset))?;
            if address == 0 {
                return Err(MemoryError::NullPointer { depth });
            }
        }
        Ok(address.wrapping_add_signed(*last))
    }
}

impl From<Vec<i64>> for PointerChain {
    fn from(offsets: Vec<i64>) -> Self {
        Self { offsets }
    }
}
