//! Memory captured into a local buffer.
//!
//! A [`MemoryDump`] holds a copy of one contiguous range of a process's
//! address space and answers reads against it exactly like the live
//! process would. Used to freeze a region for repeated scanning and to
//! drive the collector offline.

use crate::error::{MemoryError, Result};
use crate::reader::ReadMemory;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryDump {
    base: u64,
    bytes: Vec<u8>,
}

impl MemoryDump {
    /// A dump of `bytes` as if mapped at `base`.
    pub fn new(base: u64, bytes: Vec<u8>) -> Self {
        Self { base, bytes }
    }

    /// A zero-filled dump of `len` bytes at `base`.
    pub fn zeroed(base: u64, len: usize) -> Self {
        Self::new(base, vec![0; len])
    }

    /// Copy `len` bytes starting at `address` out of `source`.
    pub fn capture<R: ReadMemory + ?Sized>(source: &R, address: u64, len: usize) -> Result<Self> {
        Ok(Self::new(address, source.read_vec(address, len)?))
    }

    pub fn base(&self) -> u64 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Overwrite bytes at an absolute address inside the dump.
    pub fn put(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let range = self
            .range(address, data.len())
            .ok_or(MemoryError::WriteMemoryFailed {
                address,
                len: data.len(),
            })?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    pub fn put_u32(&mut self, address: u64, value: u32) -> Result<()> {
        self.put(address, &value.to_le_bytes())
    }

    pub fn put_u64(&mut self, address: u64, value: u64) -> Result<()> {
        self.put(address, &value.to_le_bytes())
    }

    pub fn put_f32(&mut self, address: u64, value: f32) -> Result<()> {
        self.put(address, &value.to_le_bytes())
    }

    fn range(&self, address: u64, len: usize) -> Option<std::ops::Range<usize>> {
        let start = usize::try_from(address.checked_sub(self.base)?).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.bytes.len()).then_some(start..end)
    }
}

impl ReadMemory for MemoryDump {
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        let range = self
            .range(address, buf.len())
            .ok_or(MemoryError::ReadMemoryFailed {
                address,
                len: buf.len(),
            })?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }
}
