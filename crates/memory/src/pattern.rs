//! Byte signature scanning.
//!
//! Signatures use the usual IDA notation: space separated hex bytes with
//! `?` or `??` as a single-byte wildcard, e.g. `48 8B 05 ?? ?? ?? ?? 48 85 C0`.
//! Scanning a signature over the game's code is how offsets are recovered
//! after a patch moves things around.

use std::fmt;
use std::str::FromStr;

use crate::error::{MemoryError, Result};
use crate::maps::MemoryRegion;
use crate::reader::ReadMemory;

/// Bytes read per request while scanning a range.
const SCAN_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    bytes: Vec<Option<u8>>,
}

impl Signature {
    pub fn parse(raw: &str) -> Result<Self> {
        let bytes = raw
            .split_whitespace()
            .map(|token| match token {
                "?" | "??" => Ok(None),
                hex if hex.len() <= 2 => u8::from_str_radix(hex, 16)
                    .map(Some)
                    .map_err(|_| MemoryError::InvalidSignature(format!("bad byte '{hex}' in '{raw}'"))),
                other => Err(MemoryError::InvalidSignature(format!(
                    "bad byte '{other}' in '{raw}'"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;

        if bytes.is_empty() {
            return Err(MemoryError::InvalidSignature("empty signature".into()));
        }
        if bytes.iter().all(Option::is_none) {
            return Err(MemoryError::InvalidSignature(format!(
                "signature '{raw}' is all wildcards"
            )));
        }
        Ok(Self { bytes })
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn matches_at(&self, window: &[u8]) -> bool {
        self.bytes
            .iter()
            .zip(window)
            .all(|(expected, actual)| expected.map_or(true, |b| b == *actual))
    }

    /// Offset of the first match in `haystack`.
    pub fn find_in(&self, haystack: &[u8]) -> Option<usize> {
        haystack
            .windows(self.len())
            .position(|window| self.matches_at(window))
    }

    /// Offsets of every match in `haystack`, overlapping matches included.
    pub fn find_all(&self, haystack: &[u8]) -> Vec<usize> {
        haystack
            .windows(self.len())
            .enumerate()
            .filter(|(_, window)| self.matches_at(window))
            .map(|(offset, _)| offset)
            .collect()
    }

    /// Scan `[start, end)` of `reader` and return the first matching
    /// address. Chunks that cannot be read (guard pages, unmapped holes)
    /// are skipped.
    pub fn scan<R: ReadMemory + ?Sized>(&self, reader: &R, start: u64, end: u64) -> Option<u64> {
        let overlap = self.len() as u64 - 1;
        let mut chunk_start = start;

        while chunk_start < end {
            let chunk_len = (end - chunk_start).min(SCAN_CHUNK as u64 + overlap) as usize;
            match reader.read_vec(chunk_start, chunk_len) {
                Ok(chunk) => {
                    if let Some(offset) = self.find_in(&chunk) {
                        return Some(chunk_start + offset as u64);
                    }
                }
                Err(e) => {
                    tracing::trace!(address = chunk_start, error = %e, "Skipping unreadable chunk");
                }
            }
            chunk_start += SCAN_CHUNK as u64;
        }
        None
    }

    pub fn scan_region<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        region: &MemoryRegion,
    ) -> Option<u64> {
        self.scan(reader, region.start, region.end)
    }

    /// Scan every readable region in order.
    pub fn scan_regions<R: ReadMemory + ?Sized>(
        &self,
        reader: &R,
        regions: &[MemoryRegion],
    ) -> Option<u64> {
        regions
            .iter()
            .filter(|r| r.perms.read)
            .find_map(|r| self.scan_region(reader, r))
    }
}

impl FromStr for Signature {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match byte {
                Some(b) => write!(f, "{b:02X}")?,
                None => f.write_str("??")?,
            }
        }
        Ok(())
    }
}

/// Resolve an x86-64 RIP-relative operand.
///
/// `instruction` is the address of the matched instruction,
/// `displacement_offset` where its 32-bit displacement starts and
/// `instruction_len` its total length. The target is relative to the
/// address of the next instruction.
pub fn resolve_rip_relative<R: ReadMemory + ?Sized>(
    reader: &R,
    instruction: u64,
    displacement_offset: u64,
    instruction_len: u64,
) -> Result<u64> {
    let displacement = reader.read_i32(instruction + displacement_offset)?;
    Ok((instruction + instruction_len).wrapping_add_signed(i64::from(displacement)))
}
