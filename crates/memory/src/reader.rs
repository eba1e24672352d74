//! Remote memory access.
//!
//! [`ReadMemory`] / [`WriteMemory`] are the seams everything above this
//! crate is written against. [`MemoryReader`] implements them for a live
//! process with `process_vm_readv(2)` / `process_vm_writev(2)`; the
//! [`MemoryDump`](crate::dump::MemoryDump) implements them over a captured
//! byte buffer.
//!
//! All multi-byte values are little-endian, matching x86-64.

use crate::error::{MemoryError, Result};
use crate::process::ProcessHandle;

/// Chunk size when scanning for a string terminator.
const CSTRING_CHUNK: usize = 64;

pub trait ReadMemory {
    /// Fill `buf` from `address`. Partial reads are errors.
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    fn read_vec(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_bytes(address, &mut buf)?;
        Ok(buf)
    }

    fn read_u8(&self, address: u64) -> Result<u8> {
        Ok(read_array::<_, 1>(self, address)?[0])
    }

    fn read_u16(&self, address: u64) -> Result<u16> {
        Ok(u16::from_le_bytes(read_array(self, address)?))
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        Ok(u32::from_le_bytes(read_array(self, address)?))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        Ok(i32::from_le_bytes(read_array(self, address)?))
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(read_array(self, address)?))
    }

    fn read_f32(&self, address: u64) -> Result<f32> {
        Ok(f32::from_le_bytes(read_array(self, address)?))
    }

    /// Read a 64-bit pointer.
    fn read_ptr(&self, address: u64) -> Result<u64> {
        self.read_u64(address)
    }

    /// Read a NUL-terminated UTF-8 string of at most `max_len` bytes.
    fn read_cstring(&self, address: u64, max_len: usize) -> Result<String> {
        let mut bytes = Vec::new();
        let mut chunk = [0u8; CSTRING_CHUNK];

        while bytes.len() < max_len {
            let want = CSTRING_CHUNK.min(max_len - bytes.len());
            self.read_bytes(offset_address(address, bytes.len() as u64)?, &mut chunk[..want])?;
            if let Some(nul) = chunk[..want].iter().position(|&b| b == 0) {
                bytes.extend_from_slice(&chunk[..nul]);
                return Ok(std::str::from_utf8(&bytes)?.to_string());
            }
            bytes.extend_from_slice(&chunk[..want]);
        }

        Ok(std::str::from_utf8(&bytes)?.to_string())
    }
}

pub trait WriteMemory {
    /// Store `data` at `address`. Partial writes are errors.
    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()>;

    fn write_u32(&self, address: u64, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_u64(&self, address: u64, value: u64) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }

    fn write_f32(&self, address: u64, value: f32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes())
    }
}

/// `address + offset`, failing instead of wrapping past the end of the
/// address space. Addresses read out of another process are untrusted.
pub fn offset_address(address: u64, offset: u64) -> Result<u64> {
    address
        .checked_add(offset)
        .ok_or(MemoryError::ReadMemoryFailed { address, len: 0 })
}

fn read_array<R: ReadMemory + ?Sized, const N: usize>(reader: &R, address: u64) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_bytes(address, &mut buf)?;
    Ok(buf)
}

impl<T: ReadMemory + ?Sized> ReadMemory for &T {
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        (**self).read_bytes(address, buf)
    }
}

/// Reads and writes the memory of another process.
///
/// Requires ptrace access to the target: same user with
/// `kernel.yama.ptrace_scope = 0`, or `CAP_SYS_PTRACE`.
#[derive(Debug, Clone, Copy)]
pub struct MemoryReader {
    pid: libc::pid_t,
}

impl MemoryReader {
    pub fn new(process: &ProcessHandle) -> Self {
        Self {
            pid: process.pid() as libc::pid_t,
        }
    }

    /// Attach to a process by id, checking that it is running.
    pub fn attach(pid: u32) -> Result<Self> {
        Ok(Self::new(&ProcessHandle::attach(pid)?))
    }

    pub fn pid(&self) -> u32 {
        self.pid as u32
    }
}

impl ReadMemory for MemoryReader {
    fn read_bytes(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let len = buf.len();
        if len == 0 {
            return Ok(());
        }
        if address == 0 {
            return Err(MemoryError::ReadMemoryFailed { address, len });
        }

        let local = libc::iovec {
            iov_base: buf.as_mut_ptr().cast(),
            iov_len: len,
        };
        let remote = libc::iovec {
            iov_base: address as usize as *mut libc::c_void,
            iov_len: len,
        };

        // SAFETY: `local` points at `buf`, which is valid for `len` bytes of
        // writes for the duration of the call. The remote iovec is only
        // dereferenced by the kernel, which validates it.
        let read = unsafe { libc::process_vm_readv(self.pid, &local, 1, &remote, 1, 0) };

        if read < 0 || read as usize != len {
            tracing::trace!(
                pid = self.pid,
                address,
                len,
                read,
                error = %std::io::Error::last_os_error(),
                "process_vm_readv failed",
            );
            return Err(MemoryError::ReadMemoryFailed { address, len });
        }
        Ok(())
    }
}

impl WriteMemory for MemoryReader {
    fn write_bytes(&self, address: u64, data: &[u8]) -> Result<()> {
        let len = data.len();
        if len == 0 {
            return Ok(());
        }
        if address == 0 {
            return Err(MemoryError::WriteMemoryFailed { address, len });
        }

        let local = libc::iovec {
            iov_base: data.as_ptr() as *mut libc::c_void,
            iov_len: len,
        };
        let remote = libc::iovec {
            iov_base: address as usize as *mut libc::c_void,
            iov_len: len,
        };

        // SAFETY: `local` points at `data`, valid for `len` bytes of reads;
        // process_vm_writev never writes through the local iovec.
        let written = unsafe { libc::process_vm_writev(self.pid, &local, 1, &remote, 1, 0) };

        if written < 0 || written as usize != len {
            tracing::trace!(
                pid = self.pid,
                address,
                len,
                written,
                error = %std::io::Error::last_os_error(),
                "process_vm_writev failed",
            );
            return Err(MemoryError::WriteMemoryFailed { address, len });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn own_reader() -> MemoryReader {
        MemoryReader::attach(std::process::id()).expect("self is attachable")
    }

    #[test]
    fn reads_own_heap() {
        let data: Vec<u8> = (0u8..32).collect();
        let reader = own_reader();

        let copy = reader
            .read_vec(data.as_ptr() as u64, data.len())
            .expect("own heap is readable");
        assert_eq!(copy, data);
    }

    #[test]
    fn typed_reads_are_little_endian() {
        let value: Box<[u8; 12]> = Box::new([
            0x78, 0x56, 0x34, 0x12, // u32
            0x00, 0x00, 0x80, 0x3f, // f32 1.0
            b'h', b'i', 0, 0xff,
        ]);
        let base = value.as_ptr() as u64;
        let reader = own_reader();

        assert_eq!(reader.read_u32(base).unwrap(), 0x1234_5678);
        assert_eq!(reader.read_u16(base).unwrap(), 0x5678);
        assert_eq!(reader.read_f32(base + 4).unwrap(), 1.0);
        assert_eq!(reader.read_cstring(base + 8, 4).unwrap(), "hi");
    }

    #[test]
    fn writes_own_heap() {
        let target = Box::new([0u8; 8]);
        let address = target.as_ptr() as u64;
        let reader = own_reader();

        reader
            .write_u64(address, 0x0102_0304_0506_0708)
            .expect("own heap is writable");

        // SAFETY: `target` is live and 8 bytes long.
        let stored = unsafe { std::ptr::read_volatile(target.as_ptr().cast::<[u8; 8]>()) };
        assert_eq!(u64::from_le_bytes(stored), 0x0102_0304_0506_0708);
    }

    #[test]
    fn null_and_unmapped_reads_fail() {
        let reader = own_reader();
        assert_matches!(
            reader.read_u32(0),
            Err(MemoryError::ReadMemoryFailed { address: 0, len: 4 })
        );
        assert_matches!(
            reader.read_u32(0x10),
            Err(MemoryError::ReadMemoryFailed { address: 0x10, .. })
        );
    }

    #[test]
    fn offset_past_address_space_fails() {
        assert_eq!(offset_address(0x1000, 0x20).unwrap(), 0x1020);
        assert_matches!(
            offset_address(u64::MAX - 8, 16),
            Err(MemoryError::ReadMemoryFailed { address, len: 0 }) if address == u64::MAX - 8
        );
    }

    #[test]
    fn cstring_at_end_of_address_space_fails() {
        // The last 64 bytes of the address space, no terminator.
        let dump = crate::MemoryDump::new(u64::MAX - 63, vec![b'a'; 64]);
        assert_matches!(
            dump.read_cstring(u64::MAX - 63, 128),
            Err(MemoryError::ReadMemoryFailed { len: 0, .. })
        );
    }

    #[test]
    fn zero_length_read_is_noop() {
        let reader = own_reader();
        assert!(reader.read_bytes(0, &mut []).is_ok());
    }
}
