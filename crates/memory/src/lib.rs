//! `d4log-memory` -- Linux process discovery and remote memory access.
//!
//! Finds the game process through `/proc`, parses its memory map, and
//! reads (or writes) its memory with `process_vm_readv` / `process_vm_writev`.
//! Higher layers only see the [`ReadMemory`] trait, so the same code runs
//! against a live process or a captured [`MemoryDump`].

pub mod dump;
pub mod error;
pub mod maps;
pub mod pattern;
pub mod pointer;
pub mod process;
pub mod reader;

pub use dump::MemoryDump;
pub use error::{MemoryError, Result};
pub use maps::{MemoryRegion, ModuleInfo};
pub use pattern::Signature;
pub use pointer::PointerChain;
pub use process::{find_process, list_processes, ProcessHandle, ProcessInfo};
pub use reader::{offset_address, MemoryReader, ReadMemory, WriteMemory};
