//! Error type shared by every module of this crate.

/// Errors from process discovery and remote memory access.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// No running process matched the requested name.
    #[error("Process '{0}' not found")]
    ProcessNotFound(String),

    /// The process id does not exist (or exited).
    #[error("Process {0} is not running")]
    ProcessGone(u32),

    /// The process has no mapping for the requested module.
    #[error("Module '{module}' not loaded in process {pid}")]
    ModuleNotFound { module: String, pid: u32 },

    /// A read returned fewer bytes than requested, or failed outright.
    #[error("Failed to read {len} bytes of memory at address 0x{address:x}")]
    ReadMemoryFailed { address: u64, len: usize },

    /// A write stored fewer bytes than requested, or failed outright.
    #[error("Failed to write {len} bytes of memory at address 0x{address:x}")]
    WriteMemoryFailed { address: u64, len: usize },

    /// A pointer chain hit a null pointer.
    #[error("Null pointer while resolving chain at depth {depth}")]
    NullPointer { depth: usize },

    /// A byte signature string could not be parsed.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// A line of `/proc/<pid>/maps` could not be parsed.
    #[error("Failed to parse memory map line: {0}")]
    ParseMaps(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF8 conversion error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Parse int error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),
}

/// Result alias used throughout `d4log-memory`.
pub type Result<T> = std::result::Result<T, MemoryError>;
