//! `/proc/<pid>/maps` parsing.

use std::fs;

use crate::error::{MemoryError, Result};
use crate::process::exe_basename;

/// Access flags of a mapping (`rwxp` column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
    /// `s` (shared) rather than `p` (private copy-on-write).
    pub shared: bool,
}

impl Permissions {
    fn parse(raw: &str) -> Option<Self> {
        let bytes = raw.as_bytes();
        if bytes.len() != 4 {
            return None;
        }
        Some(Self {
            read: bytes[0] == b'r',
            write: bytes[1] == b'w',
            execute: bytes[2] == b'x',
            shared: bytes[3] == b's',
        })
    }
}

/// One line of the memory map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: Permissions,
    pub offset: u64,
    pub inode: u64,
    /// Backing file or pseudo-name (`[heap]`, `[stack]`); `None` for
    /// anonymous mappings.
    pub path: Option<String>,
}

impl MemoryRegion {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn contains(&self, address: u64) -> bool {
        (self.start..self.end).contains(&address)
    }
}

/// A loaded module: the span covering every mapping of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub base: u64,
    pub size: u64,
    pub path: String,
}

/// Pop the next space-separated field, skipping column padding.
fn next_field<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let s = rest.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(' ').unwrap_or(s.len());
    let (field, remainder) = s.split_at(end);
    *rest = remainder;
    Some(field)
}

/// Parse a single maps line.
pub fn parse_line(line: &str) -> Result<MemoryRegion> {
    let bad = || MemoryError::ParseMaps(line.to_string());
    let mut rest = line;

    let range = next_field(&mut rest).ok_or_else(bad)?;
    let perms = next_field(&mut rest).ok_or_else(bad)?;
    let offset = next_field(&mut rest).ok_or_else(bad)?;
    let _device = next_field(&mut rest).ok_or_else(bad)?;
    let inode = next_field(&mut rest).ok_or_else(bad)?;

    let (start, end) = range.split_once('-').ok_or_else(bad)?;
    let start = u64::from_str_radix(start, 16).map_err(|_| bad())?;
    let end = u64::from_str_radix(end, 16).map_err(|_| bad())?;
    if end < start {
        return Err(bad());
    }

    // Whatever follows the inode is the path, which may contain spaces.
    let path = rest.trim();

    Ok(MemoryRegion {
        start,
        end,
        perms: Permissions::parse(perms).ok_or_else(bad)?,
        offset: u64::from_str_radix(offset, 16).map_err(|_| bad())?,
        inode: inode.parse().map_err(|_| bad())?,
        path: (!path.is_empty()).then(|| path.to_string()),
    })
}

/// Parse the full contents of a maps file. Blank lines are ignored.
pub fn parse_maps(contents: &str) -> Result<Vec<MemoryRegion>> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_line)
        .collect()
}

pub fn read_maps(pid: u32) -> Result<Vec<MemoryRegion>> {
    let contents = fs::read_to_string(format!("/proc/{pid}/maps"))?;
    parse_maps(&contents)
}

/// Span of every mapping whose file name is `name`.
pub fn find_module(regions: &[MemoryRegion], name: &str) -> Option<ModuleInfo> {
    let mut matching = regions.iter().filter(|r| {
        r.path
            .as_deref()
            .is_some_and(|path| exe_basename(path) == name)
    });

    let first = matching.next()?;
    let path = first.path.clone().unwrap_or_default();
    let (base, end) = matching.fold((first.start, first.end), |(lo, hi), r| {
        (lo.min(r.start), hi.max(r.end))
    });

    Some(ModuleInfo {
        base,
        size: end - base,
        path,
    })
}
