//! Reading event logs back.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{EventLogError, Result};

/// Read every record of a JSONL log written by
/// [`EventLog`](crate::persistence::EventLog).
///
/// Blank lines are skipped. The first malformed line aborts the read with
/// its 1-based line number.
pub fn read_event_log<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| EventLogError::io(path, e))?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| EventLogError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| EventLogError::Malformed {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}
