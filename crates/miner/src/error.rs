use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum MinerError {
    /// A data file or directory could not be opened.
    #[error("Failed to open data file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data file was readable but not in the expected layout.
    #[error("Failed to parse data file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MinerError>;
