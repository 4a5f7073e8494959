use std::path::PathBuf;

/// Errors raised while building indices or drawing batches.
#[derive(Debug, thiserror::Error)]
pub enum SsdaError {
    /// Invalid constructor arguments (empty collections, bad hyperparameters).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A configured directory could not be listed.
    #[error("Cannot list directory {}: {source}", path.display())]
    DirectoryListing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The extractor failed to decode a file. Never retried.
    #[error("Failed to extract {}: {source}", path.display())]
    Extraction {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// An internal consistency check failed.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl SsdaError {
    /// True for errors caused by invalid configuration, including missing
    /// or unreadable directories.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SsdaError::Configuration(_) | SsdaError::DirectoryListing { .. }
        )
    }
}
