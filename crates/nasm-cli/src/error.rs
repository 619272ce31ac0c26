//! CLI error types.
//!
//! Every error that touches the filesystem carries the path involved, so a
//! logged error alone is enough to find the offending file.

use std::{io, path::PathBuf};

use nasm_engine::{ConfigError, EngineError};
use thiserror::Error;

/// Errors from loading or storing key files.
#[derive(Debug, Error)]
pub enum KeyStoreError {
    /// Key file could not be read or written.
    #[error("key file {}: {source}", .path.display())]
    Io {
        /// Key file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Key file was read but does not describe a usable config.
    ///
    /// Fatal for this key. Fix the file and retry.
    #[error("invalid key file {}: {source}", .path.display())]
    Invalid {
        /// Key file path
        path: PathBuf,
        /// Why the config was rejected
        #[source]
        source: ConfigError,
    },
}

/// Errors from file transforms.
#[derive(Debug, Error)]
pub enum FileServiceError {
    /// Reading the input or writing the output failed.
    ///
    /// No output file is left behind.
    #[error("{}: {source}", .path.display())]
    Io {
        /// File being read or written
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The engine rejected the config, the input or was cancelled.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Key loading failed.
    #[error(transparent)]
    KeyStore(#[from] KeyStoreError),

    /// The blocking transform task panicked or was aborted.
    #[error("transform task failed: {reason}")]
    Task {
        /// Join error message
        reason: String,
    },
}

impl FileServiceError {
    /// Whether the transform stopped because its cancel flag was set.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Engine(EngineError::Cancelled { .. }))
    }
}
