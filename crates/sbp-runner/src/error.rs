//! Error types for sbp-runner.

use std::io;
use std::path::PathBuf;

use sbp_protocol::{PersistError, ProtocolError};
use sbp_radio::PacketError;
use thiserror::Error;

/// Errors surfaced at the runner boundary.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// I/O error on a transport or file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Config file could not be parsed.
    #[error("Failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Config values are inconsistent.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Radio transport failure.
    #[error("Radio error: {0}")]
    Radio(#[from] PacketError),

    /// A protocol line could not be encoded.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Non-volatile storage failure.
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    /// Signal handler could not be installed.
    #[error("Signal handler error: {0}")]
    Signal(#[from] ctrlc::Error),
}

/// Result type for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;
