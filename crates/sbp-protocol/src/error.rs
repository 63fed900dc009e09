//! Error types for the serial bridge protocol.

use thiserror::Error;

/// Errors that can occur while parsing, dispatching or encoding protocol messages.
///
/// Every variant is recoverable at the level of a single message; none of them
/// should ever end the session.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line does not start with the expected message class character.
    #[error("unexpected message type")]
    MessageType,

    /// Delimiters, id span or trailing characters are malformed.
    #[error("malformed protocol format")]
    ProtocolFormat,

    /// The command type token is not in the command table.
    #[error("unknown command type")]
    CommandType,

    /// The command value is invalid, out of range or was rejected.
    #[error("invalid command value")]
    CommandValue,

    /// A value could not be rendered or decoded as text.
    #[error("encoding error")]
    Encoding,

    /// The destination buffer cannot hold the full message.
    #[error("message length exceeded")]
    LengthExceeded,

    /// The requested combination is not supported by this encoder.
    #[error("not implemented")]
    NotImplemented,

    /// Internal invariant violation.
    #[error("internal error")]
    Internal,
}

impl ProtocolError {
    /// Numeric code rendered in `ERROR[...]` responses.
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::Internal => -1,
            ProtocolError::LengthExceeded => -2,
            ProtocolError::Encoding => -3,
            ProtocolError::MessageType => -4,
            ProtocolError::ProtocolFormat => -5,
            ProtocolError::CommandType => -6,
            ProtocolError::CommandValue => -7,
            ProtocolError::NotImplemented => -8,
        }
    }

    /// Map a numeric code back to an error, if known.
    pub fn from_code(code: i32) -> Option<ProtocolError> {
        match code {
            -1 => Some(ProtocolError::Internal),
            -2 => Some(ProtocolError::LengthExceeded),
            -3 => Some(ProtocolError::Encoding),
            -4 => Some(ProtocolError::MessageType),
            -5 => Some(ProtocolError::ProtocolFormat),
            -6 => Some(ProtocolError::CommandType),
            -7 => Some(ProtocolError::CommandValue),
            -8 => Some(ProtocolError::NotImplemented),
            _ => None,
        }
    }
}

/// Errors reported by the injected persistence callback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistError {
    /// A different value has already been committed and cannot change.
    #[error("value already committed as {committed}")]
    AlreadyCommitted {
        /// The value held by the store.
        committed: u32,
    },

    /// The underlying storage or side effect failed.
    #[error("persistence failed: {0}")]
    Storage(String),
}

impl From<PersistError> for ProtocolError {
    fn from(_: PersistError) -> Self {
        ProtocolError::CommandValue
    }
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
