//! Error types for sbp-radio.

use thiserror::Error;

/// Errors that can occur during packet operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Datagram length differs from the fixed envelope size.
    #[error("Wrong packet length: {actual} bytes (expected {expected})")]
    WrongLength {
        /// Fixed envelope size.
        expected: usize,
        /// Length actually received.
        actual: usize,
    },

    /// Invalid packet type.
    #[error("Invalid packet type: {0}")]
    InvalidPacketType(u8),

    /// Invalid command type.
    #[error("Invalid command type: {0}")]
    InvalidCommandType(u8),

    /// The radio link refused or failed to send a packet.
    #[error("Transmit failed: {0}")]
    TransmitFailed(String),
}

/// Result type for packet operations.
pub type PacketResult<T> = Result<T, PacketError>;

impl PacketError {
    /// Create a transmit error.
    pub fn transmit(message: impl Into<String>) -> Self {
        PacketError::TransmitFailed(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PacketError::WrongLength {
            expected: 28,
            actual: 16,
        };
        assert!(err.to_string().contains("16 bytes"));

        let err = PacketError::transmit("socket closed");
        assert!(err.to_string().contains("socket closed"));
    }
}
