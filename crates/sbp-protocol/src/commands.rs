//! Commands sent by the host over the serial link.
//!
//! Grammar of a command line (separator already stripped):
//!
//! ```text
//! 'C' '[' <1..=8 hex digits> ']' <type token> '[' <value> ']'
//! ```
//!
//! Parsing is strict and fails closed. The id is an opaque correlation token
//! that is echoed byte-for-byte in the response and never interpreted as a
//! number.

use std::fmt;

use crate::error::{ProtocolError, ProtocolResult};

/// Leading character of command lines.
pub const COMMAND_PREFIX: u8 = b'C';

/// Maximum number of characters in a command id.
pub const MAX_ID_LENGTH: usize = 8;

/// Command types recognised by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// Protocol handshake (`HS`).
    Handshake,
    /// Get or set the radio frequency (`RF`).
    RadioFrequency,
    /// Set the periodic message interval in milliseconds (`PER`).
    Period,
    /// Get or set the paired remote device id (`RMBID`).
    RemoteId,
    /// Get this device's own id (`MBID`).
    LocalId,
    /// Get the software version (`SWVER`).
    SoftwareVersion,
    /// Get the hardware version (`HWVER`).
    HardwareVersion,
    /// Start verbose periodic messages for a sensor subset (`START`).
    Start,
    /// Start compact periodic messages (`ZSTART`).
    CompactStart,
    /// Stop periodic messages (`STOP`).
    Stop,
}

/// Every command type, in table order.
pub const COMMAND_TYPES: [CommandType; 10] = [
    CommandType::Handshake,
    CommandType::RadioFrequency,
    CommandType::Period,
    CommandType::RemoteId,
    CommandType::LocalId,
    CommandType::SoftwareVersion,
    CommandType::HardwareVersion,
    CommandType::Start,
    CommandType::CompactStart,
    CommandType::Stop,
];

/// Length of the longest type token; bounds the token scan.
pub const MAX_TOKEN_LENGTH: usize = longest_token(&COMMAND_TYPES);

const fn longest_token(types: &[CommandType]) -> usize {
    let mut longest = 0;
    let mut i = 0;
    while i < types.len() {
        let len = types[i].as_str().len();
        if len > longest {
            longest = len;
        }
        i += 1;
    }
    longest
}

impl CommandType {
    /// Get the type token used on the wire.
    pub const fn as_str(&self) -> &'static str {
        match self {
            CommandType::Handshake => "HS",
            CommandType::RadioFrequency => "RF",
            CommandType::Period => "PER",
            CommandType::RemoteId => "RMBID",
            CommandType::LocalId => "MBID",
            CommandType::SoftwareVersion => "SWVER",
            CommandType::HardwareVersion => "HWVER",
            CommandType::Start => "START",
            CommandType::CompactStart => "ZSTART",
            CommandType::Stop => "STOP",
        }
    }

    /// Look up a type token. Matching is exact and case-sensitive.
    pub fn from_token(token: &[u8]) -> Option<CommandType> {
        if token.len() > MAX_TOKEN_LENGTH {
            return None;
        }
        COMMAND_TYPES
            .iter()
            .copied()
            .find(|t| t.as_str().as_bytes() == token)
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation token of a command, kept as the exact received bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandId {
    bytes: [u8; MAX_ID_LENGTH],
    len: u8,
}

impl CommandId {
    /// Validate an id span: 1..=8 ASCII hex digits, any case.
    pub fn new(span: &[u8]) -> ProtocolResult<CommandId> {
        if span.is_empty() || span.len() > MAX_ID_LENGTH {
            return Err(ProtocolError::ProtocolFormat);
        }
        if !span.iter().all(u8::is_ascii_hexdigit) {
            return Err(ProtocolError::ProtocolFormat);
        }
        let mut bytes = [0u8; MAX_ID_LENGTH];
        bytes[..span.len()].copy_from_slice(span);
        Ok(CommandId {
            bytes,
            len: span.len() as u8,
        })
    }

    /// Best-effort recovery of the id from a line that failed to parse, so
    /// that an error response can still be correlated.
    pub fn scan(line: &[u8]) -> Option<CommandId> {
        let rest = line.strip_prefix(&[COMMAND_PREFIX, b'['])?;
        let close = rest
            .iter()
            .take(MAX_ID_LENGTH + 1)
            .position(|&b| b == b']')?;
        CommandId::new(&rest[..close]).ok()
    }

    /// The id bytes exactly as received.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        // Only ASCII hex digits are ever stored.
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }
}

impl fmt::Debug for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandId({})", self.as_str())
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command, borrowing its value from the input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    /// Correlation id to echo in the response.
    pub id: CommandId,
    /// The command type.
    pub command_type: CommandType,
    /// The bracketed value, possibly empty.
    pub value: &'a str,
}

impl<'a> Command<'a> {
    /// Parse a command line (without separator).
    pub fn parse(line: &'a [u8]) -> ProtocolResult<Command<'a>> {
        if line.first() != Some(&COMMAND_PREFIX) {
            return Err(ProtocolError::MessageType);
        }
        if line.get(1) != Some(&b'[') {
            return Err(ProtocolError::ProtocolFormat);
        }

        // Id span: at most MAX_ID_LENGTH characters before the closing bracket.
        let id_area = &line[2..];
        let id_close = id_area
            .iter()
            .take(MAX_ID_LENGTH + 1)
            .position(|&b| b == b']')
            .ok_or(ProtocolError::ProtocolFormat)?;
        let id = CommandId::new(&id_area[..id_close])?;

        // Type token: bounded by the longest known token.
        let rest = &id_area[id_close + 1..];
        let open = rest
            .iter()
            .take(MAX_TOKEN_LENGTH + 1)
            .position(|&b| b == b'[')
            .ok_or(ProtocolError::CommandType)?;
        let command_type =
            CommandType::from_token(&rest[..open]).ok_or(ProtocolError::CommandType)?;

        // Value span: up to the first closing bracket, which must end the line.
        let value_area = &rest[open + 1..];
        let close = value_area
            .iter()
            .position(|&b| b == b']')
            .ok_or(ProtocolError::ProtocolFormat)?;
        if close + 1 != value_area.len() {
            return Err(ProtocolError::ProtocolFormat);
        }
        let value =
            std::str::from_utf8(&value_area[..close]).map_err(|_| ProtocolError::Encoding)?;

        Ok(Command {
            id,
            command_type,
            value,
        })
    }

    /// Encode the command as a line to send to the firmware (host side).
    pub fn encode(&self) -> Vec<u8> {
        format!(
            "C[{}]{}[{}]\n",
            self.id,
            self.command_type.as_str(),
            self.value
        )
        .into_bytes()
    }
}
