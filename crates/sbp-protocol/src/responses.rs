//! Responses sent back to the host.
//!
//! ```text
//! 'R' '[' <echoed id> ']' <type token> '[' <value> ']' <separator>
//! 'R' '[' <echoed id> ']' 'ERROR' '[' <error code> ']' <separator>
//! ```

use crate::codec::{write_line, LINE_SEPARATOR, MAX_LINE_LENGTH};
use crate::commands::{CommandId, CommandType, MAX_ID_LENGTH};
use crate::error::{ProtocolError, ProtocolResult};

/// Leading character of response lines.
pub const RESPONSE_PREFIX: u8 = b'R';

/// Token used in place of the command type for error responses.
pub const ERROR_TOKEN: &str = "ERROR";

/// Longest value a success response of `command_type` can carry when the id
/// has its maximum length.
pub const fn max_value_length(command_type: CommandType) -> usize {
    // R[<id>]<token>[<value>]<separator>
    MAX_LINE_LENGTH - (5 + MAX_ID_LENGTH + command_type.as_str().len() + LINE_SEPARATOR.len())
}

/// A response to exactly one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The command succeeded.
    Success {
        /// Id of the command being answered.
        id: CommandId,
        /// Type of the command being answered.
        command_type: CommandType,
        /// Rendered value, possibly empty.
        value: String,
    },

    /// The command failed.
    Error {
        /// Id of the command being answered.
        id: CommandId,
        /// Why it failed.
        error: ProtocolError,
    },
}

impl Response {
    /// Create a success response.
    pub fn success(id: CommandId, command_type: CommandType, value: impl Into<String>) -> Self {
        Response::Success {
            id,
            command_type,
            value: value.into(),
        }
    }

    /// Create an error response.
    pub fn error(id: CommandId, error: ProtocolError) -> Self {
        Response::Error { id, error }
    }

    /// The id this response echoes.
    pub fn id(&self) -> CommandId {
        match self {
            Response::Success { id, .. } | Response::Error { id, .. } => *id,
        }
    }

    /// Check if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Render the response line into `buf`, returning its length.
    ///
    /// Fails with `LengthExceeded` rather than truncating.
    pub fn encode_into(&self, buf: &mut [u8]) -> ProtocolResult<usize> {
        write_line(buf, |w| {
            w.put(&[RESPONSE_PREFIX, b'['])?;
            w.put(self.id().as_bytes())?;
            w.put(b"]")?;
            match self {
                Response::Success {
                    command_type,
                    value,
                    ..
                } => {
                    w.put_str(command_type.as_str())?;
                    w.put(b"[")?;
                    w.put_str(value)?;
                }
                Response::Error { error, .. } => {
                    w.put_str(ERROR_TOKEN)?;
                    w.put_fmt(format_args!("[{}", error.code()))?;
                }
            }
            w.put(b"]")
        })
    }

    /// Render the response into a new line buffer.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let mut buf = [0u8; MAX_LINE_LENGTH];
        let len = self.encode_into(&mut buf)?;
        Ok(buf[..len].to_vec())
    }
}

/// A response line as seen by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseLine {
    /// Echoed id text.
    pub id: String,
    /// Type token, or `ERROR`.
    pub token: String,
    /// Bracketed value.
    pub value: String,
}

impl ResponseLine {
    /// Check if this line reports an error.
    pub fn is_error(&self) -> bool {
        self.token == ERROR_TOKEN
    }

    /// Decode the error code of an error line.
    pub fn error(&self) -> Option<ProtocolError> {
        if !self.is_error() {
            return None;
        }
        self.value.parse().ok().and_then(ProtocolError::from_code)
    }
}

/// Parse a response line received by the host, with or without separator.
pub fn parse_response_line(line: &str) -> ProtocolResult<ResponseLine> {
    let line = line.trim_end_matches(['\r', '\n']);
    let rest = line
        .strip_prefix(RESPONSE_PREFIX as char)
        .ok_or(ProtocolError::MessageType)?;
    let rest = rest.strip_prefix('[').ok_or(ProtocolError::ProtocolFormat)?;
    let (id, rest) = rest.split_once(']').ok_or(ProtocolError::ProtocolFormat)?;
    if id.is_empty() || id.len() > MAX_ID_LENGTH {
        return Err(ProtocolError::ProtocolFormat);
    }
    let (token, rest) = rest.split_once('[').ok_or(ProtocolError::ProtocolFormat)?;
    let value = rest.strip_suffix(']').ok_or(ProtocolError::ProtocolFormat)?;
    if value.contains(']') {
        return Err(ProtocolError::ProtocolFormat);
    }
    Ok(ResponseLine {
        id: id.to_string(),
        token: token.to_string(),
        value: value.to_string(),
    })
}
