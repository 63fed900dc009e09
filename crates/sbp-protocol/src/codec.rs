//! Line framing for the serial link.
//!
//! Every protocol message is a single line terminated by [`LINE_SEPARATOR`].
//! Outbound lines are built into a fixed buffer with [`LineWriter`], which
//! reports overflow as [`ProtocolError::LengthExceeded`] instead of
//! truncating. Inbound bytes are accumulated by [`LineCodec`] until a complete
//! line is available.

use std::fmt;

use bytes::{BufMut, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};

/// Maximum length of a single line, in either direction, including the separator.
pub const MAX_LINE_LENGTH: usize = 128;

/// Separator terminating every line.
pub const LINE_SEPARATOR: &[u8] = b"\n";

/// A bounded writer over a fixed byte buffer.
///
/// Writes either fit completely or fail with `LengthExceeded` and leave the
/// written length unchanged.
#[derive(Debug)]
pub struct LineWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> LineWriter<'a> {
    /// Create a writer over `buf`, starting empty.
    pub fn new(buf: &'a mut [u8]) -> Self {
        LineWriter { buf, len: 0 }
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Append raw bytes.
    pub fn put(&mut self, bytes: &[u8]) -> ProtocolResult<()> {
        if bytes.len() > self.remaining() {
            return Err(ProtocolError::LengthExceeded);
        }
        self.buf[self.len..self.len + bytes.len()].copy_from_slice(bytes);
        self.len += bytes.len();
        Ok(())
    }

    /// Append a string.
    pub fn put_str(&mut self, s: &str) -> ProtocolResult<()> {
        self.put(s.as_bytes())
    }

    /// Append formatted text, rolling back any partial output on overflow.
    pub fn put_fmt(&mut self, args: fmt::Arguments<'_>) -> ProtocolResult<()> {
        let start = self.len;
        match fmt::Write::write_fmt(&mut *self, args) {
            Ok(()) => Ok(()),
            Err(_) => {
                self.len = start;
                Err(ProtocolError::LengthExceeded)
            }
        }
    }

    /// Overwrite the tail of the buffer with the separator so that a partial
    /// message is still frame-delimited.
    fn terminate_at_end(&mut self) {
        let end = self.buf.len();
        if end >= LINE_SEPARATOR.len() {
            self.buf[end - LINE_SEPARATOR.len()..].copy_from_slice(LINE_SEPARATOR);
            self.len = end;
        }
    }
}

impl fmt::Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

/// Build a complete line into `buf`.
///
/// `body` writes the message content; the separator is appended afterwards.
/// Returns the full line length. When the buffer is too small the separator
/// is written into its last bytes and `LengthExceeded` is returned.
pub fn write_line<F>(buf: &mut [u8], body: F) -> ProtocolResult<usize>
where
    F: FnOnce(&mut LineWriter<'_>) -> ProtocolResult<()>,
{
    let mut writer = LineWriter::new(buf);
    let result = body(&mut writer).and_then(|()| writer.put(LINE_SEPARATOR));
    match result {
        Ok(()) => Ok(writer.len()),
        Err(ProtocolError::LengthExceeded) => {
            writer.terminate_at_end();
            Err(ProtocolError::LengthExceeded)
        }
        Err(e) => Err(e),
    }
}

/// Accumulates inbound serial bytes and yields complete lines.
///
/// Lines longer than [`MAX_LINE_LENGTH`] are discarded whole, up to and
/// including their separator, so they are never parsed truncated.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
    /// Bytes received since the last separator.
    pending: usize,
    /// Whether the rest of the current line is being dropped.
    discarding: bool,
    /// Number of overlong lines dropped so far.
    dropped: u64,
}

impl LineCodec {
    /// Create a new line codec.
    pub fn new() -> Self {
        LineCodec {
            buffer: BytesMut::with_capacity(MAX_LINE_LENGTH * 2),
            pending: 0,
            discarding: false,
            dropped: 0,
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        for &byte in data {
            if self.discarding {
                if byte == b'\n' {
                    self.discarding = false;
                }
                continue;
            }

            self.buffer.put_u8(byte);
            if byte == b'\n' {
                self.pending = 0;
                continue;
            }

            self.pending += 1;
            if self.pending >= MAX_LINE_LENGTH {
                let keep = self.buffer.len() - self.pending;
                self.buffer.truncate(keep);
                self.pending = 0;
                self.discarding = true;
                self.dropped += 1;
                log::warn!("dropping serial line longer than {} bytes", MAX_LINE_LENGTH);
            }
        }
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// The separator and any trailing carriage return are stripped. Empty
    /// lines are skipped.
    pub fn decode_line(&mut self) -> Option<Vec<u8>> {
        loop {
            let end = self.buffer.iter().position(|&b| b == b'\n')?;
            let line = self.buffer.split_to(end + 1);
            let mut content = &line[..end];
            if let Some(stripped) = content.strip_suffix(b"\r") {
                content = stripped;
            }
            if !content.is_empty() {
                return Some(content.to_vec());
            }
        }
    }

    /// Number of overlong lines dropped since creation.
    pub fn dropped_lines(&self) -> u64 {
        self.dropped
    }
}
