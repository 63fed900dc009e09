//! Serial line transports.
//!
//! The scheduler sees a [`SerialPort`]: a non-blocking line reader plus a
//! writer. [`StdioSerial`] reads stdin on a background thread and writes to
//! stdout; [`ChannelSerial::new_pair`] gives an in-memory port and its host
//! end for tests.

use std::io::{self, Read, Write};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use sbp_protocol::LineCodec;

/// Line-oriented serial transport.
pub trait SerialPort {
    /// Take one complete inbound line, without its separator, if available.
    fn read_line(&mut self) -> Option<Vec<u8>>;

    /// Transmit already-framed bytes.
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
}

// ============================================================================
// Stdio
// ============================================================================

/// Serial port over the process's stdin and stdout.
pub struct StdioSerial {
    lines: Receiver<Vec<u8>>,
    stdout: io::Stdout,
}

impl StdioSerial {
    /// Spawn the stdin reader thread.
    pub fn spawn() -> io::Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        thread::Builder::new()
            .name("serial-rx".into())
            .spawn(move || stdin_reader(tx))?;
        Ok(StdioSerial {
            lines: rx,
            stdout: io::stdout(),
        })
    }
}

fn stdin_reader(tx: Sender<Vec<u8>>) {
    let mut codec = LineCodec::new();
    let mut stdin = io::stdin().lock();
    let mut buf = [0u8; 256];
    loop {
        match stdin.read(&mut buf) {
            Ok(0) => {
                tracing::debug!(
                    "stdin closed, {} overlong lines dropped",
                    codec.dropped_lines()
                );
                return;
            }
            Ok(n) => {
                codec.push(&buf[..n]);
                while let Some(line) = codec.decode_line() {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!("stdin read failed: {e}");
                return;
            }
        }
    }
}

impl SerialPort for StdioSerial {
    fn read_line(&mut self) -> Option<Vec<u8>> {
        self.lines.try_recv().ok()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = self.stdout.lock();
        out.write_all(bytes)?;
        out.flush()
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Device end of an in-memory serial link.
pub struct ChannelSerial {
    rx: Receiver<Vec<u8>>,
    tx: Sender<Vec<u8>>,
}

/// Host end of an in-memory serial link.
pub struct SerialHost {
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

impl ChannelSerial {
    /// Create a connected device/host pair.
    pub fn new_pair() -> (ChannelSerial, SerialHost) {
        let (to_device, from_host) = crossbeam_channel::unbounded();
        let (to_host, from_device) = crossbeam_channel::unbounded();
        (
            ChannelSerial {
                rx: from_host,
                tx: to_host,
            },
            SerialHost {
                tx: to_device,
                rx: from_device,
            },
        )
    }
}

impl SerialPort for ChannelSerial {
    fn read_line(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "serial host dropped"))
    }
}

impl SerialHost {
    /// Queue one line for the device (separator not included).
    pub fn send_line(&self, line: &str) {
        // The device end may already be gone; tests then see no output.
        let _ = self.tx.send(line.as_bytes().to_vec());
    }

    /// Next output written by the device, as text.
    pub fn try_recv(&self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Everything written so far.
    pub fn drain(&self) -> Vec<String> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
