//! Radio remote role.
//!
//! A remote has no serial host. It broadcasts its readings every
//! [`SEND_INTERVAL_MS`] and answers commands addressed to it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use sbp_radio::{
    decode_packet, display_rows, PacketResult, PacketSequencer, RadioCommand, RadioLink,
    RadioPacket, RadioPayload, SensorReading, DISPLAY_ROWS,
};

use crate::clock::Clock;
use crate::sensors::SensorSource;

/// Interval between two sensor packets.
pub const SEND_INTERVAL_MS: u64 = 40;

/// How a remote reacted to a received datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEvent {
    Blink,
    /// Answered a presence probe.
    Hello,
    Display([u8; DISPLAY_ROWS]),
    /// A command for another device.
    NotAddressed,
    /// Not a command packet.
    Ignored,
    Malformed,
}

/// A remote sensor board.
pub struct RemoteNode {
    device_id: u32,
    link: Arc<dyn RadioLink>,
    sequencer: PacketSequencer,
    sensors: Mutex<Box<dyn SensorSource>>,
}

impl RemoteNode {
    pub fn new(device_id: u32, link: Arc<dyn RadioLink>, sensors: Box<dyn SensorSource>) -> Self {
        RemoteNode {
            device_id,
            link,
            sequencer: PacketSequencer::new(),
            sensors: Mutex::new(sensors),
        }
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Read the sensors and send one sensor data packet.
    pub fn send_reading(&self) -> PacketResult<()> {
        let data = self.sensors.lock().read();
        let packet = RadioPacket::sensor_data(
            self.sequencer.next_id(),
            self.device_id,
            SensorReading::from(&data),
        );
        self.link.send_packet(&packet)
    }

    /// Handle one datagram from the radio.
    pub fn on_radio_receive(&self, bytes: &[u8]) -> RemoteEvent {
        let packet = match decode_packet(bytes) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!("dropping radio datagram: {e}");
                return RemoteEvent::Malformed;
            }
        };

        let RadioPayload::Command { command, data } = packet.payload else {
            return RemoteEvent::Ignored;
        };
        if !packet.is_addressed_to(self.device_id) {
            return RemoteEvent::NotAddressed;
        }

        match command {
            RadioCommand::Blink => {
                tracing::info!("blink requested");
                RemoteEvent::Blink
            }
            RadioCommand::Hello => {
                let response =
                    RadioPacket::response(self.sequencer.next_id(), self.device_id, command);
                if let Err(e) = self.link.send_packet(&response) {
                    tracing::warn!("hello response not sent: {e}");
                }
                RemoteEvent::Hello
            }
            RadioCommand::Display => {
                let rows = display_rows(&data);
                tracing::info!("display:\n{}", render_rows(&rows));
                RemoteEvent::Display(rows)
            }
            RadioCommand::Invalid => RemoteEvent::Ignored,
        }
    }

    /// Send readings on a fixed cadence until `shutdown` is set.
    pub fn run(&self, clock: &dyn Clock, shutdown: &AtomicBool) {
        let interval_us = SEND_INTERVAL_MS * 1_000;
        let mut next = clock.now_us() + interval_us;
        tracing::info!("remote {} sending every {} ms", self.device_id, SEND_INTERVAL_MS);

        while !shutdown.load(Ordering::Relaxed) {
            let now = clock.now_us();
            if now < next {
                clock.sleep(Duration::from_micros(next - now));
                continue;
            }
            if let Err(e) = self.send_reading() {
                tracing::warn!("sensor packet not sent: {e}");
            }
            next += interval_us;
        }
    }
}

/// Draw a 5x5 image, bit 4 of each row leftmost.
fn render_rows(rows: &[u8; DISPLAY_ROWS]) -> String {
    rows.iter()
        .map(|row| {
            (0..5)
                .rev()
                .map(|bit| if row & (1 << bit) != 0 { '#' } else { '.' })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
