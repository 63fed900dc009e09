//! Radio link abstraction and per-sender sequencing.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{encode_packet, PacketError, RadioPacket, PACKET_SIZE};

/// Transmit side of a radio transport.
///
/// Implementations take `&self` so one link can be shared between the main
/// loop and the receive path.
pub trait RadioLink: Send + Sync {
    /// Send one encoded frame on the current channel.
    fn transmit(&self, frame: &[u8; PACKET_SIZE]) -> Result<(), PacketError>;

    /// Retune to another channel.
    fn set_frequency(&self, frequency: u8) -> Result<(), PacketError>;

    /// Encode and send a packet.
    fn send_packet(&self, packet: &RadioPacket) -> Result<(), PacketError> {
        log::trace!(
            "radio tx {:?} seq={} device={}",
            packet.packet_type(),
            packet.sequence_id,
            packet.device_id
        );
        self.transmit(&encode_packet(packet))
    }
}

/// Monotonic, wrapping sequence counter for outgoing packets.
#[derive(Debug, Default)]
pub struct PacketSequencer {
    next: AtomicU32,
}

impl PacketSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting at `first`.
    pub fn starting_at(first: u32) -> Self {
        PacketSequencer {
            next: AtomicU32::new(first),
        }
    }

    /// Take the next sequence id.
    pub fn next_id(&self) -> u32 {
        // fetch_add wraps on overflow
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// The id the next call to [`next_id`](Self::next_id) will return.
    pub fn peek(&self) -> u32 {
        self.next.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{decode_packet, RadioCommand};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLink {
        frames: Mutex<Vec<[u8; PACKET_SIZE]>>,
    }

    impl RadioLink for RecordingLink {
        fn transmit(&self, frame: &[u8; PACKET_SIZE]) -> Result<(), PacketError> {
            self.frames.lock().unwrap().push(*frame);
            Ok(())
        }

        fn set_frequency(&self, _frequency: u8) -> Result<(), PacketError> {
            Ok(())
        }
    }

    #[test]
    fn test_sequencer_monotonic() {
        let seq = PacketSequencer::new();
        assert_eq!(seq.next_id(), 0);
        assert_eq!(seq.next_id(), 1);
        assert_eq!(seq.peek(), 2);
    }

    #[test]
    fn test_sequencer_wraps() {
        let seq = PacketSequencer::starting_at(u32::MAX);
        assert_eq!(seq.next_id(), u32::MAX);
        assert_eq!(seq.next_id(), 0);
    }

    #[test]
    fn test_send_packet_encodes() {
        let link = RecordingLink::default();
        let packet = RadioPacket::command(3, 99, RadioCommand::Hello);
        link.send_packet(&packet).unwrap();

        let frames = link.frames.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(decode_packet(&frames[0]).unwrap(), packet);
    }
}
