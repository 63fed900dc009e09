//! Radio packet types.
//!
//! All packets share one fixed-size envelope so the receiver can validate the
//! datagram length before looking at the type.

use sbp_protocol::{SensorData, MAX_FREQUENCY};

use crate::error::PacketError;

/// Size of the payload block shared by every packet kind.
pub const PAYLOAD_SIZE: usize = 16;

/// Size of the envelope header: type, sub type, reserved, sequence id, device id.
pub const HEADER_SIZE: usize = 12;

/// Total size of every radio packet on the wire.
pub const PACKET_SIZE: usize = HEADER_SIZE + PAYLOAD_SIZE;

/// Device id addressing every remote at once.
pub const BROADCAST_ID: u32 = 0;

/// Number of display rows carried by a `Display` command.
pub const DISPLAY_ROWS: usize = 5;

/// Derive a radio channel from a device identity.
///
/// Deterministic and stateless, so two devices agree on the channel without
/// negotiating. Collisions are possible.
pub fn frequency_from_id(id: u32) -> u8 {
    (id % u32::from(MAX_FREQUENCY)) as u8
}

/// Packet kind, the first byte of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// Sensor readings from a remote.
    SensorData = 0,
    /// Command to one remote or to all of them.
    Command = 1,
    /// Answer to a command.
    Response = 2,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::SensorData),
            1 => Ok(PacketType::Command),
            2 => Ok(PacketType::Response),
            other => Err(PacketError::InvalidPacketType(other)),
        }
    }
}

/// Command carried in the sub type byte of command and response packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioCommand {
    /// Placeholder for an unset command.
    Invalid = 0,
    /// Presence probe; remotes answer with a response packet.
    Hello = 1,
    /// Flash the display so the device can be identified.
    Blink = 2,
    /// Show a 5x5 image.
    Display = 3,
}

impl TryFrom<u8> for RadioCommand {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RadioCommand::Invalid),
            1 => Ok(RadioCommand::Hello),
            2 => Ok(RadioCommand::Blink),
            3 => Ok(RadioCommand::Display),
            other => Err(PacketError::InvalidCommandType(other)),
        }
    }
}

/// Accelerometer and button readings sent by a remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorReading {
    pub accelerometer_x: i32,
    pub accelerometer_y: i32,
    pub accelerometer_z: i32,
    pub button_a: bool,
    pub button_b: bool,
    pub button_logo: bool,
}

impl From<SensorReading> for SensorData {
    fn from(reading: SensorReading) -> Self {
        SensorData {
            accelerometer_x: reading.accelerometer_x,
            accelerometer_y: reading.accelerometer_y,
            accelerometer_z: reading.accelerometer_z,
            button_a: reading.button_a,
            button_b: reading.button_b,
            button_logo: reading.button_logo,
            ..SensorData::default()
        }
    }
}

impl From<&SensorData> for SensorReading {
    fn from(data: &SensorData) -> Self {
        SensorReading {
            accelerometer_x: data.accelerometer_x,
            accelerometer_y: data.accelerometer_y,
            accelerometer_z: data.accelerometer_z,
            button_a: data.button_a,
            button_b: data.button_b,
            button_logo: data.button_logo,
        }
    }
}

/// Typed packet payload, one case per packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioPayload {
    /// Sensor readings.
    SensorData(SensorReading),
    /// A command with its opaque value block.
    Command {
        command: RadioCommand,
        data: [u8; PAYLOAD_SIZE],
    },
    /// A response with its opaque value block.
    Response {
        command: RadioCommand,
        data: [u8; PAYLOAD_SIZE],
    },
}

/// A decoded radio packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioPacket {
    /// Per-sender counter, wrapping.
    pub sequence_id: u32,
    /// Sender for sensor data and responses; addressee for commands.
    pub device_id: u32,
    /// Kind-specific payload.
    pub payload: RadioPayload,
}

impl RadioPacket {
    /// Create a sensor data packet.
    pub fn sensor_data(sequence_id: u32, sender_id: u32, reading: SensorReading) -> Self {
        RadioPacket {
            sequence_id,
            device_id: sender_id,
            payload: RadioPayload::SensorData(reading),
        }
    }

    /// Create a command packet addressed to `target_id` (or [`BROADCAST_ID`]).
    pub fn command(sequence_id: u32, target_id: u32, command: RadioCommand) -> Self {
        Self::command_with_data(sequence_id, target_id, command, [0u8; PAYLOAD_SIZE])
    }

    /// Create a command packet with a value block.
    pub fn command_with_data(
        sequence_id: u32,
        target_id: u32,
        command: RadioCommand,
        data: [u8; PAYLOAD_SIZE],
    ) -> Self {
        RadioPacket {
            sequence_id,
            device_id: target_id,
            payload: RadioPayload::Command { command, data },
        }
    }

    /// Create a display command showing five row bitmaps.
    pub fn display(sequence_id: u32, target_id: u32, rows: [u8; DISPLAY_ROWS]) -> Self {
        let mut data = [0u8; PAYLOAD_SIZE];
        data[..DISPLAY_ROWS].copy_from_slice(&rows);
        Self::command_with_data(sequence_id, target_id, RadioCommand::Display, data)
    }

    /// Create a response packet from `sender_id`.
    pub fn response(sequence_id: u32, sender_id: u32, command: RadioCommand) -> Self {
        RadioPacket {
            sequence_id,
            device_id: sender_id,
            payload: RadioPayload::Response {
                command,
                data: [0u8; PAYLOAD_SIZE],
            },
        }
    }

    /// The packet kind.
    pub fn packet_type(&self) -> PacketType {
        match self.payload {
            RadioPayload::SensorData(_) => PacketType::SensorData,
            RadioPayload::Command { .. } => PacketType::Command,
            RadioPayload::Response { .. } => PacketType::Response,
        }
    }

    /// Whether a command packet targets `id`, directly or by broadcast.
    pub fn is_addressed_to(&self, id: u32) -> bool {
        self.device_id == id || self.device_id == BROADCAST_ID
    }
}

/// Rows of a display command value block.
pub fn display_rows(data: &[u8; PAYLOAD_SIZE]) -> [u8; DISPLAY_ROWS] {
    let mut rows = [0u8; DISPLAY_ROWS];
    rows.copy_from_slice(&data[..DISPLAY_ROWS]);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_size() {
        assert_eq!(PACKET_SIZE, 28);
    }

    #[test]
    fn test_frequency_from_id_in_range() {
        for id in [0, 1, 82, 83, 84, 3130793464, u32::MAX, u32::MAX - 1] {
            assert!(frequency_from_id(id) < MAX_FREQUENCY);
        }
        assert_eq!(frequency_from_id(83), 0);
        assert_eq!(frequency_from_id(85), 2);
        assert_eq!(frequency_from_id(3130793464), frequency_from_id(3130793464));
    }

    #[test]
    fn test_addressing() {
        let packet = RadioPacket::command(1, 42, RadioCommand::Blink);
        assert!(packet.is_addressed_to(42));
        assert!(!packet.is_addressed_to(43));

        let broadcast = RadioPacket::command(2, BROADCAST_ID, RadioCommand::Hello);
        assert!(broadcast.is_addressed_to(43));
    }

    #[test]
    fn test_display_rows() {
        let packet = RadioPacket::display(1, 42, [1, 2, 3, 4, 5]);
        match packet.payload {
            RadioPayload::Command { command, data } => {
                assert_eq!(command, RadioCommand::Display);
                assert_eq!(display_rows(&data), [1, 2, 3, 4, 5]);
            }
            other => panic!("Expected Command payload, got {other:?}"),
        }
    }

    #[test]
    fn test_reading_conversion() {
        let reading = SensorReading {
            accelerometer_x: -5,
            accelerometer_y: 6,
            accelerometer_z: 1024,
            button_a: true,
            button_b: false,
            button_logo: true,
        };
        let data = SensorData::from(reading);
        assert_eq!(data.accelerometer_z, 1024);
        assert!(data.button_logo);
        assert_eq!(SensorReading::from(&data), reading);
    }
}
