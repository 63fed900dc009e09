//! Packet encoding and decoding.
//!
//! ## Packet Format
//!
//! | Field       | Size (bytes) | Description                                         |
//! |-------------|--------------|-----------------------------------------------------|
//! | packet_type | 1            | [`PacketType`] discriminant.                        |
//! | sub_type    | 1            | [`RadioCommand`] for commands and responses, else 0.|
//! | reserved    | 2            | Always written as zero, ignored on receive.         |
//! | sequence_id | 4            | Little-endian per-sender counter.                   |
//! | device_id   | 4            | Little-endian sender or addressee.                  |
//! | payload     | 16           | Kind-specific block, padded to full size.           |
//!
//! Sensor data payload: `x i32 | y i32 | z i32 | button_a u8 | button_b u8 |
//! button_logo u8 | pad u8`.

use bytes::{Buf, BufMut};

use crate::{
    PacketError, PacketType, RadioCommand, RadioPacket, RadioPayload, SensorReading,
    PACKET_SIZE, PAYLOAD_SIZE,
};

// ============================================================================
// Encoding Functions
// ============================================================================

/// Encode a packet into its fixed-size wire form.
pub fn encode_packet(packet: &RadioPacket) -> [u8; PACKET_SIZE] {
    let mut frame = [0u8; PACKET_SIZE];
    let mut buf = &mut frame[..];

    let sub_type = match packet.payload {
        RadioPayload::SensorData(_) => 0,
        RadioPayload::Command { command, .. } | RadioPayload::Response { command, .. } => {
            command as u8
        }
    };

    // 1. Header
    buf.put_u8(packet.packet_type() as u8);
    buf.put_u8(sub_type);
    buf.put_u16_le(0);
    buf.put_u32_le(packet.sequence_id);
    buf.put_u32_le(packet.device_id);

    // 2. Payload (always the full block)
    match packet.payload {
        RadioPayload::SensorData(reading) => encode_sensor_reading(&reading, &mut buf),
        RadioPayload::Command { data, .. } | RadioPayload::Response { data, .. } => {
            buf.put_slice(&data)
        }
    }

    frame
}

/// Encode sensor readings.
/// Format: x(4) + y(4) + z(4) + button_a(1) + button_b(1) + button_logo(1) + pad(1)
fn encode_sensor_reading(reading: &SensorReading, buf: &mut impl BufMut) {
    buf.put_i32_le(reading.accelerometer_x);
    buf.put_i32_le(reading.accelerometer_y);
    buf.put_i32_le(reading.accelerometer_z);
    buf.put_u8(u8::from(reading.button_a));
    buf.put_u8(u8::from(reading.button_b));
    buf.put_u8(u8::from(reading.button_logo));
    buf.put_u8(0);
}

// ============================================================================
// Decoding Functions
// ============================================================================

/// Decode a received datagram.
///
/// The length is validated before anything else; a datagram of any other
/// size is rejected, never partially interpreted.
pub fn decode_packet(data: &[u8]) -> Result<RadioPacket, PacketError> {
    if data.len() != PACKET_SIZE {
        return Err(PacketError::WrongLength {
            expected: PACKET_SIZE,
            actual: data.len(),
        });
    }

    let mut buf = data;
    let packet_type = PacketType::try_from(buf.get_u8())?;
    let sub_type = buf.get_u8();
    let _reserved = buf.get_u16_le();
    let sequence_id = buf.get_u32_le();
    let device_id = buf.get_u32_le();

    let payload = match packet_type {
        PacketType::SensorData => RadioPayload::SensorData(decode_sensor_reading(&mut buf)),
        PacketType::Command => RadioPayload::Command {
            command: RadioCommand::try_from(sub_type)?,
            data: decode_block(&mut buf),
        },
        PacketType::Response => RadioPayload::Response {
            command: RadioCommand::try_from(sub_type)?,
            data: decode_block(&mut buf),
        },
    };

    Ok(RadioPacket {
        sequence_id,
        device_id,
        payload,
    })
}

fn decode_sensor_reading(buf: &mut impl Buf) -> SensorReading {
    SensorReading {
        accelerometer_x: buf.get_i32_le(),
        accelerometer_y: buf.get_i32_le(),
        accelerometer_z: buf.get_i32_le(),
        button_a: buf.get_u8() != 0,
        button_b: buf.get_u8() != 0,
        button_logo: buf.get_u8() != 0,
    }
}

fn decode_block(buf: &mut impl Buf) -> [u8; PAYLOAD_SIZE] {
    let mut block = [0u8; PAYLOAD_SIZE];
    buf.copy_to_slice(&mut block);
    block
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BROADCAST_ID;

    #[test]
    fn test_sensor_data_layout() {
        let packet = RadioPacket::sensor_data(
            0x01020304,
            0xAABBCCDD,
            SensorReading {
                accelerometer_x: -1,
                accelerometer_y: 2,
                accelerometer_z: 1024,
                button_a: true,
                button_b: false,
                button_logo: true,
            },
        );

        let encoded = encode_packet(&packet);
        assert_eq!(encoded.len(), PACKET_SIZE);
        assert_eq!(&encoded[..4], &[0, 0, 0, 0]);
        assert_eq!(&encoded[4..8], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&encoded[8..12], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(&encoded[12..16], &[0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(&encoded[20..24], &[0x00, 0x04, 0x00, 0x00]);
        assert_eq!(&encoded[24..], &[1, 0, 1, 0]);

        assert_eq!(decode_packet(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_command_roundtrip() {
        let packet = RadioPacket::command(7, BROADCAST_ID, RadioCommand::Blink);
        let encoded = encode_packet(&packet);
        assert_eq!(encoded[0], PacketType::Command as u8);
        assert_eq!(encoded[1], RadioCommand::Blink as u8);
        assert_eq!(decode_packet(&encoded).unwrap(), packet);
    }

    #[test]
    fn test_response_roundtrip() {
        let packet = RadioPacket::response(9, 1234, RadioCommand::Hello);
        let decoded = decode_packet(&encode_packet(&packet)).unwrap();
        assert_eq!(decoded.packet_type(), PacketType::Response);
        assert_eq!(decoded.device_id, 1234);
    }

    #[test]
    fn test_decode_wrong_length() {
        let encoded = encode_packet(&RadioPacket::command(1, 2, RadioCommand::Hello));
        assert_eq!(
            decode_packet(&encoded[..16]),
            Err(PacketError::WrongLength {
                expected: PACKET_SIZE,
                actual: 16
            })
        );

        let mut long = encoded.to_vec();
        long.push(0);
        assert!(matches!(
            decode_packet(&long),
            Err(PacketError::WrongLength { actual: 29, .. })
        ));
        assert!(decode_packet(&[]).is_err());
    }

    #[test]
    fn test_decode_invalid_type() {
        let mut encoded = encode_packet(&RadioPacket::command(1, 2, RadioCommand::Hello));
        encoded[0] = 9;
        assert_eq!(decode_packet(&encoded), Err(PacketError::InvalidPacketType(9)));

        encoded[0] = PacketType::Command as u8;
        encoded[1] = 200;
        assert_eq!(decode_packet(&encoded), Err(PacketError::InvalidCommandType(200)));
    }

    #[test]
    fn test_sensor_sub_type_ignored() {
        let mut encoded = encode_packet(&RadioPacket::sensor_data(1, 2, SensorReading::default()));
        encoded[1] = 0xEE;
        assert!(decode_packet(&encoded).is_ok());
    }
}
