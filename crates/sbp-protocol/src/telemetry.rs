//! Periodic telemetry messages.
//!
//! Two encodings are supported:
//!
//! - **Verbose**: `P[<hex id>]` followed by one `TAG[value]` token per
//!   enabled reading, e.g. `P[1A]AX[-12]AY[40]AZ[-1020]BA[0]BB[1]`.
//! - **Compact**: `P<2 hex id>` followed by three 3-digit hex accelerometer
//!   axes (12-bit, biased by 2048) and one hex digit of button flags, e.g.
//!   `P1A7F48284042`.
//!
//! When no fresh data has arrived since the last message a waiting line is
//! sent instead: `P[<hex id>]WAIT[]` or `P<2 hex id>W`.

use std::fmt;

use crate::codec::write_line;
use crate::error::{ProtocolError, ProtocolResult};

/// Leading character of periodic lines.
pub const PERIODIC_PREFIX: u8 = b'P';

/// Accelerometer range representable in the compact encoding.
pub const COMPACT_ACCEL_MIN: i32 = -2048;
/// Upper bound of the compact accelerometer range.
pub const COMPACT_ACCEL_MAX: i32 = 2047;
/// Bias added to a clamped axis to make it unsigned.
const COMPACT_ACCEL_BIAS: i32 = 2048;

/// Sensor groups that can be streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorType {
    /// Accelerometer X/Y/Z.
    Accelerometer,
    /// Magnetometer (compass) X/Y/Z.
    Magnetometer,
    /// Buttons A and B.
    Buttons,
    /// Touch logo button.
    ButtonLogo,
    /// Edge pin buttons P0..P2.
    ButtonPins,
    /// Temperature.
    Temperature,
    /// Light level.
    LightLevel,
    /// Sound level.
    SoundLevel,
}

/// Every sensor type, in telemetry order.
pub const SENSOR_TYPES: [SensorType; 8] = [
    SensorType::Accelerometer,
    SensorType::Magnetometer,
    SensorType::Buttons,
    SensorType::ButtonLogo,
    SensorType::ButtonPins,
    SensorType::Temperature,
    SensorType::LightLevel,
    SensorType::SoundLevel,
];

impl SensorType {
    /// Letter selecting this sensor in a `START` value.
    pub fn letter(&self) -> char {
        match self {
            SensorType::Accelerometer => 'A',
            SensorType::Magnetometer => 'M',
            SensorType::Buttons => 'B',
            SensorType::ButtonLogo => 'F',
            SensorType::ButtonPins => 'P',
            SensorType::Temperature => 'T',
            SensorType::LightLevel => 'L',
            SensorType::SoundLevel => 'S',
        }
    }

    /// Parse a sensor selection letter.
    pub fn from_letter(letter: char) -> Option<SensorType> {
        SENSOR_TYPES.iter().copied().find(|s| s.letter() == letter)
    }

    fn bit(&self) -> u8 {
        1 << (*self as u8)
    }
}

/// Set of enabled sensor types.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SensorSet(u8);

impl SensorSet {
    /// The empty set.
    pub const fn empty() -> Self {
        SensorSet(0)
    }

    /// The subset streamed by compact mode.
    pub fn compact() -> Self {
        SensorSet::empty()
            .with(SensorType::Accelerometer)
            .with(SensorType::Buttons)
    }

    /// Parse a `START` value: one letter per sensor, any order, duplicates allowed.
    pub fn from_letters(letters: &str) -> ProtocolResult<SensorSet> {
        letters.chars().try_fold(SensorSet::empty(), |set, c| {
            SensorType::from_letter(c)
                .map(|s| set.with(s))
                .ok_or(ProtocolError::CommandValue)
        })
    }

    /// Return a copy with `sensor` enabled.
    pub fn with(self, sensor: SensorType) -> Self {
        SensorSet(self.0 | sensor.bit())
    }

    /// Check if `sensor` is enabled.
    pub fn contains(&self, sensor: SensorType) -> bool {
        self.0 & sensor.bit() != 0
    }

    /// Check if no sensor is enabled.
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Iterate over the enabled sensors in telemetry order.
    pub fn iter(&self) -> impl Iterator<Item = SensorType> + '_ {
        SENSOR_TYPES.iter().copied().filter(|s| self.contains(*s))
    }
}

impl fmt::Debug for SensorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letters: String = self.iter().map(|s| s.letter()).collect();
        write!(f, "SensorSet({letters})")
    }
}

/// Latest sensor readings. Units are whatever the data source provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorData {
    pub accelerometer_x: i32,
    pub accelerometer_y: i32,
    pub accelerometer_z: i32,
    pub magnetometer_x: i32,
    pub magnetometer_y: i32,
    pub magnetometer_z: i32,
    pub button_a: bool,
    pub button_b: bool,
    pub button_logo: bool,
    pub button_p0: bool,
    pub button_p1: bool,
    pub button_p2: bool,
    pub temperature: i32,
    pub light_level: i32,
    pub sound_level: i32,
}

/// Sensor data plus whether it changed since it was last consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub data: SensorData,
    pub fresh: bool,
}

impl SensorSnapshot {
    /// A snapshot holding newly acquired data.
    pub fn fresh(data: SensorData) -> Self {
        SensorSnapshot { data, fresh: true }
    }
}

/// Render a verbose periodic line into `buf`.
pub fn encode_verbose(
    packet_id: u32,
    sensors: SensorSet,
    data: &SensorData,
    buf: &mut [u8],
) -> ProtocolResult<usize> {
    write_line(buf, |w| {
        w.put_fmt(format_args!("P[{packet_id:X}]"))?;
        for sensor in sensors.iter() {
            match sensor {
                SensorType::Accelerometer => w.put_fmt(format_args!(
                    "AX[{}]AY[{}]AZ[{}]",
                    data.accelerometer_x, data.accelerometer_y, data.accelerometer_z
                ))?,
                SensorType::Magnetometer => w.put_fmt(format_args!(
                    "CX[{}]CY[{}]CZ[{}]",
                    data.magnetometer_x, data.magnetometer_y, data.magnetometer_z
                ))?,
                SensorType::Buttons => w.put_fmt(format_args!(
                    "BA[{}]BB[{}]",
                    u8::from(data.button_a),
                    u8::from(data.button_b)
                ))?,
                SensorType::ButtonLogo => {
                    w.put_fmt(format_args!("BL[{}]", u8::from(data.button_logo)))?
                }
                SensorType::ButtonPins => w.put_fmt(format_args!(
                    "B0[{}]B1[{}]B2[{}]",
                    u8::from(data.button_p0),
                    u8::from(data.button_p1),
                    u8::from(data.button_p2)
                ))?,
                SensorType::Temperature => w.put_fmt(format_args!("T[{}]", data.temperature))?,
                SensorType::LightLevel => w.put_fmt(format_args!("L[{}]", data.light_level))?,
                SensorType::SoundLevel => w.put_fmt(format_args!("S[{}]", data.sound_level))?,
            }
        }
        Ok(())
    })
}

/// Clamp an axis to the signed 12-bit range and shift it to unsigned.
pub fn compact_axis(value: i32) -> u16 {
    (value.clamp(COMPACT_ACCEL_MIN, COMPACT_ACCEL_MAX) + COMPACT_ACCEL_BIAS) as u16
}

/// Render a compact periodic line into `buf`.
///
/// Only the accelerometer and buttons can be represented; any other enabled
/// sensor fails with `NotImplemented` instead of being dropped.
pub fn encode_compact(
    packet_id: u32,
    sensors: SensorSet,
    data: &SensorData,
    buf: &mut [u8],
) -> ProtocolResult<usize> {
    if sensors
        .iter()
        .any(|s| !matches!(s, SensorType::Accelerometer | SensorType::Buttons))
    {
        return Err(ProtocolError::NotImplemented);
    }

    write_line(buf, |w| {
        w.put_fmt(format_args!("P{:02X}", packet_id & 0xFF))?;
        if sensors.contains(SensorType::Accelerometer) {
            w.put_fmt(format_args!(
                "{:03X}{:03X}{:03X}",
                compact_axis(data.accelerometer_x),
                compact_axis(data.accelerometer_y),
                compact_axis(data.accelerometer_z)
            ))?;
        }
        if sensors.contains(SensorType::Buttons) {
            let flags = u8::from(data.button_a) | (u8::from(data.button_b) << 1);
            w.put_fmt(format_args!("{flags:X}"))?;
        }
        Ok(())
    })
}

/// Render the "no fresh data" indication for the given encoding.
pub fn encode_waiting(packet_id: u32, compact: bool, buf: &mut [u8]) -> ProtocolResult<usize> {
    write_line(buf, |w| {
        if compact {
            w.put_fmt(format_args!("P{:02X}W", packet_id & 0xFF))
        } else {
            w.put_fmt(format_args!("P[{packet_id:X}]WAIT[]"))
        }
    })
}

/// Render one periodic line with the encoding selected by `compact`.
pub fn encode_periodic(
    packet_id: u32,
    compact: bool,
    sensors: SensorSet,
    data: &SensorData,
    buf: &mut [u8],
) -> ProtocolResult<usize> {
    if compact {
        encode_compact(packet_id, sensors, data, buf)
    } else {
        encode_verbose(packet_id, sensors, data, buf)
    }
}
