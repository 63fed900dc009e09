//! Sensor data sources.
//!
//! [`SyntheticSensors`] stands in for the board's hardware reads with a
//! seeded random walk. [`SnapshotSource`] is what the scheduler polls once
//! per period: either local sensors (always fresh) or the bridge relay.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use sbp_bridge::BridgeRelay;
use sbp_protocol::{SensorData, SensorSnapshot};

/// Raw sensor acquisition.
pub trait SensorSource: Send {
    fn read(&mut self) -> SensorData;
}

/// Deterministic fake sensors.
#[derive(Debug, Clone)]
pub struct SyntheticSensors {
    rng: ChaCha8Rng,
    data: SensorData,
}

impl SyntheticSensors {
    pub fn new(seed: u64) -> Self {
        SyntheticSensors {
            rng: ChaCha8Rng::seed_from_u64(seed),
            data: SensorData {
                accelerometer_z: -1024,
                temperature: 21,
                ..SensorData::default()
            },
        }
    }

    fn walk(&mut self, value: i32, step: i32, min: i32, max: i32) -> i32 {
        (value + self.rng.gen_range(-step..=step)).clamp(min, max)
    }

    fn flicker(&mut self, pressed: bool) -> bool {
        if self.rng.gen_bool(0.02) {
            !pressed
        } else {
            pressed
        }
    }
}

impl SensorSource for SyntheticSensors {
    fn read(&mut self) -> SensorData {
        let d = self.data;
        self.data = SensorData {
            accelerometer_x: self.walk(d.accelerometer_x, 40, -2048, 2047),
            accelerometer_y: self.walk(d.accelerometer_y, 40, -2048, 2047),
            accelerometer_z: self.walk(d.accelerometer_z, 40, -2048, 2047),
            magnetometer_x: self.walk(d.magnetometer_x, 200, -50_000, 50_000),
            magnetometer_y: self.walk(d.magnetometer_y, 200, -50_000, 50_000),
            magnetometer_z: self.walk(d.magnetometer_z, 200, -50_000, 50_000),
            button_a: self.flicker(d.button_a),
            button_b: self.flicker(d.button_b),
            button_logo: self.flicker(d.button_logo),
            button_p0: self.flicker(d.button_p0),
            button_p1: self.flicker(d.button_p1),
            button_p2: self.flicker(d.button_p2),
            temperature: self.walk(d.temperature, 1, -5, 50),
            light_level: self.walk(d.light_level, 8, 0, 255),
            sound_level: self.walk(d.sound_level, 16, 0, 255),
        };
        self.data
    }
}

/// Data polled by the scheduler at each telemetry deadline.
pub trait SnapshotSource {
    fn snapshot(&mut self, now_ms: u64) -> SensorSnapshot;
}

/// Local sensors read on demand; every snapshot is fresh.
pub struct LocalSnapshots<S> {
    sensors: S,
}

impl<S: SensorSource> LocalSnapshots<S> {
    pub fn new(sensors: S) -> Self {
        LocalSnapshots { sensors }
    }
}

impl<S: SensorSource> SnapshotSource for LocalSnapshots<S> {
    fn snapshot(&mut self, _now_ms: u64) -> SensorSnapshot {
        SensorSnapshot::fresh(self.sensors.read())
    }
}

/// Snapshots relayed from the active remote.
///
/// A press of the bridge's own button A asks the relay to switch remotes.
pub struct BridgeSnapshots {
    relay: Arc<BridgeRelay>,
    buttons: Option<Box<dyn SensorSource>>,
    button_was_pressed: bool,
}

impl BridgeSnapshots {
    pub fn new(relay: Arc<BridgeRelay>) -> Self {
        BridgeSnapshots {
            relay,
            buttons: None,
            button_was_pressed: false,
        }
    }

    /// Poll `buttons` for switch presses.
    pub fn with_switch_button(mut self, buttons: Box<dyn SensorSource>) -> Self {
        self.buttons = Some(buttons);
        self
    }
}

impl SnapshotSource for BridgeSnapshots {
    fn snapshot(&mut self, now_ms: u64) -> SensorSnapshot {
        if let Some(buttons) = self.buttons.as_mut() {
            let pressed = buttons.read().button_a;
            if pressed && !self.button_was_pressed {
                if let Some(active) = self.relay.request_switch(now_ms) {
                    tracing::debug!("switch button pressed, active remote {active}");
                }
            }
            self.button_was_pressed = pressed;
        }
        self.relay.take_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_deterministic() {
        let mut a = SyntheticSensors::new(7);
        let mut b = SyntheticSensors::new(7);
        for _ in 0..50 {
            assert_eq!(a.read(), b.read());
        }
    }

    #[test]
    fn test_synthetic_in_range() {
        let mut sensors = SyntheticSensors::new(1);
        for _ in 0..1_000 {
            let d = sensors.read();
            assert!((-2048..=2047).contains(&d.accelerometer_x));
            assert!((0..=255).contains(&d.light_level));
        }
    }

    #[test]
    fn test_local_snapshots_fresh() {
        let mut source = LocalSnapshots::new(SyntheticSensors::new(3));
        assert!(source.snapshot(0).fresh);
        assert!(source.snapshot(20).fresh);
    }
}
