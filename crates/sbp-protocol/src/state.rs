//! Protocol session state.

use crate::telemetry::SensorSet;

/// Version reported by the handshake.
pub const PROTOCOL_VERSION: &str = "1";

/// Number of radio channels; valid frequencies are `0..MAX_FREQUENCY`.
pub const MAX_FREQUENCY: u8 = 83;

/// Shortest accepted telemetry period in milliseconds.
pub const MIN_PERIOD_MS: u32 = 9;

/// Longest accepted telemetry period in milliseconds.
pub const MAX_PERIOD_MS: u32 = 10_000;

/// Telemetry period used until the host configures one.
pub const DEFAULT_PERIOD_MS: u32 = 20;

/// Default hardware version tag.
pub const DEFAULT_HW_VERSION: u32 = 2;

/// The single mutable session record.
///
/// Created once at startup and mutated only by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolState {
    /// Current radio channel.
    pub radio_frequency: u8,
    /// Paired or bridged remote device, if any.
    pub remote_id: Option<u32>,
    local_id: u32,
    /// Telemetry interval in milliseconds.
    pub period_ms: u32,
    /// Whether periodic messages are being sent.
    pub send_periodic: bool,
    /// Whether the compact encoding is selected.
    pub compact_mode: bool,
    /// Sensors included in periodic messages.
    pub enabled_sensors: SensorSet,
    pub hw_version: u32,
    pub sw_version: String,
}

impl ProtocolState {
    /// Create the session state for a device with the given identity.
    pub fn new(local_id: u32) -> Self {
        ProtocolState {
            radio_frequency: 0,
            remote_id: None,
            local_id,
            period_ms: DEFAULT_PERIOD_MS,
            send_periodic: false,
            compact_mode: false,
            enabled_sensors: SensorSet::empty(),
            hw_version: DEFAULT_HW_VERSION,
            sw_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Set the starting radio frequency, e.g. from persisted storage.
    pub fn with_radio_frequency(mut self, frequency: u8) -> Self {
        self.radio_frequency = frequency;
        self
    }

    /// Set the starting remote id, e.g. from persisted storage.
    pub fn with_remote_id(mut self, remote_id: Option<u32>) -> Self {
        self.remote_id = remote_id;
        self
    }

    /// Set the starting telemetry period.
    pub fn with_period_ms(mut self, period_ms: u32) -> Self {
        self.period_ms = period_ms.clamp(MIN_PERIOD_MS, MAX_PERIOD_MS);
        self
    }

    /// Set the reported version tags.
    pub fn with_versions(mut self, hw_version: u32, sw_version: impl Into<String>) -> Self {
        self.hw_version = hw_version;
        self.sw_version = sw_version.into();
        self
    }

    /// This device's own identity.
    pub fn local_id(&self) -> u32 {
        self.local_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = ProtocolState::new(1234);
        assert_eq!(state.local_id(), 1234);
        assert_eq!(state.period_ms, DEFAULT_PERIOD_MS);
        assert!(!state.send_periodic);
        assert!(state.enabled_sensors.is_empty());
        assert_eq!(state.sw_version, "0.1.0");
    }

    #[test]
    fn test_period_clamped() {
        assert_eq!(ProtocolState::new(0).with_period_ms(1).period_ms, MIN_PERIOD_MS);
        assert_eq!(
            ProtocolState::new(0).with_period_ms(u32::MAX).period_ms,
            MAX_PERIOD_MS
        );
    }
}
